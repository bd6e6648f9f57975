// Contact matrix data structures

pub mod contact;
pub mod conversion;
pub mod triples;

pub use contact::SparseContactMatrix;
pub use triples::{check_partition, partition_from_labels, total_nnz, MergedTriples};
