//! Dedicated worker pools
//!
//! Every parallel loop in the crate uses rayon's ambient pool. Running an
//! operation through [`run_in_pool`] scopes those loops to a pool of the
//! requested size.

use log::debug;
use rayon::ThreadPoolBuilder;

use crate::error::{Error, Result};

/// Number of worker threads used when none is configured
pub fn default_threads() -> usize {
    num_cpus::get()
}

/// Runs `f` inside a fresh rayon pool with `n_threads` workers
///
/// # Arguments
///
/// * `n_threads` - Worker count; [`default_threads`] when `None`
/// * `f` - Work to run; its parallel iterators use the new pool
///
/// # Errors
///
/// [`Error::InvalidArgument`] for a zero thread count and
/// [`Error::ThreadPool`] if the pool cannot be built. Errors returned by
/// `f` are passed through.
pub fn run_in_pool<R, F>(n_threads: Option<usize>, f: F) -> Result<R>
where
    F: FnOnce() -> Result<R> + Send,
    R: Send,
{
    let n_threads = n_threads.unwrap_or_else(default_threads);
    if n_threads == 0 {
        return Err(Error::InvalidArgument {
            arg: "n_threads",
            reason: "must be at least 1".to_string(),
        });
    }

    let pool = ThreadPoolBuilder::new().num_threads(n_threads).build()?;
    debug!("running in a pool of {} threads", n_threads);
    pool.install(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size() {
        let threads = run_in_pool(Some(3), || Ok(rayon::current_num_threads())).unwrap();
        assert_eq!(threads, 3);
    }

    #[test]
    fn test_errors_pass_through() {
        let result: Result<()> = run_in_pool(Some(1), || Err(Error::EmptyInput("test")));
        assert!(matches!(result, Err(Error::EmptyInput("test"))));
        assert!(matches!(
            run_in_pool(Some(0), || Ok(())),
            Err(Error::InvalidArgument { .. })
        ));
    }
}
