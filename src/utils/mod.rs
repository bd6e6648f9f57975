//! Utility functions and helpers

pub mod formats;

/// Computes an exclusive prefix sum (scan) for a vector
pub fn exclusive_scan(input: &[usize]) -> Vec<usize> {
    let mut result = Vec::with_capacity(input.len() + 1);
    let mut sum = 0;

    result.push(0); // First element is always 0

    for &val in input {
        sum += val;
        result.push(sum);
    }

    result
}

/// Maps every flagged position to its rank among flagged positions
///
/// Unflagged positions map to `None`. Returns the mapping and the number of
/// flagged positions.
pub fn compact_index(flags: &[bool]) -> (Vec<Option<usize>>, usize) {
    let counts: Vec<usize> = flags.iter().map(|&f| usize::from(f)).collect();
    let offsets = exclusive_scan(&counts);
    let mapping = flags
        .iter()
        .zip(&offsets)
        .map(|(&f, &offset)| f.then_some(offset))
        .collect();
    (mapping, offsets[flags.len()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_scan() {
        let input = vec![1, 2, 3, 4];
        let expected = vec![0, 1, 3, 6, 10];
        assert_eq!(exclusive_scan(&input), expected);

        let input = vec![0, 0, 5, 0];
        let expected = vec![0, 0, 0, 5, 5];
        assert_eq!(exclusive_scan(&input), expected);
    }

    #[test]
    fn test_compact_index() {
        let (mapping, n) = compact_index(&[true, false, false, true, true]);
        assert_eq!(mapping, vec![Some(0), None, None, Some(1), Some(2)]);
        assert_eq!(n, 3);

        let (mapping, n) = compact_index(&[]);
        assert!(mapping.is_empty());
        assert_eq!(n, 0);
    }
}
