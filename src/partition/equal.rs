//! Deterministic equal split

use crate::models::Test;

/// Split sorted tests into `total` contiguous ranges of `ceil(n / total)`
/// tests; trailing chunks are empty when there are fewer tests than chunks
pub(super) fn split(sorted: &[Test], total: usize) -> Vec<Vec<Test>> {
    let len = sorted.len();
    let size = len.div_ceil(total);

    (0..total)
        .map(|index| {
            let start = (index * size).min(len);
            let end = ((index + 1) * size).min(len);
            sorted[start..end].to_vec()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(count: usize) -> Vec<Test> {
        (0..count)
            .map(|i| Test::new("pkg", format!("Test{i:02}")))
            .collect()
    }

    fn sizes(chunks: &[Vec<Test>]) -> Vec<usize> {
        chunks.iter().map(Vec::len).collect()
    }

    #[test]
    fn test_ceiling_sized_ranges() {
        let tests = numbered(10);
        let chunks = split(&tests, 3);
        assert_eq!(sizes(&chunks), vec![4, 4, 2]);
        assert_eq!(chunks[0][0], tests[0]);
        assert_eq!(chunks[2][1], tests[9]);
    }

    #[test]
    fn test_trailing_chunks_may_be_empty() {
        // ceil(5 / 4) = 2 leaves the last chunk without tests
        assert_eq!(sizes(&split(&numbered(5), 4)), vec![2, 2, 1, 0]);
        assert_eq!(sizes(&split(&numbered(1), 3)), vec![1, 0, 0]);
    }

    #[test]
    fn test_no_tests() {
        assert_eq!(sizes(&split(&[], 2)), vec![0, 0]);
    }
}
