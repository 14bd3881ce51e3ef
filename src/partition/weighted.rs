//! Timing-weighted balancing
//!
//! Longest-processing-time-first: the heaviest remaining test always goes
//! to the chunk with the smallest accumulated load. The makespan stays
//! within 4/3 of optimal and no two chunks differ by more than the
//! heaviest single test.

use std::time::Duration;

use crate::models::Test;

/// Balance sorted tests over `total` chunks
///
/// Returns each chunk's tests in canonical order together with its load.
/// Equal weights keep their canonical order and equal loads resolve to the
/// lowest chunk index, so the result depends only on the input.
pub(super) fn balance(
    sorted: &[Test],
    total: usize,
    weight: impl Fn(&Test) -> Duration,
) -> Vec<(Vec<Test>, Duration)> {
    let mut weighted: Vec<(&Test, Duration)> =
        sorted.iter().map(|test| (test, weight(test))).collect();
    // stable: ties keep canonical order
    weighted.sort_by(|a, b| b.1.cmp(&a.1));

    let mut chunks: Vec<(Vec<Test>, Duration)> = vec![(Vec::new(), Duration::ZERO); total];
    for (test, duration) in weighted {
        let lightest = lightest(&chunks);
        let (tests, load) = &mut chunks[lightest];
        tests.push(test.clone());
        *load += duration;
    }

    for (tests, _) in &mut chunks {
        tests.sort();
    }
    chunks
}

/// Index of the least loaded chunk, lowest index on ties
fn lightest(chunks: &[(Vec<Test>, Duration)]) -> usize {
    chunks
        .iter()
        .enumerate()
        .min_by_key(|(_, (_, load))| *load)
        .map(|(index, _)| index)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn millis(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn test_heaviest_first_into_lightest_chunk() {
        let tests: Vec<Test> = ["TestA", "TestB", "TestC", "TestD", "TestE"]
            .iter()
            .map(|n| Test::new("pkg", *n))
            .collect();
        let weights: HashMap<&str, u64> =
            [("TestA", 7), ("TestB", 5), ("TestC", 4), ("TestD", 3), ("TestE", 1)]
                .into_iter()
                .collect();

        let chunks = balance(&tests, 2, |t| millis(weights[t.name.as_str()]));

        // A(7) -> 0, B(5) -> 1, C(4) -> 1, D(3) -> 0, E(1) -> 1
        let names: Vec<Vec<&str>> = chunks
            .iter()
            .map(|(tests, _)| tests.iter().map(|t| t.name.as_str()).collect())
            .collect();
        assert_eq!(names, vec![vec!["TestA", "TestD"], vec!["TestB", "TestC", "TestE"]]);
        assert_eq!(chunks[0].1, millis(10));
        assert_eq!(chunks[1].1, millis(10));
    }

    #[test]
    fn test_equal_weights_round_robin_in_canonical_order() {
        let tests: Vec<Test> = (0..5).map(|i| Test::new("pkg", format!("Test{i}"))).collect();
        let chunks = balance(&tests, 2, |_| millis(1));

        assert_eq!(chunks[0].0, vec![tests[0].clone(), tests[2].clone(), tests[4].clone()]);
        assert_eq!(chunks[1].0, vec![tests[1].clone(), tests[3].clone()]);
    }

    #[test]
    fn test_lightest_prefers_lowest_index() {
        let chunks = vec![
            (Vec::new(), millis(5)),
            (Vec::new(), millis(2)),
            (Vec::new(), millis(2)),
        ];
        assert_eq!(lightest(&chunks), 1);
    }
}
