//! CI parallelism detection
//!
//! Reads the slot position a CI provider assigns to a parallel job. Only
//! the command line consults this; chunking itself never reads the
//! environment.

/// 1-based chunk position reported by a CI provider
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkPosition {
    pub chunk: i64,
    pub chunks: i64,
}

/// Index variable, total variable and the offset that turns the index into
/// a 1-based position, in lookup order
const PROVIDERS: &[(&str, &str, i64)] = &[
    // Knapsack, Travis CI, GitLab
    ("CI_NODE_INDEX", "CI_NODE_TOTAL", 1),
    ("CIRCLE_NODE_INDEX", "CIRCLE_NODE_TOTAL", 0),
    ("BITBUCKET_PARALLEL_STEP", "BITBUCKET_PARALLEL_STEP_COUNT", 1),
    ("BUILDKITE_PARALLEL_JOB", "BUILDKITE_PARALLEL_JOB_COUNT", 0),
    ("SEMAPHORE_CURRENT_JOB", "SEMAPHORE_JOB_COUNT", 1),
];

/// Position from the first provider whose variables are both set and numeric
pub fn detect(lookup: impl Fn(&str) -> Option<String>) -> Option<ChunkPosition> {
    PROVIDERS.iter().find_map(|(index_var, total_var, offset)| {
        let index: i64 = lookup(index_var)?.trim().parse().ok()?;
        let chunks: i64 = lookup(total_var)?.trim().parse().ok()?;
        Some(ChunkPosition {
            chunk: index + offset,
            chunks,
        })
    })
}

/// Position from the process environment
pub fn detect_env() -> Option<ChunkPosition> {
    detect(|name| std::env::var(name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn detect_from(vars: &[(&str, &str)]) -> Option<ChunkPosition> {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        detect(|name| env.get(name).cloned())
    }

    #[test]
    fn test_gitlab_index_is_shifted() {
        assert_eq!(
            detect_from(&[("CI_NODE_INDEX", "0"), ("CI_NODE_TOTAL", "4")]),
            Some(ChunkPosition { chunk: 1, chunks: 4 })
        );
    }

    #[test]
    fn test_circle_and_buildkite_are_taken_as_is() {
        assert_eq!(
            detect_from(&[("CIRCLE_NODE_INDEX", "1"), ("CIRCLE_NODE_TOTAL", "3")]),
            Some(ChunkPosition { chunk: 1, chunks: 3 })
        );
        assert_eq!(
            detect_from(&[
                ("BUILDKITE_PARALLEL_JOB", "2"),
                ("BUILDKITE_PARALLEL_JOB_COUNT", "5")
            ]),
            Some(ChunkPosition { chunk: 2, chunks: 5 })
        );
    }

    #[test]
    fn test_semaphore_and_bitbucket() {
        assert_eq!(
            detect_from(&[("SEMAPHORE_CURRENT_JOB", "2"), ("SEMAPHORE_JOB_COUNT", "2")]),
            Some(ChunkPosition { chunk: 3, chunks: 2 })
        );
        assert_eq!(
            detect_from(&[
                ("BITBUCKET_PARALLEL_STEP", "0"),
                ("BITBUCKET_PARALLEL_STEP_COUNT", "2")
            ]),
            Some(ChunkPosition { chunk: 1, chunks: 2 })
        );
    }

    #[test]
    fn test_incomplete_or_invalid_providers_are_skipped() {
        assert_eq!(detect_from(&[]), None);
        assert_eq!(detect_from(&[("CI_NODE_INDEX", "0")]), None);

        // first provider unparsable, second one wins
        assert_eq!(
            detect_from(&[
                ("CI_NODE_INDEX", "zero"),
                ("CI_NODE_TOTAL", "4"),
                ("CIRCLE_NODE_INDEX", "2"),
                ("CIRCLE_NODE_TOTAL", "4"),
            ]),
            Some(ChunkPosition { chunk: 2, chunks: 4 })
        );
    }
}
