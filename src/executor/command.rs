//! `go test` invocation assembly

#![allow(dead_code)]

use crate::models::Test;

/// Flag requesting structured output; always supplied by the runner
const JSON_FLAG: &str = "-json";

/// Arguments for one chunk's `go test` run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestCommand {
    go_binary: String,
    verbose: bool,
    count: Option<u32>,
    extra_args: Vec<String>,
    selector: String,
    packages: Vec<String>,
}

impl TestCommand {
    pub fn new(go_binary: impl Into<String>) -> Self {
        Self {
            go_binary: go_binary.into(),
            ..Default::default()
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn count(mut self, count: Option<u32>) -> Self {
        self.count = count;
        self
    }

    /// Passthrough flags for `go test`; `-json` is dropped
    pub fn extra_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.extra_args = args.into_iter().filter(|arg| arg != JSON_FLAG).collect();
        self
    }

    /// Select `tests` in the given import paths
    pub fn tests(mut self, tests: &[Test], packages: Vec<String>) -> Self {
        self.selector = run_selector(tests);
        self.packages = packages;
        self
    }

    pub fn program(&self) -> &str {
        &self.go_binary
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Arguments following the program name
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["test".to_string(), JSON_FLAG.to_string()];
        if self.verbose {
            args.push("-v".to_string());
        }
        if let Some(count) = self.count {
            args.push(format!("-count={count}"));
        }
        args.extend(self.extra_args.iter().cloned());
        args.push(format!("-run={}", self.selector));
        args.extend(self.packages.iter().cloned());
        args
    }
}

/// Anchored alternation of the top-level names of `tests`
///
/// Returns an empty string when there is nothing to select.
pub fn run_selector(tests: &[Test]) -> String {
    let mut names: Vec<&str> = Vec::with_capacity(tests.len());
    for test in tests {
        let name = test.parent_name();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    anchored(&names)
}

/// Build a selector from `package.Name` strings, keeping what follows the
/// last `.`
pub fn selector_from_qualified(names: &[String]) -> String {
    let leaves: Vec<&str> = names
        .iter()
        .map(|name| name.rsplit_once('.').map_or(name.as_str(), |(_, leaf)| leaf))
        .collect();
    anchored(&leaves)
}

fn anchored(names: &[&str]) -> String {
    if names.is_empty() {
        String::new()
    } else {
        format!("^({})$", names.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_uses_bare_names() {
        let tests = vec![
            Test::new("pkg/a", "TestOne"),
            Test::new("pkg/b", "TestTwo"),
        ];
        assert_eq!(run_selector(&tests), "^(TestOne|TestTwo)$");
    }

    #[test]
    fn test_selector_collapses_subtests_to_parent() {
        let tests = vec![
            Test::new("pkg", "TestMath/Add"),
            Test::new("pkg", "TestMath/Divide"),
            Test::new("pkg", "TestString"),
        ];
        assert_eq!(run_selector(&tests), "^(TestMath|TestString)$");
    }

    #[test]
    fn test_empty_selector() {
        assert_eq!(run_selector(&[]), "");
        assert_eq!(selector_from_qualified(&[]), "");
    }

    #[test]
    fn test_selector_from_qualified_names() {
        let names = vec![
            "pkg/example.TestSimple".to_string(),
            "pkg/v1.2.TestVersion".to_string(),
            "TestBare".to_string(),
        ];
        assert_eq!(
            selector_from_qualified(&names),
            "^(TestSimple|TestVersion|TestBare)$"
        );
    }

    #[test]
    fn test_args_order_and_json_dedup() {
        let command = TestCommand::new("go")
            .verbose(true)
            .count(Some(1))
            .extra_args(vec!["-race".to_string(), "-json".to_string()])
            .tests(
                &[Test::new("pkg/example", "TestSimple")],
                vec!["github.com/acme/widgets/pkg/example".to_string()],
            );

        assert_eq!(command.program(), "go");
        assert_eq!(
            command.args(),
            vec![
                "test",
                "-json",
                "-v",
                "-count=1",
                "-race",
                "-run=^(TestSimple)$",
                "github.com/acme/widgets/pkg/example",
            ]
        );
    }

    #[test]
    fn test_minimal_args() {
        let command = TestCommand::new("go").tests(
            &[Test::new(".", "TestRoot")],
            vec!["github.com/acme/widgets".to_string()],
        );
        assert_eq!(
            command.args(),
            vec!["test", "-json", "-run=^(TestRoot)$", "github.com/acme/widgets"]
        );
    }
}
