//! Test catalog
//!
//! Normalizes raw discovery output into a deduplicated set of tests.

#![allow(dead_code)]

mod discovery;

pub use discovery::GoDiscovery;

use std::collections::BTreeSet;

use crate::models::{Test, ROOT_PACKAGE};

/// Prefix every runnable test function carries
const TEST_PREFIX: &str = "Test";

/// The deduplicated universe of tests for one invocation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestCatalog {
    module: String,
    tests: BTreeSet<Test>,
}

impl TestCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty catalog for tests of the given module
    pub fn for_module(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            tests: BTreeSet::new(),
        }
    }

    /// Module path packages are relative to (empty when unknown)
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Import path of a module-relative package
    pub fn resolve(&self, package: &str) -> String {
        resolve_package(&self.module, package)
    }

    /// Add a test, returning false when it was already present
    pub fn insert(&mut self, test: Test) -> bool {
        self.tests.insert(test)
    }

    /// Add every test named in the output of `go test -list` for a package
    ///
    /// Lines that are not test functions (`ok` summaries, benchmarks,
    /// examples, blank lines) are ignored. Returns the number of new tests.
    pub fn add_listing(&mut self, package: &str, listing: &str) -> usize {
        listing
            .lines()
            .map(str::trim)
            .filter(|line| is_test_name(line))
            .filter(|name| self.insert(Test::new(package, *name)))
            .count()
    }

    /// Tests in canonical `(package, name)` order
    pub fn tests(&self) -> Vec<Test> {
        self.tests.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Test> {
        self.tests.iter()
    }

    pub fn contains(&self, test: &Test) -> bool {
        self.tests.contains(test)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Sorted unique packages across the catalog
    pub fn packages(&self) -> Vec<String> {
        packages_of(self.tests.iter())
    }
}

impl FromIterator<Test> for TestCatalog {
    fn from_iter<I: IntoIterator<Item = Test>>(iter: I) -> Self {
        Self {
            module: String::new(),
            tests: iter.into_iter().collect(),
        }
    }
}

impl Extend<Test> for TestCatalog {
    fn extend<I: IntoIterator<Item = Test>>(&mut self, iter: I) {
        self.tests.extend(iter);
    }
}

/// Sorted unique packages of a set of tests
pub fn packages_of<'a>(tests: impl IntoIterator<Item = &'a Test>) -> Vec<String> {
    tests
        .into_iter()
        .map(|test| test.package.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Whether a listed symbol follows the test naming convention
fn is_test_name(symbol: &str) -> bool {
    match symbol.strip_prefix(TEST_PREFIX) {
        // `TestMain` is the harness entry point, not a test
        Some("Main") => false,
        Some(rest) => rest
            .chars()
            .next()
            .map_or(true, |c| !c.is_lowercase()),
        None => false,
    }
}

/// Make a package path relative to the module root
///
/// `github.com/acme/app/pkg/x` becomes `pkg/x` and the module itself
/// becomes `.`. Paths outside the module are returned unchanged.
pub fn normalize_package(module: &str, package: &str) -> String {
    let package = package.trim();
    let module = module.trim().trim_end_matches('/');
    if module.is_empty() {
        return package.trim_start_matches("./").to_string();
    }
    if package == module {
        return ROOT_PACKAGE.to_string();
    }
    match package
        .strip_prefix(module)
        .and_then(|rest| rest.strip_prefix('/'))
    {
        Some(relative) => relative.to_string(),
        None => package.trim_start_matches("./").to_string(),
    }
}

/// Map a module-relative package back to its import path
pub fn resolve_package(module: &str, package: &str) -> String {
    if module.is_empty() {
        return if package == ROOT_PACKAGE {
            ROOT_PACKAGE.to_string()
        } else {
            format!("./{package}")
        };
    }
    if package == ROOT_PACKAGE {
        module.to_string()
    } else {
        format!("{module}/{package}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULE: &str = "github.com/acme/widgets";

    #[test]
    fn test_add_listing_filters_non_tests() {
        let listing = "TestSimple\nTestParallel\nBenchmarkSort\nExampleMultiply\nTestMain\nTestable\nok  \tgithub.com/acme/widgets/pkg/example\t0.002s\n\n";
        let mut catalog = TestCatalog::new();
        let added = catalog.add_listing("pkg/example", listing);

        assert_eq!(added, 2);
        let names: Vec<String> = catalog.iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, vec!["TestParallel", "TestSimple"]);
    }

    #[test]
    fn test_duplicates_collapse() {
        let mut catalog = TestCatalog::new();
        catalog.add_listing("pkg/a", "TestOne\nTestTwo");
        let added = catalog.add_listing("pkg/a", "TestTwo\nTestThree");

        assert_eq!(added, 1);
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_order_independent() {
        let forward: TestCatalog = vec![Test::new("b", "TestB"), Test::new("a", "TestA")]
            .into_iter()
            .collect();
        let reverse: TestCatalog = vec![Test::new("a", "TestA"), Test::new("b", "TestB")]
            .into_iter()
            .collect();
        assert_eq!(forward, reverse);
        assert_eq!(forward.tests()[0], Test::new("a", "TestA"));
    }

    #[test]
    fn test_packages_sorted_unique() {
        let catalog: TestCatalog = vec![
            Test::new("pkg/example/sub", "TestMath"),
            Test::new("pkg/example", "TestSimple"),
            Test::new("pkg/example", "TestParallel"),
        ]
        .into_iter()
        .collect();

        assert_eq!(catalog.packages(), vec!["pkg/example", "pkg/example/sub"]);
    }

    #[test]
    fn test_normalize_package() {
        assert_eq!(
            normalize_package(MODULE, "github.com/acme/widgets/pkg/example"),
            "pkg/example"
        );
        assert_eq!(normalize_package(MODULE, MODULE), ".");
        assert_eq!(normalize_package(MODULE, "./pkg/x"), "pkg/x");
        // a sibling module sharing a prefix is not stripped
        assert_eq!(
            normalize_package(MODULE, "github.com/acme/widgets2/pkg"),
            "github.com/acme/widgets2/pkg"
        );
        assert_eq!(normalize_package("", "./pkg/x"), "pkg/x");
    }

    #[test]
    fn test_resolve_package() {
        assert_eq!(
            resolve_package(MODULE, "pkg/example"),
            "github.com/acme/widgets/pkg/example"
        );
        assert_eq!(resolve_package(MODULE, "."), MODULE);
        assert_eq!(resolve_package("", "pkg/example"), "./pkg/example");
    }

    #[test]
    fn test_catalog_resolves_against_its_module() {
        let catalog = TestCatalog::for_module(MODULE);
        assert_eq!(catalog.module(), MODULE);
        assert_eq!(catalog.resolve("pkg/example/sub"), format!("{MODULE}/pkg/example/sub"));
    }

    #[test]
    fn test_is_test_name() {
        assert!(is_test_name("TestSimple"));
        assert!(is_test_name("Test"));
        assert!(is_test_name("Test_underscore"));
        assert!(!is_test_name("Testable"));
        assert!(!is_test_name("TestMain"));
        assert!(!is_test_name("BenchmarkX"));
        assert!(!is_test_name("ExampleX"));
        assert!(!is_test_name("FuzzX"));
    }
}
