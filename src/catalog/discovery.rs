//! Test discovery through the Go toolchain
//!
//! Runs `go list` and `go test -list` to enumerate the tests of a set of
//! package patterns.

#![allow(dead_code)]

use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

use super::{normalize_package, TestCatalog};
use crate::error::{ChunkError, Result};

/// Discovers tests by invoking the Go toolchain
#[derive(Clone, Debug)]
pub struct GoDiscovery {
    go_binary: String,
    dir: Option<PathBuf>,
}

impl Default for GoDiscovery {
    fn default() -> Self {
        Self::new("go")
    }
}

impl GoDiscovery {
    pub fn new(go_binary: impl Into<String>) -> Self {
        Self {
            go_binary: go_binary.into(),
            dir: None,
        }
    }

    /// Run the toolchain from a specific directory
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Path of the module in the working directory
    pub async fn module_name(&self) -> Result<String> {
        let output = self
            .go(&["list", "-m"], "resolving the module name")
            .await?;
        let module = output.lines().next().unwrap_or_default().trim().to_string();
        if module.is_empty() {
            return Err(ChunkError::discovery(
                "resolving the module name",
                "go list -m printed no module path",
            ));
        }
        Ok(module)
    }

    /// Import paths of every package matching the patterns
    pub async fn list_packages(&self, patterns: &[String]) -> Result<Vec<String>> {
        let mut args = vec!["list"];
        args.extend(patterns.iter().map(String::as_str));

        let output = self.go(&args, "listing packages").await?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Discover every test in the packages matching the patterns
    ///
    /// An empty pattern list means the current directory.
    pub async fn discover(&self, patterns: &[String]) -> Result<TestCatalog> {
        let patterns = if patterns.is_empty() {
            vec![".".to_string()]
        } else {
            patterns.to_vec()
        };

        let module = self.module_name().await?;
        let packages = self.list_packages(&patterns).await?;
        debug!("Found {} packages in module {}", packages.len(), module);

        let mut catalog = TestCatalog::for_module(&module);
        for package in &packages {
            let action = format!("listing tests for package {package}");
            let listing = self.go(&["test", "-list", ".", package], &action).await?;

            let relative = normalize_package(&module, package);
            let added = catalog.add_listing(&relative, &listing);
            debug!("  {}: {} tests", relative, added);
        }

        Ok(catalog)
    }

    /// Run a go subcommand, returning stdout or a discovery error carrying
    /// the combined output
    async fn go(&self, args: &[&str], action: &str) -> Result<String> {
        debug!("Running {} {}", self.go_binary, args.join(" "));

        let mut command = Command::new(&self.go_binary);
        command.args(args);
        if let Some(ref dir) = self.dir {
            command.current_dir(dir);
        }

        let output = command.output().await.map_err(|e| {
            ChunkError::discovery(action, format!("failed to run {}: {e}", self.go_binary))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ChunkError::discovery(action, format!("{stdout}{stderr}")));
        }

        Ok(stdout)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    /// Write a fake `go` that answers the three listing commands
    fn fake_go(dir: &std::path::Path, list_exit: i32) -> PathBuf {
        let script = format!(
            r#"#!/bin/sh
case "$1 $2" in
  "list -m") echo "github.com/acme/widgets" ;;
  "test -list")
    case "$4" in
      github.com/acme/widgets/pkg/a) printf 'TestOne\nTestTwo\nBenchmarkX\nok  \tgithub.com/acme/widgets/pkg/a\t0.01s\n' ;;
      *) printf 'TestRoot\nExampleDoc\n' ;;
    esac ;;
  list*)
    if [ {list_exit} -ne 0 ]; then echo "pattern ./nope: directory prefix . does not contain main module" >&2; exit {list_exit}; fi
    printf 'github.com/acme/widgets\ngithub.com/acme/widgets/pkg/a\n' ;;
esac
"#
        );
        let path = dir.join("go");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_discover_normalizes_and_filters() {
        let dir = tempdir().unwrap();
        let go = fake_go(dir.path(), 0);
        let discovery = GoDiscovery::new(go.to_string_lossy()).current_dir(dir.path());

        let catalog = discovery.discover(&["./...".to_string()]).await.unwrap();

        assert_eq!(catalog.module(), "github.com/acme/widgets");
        let tests: Vec<String> = catalog.iter().map(|t| t.to_string()).collect();
        assert_eq!(tests, vec!["TestRoot", "pkg/a.TestOne", "pkg/a.TestTwo"]);
    }

    #[tokio::test]
    async fn test_discover_reports_listing_output_verbatim() {
        let dir = tempdir().unwrap();
        let go = fake_go(dir.path(), 1);
        let discovery = GoDiscovery::new(go.to_string_lossy()).current_dir(dir.path());

        let err = discovery
            .discover(&["./nope".to_string()])
            .await
            .unwrap_err();

        match err {
            ChunkError::Discovery { action, output } => {
                assert_eq!(action, "listing packages");
                assert!(output.contains("does not contain main module"));
            }
            other => panic!("expected discovery error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_toolchain_is_a_discovery_error() {
        let discovery = GoDiscovery::new("/nonexistent/go-toolchain");
        let err = discovery.module_name().await.unwrap_err();
        assert!(matches!(err, ChunkError::Discovery { .. }));
    }
}
