//! Integration tests for coderun
//!
//! The pipeline tests drive `/bin/sh`-backed languages and run everywhere.
//! Tests against real toolchains and Docker need the `integration-tests`
//! feature and are `#[ignore]`d by default:
//!    cargo test -p coderun --features integration-tests -- --include-ignored

use std::fs;
use std::path::Path;

use coderun::config::Config;

mod config_loading;
#[cfg(feature = "integration-tests")]
mod containers;
mod pipeline;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Helper to get fixture file content
#[cfg_attr(not(feature = "integration-tests"), allow(dead_code))]
pub(crate) fn fixture_source(name: &str) -> String {
    let path = format!("{FIXTURES_PATH}/sources/{name}");
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"))
}

/// Load a fixture config and point its workspaces at `root`
pub(crate) fn fixture_config(name: &str, root: &Path) -> Config {
    let path = format!("{FIXTURES_PATH}/configs/{name}");
    let mut config = Config::from_file(&path).expect("Failed to load config");
    config.workspace_root = Some(root.to_path_buf());
    config
}

/// Assert that every workspace under `root` has been removed
pub(crate) fn assert_no_workspaces(root: &Path) {
    let left: Vec<_> = fs::read_dir(root)
        .expect("Failed to read workspace root")
        .collect();
    assert!(left.is_empty(), "workspaces leaked: {left:?}");
}
