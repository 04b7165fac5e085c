//! Shared test helpers for integration tests
//!
//! This module provides common utilities used across all test files.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo;
use assert_cmd::Command;
use tempfile::TempDir;

/// Helper to get a bando command
pub fn bando() -> Command {
    Command::new(cargo::cargo_bin!("bando"))
}

/// A module small enough to relax in a few milliseconds
pub const SMALL_CONFIG: &str = "\
cell_count: 4
bandolier_count: 2
max_steps: 400
sustained_step_count: 20
";

/// Write `content` into `name` inside a fresh temp directory
pub fn write_file(name: &str, content: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join(name);
    fs::write(&path, content).unwrap();
    (tmp, path)
}

/// Temp directory holding `model.yaml` with [`SMALL_CONFIG`]
pub fn small_config() -> (TempDir, PathBuf) {
    write_file("model.yaml", SMALL_CONFIG)
}

/// Sweep over 3 pitches × 2 Y-wall settings × 5 repeats, on the small base
pub fn small_sweep() -> (TempDir, PathBuf) {
    let content = format!(
        "iterations: 5\nseed: 11\nbase:\n{}axes:\n  - field: pitch_y2\n    values: [22.5, 23.0, 23.5]\n  - field: include_y_constraints\n    values: [false, true]\n",
        SMALL_CONFIG
            .lines()
            .map(|l| format!("  {}\n", l))
            .collect::<String>()
    );
    write_file("sweep.yaml", &content)
}
