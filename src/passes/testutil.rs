// src/passes/testutil.rs
//! Helpers for pass tests: run the pipeline up to (and including) a named
//! pass over source text on disk.

use std::path::Path;

use clap::Parser as _;
use tempfile::TempDir;

use crate::cli::Options;
use crate::global::Global;
use crate::passes::{full_pipeline, run_pass};

/// Write `files` (relative path, contents) into a fresh temp directory.
pub fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    for (rel, contents) in files {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create dirs");
        }
        std::fs::write(&path, contents).expect("write file");
    }
    dir
}

/// Compile a single standalone module up to the pass described by `upto`.
/// Diagnostics are retained on the state so tests can inspect them.
pub fn analyzed_upto(source: &str, upto: &str) -> Global {
    let dir = project(&[("T.fern", source)]);
    analyzed_upto_in(dir.path(), "T.fern", upto)
}

/// Same, but against a project directory that is also the source path.
pub fn analyzed_upto_in(root: &Path, main: &str, upto: &str) -> Global {
    let main_path = root.join(main);
    let mut opts = Options::parse_from([
        "fernc",
        "--source-path",
        &root.display().to_string(),
        &main_path.display().to_string(),
    ]);
    opts.normalize();
    opts.ide = true;
    opts.source = main_path.display().to_string();
    let mut global = Global::new(opts);
    for pass in full_pipeline() {
        run_pass(&mut global, &pass);
        if pass.desc == upto {
            break;
        }
    }
    global
}
