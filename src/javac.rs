// src/javac.rs
//! Invocation of the host Java compiler.

use std::path::PathBuf;
use std::process::Command;

use thiserror::Error;

use crate::cli::Options;
use crate::global::Global;

/// Registry description of the per-module pass; make mode filters on it.
pub const DESC: &str = "run java compiler";

/// Environment variable overriding the host compiler command. The value is
/// split on whitespace to yield the command-vector prefix.
pub const ENV_OVERRIDE: &str = "FERNC_JAVAC";

/// Diagnostic appended when the host compiler fails.
pub const NATIVE_HINT: &str =
    "java compiler errors are most likely caused by erroneous native definitions";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("could not run '{cmd}': {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{cmd}' exited with status {code}")]
    NonZero { cmd: String, code: i32 },
    #[error("invalid path in class or source path: {0}")]
    BadPath(String),
}

/// The host compiler command vector: `javac` unless overridden.
pub fn host_command() -> Vec<String> {
    match std::env::var(ENV_OVERRIDE) {
        Ok(value) if !value.trim().is_empty() => {
            value.split_whitespace().map(str::to_string).collect()
        }
        _ => vec!["javac".to_string()],
    }
}

/// Run the host compiler over `files` synchronously.
pub fn compile(options: &Options, files: &[PathBuf]) -> Result<(), ToolError> {
    let mut vector = host_command();
    let program = vector.remove(0);
    let mut cmd = Command::new(&program);
    cmd.args(&vector);

    // The output directory is always on the class path, so generated
    // modules can see each other's classes.
    let mut class_path = options.class_path.clone();
    class_path.push(options.dest.clone());
    let class_path = std::env::join_paths(&class_path)
        .map_err(|err| ToolError::BadPath(err.to_string()))?;
    let source_path = std::env::join_paths(&options.source_path)
        .map_err(|err| ToolError::BadPath(err.to_string()))?;

    cmd.arg("-cp").arg(class_path);
    cmd.arg("-d").arg(&options.dest);
    cmd.arg("-sourcepath").arg(source_path);
    cmd.arg("-encoding").arg("UTF-8");
    cmd.args(files);

    tracing::debug!(program = %program, count = files.len(), "invoking host compiler");
    let status = cmd.status().map_err(|source| ToolError::Spawn {
        cmd: program.clone(),
        source,
    })?;
    if status.success() {
        Ok(())
    } else {
        Err(ToolError::NonZero {
            cmd: program,
            code: status.code().unwrap_or(-1),
        })
    }
}

/// The `run-host-compiler` pass of the single-file pipeline. Only does
/// anything when `--run-javac` was given and a file was actually written.
pub fn run_pass(global: &mut Global) -> (&'static str, usize) {
    if !global.options.run_javac {
        return ("files", 0);
    }
    let Some(target) = global.gen.target_file.clone() else {
        return ("files", 0);
    };
    let options = global.options.clone();
    match compile(&options, &[target]) {
        Ok(()) => ("files", 1),
        Err(err) => {
            global.error(None, err.to_string());
            global.error(None, NATIVE_HINT);
            ("files", 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_command_is_javac() {
        // The override variable is process-global; only assert the default
        // when the environment does not set it.
        if std::env::var(ENV_OVERRIDE).is_err() {
            assert_eq!(host_command(), vec!["javac".to_string()]);
        }
    }

    #[test]
    fn override_splits_on_whitespace() {
        // Modifying the environment would race other tests; exercise the
        // splitting rule directly instead.
        let value = "/opt/jdk/bin/javac -nowarn";
        let parts: Vec<String> = value.split_whitespace().map(str::to_string).collect();
        assert_eq!(parts, vec!["/opt/jdk/bin/javac", "-nowarn"]);
    }
}
