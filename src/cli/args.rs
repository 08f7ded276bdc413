// src/cli/args.rs

use clap::Parser;
use std::path::PathBuf;

/// Fern compiler: translates .fern modules to Java sources
#[derive(Parser, Debug, Clone)]
#[command(name = "fernc")]
#[command(version)]
#[command(about = "Fern compiler", long_about = None)]
pub struct Options {
    /// Build all modules reachable from the arguments, in dependency order
    #[arg(short = 'm', long)]
    pub make: bool,

    /// Print one timing line per compiler pass to stderr
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Retain diagnostics on the compiler state instead of printing them
    /// after each pass (for IDE/tooling use)
    #[arg(long, hide = true)]
    pub ide: bool,

    /// Run javac on the generated Java sources
    #[arg(long)]
    pub run_javac: bool,

    /// Directory where generated .java files are written
    #[arg(short = 'd', long = "dest", value_name = "DIR", default_value = ".")]
    pub dest: PathBuf,

    /// Directory searched for .fern sources (repeatable; default ".")
    #[arg(long = "source-path", value_name = "DIR")]
    pub source_path: Vec<PathBuf>,

    /// Class path entry handed to javac (repeatable)
    #[arg(long = "class-path", value_name = "PATH")]
    pub class_path: Vec<PathBuf>,

    /// Number of build workers in make mode (default: hardware threads)
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Source files, directories, or dotted module names
    #[arg(value_name = "ITEM", required = true)]
    pub items: Vec<String>,

    /// Name of the input currently being compiled ("-" for stdin).
    /// Set by the driver, not from the command line.
    #[arg(skip)]
    pub source: String,
}

impl Options {
    /// Fill in defaults clap cannot express: an empty source path means
    /// "search the current directory".
    pub fn normalize(&mut self) {
        if self.source_path.is_empty() {
            self.source_path.push(PathBuf::from("."));
        }
    }

    /// Worker count for make mode.
    pub fn effective_jobs(&self) -> usize {
        self.jobs
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_flags_and_items() {
        let opts = Options::parse_from([
            "fernc",
            "-m",
            "--verbose",
            "-d",
            "out",
            "--source-path",
            "src",
            "--source-path",
            "lib",
            "demo.Hello",
            "other.fern",
        ]);
        assert!(opts.make);
        assert!(opts.verbose);
        assert!(!opts.run_javac);
        assert_eq!(opts.dest, PathBuf::from("out"));
        assert_eq!(opts.source_path.len(), 2);
        assert_eq!(opts.items, vec!["demo.Hello", "other.fern"]);
    }

    #[test]
    fn normalize_defaults_source_path() {
        let mut opts = Options::parse_from(["fernc", "Hello.fern"]);
        assert!(opts.source_path.is_empty());
        opts.normalize();
        assert_eq!(opts.source_path, vec![PathBuf::from(".")]);
    }

    #[test]
    fn empty_argument_list_is_a_usage_error() {
        assert!(Options::try_parse_from(["fernc"]).is_err());
    }

    #[test]
    fn effective_jobs_is_at_least_one() {
        let mut opts = Options::parse_from(["fernc", "Hello.fern"]);
        opts.jobs = Some(0);
        assert_eq!(opts.effective_jobs(), 1);
    }
}
