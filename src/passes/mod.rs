// src/passes/mod.rs
//! The pass pipeline: the fixed registry of stages and the runner that
//! executes one stage against a compiler state.

pub mod definitions;
pub mod imports;
pub mod resolve;
#[cfg(test)]
pub mod testutil;
pub mod transform;
pub mod typecheck;

use std::time::Instant;

use crate::frontend::{lexer, parser};
use crate::gen::{java, metadata, printer};
use crate::global::Global;
use crate::javac;

/// One pipeline stage: the operation plus a human-readable description.
/// The operation returns an item-kind label and an item count, used purely
/// for the verbose timing report; all real results live on the state.
pub struct Pass {
    pub run: fn(&mut Global) -> (&'static str, usize),
    pub desc: &'static str,
}

impl Pass {
    const fn new(run: fn(&mut Global) -> (&'static str, usize), desc: &'static str) -> Pass {
        Pass { run, desc }
    }
}

/// The full, ordered pipeline for compiling a single file.
pub fn full_pipeline() -> Vec<Pass> {
    vec![
        Pass::new(lexer::run, "lexical analysis"),
        Pass::new(parser::run, "syntax analysis"),
        Pass::new(definitions::join_definitions, "join definitions"),
        Pass::new(imports::import_packages, "import packages"),
        Pass::new(imports::verify_imported_instances, "verify imported instances"),
        Pass::new(definitions::enter_definitions, "enter definitions"),
        Pass::new(definitions::field_definitions, "field definitions"),
        Pass::new(definitions::type_aliases, "process type aliases"),
        Pass::new(definitions::derive_instances, "derive instances"),
        Pass::new(resolve::resolve_names, "resolve names"),
        Pass::new(resolve::verify_class_defs, "verify class definitions"),
        Pass::new(resolve::verify_own_instances, "verify own instances"),
        Pass::new(transform::simplify_lets, "simplify lets"),
        Pass::new(typecheck::type_check, "type check"),
        Pass::new(transform::simplify_expressions, "simplify expressions"),
        Pass::new(transform::globalize_lambdas, "globalize lambdas"),
        Pass::new(transform::strictness_analysis, "strictness analysis"),
        Pass::new(printer::open, ""),
        Pass::new(metadata::run, "generate meta data"),
        Pass::new(java::run, "generate java code"),
        Pass::new(printer::close, ""),
        Pass::new(javac::run_pass, javac::DESC),
        Pass::new(clean_symbol_table, ""),
    ]
}

/// The pipeline used by make-mode workers: lexing and parsing happened
/// up-front, and the host compiler is batched over all modules at the end.
pub fn make_pipeline() -> Vec<Pass> {
    full_pipeline()
        .into_iter()
        .skip(2)
        .filter(|pass| pass.desc != javac::DESC)
        .collect()
}

/// Execute one pass against `global` (the C3 contract):
///
/// - with errors pending, the pass is skipped and nothing is timed;
/// - diagnostics are drained exactly once afterwards (kept in IDE mode);
/// - a pass that raised errors gets the printer closed at once, flushing
///   any partial emission;
/// - in verbose mode, described passes report timing and throughput.
///
/// Returns whether the pipeline may continue.
pub fn run_pass(global: &mut Global, pass: &Pass) -> bool {
    if global.has_errors() {
        return false;
    }
    tracing::trace!(pass = pass.desc, source = %global.options.source, "running pass");
    let start = Instant::now();
    let (kind, count) = (pass.run)(global);
    let elapsed = start.elapsed();

    if !global.options.ide {
        global.flush_messages();
    }
    if global.has_errors() {
        let _ = global.gen.printer.close();
    }
    if global.options.verbose && !pass.desc.is_empty() {
        let ms = elapsed.as_millis() as u64;
        let rate = (count as u64).saturating_mul(1000) / (ms + 1);
        eprintln!(
            "{:<40}  took  {}.{:03}s, {} {} ({} {}/s)",
            pass.desc,
            ms / 1000,
            ms % 1000,
            count,
            kind,
            rate,
            kind
        );
    }
    !global.has_errors()
}

/// The final pass: forget tokens, definitions, and symbols so a finished
/// state holds only options, messages, and counters.
fn clean_symbol_table(global: &mut Global) -> (&'static str, usize) {
    global.sub.tokens = Vec::new();
    global.sub.defs = Vec::new();
    global.sub.exports.clear();
    let count = global.sub.symtab.clear();
    ("symbols", count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Options;
    use clap::Parser as _;

    fn fresh(ide: bool) -> Global {
        let mut opts = Options::parse_from(["fernc", "X.fern"]);
        opts.normalize();
        opts.ide = ide;
        opts.source = "X.fern".to_string();
        Global::new(opts)
    }

    fn noisy_pass(global: &mut Global) -> (&'static str, usize) {
        global.hint(None, "from the pass");
        ("things", 1)
    }

    fn failing_pass(global: &mut Global) -> (&'static str, usize) {
        global.error(None, "pass failed");
        ("things", 0)
    }

    #[test]
    fn registry_has_the_fixed_length_and_order() {
        let full = full_pipeline();
        assert_eq!(full.len(), 23);
        assert_eq!(full[0].desc, "lexical analysis");
        assert_eq!(full[1].desc, "syntax analysis");
        assert_eq!(full[13].desc, "type check");
        assert_eq!(full[21].desc, javac::DESC);
    }

    #[test]
    fn make_pipeline_drops_frontend_and_javac() {
        let make = make_pipeline();
        assert_eq!(make.len(), 20);
        assert_eq!(make[0].desc, "join definitions");
        assert!(make.iter().all(|p| p.desc != javac::DESC));
        assert!(make.iter().all(|p| p.desc != "lexical analysis"));
    }

    #[test]
    fn pass_is_skipped_when_errors_pending() {
        let mut g = fresh(false);
        g.error(None, "earlier failure");
        let before = g.sub.messages.len();
        let pass = Pass::new(noisy_pass, "noisy");
        assert!(!run_pass(&mut g, &pass));
        // The pass body never ran and nothing was drained.
        assert_eq!(g.sub.messages.len(), before);
    }

    #[test]
    fn messages_are_drained_exactly_once() {
        let mut g = fresh(false);
        let pass = Pass::new(noisy_pass, "noisy");
        assert!(run_pass(&mut g, &pass));
        assert!(g.sub.messages.is_empty());
        assert!(!g.has_errors());
    }

    #[test]
    fn ide_mode_retains_messages() {
        let mut g = fresh(true);
        let pass = Pass::new(noisy_pass, "noisy");
        assert!(run_pass(&mut g, &pass));
        assert_eq!(g.sub.messages.len(), 1);
    }

    #[test]
    fn failing_pass_stops_the_pipeline() {
        let mut g = fresh(false);
        let failing = Pass::new(failing_pass, "failing");
        let after = Pass::new(noisy_pass, "after");
        assert!(!run_pass(&mut g, &failing));
        assert!(!run_pass(&mut g, &after));
        assert_eq!(g.sub.num_errors, 1);
    }
}
