// src/driver.rs
//! The single-file driver: one fresh compiler state per input, the full
//! pass pipeline, no state shared between files.

use std::path::Path;

use crate::cli::{Options, WorkItem};
use crate::global::Global;
use crate::passes::{full_pipeline, run_pass};

/// Compile one source file through the complete pipeline on a fresh state.
/// The returned state carries the error count and, in IDE mode, the
/// retained diagnostics.
pub fn compile_file(options: &Options, path: &Path) -> Global {
    let mut options = options.clone();
    options.source = path.display().to_string();
    let mut global = Global::new(options);
    tracing::debug!(source = %global.options.source, "compiling");
    for pass in full_pipeline() {
        run_pass(&mut global, &pass);
    }
    global
}

/// Run only the lexer and parser on `path`, retaining diagnostics on the
/// returned state so the caller can merge them. Used by make mode, which
/// parses everything up front.
pub fn lex_and_parse(options: &Options, path: &Path) -> Global {
    let mut options = options.clone();
    options.source = path.display().to_string();
    let ide = options.ide;
    options.ide = true;
    let mut global = Global::new(options);
    for pass in full_pipeline().iter().take(2) {
        run_pass(&mut global, pass);
    }
    global.options.ide = ide;
    global
}

/// Compile the work items in argument order, each on its own state.
/// Returns whether everything (including input resolution on `parent`)
/// finished without errors.
pub fn compile_all(parent: &mut Global, items: &[WorkItem]) -> bool {
    for item in items {
        let path = match item {
            WorkItem::SourceFile(path) => path.clone(),
            WorkItem::Module { path, .. } => path.clone(),
        };
        let mut child = compile_file(&parent.options, &path);
        if parent.options.ide {
            parent.merge_diagnostics(&mut child);
        } else {
            parent.sub.num_errors += child.sub.num_errors;
        }
    }
    !parent.has_errors()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::inputs::resolve_items;
    use crate::gen::printer::target_path;
    use crate::pack::PackName;
    use crate::passes::testutil::project;
    use clap::Parser as _;

    fn options_for(args: &[&str]) -> Options {
        let mut argv = vec!["fernc"];
        argv.extend_from_slice(args);
        let mut opts = Options::parse_from(argv);
        opts.normalize();
        opts
    }

    #[test]
    fn single_file_produces_output_and_no_errors() {
        let dir = project(&[(
            "Hello.fern",
            "module demo.Hello where\n\
             greeting :: String\n\
             greeting = \"hello\" ++ \" world\"\n\
             main = greeting\n",
        )]);
        let out = dir.path().join("out");
        let opts = options_for(&[
            "-d",
            &out.display().to_string(),
            &dir.path().join("Hello.fern").display().to_string(),
        ]);
        let g = compile_file(&opts, &dir.path().join("Hello.fern"));
        assert!(!g.has_errors(), "messages: {:?}", g.sub.messages);
        let expected = target_path(&out, &PackName::parse("demo.Hello").unwrap());
        assert!(expected.is_file(), "missing {}", expected.display());
        let java = std::fs::read_to_string(&expected).unwrap();
        assert!(java.starts_with("// generated by fernc"));
        assert!(java.contains("@FernModule"));
        assert!(java.contains("public final class Hello"));
    }

    #[test]
    fn compile_is_deterministic() {
        let dir = project(&[(
            "M.fern",
            "module M where\n\
             data Pair = Pair { a :: Int, b :: Int } deriving (Eq, Show)\n\
             sum :: Pair -> Int\n\
             sum p = a p + b p\n\
             main = sum (Pair 20 22)\n",
        )]);
        let out = dir.path().join("out");
        let opts = options_for(&[
            "-d",
            &out.display().to_string(),
            &dir.path().join("M.fern").display().to_string(),
        ]);
        let first = {
            let g = compile_file(&opts, &dir.path().join("M.fern"));
            assert!(!g.has_errors(), "messages: {:?}", g.sub.messages);
            std::fs::read(target_path(&out, &PackName::parse("M").unwrap())).unwrap()
        };
        let second = {
            let g = compile_file(&opts, &dir.path().join("M.fern"));
            assert!(!g.has_errors());
            std::fs::read(target_path(&out, &PackName::parse("M").unwrap())).unwrap()
        };
        assert_eq!(first, second);
    }

    #[test]
    fn parse_error_leaves_no_output() {
        let dir = project(&[("Bad.fern", "module Bad where\nx = )\n")]);
        let out = dir.path().join("out");
        let opts = options_for(&[
            "--ide",
            "-d",
            &out.display().to_string(),
            &dir.path().join("Bad.fern").display().to_string(),
        ]);
        let g = compile_file(&opts, &dir.path().join("Bad.fern"));
        assert!(g.has_errors());
        let target = target_path(&out, &PackName::parse("Bad").unwrap());
        assert!(!target.exists());
        // The diagnostic carries the offending line.
        assert!(g
            .sub
            .messages
            .iter()
            .any(|m| m.pos.is_some_and(|p| p.line == 2)));
    }

    #[test]
    fn type_error_stops_before_emission() {
        let dir = project(&[(
            "T.fern",
            "module T where\nv :: Int\nv = \"nope\"\n",
        )]);
        let out = dir.path().join("out");
        let opts = options_for(&[
            "--ide",
            "-d",
            &out.display().to_string(),
            &dir.path().join("T.fern").display().to_string(),
        ]);
        let g = compile_file(&opts, &dir.path().join("T.fern"));
        assert!(g.has_errors());
        assert!(!target_path(&out, &PackName::parse("T").unwrap()).exists());
    }

    #[test]
    fn compile_all_accumulates_errors_across_files() {
        let dir = project(&[
            ("Good.fern", "module Good where\nv :: Int\nv = 1\n"),
            ("Bad.fern", "module Bad where\nx = )\n"),
        ]);
        let out = dir.path().join("out");
        let opts = options_for(&[
            "--ide",
            "-d",
            &out.display().to_string(),
            &dir.path().join("Good.fern").display().to_string(),
            &dir.path().join("Bad.fern").display().to_string(),
        ]);
        let mut parent = Global::new(opts);
        let items = resolve_items(&mut parent);
        assert!(!parent.has_errors());
        assert!(!compile_all(&mut parent, &items));
        assert!(parent.has_errors());
        // The good module still produced its output.
        assert!(target_path(&out, &PackName::parse("Good").unwrap()).is_file());
    }

    #[test]
    fn lex_and_parse_retains_messages() {
        let dir = project(&[("Bad.fern", "module Bad where\nx = )\n")]);
        let opts = options_for(&[&dir.path().join("Bad.fern").display().to_string()]);
        let g = lex_and_parse(&opts, &dir.path().join("Bad.fern"));
        assert!(g.has_errors());
        assert!(!g.sub.messages.is_empty());
        // The caller's IDE flag is restored.
        assert!(!g.options.ide);
    }
}
