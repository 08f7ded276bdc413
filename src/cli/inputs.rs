// src/cli/inputs.rs
//
// Input resolution: turn command-line positional arguments into work items,
// consulting the source-path search list.

use std::path::{Path, PathBuf};

use glob::glob;

use crate::global::Global;
use crate::pack::PackName;

/// Extension of Fern source files, without the dot.
pub const SOURCE_EXT: &str = "fern";

/// One unit of requested work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// A source file that must be parsed.
    SourceFile(PathBuf),
    /// A module known by name, to be rebuilt from `path` if required.
    Module { pack: PackName, path: PathBuf },
}

/// Resolve the positional arguments into an ordered list of work items,
/// preserving argument order and deduplicating nothing. Unresolvable
/// arguments become diagnostics on `global`; the caller bails before any
/// compilation when that happened.
pub fn resolve_items(global: &mut Global) -> Vec<WorkItem> {
    let args = global.options.items.clone();
    let mut items = Vec::new();
    for arg in &args {
        resolve_one(global, arg, &mut items);
    }
    items
}

fn resolve_one(global: &mut Global, arg: &str, items: &mut Vec<WorkItem>) {
    let path = Path::new(arg);

    // "-" is the stdin/stdout pseudo-file.
    if arg == "-" || path.is_file() {
        items.push(WorkItem::SourceFile(PathBuf::from(arg)));
        return;
    }

    if path.is_dir() {
        collect_dir(arg, items);
        return;
    }

    if has_source_ext(path) {
        // A source path that is not an existing file: search the source path
        // unless it is absolute, which cannot be re-rooted.
        if path.is_absolute() {
            global.error(None, format!("could not read '{arg}'"));
            return;
        }
        let source_path = global.options.source_path.clone();
        for dir in &source_path {
            let candidate = dir.join(path);
            if candidate.is_file() {
                items.push(WorkItem::SourceFile(candidate));
                return;
            }
        }
        global.error(None, format!("could not find '{arg}' in source path"));
        return;
    }

    // Anything else is taken as a dotted module name.
    let Some(pack) = PackName::parse(arg) else {
        global.error(
            None,
            format!("'{arg}' is neither a file, a directory, nor a module name"),
        );
        return;
    };
    let source_path = global.options.source_path.clone();
    match find_on_source_path(&source_path, &pack) {
        Some(found) => items.push(WorkItem::Module { pack, path: found }),
        None => global.error(
            None,
            format!("could not find module '{pack}' on the source path"),
        ),
    }
}

/// Every readable `.fern` file under `dir`, recursively, in the order the
/// filesystem walk yields them. A directory without matches contributes
/// nothing; that is not an error.
fn collect_dir(dir: &str, items: &mut Vec<WorkItem>) {
    let pattern = format!("{}/**/*.{}", dir.trim_end_matches('/'), SOURCE_EXT);
    let entries = match glob(&pattern) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => items.push(WorkItem::SourceFile(path)),
            Ok(_) => {}
            Err(err) => {
                // Unreadable entries are skipped, not fatal.
                tracing::debug!("skipping unreadable path under {dir}: {err}");
            }
        }
    }
}

/// Locate the source file of `pack` by translating dots to path separators,
/// appending the source extension, and probing the source path in order.
pub fn find_on_source_path(dirs: &[PathBuf], pack: &PackName) -> Option<PathBuf> {
    let rel = pack.as_path(SOURCE_EXT);
    dirs.iter()
        .map(|dir| dir.join(&rel))
        .find(|candidate| candidate.is_file())
}

fn has_source_ext(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SOURCE_EXT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global::Global;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    fn global_for(args: &[&str]) -> Global {
        let mut argv = vec!["fernc"];
        argv.extend_from_slice(args);
        let mut opts = crate::cli::args::Options::parse_from(argv);
        opts.normalize();
        Global::new(opts)
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, "module X where\n").unwrap();
        path
    }

    #[test]
    fn file_argument_becomes_source_item() {
        let tmp = TempDir::new().unwrap();
        let file = touch(tmp.path(), "Hello.fern");
        let mut g = global_for(&[file.to_str().unwrap()]);
        let items = resolve_items(&mut g);
        assert_eq!(items, vec![WorkItem::SourceFile(file)]);
        assert!(!g.has_errors());
    }

    #[test]
    fn directory_argument_expands_recursively() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a/One.fern");
        touch(tmp.path(), "a/b/Two.fern");
        touch(tmp.path(), "a/ignored.txt");
        let mut g = global_for(&[tmp.path().to_str().unwrap()]);
        let items = resolve_items(&mut g);
        assert_eq!(items.len(), 2);
        assert!(!g.has_errors());
    }

    #[test]
    fn empty_directory_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let mut g = global_for(&[tmp.path().to_str().unwrap()]);
        let items = resolve_items(&mut g);
        assert!(items.is_empty());
        assert!(!g.has_errors());
    }

    #[test]
    fn relative_source_file_is_searched_on_source_path() {
        let tmp = TempDir::new().unwrap();
        let file = touch(tmp.path(), "Util.fern");
        let mut g = global_for(&["--source-path", tmp.path().to_str().unwrap(), "Util.fern"]);
        let items = resolve_items(&mut g);
        assert_eq!(items, vec![WorkItem::SourceFile(file)]);
    }

    #[test]
    fn missing_absolute_source_file_is_an_error() {
        let mut g = global_for(&["/no/such/place/X.fern"]);
        let items = resolve_items(&mut g);
        assert!(items.is_empty());
        assert!(g.has_errors());
    }

    #[test]
    fn module_name_resolves_through_source_path() {
        let tmp = TempDir::new().unwrap();
        let file = touch(tmp.path(), "a/b/C.fern");
        let mut g = global_for(&["--source-path", tmp.path().to_str().unwrap(), "a.b.C"]);
        let items = resolve_items(&mut g);
        let pack = PackName::parse("a.b.C").unwrap();
        assert_eq!(items, vec![WorkItem::Module { pack, path: file }]);
    }

    #[test]
    fn unknown_module_name_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let mut g = global_for(&["--source-path", tmp.path().to_str().unwrap(), "no.such.Mod"]);
        let items = resolve_items(&mut g);
        assert!(items.is_empty());
        assert!(g.has_errors());
    }

    #[test]
    fn dash_is_passed_through() {
        let mut g = global_for(&["-"]);
        let items = resolve_items(&mut g);
        assert_eq!(items, vec![WorkItem::SourceFile(PathBuf::from("-"))]);
    }

    #[test]
    fn argument_order_is_preserved() {
        let tmp = TempDir::new().unwrap();
        let one = touch(tmp.path(), "One.fern");
        let two = touch(tmp.path(), "Two.fern");
        let mut g = global_for(&[two.to_str().unwrap(), one.to_str().unwrap()]);
        let items = resolve_items(&mut g);
        assert_eq!(
            items,
            vec![WorkItem::SourceFile(two), WorkItem::SourceFile(one)]
        );
    }
}
