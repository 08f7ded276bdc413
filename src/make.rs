// src/make.rs
//! Make mode: parse every root up front, build a dependency work set keyed
//! by module identity, and schedule module builds on a worker pool.
//!
//! Workers share a mutex-guarded build state and a condvar. A worker claims
//! the first actionable entry in insertion order: any pending `CheckUpdate`
//! (locating and parsing a module needs no dependencies), or a pending
//! `CompileAfterDeps` whose dependencies have all completed or left the
//! work set. When nothing is actionable, no worker is busy, and pending
//! entries remain, those entries form a dependency cycle and are failed
//! with one error naming them.

use std::path::PathBuf;
use std::sync::{Condvar, Mutex, MutexGuard};

use rustc_hash::FxHashMap;

use crate::cli::inputs::find_on_source_path;
use crate::cli::{Options, WorkItem};
use crate::diag::{self, Message, Severity};
use crate::driver::lex_and_parse;
use crate::global::Global;
use crate::javac;
use crate::pack::PackName;
use crate::passes::{make_pipeline, run_pass};

/// Why a module entered the work set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    Root,
    DependencyOf(PackName),
}

/// One entry of the work set.
pub enum Todo {
    /// Parsed; compiles once its dependencies are done.
    CompileAfterDeps { global: Box<Global>, reason: Reason },
    /// Known by name only; must be located and parsed first.
    CheckUpdate { reason: Reason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Pending,
    Busy,
    Done,
    Failed,
}

#[derive(Default)]
struct BuildState {
    /// Insertion order; ties among ready entries resolve in this order.
    order: Vec<PackName>,
    todo: FxHashMap<PackName, Todo>,
    status: FxHashMap<PackName, Status>,
    deps: FxHashMap<PackName, Vec<PackName>>,
    /// Successfully written Java files, for the batched host compile.
    emitted: Vec<PathBuf>,
    /// Messages to hand back to the parent state (IDE mode and skip notes).
    deferred: Vec<Message>,
    errors: usize,
    busy: usize,
}

impl BuildState {
    fn known(&self, pack: &PackName) -> bool {
        self.todo.contains_key(pack) || self.status.contains_key(pack)
    }

    /// A module named on the command line. Never demotes a parsed entry;
    /// the reason is upgraded to root either way.
    fn add_root_name(&mut self, pack: PackName) {
        match self.todo.get_mut(&pack) {
            Some(Todo::CompileAfterDeps { reason, .. }) => *reason = Reason::Root,
            Some(Todo::CheckUpdate { reason }) => *reason = Reason::Root,
            None => {
                self.todo.insert(pack.clone(), Todo::CheckUpdate { reason: Reason::Root });
                self.status.insert(pack.clone(), Status::Pending);
                self.order.push(pack);
            }
        }
    }

    /// A dependency discovered during parsing: insert or keep.
    fn add_dependency(&mut self, pack: PackName, of: PackName) {
        if self.known(&pack) {
            return;
        }
        self.todo.insert(
            pack.clone(),
            Todo::CheckUpdate {
                reason: Reason::DependencyOf(of),
            },
        );
        self.status.insert(pack.clone(), Status::Pending);
        self.order.push(pack);
    }

    /// A parsed module. Supersedes any `CheckUpdate` for the same key.
    fn add_parsed(
        &mut self,
        pack: PackName,
        global: Box<Global>,
        reason: Reason,
        deps: Vec<PackName>,
    ) {
        let reason = match (&reason, self.todo.get(&pack)) {
            // Once a root, always a root.
            (_, Some(Todo::CheckUpdate { reason: Reason::Root }))
            | (_, Some(Todo::CompileAfterDeps { reason: Reason::Root, .. })) => Reason::Root,
            _ => reason,
        };
        if !self.known(&pack) {
            self.order.push(pack.clone());
        }
        self.todo
            .insert(pack.clone(), Todo::CompileAfterDeps { global, reason });
        self.status.insert(pack.clone(), Status::Pending);
        self.deps.insert(pack, deps);
    }

    fn all_terminal(&self) -> bool {
        self.order
            .iter()
            .all(|pack| matches!(self.status[pack], Status::Done | Status::Failed))
    }

    /// First actionable entry in insertion order. Entries whose
    /// dependencies failed are failed in place with a note, not claimed.
    fn claim(&mut self) -> Option<(PackName, Todo)> {
        for i in 0..self.order.len() {
            let pack = self.order[i].clone();
            if self.status[&pack] != Status::Pending {
                continue;
            }
            match self.todo.get(&pack) {
                Some(Todo::CheckUpdate { .. }) => {
                    if let Some(todo) = self.todo.remove(&pack) {
                        self.status.insert(pack.clone(), Status::Busy);
                        return Some((pack, todo));
                    }
                }
                Some(Todo::CompileAfterDeps { .. }) => {
                    let deps = self.deps.get(&pack).cloned().unwrap_or_default();
                    let mut ready = true;
                    let mut failed_dep = None;
                    for dep in &deps {
                        match self.status.get(dep) {
                            None | Some(Status::Done) => {}
                            Some(Status::Failed) => failed_dep = Some(dep.clone()),
                            Some(Status::Pending) | Some(Status::Busy) => {
                                ready = false;
                                break;
                            }
                        }
                    }
                    if !ready {
                        continue;
                    }
                    if let Some(dep) = failed_dep {
                        self.status.insert(pack.clone(), Status::Failed);
                        self.deferred.push(Message {
                            file: String::new(),
                            pos: None,
                            severity: Severity::Hint,
                            text: format!("module '{pack}' not built: errors in dependency '{dep}'"),
                        });
                        continue;
                    }
                    if let Some(todo) = self.todo.remove(&pack) {
                        self.status.insert(pack.clone(), Status::Busy);
                        return Some((pack, todo));
                    }
                }
                None => continue,
            }
        }
        None
    }

    /// Fail all still-pending entries as one dependency cycle.
    fn fail_cycle(&mut self) {
        let stuck: Vec<PackName> = self
            .order
            .iter()
            .filter(|pack| self.status[*pack] == Status::Pending)
            .cloned()
            .collect();
        if stuck.is_empty() {
            return;
        }
        let names: Vec<String> = stuck.iter().map(|p| p.to_string()).collect();
        let message = Message {
            file: String::new(),
            pos: None,
            severity: Severity::Error,
            text: format!(
                "circular dependencies among modules: {}",
                names.join(", ")
            ),
        };
        self.errors += 1;
        self.deferred.push(message);
        for pack in stuck {
            self.status.insert(pack, Status::Failed);
        }
    }
}

/// What a worker produced outside the lock.
enum Outcome {
    /// A `CheckUpdate` was located and parsed.
    Parsed {
        global: Box<Global>,
        deps: Vec<PackName>,
        reason: Reason,
    },
    /// The module's source is not on the source path but it was only a
    /// dependency: assume it exists pre-built on the class path.
    External,
    /// A failure with an already-formatted message (counted as one error).
    Error(Message),
    /// Parsing found errors; they were already reported or deferred.
    ParseFailed { errors: usize, messages: Vec<Message> },
    /// A `CompileAfterDeps` ran the make pipeline.
    Compiled {
        emitted: Option<PathBuf>,
        errors: usize,
        messages: Vec<Message>,
    },
}

struct Shared {
    state: Mutex<BuildState>,
    cv: Condvar,
    options: Options,
}

/// The make orchestrator: build the work set from the input items, run the
/// worker pool, then invoke the host compiler once over everything emitted.
/// Returns whether the whole build finished without errors.
pub fn build(parent: &mut Global, items: Vec<WorkItem>) -> bool {
    let mut state = BuildState::default();

    // Parse all roots up front.
    for item in items {
        match item {
            WorkItem::Module { pack, .. } => state.add_root_name(pack),
            WorkItem::SourceFile(path) => {
                let mut child = lex_and_parse(&parent.options, &path);
                let failed = child.has_errors();
                let this_pack = child.sub.this_pack.clone();
                parent.merge_diagnostics(&mut child);
                if !parent.options.ide {
                    parent.flush_messages();
                }
                if failed {
                    // Parse failure skips the file; the errors already count.
                    continue;
                }
                let Some(pack) = this_pack else {
                    parent.error(None, format!("'{}' does not define a module", path.display()));
                    if !parent.options.ide {
                        parent.flush_messages();
                    }
                    continue;
                };
                let deps: Vec<PackName> =
                    child.sub.imports.iter().map(|i| i.pack.clone()).collect();
                tracing::debug!(module = %pack, deps = deps.len(), "parsed root");
                for dep in &deps {
                    state.add_dependency(dep.clone(), pack.clone());
                }
                state.add_parsed(pack, Box::new(child), Reason::Root, deps);
            }
        }
    }

    // Run the worker pool.
    let jobs = parent
        .options
        .effective_jobs()
        .min(state.order.len().max(1));
    let shared = Shared {
        state: Mutex::new(state),
        cv: Condvar::new(),
        options: parent.options.clone(),
    };
    std::thread::scope(|scope| {
        for _ in 0..jobs {
            scope.spawn(|| worker(&shared));
        }
    });
    let state = match shared.state.into_inner() {
        Ok(state) => state,
        Err(poisoned) => poisoned.into_inner(),
    };

    // Hand results back to the parent driver state.
    parent.sub.num_errors += state.errors;
    for msg in state.deferred.into_iter().rev() {
        parent.sub.messages.push_front(msg);
    }
    if !parent.options.ide {
        parent.flush_messages();
    }

    // One host-compiler run over the full emitted set.
    if parent.options.run_javac && !state.emitted.is_empty() {
        let options = parent.options.clone();
        if let Err(err) = javac::compile(&options, &state.emitted) {
            parent.error(None, err.to_string());
            parent.error(None, javac::NATIVE_HINT);
            if !parent.options.ide {
                parent.flush_messages();
            }
        }
    }

    !parent.has_errors()
}

fn lock<'a>(mutex: &'a Mutex<BuildState>) -> MutexGuard<'a, BuildState> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn worker(shared: &Shared) {
    let mut guard = lock(&shared.state);
    loop {
        if let Some((pack, todo)) = guard.claim() {
            guard.busy += 1;
            drop(guard);
            let outcome = process(shared, &pack, todo);
            guard = lock(&shared.state);
            guard.busy -= 1;
            apply(&mut guard, &pack, outcome);
            shared.cv.notify_all();
            continue;
        }
        if guard.all_terminal() {
            shared.cv.notify_all();
            return;
        }
        if guard.busy == 0 {
            // Nothing actionable, nothing running, pending entries remain:
            // the leftovers form a dependency cycle.
            guard.fail_cycle();
            shared.cv.notify_all();
            return;
        }
        guard = match shared.cv.wait(guard) {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
    }
}

fn process(shared: &Shared, pack: &PackName, todo: Todo) -> Outcome {
    match todo {
        Todo::CheckUpdate { reason } => {
            let Some(path) = find_on_source_path(&shared.options.source_path, pack) else {
                return match reason {
                    Reason::Root => Outcome::Error(Message {
                        file: String::new(),
                        pos: None,
                        severity: Severity::Error,
                        text: format!("could not find module '{pack}' on the source path"),
                    }),
                    Reason::DependencyOf(_) => {
                        tracing::debug!(module = %pack, "not on source path, assuming pre-built");
                        Outcome::External
                    }
                };
            };
            let mut child = lex_and_parse(&shared.options, &path);
            if !child.has_errors() && child.sub.this_pack.as_ref() != Some(pack) {
                let found = child
                    .sub
                    .this_pack
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "nothing".to_string());
                child.error(
                    None,
                    format!("'{}' defines module '{found}', expected '{pack}'", path.display()),
                );
            }
            if child.has_errors() {
                let errors = child.sub.num_errors;
                let messages = drain_or_flush(shared, &mut child);
                return Outcome::ParseFailed { errors, messages };
            }
            let deps: Vec<PackName> = child.sub.imports.iter().map(|i| i.pack.clone()).collect();
            tracing::debug!(module = %pack, deps = deps.len(), "parsed dependency");
            // Messages from a clean parse are at most hints; surface them.
            let _ = drain_or_flush(shared, &mut child);
            Outcome::Parsed {
                global: Box::new(child),
                deps,
                reason,
            }
        }
        Todo::CompileAfterDeps { mut global, .. } => {
            tracing::debug!(module = %pack, "building");
            for pass in make_pipeline() {
                run_pass(&mut global, &pass);
            }
            let errors = global.sub.num_errors;
            let emitted = if errors == 0 {
                global.gen.target_file.clone()
            } else {
                None
            };
            let messages = if shared.options.ide {
                global.sub.messages.drain(..).collect()
            } else {
                Vec::new()
            };
            Outcome::Compiled {
                emitted,
                errors,
                messages,
            }
        }
    }
}

/// In IDE mode child messages are handed to the caller; otherwise they are
/// printed now under one stderr lock.
fn drain_or_flush(shared: &Shared, child: &mut Global) -> Vec<Message> {
    if shared.options.ide {
        child.sub.messages.drain(..).collect()
    } else {
        diag::flush(&mut child.sub.messages);
        Vec::new()
    }
}

fn apply(state: &mut BuildState, pack: &PackName, outcome: Outcome) {
    match outcome {
        Outcome::Parsed {
            global,
            deps,
            reason,
        } => {
            for dep in &deps {
                state.add_dependency(dep.clone(), pack.clone());
            }
            state.add_parsed(pack.clone(), global, reason, deps);
        }
        Outcome::External => {
            state.status.insert(pack.clone(), Status::Done);
        }
        Outcome::Error(message) => {
            if !state.deferred.iter().any(|m| m.text == message.text) {
                state.errors += 1;
                state.deferred.push(message);
            }
            state.status.insert(pack.clone(), Status::Failed);
        }
        Outcome::ParseFailed { errors, messages } => {
            state.errors += errors;
            state.deferred.extend(messages);
            state.status.insert(pack.clone(), Status::Failed);
        }
        Outcome::Compiled {
            emitted,
            errors,
            messages,
        } => {
            state.errors += errors;
            state.deferred.extend(messages);
            if let Some(path) = emitted {
                state.emitted.push(path);
                state.status.insert(pack.clone(), Status::Done);
            } else {
                state.status.insert(pack.clone(), Status::Failed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gen::printer::target_path;
    use crate::passes::testutil::project;
    use clap::Parser as _;

    fn make_options(root: &std::path::Path, out: &std::path::Path, extra: &[&str]) -> Options {
        let mut argv = vec![
            "fernc".to_string(),
            "--make".to_string(),
            "-d".to_string(),
            out.display().to_string(),
            "--source-path".to_string(),
            root.display().to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        let mut opts = Options::parse_from(argv);
        opts.normalize();
        opts
    }

    #[test]
    fn builds_dependency_chain_in_order() {
        let dir = project(&[
            (
                "Bot.fern",
                "module Bot where\nbase :: Int\nbase = 2\n",
            ),
            (
                "Mid.fern",
                "module Mid where\n\
                 import Bot\n\
                 grow :: Int -> Int\n\
                 grow x = x * Bot.base\n",
            ),
            (
                "Top.fern",
                "module Top where\n\
                 import Mid\n\
                 main = Mid.grow 21\n",
            ),
        ]);
        let out = dir.path().join("out");
        let opts = make_options(dir.path(), &out, &["Top"]);
        let mut parent = Global::new(opts);
        let items = vec![WorkItem::Module {
            pack: PackName::parse("Top").unwrap(),
            path: dir.path().join("Top.fern"),
        }];
        assert!(build(&mut parent, items), "messages: {:?}", parent.sub.messages);
        for module in ["Top", "Mid", "Bot"] {
            let path = target_path(&out, &PackName::parse(module).unwrap());
            assert!(path.is_file(), "missing {}", path.display());
        }
    }

    #[test]
    fn file_roots_are_parsed_up_front() {
        let dir = project(&[
            ("A.fern", "module A where\nv :: Int\nv = 1\n"),
            (
                "B.fern",
                "module B where\nimport A\nmain = A.v\n",
            ),
        ]);
        let out = dir.path().join("out");
        let opts = make_options(dir.path(), &out, &["B.fern"]);
        let mut parent = Global::new(opts);
        let items = vec![WorkItem::SourceFile(dir.path().join("B.fern"))];
        assert!(build(&mut parent, items), "messages: {:?}", parent.sub.messages);
        assert!(target_path(&out, &PackName::parse("A").unwrap()).is_file());
        assert!(target_path(&out, &PackName::parse("B").unwrap()).is_file());
    }

    #[test]
    fn cyclic_modules_are_reported_not_deadlocked() {
        let dir = project(&[
            ("A.fern", "module A where\nimport B\nv :: Int\nv = 1\n"),
            ("B.fern", "module B where\nimport A\nw :: Int\nw = 2\n"),
        ]);
        let out = dir.path().join("out");
        let mut opts = make_options(dir.path(), &out, &["A"]);
        opts.ide = true;
        let mut parent = Global::new(opts);
        let items = vec![WorkItem::Module {
            pack: PackName::parse("A").unwrap(),
            path: dir.path().join("A.fern"),
        }];
        assert!(!build(&mut parent, items));
        assert!(parent
            .sub
            .messages
            .iter()
            .any(|m| m.text.contains("circular dependencies")));
    }

    #[test]
    fn missing_root_module_is_an_error() {
        let dir = project(&[]);
        let out = dir.path().join("out");
        let mut opts = make_options(dir.path(), &out, &["no.Such"]);
        opts.ide = true;
        let mut parent = Global::new(opts);
        let items = vec![WorkItem::Module {
            pack: PackName::parse("no.Such").unwrap(),
            path: PathBuf::new(),
        }];
        assert!(!build(&mut parent, items));
        assert!(parent.has_errors());
    }

    #[test]
    fn dependency_satisfied_from_class_path_metadata() {
        // Compile the dependency alone, then build the dependent against
        // only the generated code.
        let lib_src = project(&[(
            "Lib.fern",
            "module Lib where\ntwice :: Int -> Int\ntwice x = x + x\n",
        )]);
        let out = lib_src.path().join("out");
        let lib_opts = make_options(lib_src.path(), &out, &["Lib"]);
        let mut lib_parent = Global::new(lib_opts);
        assert!(build(
            &mut lib_parent,
            vec![WorkItem::Module {
                pack: PackName::parse("Lib").unwrap(),
                path: lib_src.path().join("Lib.fern"),
            }]
        ));

        let app_src = project(&[(
            "App.fern",
            "module App where\nimport Lib\nmain = Lib.twice 21\n",
        )]);
        let app_out = app_src.path().join("out");
        let argv = vec![
            "fernc".to_string(),
            "--make".to_string(),
            "-d".to_string(),
            app_out.display().to_string(),
            "--source-path".to_string(),
            app_src.path().display().to_string(),
            "--class-path".to_string(),
            out.display().to_string(),
            "App".to_string(),
        ];
        let mut opts = Options::parse_from(argv);
        opts.normalize();
        let mut parent = Global::new(opts);
        assert!(
            build(
                &mut parent,
                vec![WorkItem::Module {
                    pack: PackName::parse("App").unwrap(),
                    path: app_src.path().join("App.fern"),
                }]
            ),
            "messages: {:?}",
            parent.sub.messages
        );
        assert!(target_path(&app_out, &PackName::parse("App").unwrap()).is_file());
    }

    #[test]
    fn parsed_entries_are_never_demoted() {
        let mut state = BuildState::default();
        let pack = PackName::parse("A").unwrap();
        let opts = {
            let mut o = Options::parse_from(["fernc", "x.fern"]);
            o.normalize();
            o
        };
        state.add_parsed(
            pack.clone(),
            Box::new(Global::new(opts)),
            Reason::DependencyOf(PackName::parse("B").unwrap()),
            vec![],
        );
        state.add_root_name(pack.clone());
        match state.todo.get(&pack) {
            Some(Todo::CompileAfterDeps { reason, .. }) => assert_eq!(*reason, Reason::Root),
            _ => panic!("entry was demoted"),
        }
    }

    #[test]
    fn check_update_is_kept_not_duplicated() {
        let mut state = BuildState::default();
        let dep = PackName::parse("D").unwrap();
        state.add_dependency(dep.clone(), PackName::parse("X").unwrap());
        state.add_dependency(dep.clone(), PackName::parse("Y").unwrap());
        assert_eq!(state.order.len(), 1);
        match state.todo.get(&dep) {
            Some(Todo::CheckUpdate {
                reason: Reason::DependencyOf(of),
            }) => assert_eq!(of.as_str(), "X"),
            _ => panic!("unexpected entry"),
        }
    }
}
