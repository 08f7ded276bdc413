// src/global.rs
//! The compiler state threaded through every pass.
//!
//! One `Global` exists per compilation unit; the driver never shares a state
//! between modules, so parallel drivers hold disjoint states and only the
//! stderr sink is contended.

use std::collections::VecDeque;
use std::path::PathBuf;

use rustc_hash::FxHashMap;

use crate::cli::Options;
use crate::diag::{self, Message, Position, Severity};
use crate::frontend::ast::{Def, Import};
use crate::frontend::token::Token;
use crate::gen::printer::PrinterSink;
use crate::pack::PackName;
use crate::passes::imports::ExportTable;
use crate::symtab::SymTab;

/// Per-module compilation substate.
#[derive(Default)]
pub struct SubSt {
    /// Lexed tokens of the current module.
    pub tokens: Vec<Token>,
    /// Parsed top-level definitions.
    pub defs: Vec<Def>,
    /// Identity of the current compilation unit, set by the parser.
    pub this_pack: Option<PackName>,
    /// Import declarations in source order.
    pub imports: Vec<Import>,
    /// Diagnostics, most recent first.
    pub messages: VecDeque<Message>,
    /// Cumulative count of error-severity messages.
    pub num_errors: usize,
    /// Symbol table built by the enter/resolve passes.
    pub symtab: SymTab,
    /// Export tables of imported modules, filled by import-packages.
    pub exports: FxHashMap<PackName, ExportTable>,
}

/// Code-emission substate.
pub struct GenSt {
    /// Current output sink for emitted Java source.
    pub printer: PrinterSink,
    /// Path of the file the printer writes to, if any.
    pub target_file: Option<PathBuf>,
}

impl Default for GenSt {
    fn default() -> Self {
        GenSt {
            printer: PrinterSink::Stdout,
            target_file: None,
        }
    }
}

pub struct Global {
    pub options: Options,
    pub sub: SubSt,
    pub gen: GenSt,
}

impl Global {
    pub fn new(options: Options) -> Global {
        Global {
            options,
            sub: SubSt::default(),
            gen: GenSt::default(),
        }
    }

    pub fn error(&mut self, pos: Option<Position>, text: impl Into<String>) {
        self.report(Severity::Error, pos, text.into());
    }

    pub fn warning(&mut self, pos: Option<Position>, text: impl Into<String>) {
        self.report(Severity::Warning, pos, text.into());
    }

    pub fn hint(&mut self, pos: Option<Position>, text: impl Into<String>) {
        self.report(Severity::Hint, pos, text.into());
    }

    fn report(&mut self, severity: Severity, pos: Option<Position>, text: String) {
        if severity == Severity::Error {
            self.sub.num_errors += 1;
        }
        self.sub.messages.push_front(Message {
            file: self.options.source.clone(),
            pos,
            severity,
            text,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.sub.num_errors > 0
    }

    /// Print and clear all pending messages (chronological order, one
    /// stderr lock for the whole batch).
    pub fn flush_messages(&mut self) {
        diag::flush(&mut self.sub.messages);
    }

    /// Move the child's diagnostics onto this state. The child's messages
    /// are newer than anything already here, so they land at the front of
    /// the queue with their relative order preserved.
    pub fn merge_diagnostics(&mut self, child: &mut Global) {
        self.sub.num_errors += child.sub.num_errors;
        for msg in child.sub.messages.drain(..).rev() {
            self.sub.messages.push_front(msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn fresh() -> Global {
        let mut opts = Options::parse_from(["fernc", "X.fern"]);
        opts.normalize();
        opts.source = "X.fern".to_string();
        Global::new(opts)
    }

    #[test]
    fn error_count_tracks_error_messages() {
        let mut g = fresh();
        g.hint(None, "harmless");
        assert!(!g.has_errors());
        g.error(Some(Position::new(1, 1)), "broken");
        g.error(None, "also broken");
        assert_eq!(g.sub.num_errors, 2);
        assert_eq!(g.sub.messages.len(), 3);
    }

    #[test]
    fn messages_are_stored_most_recent_first() {
        let mut g = fresh();
        g.error(None, "first");
        g.error(None, "second");
        assert_eq!(g.sub.messages[0].text, "second");
        assert_eq!(g.sub.messages[1].text, "first");
    }

    #[test]
    fn merge_keeps_child_messages_newest() {
        let mut parent = fresh();
        parent.error(None, "old");
        let mut child = fresh();
        child.error(None, "a");
        child.warning(None, "b");
        parent.merge_diagnostics(&mut child);
        assert_eq!(parent.sub.num_errors, 2);
        // front = newest: child's "b", then child's "a", then parent's "old"
        let texts: Vec<_> = parent.sub.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "a", "old"]);
        assert!(child.sub.messages.is_empty());
    }
}
