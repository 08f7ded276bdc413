// src/diag.rs
//! Diagnostics carried on the compiler state.
//!
//! Messages are prepended to the state's queue as they are produced (most
//! recent first) and flushed by printing in reverse of storage order, which
//! restores chronological order. The whole flush happens under one stderr
//! lock so lines from parallel build workers never interleave.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Hint,
}

impl Severity {
    fn label(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Hint => "hint",
        }
    }
}

/// Source position, 1-indexed. Diagnostics without a position (input errors,
/// tool failures) carry `None` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub col: u32,
}

impl Position {
    pub fn new(line: u32, col: u32) -> Self {
        Position { line, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub file: String,
    pub pos: Option<Position>,
    pub severity: Severity,
    pub text: String,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.pos) {
            (file, Some(pos)) if !file.is_empty() => {
                write!(f, "{}: {}:{}: {}", self.severity.label(), file, pos, self.text)
            }
            (file, None) if !file.is_empty() => {
                write!(f, "{}: {}: {}", self.severity.label(), file, self.text)
            }
            _ => write!(f, "{}: {}", self.severity.label(), self.text),
        }
    }
}

/// Print `messages` to stderr back-to-front and clear the queue.
pub fn flush(messages: &mut VecDeque<Message>) {
    if messages.is_empty() {
        return;
    }
    let stderr = io::stderr();
    let mut out = stderr.lock();
    while let Some(msg) = messages.pop_back() {
        let _ = writeln!(out, "{msg}");
    }
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(text: &str) -> Message {
        Message {
            file: "T.fern".to_string(),
            pos: Some(Position::new(3, 7)),
            severity: Severity::Error,
            text: text.to_string(),
        }
    }

    #[test]
    fn display_with_position() {
        assert_eq!(msg("bad token").to_string(), "error: T.fern:3:7: bad token");
    }

    #[test]
    fn display_without_file() {
        let m = Message {
            file: String::new(),
            pos: None,
            severity: Severity::Error,
            text: "could not read 'x.fern'".to_string(),
        };
        assert_eq!(m.to_string(), "error: could not read 'x.fern'");
    }

    #[test]
    fn flush_clears_queue() {
        let mut q = VecDeque::new();
        q.push_front(msg("first"));
        q.push_front(msg("second"));
        flush(&mut q);
        assert!(q.is_empty());
    }
}
