// src/pack.rs
//
// Canonical module names ("packs") and their mapping to paths.

use std::fmt;
use std::path::PathBuf;

/// Canonical dotted module name, e.g. `demo.util.Strings`.
///
/// Two strings name the same module iff their canonical forms are equal;
/// the driver relies on this equality for deduplication in make mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackName(String);

impl PackName {
    /// Canonicalize a dotted name. Surrounding whitespace is trimmed; every
    /// dot-separated segment must be a plain identifier. Returns `None` for
    /// anything that is not a module name.
    pub fn parse(raw: &str) -> Option<PackName> {
        let name = raw.trim();
        if name.is_empty() {
            return None;
        }
        for segment in name.split('.') {
            if !is_ident(segment) {
                return None;
            }
        }
        Some(PackName(name.to_string()))
    }

    /// Build a pack name from already-validated segments.
    pub fn from_segments(segments: &[String]) -> PackName {
        PackName(segments.join("."))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Last segment; the simple name used as the generated class name.
    pub fn base(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Dotted prefix before the last segment, if any; the Java package.
    pub fn prefix(&self) -> Option<&str> {
        self.0.rfind('.').map(|i| &self.0[..i])
    }

    /// Relative path with dots as separators and `ext` appended,
    /// e.g. `demo.Hello` + `".java"` -> `demo/Hello.java`.
    pub fn as_path(&self, ext: &str) -> PathBuf {
        let mut path = PathBuf::new();
        for segment in self.segments() {
            path.push(segment);
        }
        path.set_extension(ext.trim_start_matches('.'));
        path
    }
}

impl fmt::Display for PackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '\'')
}
