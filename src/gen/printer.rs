// src/gen/printer.rs
//! The output sink for generated Java source.
//!
//! Standard output doubles as the "no file" sink: emission for source `"-"`
//! goes there, and `close` always swings the state back to it, so a printer
//! is open for exactly the span between the open and close passes.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::global::Global;
use crate::pack::PackName;

pub enum PrinterSink {
    Stdout,
    File(BufWriter<File>),
}

impl PrinterSink {
    /// Flush and close the current sink, replacing it with standard output.
    /// Closing the stdout sink only flushes.
    pub fn close(&mut self) -> io::Result<()> {
        match std::mem::replace(self, PrinterSink::Stdout) {
            PrinterSink::Stdout => io::stdout().flush(),
            PrinterSink::File(mut writer) => {
                writer.flush()?;
                // Dropping the BufWriter closes the file.
                Ok(())
            }
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, PrinterSink::File(_))
    }
}

impl Write for PrinterSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            PrinterSink::Stdout => io::stdout().write(buf),
            PrinterSink::File(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            PrinterSink::Stdout => io::stdout().flush(),
            PrinterSink::File(writer) => writer.flush(),
        }
    }
}

/// Target path of a module's generated Java source: a total function of the
/// output directory and the module identity.
pub fn target_path(dest: &Path, pack: &PackName) -> PathBuf {
    dest.join(pack.as_path("java"))
}

/// The `open-printer` pass: route emission to standard output for source
/// `"-"`, otherwise create `<dest>/<module-path>.java` (and its parent
/// directories) and write the version banner.
pub fn open(global: &mut Global) -> (&'static str, usize) {
    let Some(pack) = global.sub.this_pack.clone() else {
        global.error(None, "no module identity; cannot open an output file");
        return ("files", 0);
    };

    if global.options.source == "-" {
        global.gen.printer = PrinterSink::Stdout;
        global.gen.target_file = None;
        banner(global, &pack);
        return ("files", 1);
    }

    let target = target_path(&global.options.dest, &pack);
    if let Some(parent) = target.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            global.error(
                None,
                format!("could not create directory '{}': {err}", parent.display()),
            );
            return ("files", 0);
        }
    }
    match File::create(&target) {
        Ok(file) => {
            tracing::debug!(target = %target.display(), "opened printer");
            global.gen.printer = PrinterSink::File(BufWriter::new(file));
            global.gen.target_file = Some(target);
            banner(global, &pack);
            ("files", 1)
        }
        Err(err) => {
            global.error(
                None,
                format!("could not create '{}': {err}", target.display()),
            );
            ("files", 0)
        }
    }
}

/// The `close-printer` pass.
pub fn close(global: &mut Global) -> (&'static str, usize) {
    if let Err(err) = global.gen.printer.close() {
        global.error(None, format!("error closing output file: {err}"));
    }
    ("files", 1)
}

fn banner(global: &mut Global, pack: &PackName) {
    let line = format!(
        "// generated by fernc {} from {pack}\n\n",
        env!("CARGO_PKG_VERSION")
    );
    if let Err(err) = global.gen.printer.write_all(line.as_bytes()) {
        global.error(None, format!("write error: {err}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn target_path_is_total_and_deterministic() {
        let dest = Path::new("out");
        let a = PackName::parse("a.b.C").unwrap();
        let b = PackName::parse("a.b.C").unwrap();
        assert_eq!(target_path(dest, &a), target_path(dest, &b));
        assert_eq!(target_path(dest, &a), PathBuf::from("out/a/b/C.java"));
    }

    #[test]
    fn close_returns_sink_to_stdout() {
        let dir = TempDir::new().unwrap();
        let file = File::create(dir.path().join("x.java")).unwrap();
        let mut sink = PrinterSink::File(BufWriter::new(file));
        assert!(sink.is_file());
        sink.close().unwrap();
        assert!(!sink.is_file());
    }

    #[test]
    fn file_sink_writes_through() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.java");
        let mut sink = PrinterSink::File(BufWriter::new(File::create(&path).unwrap()));
        sink.write_all(b"hello").unwrap();
        sink.close().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }
}
