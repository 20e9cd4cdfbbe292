//! Line-oriented writer that makes tool output linkable in CI.
//!
//! Code-hosting UIs turn `path:line: message` lines into annotations only
//! when the path is relative to the repository root and the line carries no
//! prefix. Until such a line is seen, output is prefixed with the task name
//! so interleaved parallel tasks stay readable. The first file reference
//! switches the writer into pass-through mode for the rest of its life.

use std::borrow::Cow;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::Paths;

/// Prefixing writer with a one-way latch into file-reference mode.
pub struct LogWriter<W: Write> {
    out: W,
    prefix: String,
    root: PathBuf,
    offset: Option<PathBuf>,
    has_file_references: bool,
    pending: Vec<u8>,
}

impl<W: Write> LogWriter<W> {
    /// Wrap `out`, prefixing lines with `prefix` until latched.
    pub fn new(out: W, prefix: impl Into<String>, paths: &Paths) -> Self {
        Self {
            out,
            prefix: prefix.into(),
            root: paths.repo_root().to_path_buf(),
            offset: paths.work_dir_offset(),
            has_file_references: false,
            pending: Vec::new(),
        }
    }

    /// Whether a file reference has been seen.
    #[must_use]
    pub fn has_file_references(&self) -> bool {
        self.has_file_references
    }

    fn emit(&mut self, raw: &[u8]) -> io::Result<()> {
        let text = String::from_utf8_lossy(raw);
        let line = text.strip_suffix('\r').unwrap_or(&text);
        self.write_line(line)
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut line = Cow::Borrowed(line);
        if !self.has_file_references
            && let Some(rewritten) = self.file_reference(&line)
        {
            self.has_file_references = true;
            writeln!(self.out, "{}", self.prefix)?;
            line = Cow::Owned(rewritten);
        }
        if self.has_file_references {
            writeln!(self.out, "{line}")
        } else {
            writeln!(self.out, "{}{line}", self.prefix)
        }
    }

    /// Detect a leading `<path>:` naming an existing file and return the
    /// line with that path made relative to the repository root.
    fn file_reference(&self, line: &str) -> Option<String> {
        let trimmed = line.trim();
        let colon = trimmed.find(':').filter(|&i| i > 0)?;
        let (candidate, rest) = trimmed.split_at(colon);
        let relative = self.relative_to_root(Path::new(candidate))?;
        std::fs::symlink_metadata(self.root.join(&relative)).ok()?;
        Some(format!("{}{rest}", relative.display()))
    }

    fn relative_to_root(&self, candidate: &Path) -> Option<PathBuf> {
        if candidate.is_absolute() {
            return candidate
                .strip_prefix(&self.root)
                .ok()
                .map(Path::to_path_buf);
        }
        let offset = self.offset.as_ref()?;
        if offset.as_os_str().is_empty() || candidate.starts_with(offset) {
            Some(candidate.to_path_buf())
        } else {
            Some(offset.join(candidate))
        }
    }
}

impl<W: Write> Write for LogWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            self.emit(&line[..end])?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.emit(&line)?;
        }
        self.out.flush()
    }
}

impl<W: Write> Drop for LogWriter<W> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn render(paths: &Paths, chunks: &[&str]) -> String {
        let mut out = Vec::new();
        {
            let mut writer = LogWriter::new(&mut out, "[lint] ", paths);
            for chunk in chunks {
                writer.write_all(chunk.as_bytes()).unwrap();
            }
        }
        String::from_utf8(out).unwrap()
    }

    fn repo_with(file: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "").unwrap();
        temp
    }

    #[test]
    fn test_prefixes_plain_lines() {
        let paths = Paths::new("/nonexistent-root", "/nonexistent-root");
        let out = render(&paths, &["building\n", "done\n"]);
        assert_eq!(out, "[lint] building\n[lint] done\n");
    }

    #[test]
    fn test_latches_on_first_file_reference() {
        let repo = repo_with("src/main.rs");
        let paths = Paths::new(repo.path(), repo.path());
        let out = render(
            &paths,
            &["checking\n", "src/main.rs:10:5: unused variable\n", "  = note: details\n"],
        );
        assert_eq!(
            out,
            "[lint] checking\n[lint] \nsrc/main.rs:10:5: unused variable\n  = note: details\n"
        );
    }

    #[test]
    fn test_missing_file_does_not_latch() {
        let repo = repo_with("src/main.rs");
        let paths = Paths::new(repo.path(), repo.path());
        let out = render(&paths, &["warning: something\n", "src/other.rs:1: x\n"]);
        assert_eq!(out, "[lint] warning: something\n[lint] src/other.rs:1: x\n");
    }

    #[test]
    fn test_leading_colon_is_not_a_reference() {
        let repo = repo_with("a.go");
        let paths = Paths::new(repo.path(), repo.path());
        assert_eq!(render(&paths, &[": a.go\n"]), "[lint] : a.go\n");
    }

    #[test]
    fn test_rewrites_path_relative_to_root_from_subdir() {
        let repo = repo_with("svc/a.go");
        let paths = Paths::new(repo.path(), repo.path().join("svc"));
        let out = render(&paths, &["a.go:3:1: exported func\n"]);
        assert_eq!(out, "[lint] \nsvc/a.go:3:1: exported func\n");
    }

    #[test]
    fn test_keeps_paths_already_relative_to_root() {
        let repo = repo_with("svc/a.go");
        let paths = Paths::new(repo.path(), repo.path().join("svc"));
        let out = render(&paths, &["svc/a.go:3:1: exported func\n"]);
        assert_eq!(out, "[lint] \nsvc/a.go:3:1: exported func\n");
    }

    #[test]
    fn test_absolute_paths_are_made_relative() {
        let repo = repo_with("src/lib.rs");
        let paths = Paths::new(repo.path(), repo.path());
        let line = format!("{}:7: oops\n", repo.path().join("src/lib.rs").display());
        let out = render(&paths, &[&line]);
        assert_eq!(out, "[lint] \nsrc/lib.rs:7: oops\n");
    }

    #[test]
    fn test_work_dir_outside_root_never_latches() {
        let repo = repo_with("a.go");
        let paths = Paths::new(repo.path(), "/somewhere/else");
        assert_eq!(render(&paths, &["a.go:1: x\n"]), "[lint] a.go:1: x\n");
    }

    #[test]
    fn test_partial_lines_are_buffered_until_flush() {
        let paths = Paths::new("/nonexistent-root", "/nonexistent-root");
        let mut out = Vec::new();
        {
            let mut writer = LogWriter::new(&mut out, "[t] ", &paths);
            writer.write_all(b"hel").unwrap();
            writer.write_all(b"lo\r\nwor").unwrap();
            writer.flush().unwrap();
            assert!(!writer.has_file_references());
        }
        assert_eq!(String::from_utf8(out).unwrap(), "[t] hello\n[t] wor\n");
    }

    proptest! {
        #[test]
        fn chunking_does_not_change_output(
            lines in prop::collection::vec("[a-z ]{0,16}", 0..8),
            split in 0usize..200,
        ) {
            let paths = Paths::new("/nonexistent-root", "/nonexistent-root");
            let input: String = lines.iter().map(|l| format!("{l}\n")).collect();
            let split = split.min(input.len());
            let (head, tail) = input.split_at(split);

            let expected: String = lines.iter().map(|l| format!("[lint] {l}\n")).collect();
            prop_assert_eq!(render(&paths, &[head, tail]), expected);
        }
    }
}
