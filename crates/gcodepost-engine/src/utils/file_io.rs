//! File I/O
//!
//! G-code is loaded whole, split on `\n` into lines, and written back joined
//! with `\n`. A trailing newline in the input becomes a trailing empty line,
//! so load followed by store is byte-exact.

use std::fs;
use std::path::Path;

use gcodepost_core::Result;
use tracing::debug;

/// Split text into lines on `\n`
pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(String::from).collect()
}

/// Join lines with `\n`
pub fn join_lines<S: AsRef<str>>(lines: &[S]) -> String {
    let mut text = String::with_capacity(lines.iter().map(|l| l.as_ref().len() + 1).sum());
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            text.push('\n');
        }
        text.push_str(line.as_ref());
    }
    text
}

/// Read a G-code file into lines
pub fn read_lines(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let lines = split_lines(&text);
    debug!("Read {} lines from {}", lines.len(), path.display());
    Ok(lines)
}

/// Write lines to a G-code file
pub fn write_lines<S: AsRef<str>>(path: impl AsRef<Path>, lines: &[S]) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, join_lines(lines))?;
    debug!("Wrote {} lines to {}", lines.len(), path.display());
    Ok(())
}
