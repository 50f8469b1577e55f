//! Interactive REPL.
//!
//! - [`session`]: the read-eval loop and its per-session state
//! - [`commands`]: `:`-prefixed session commands and their registry
//!
//! Input comes through a [`LineReader`] so the loop runs the same against a
//! terminal (rustyline), piped stdin, or a scripted test input.

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::BufRead;

pub mod commands;
pub mod session;

pub use session::{History, ReplSession, SessionState};

// ============================================================================
// Line Readers
// ============================================================================

/// Source of interactive input lines.
pub trait LineReader {
    /// Show `prompt` and read one line. Returns None at end of input.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Terminal line editor with in-memory input history.
pub struct EditorReader {
    editor: DefaultEditor,
}

impl EditorReader {
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().context("failed to initialise line editor")?;
        Ok(Self { editor })
    }
}

impl LineReader for EditorReader {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            // Ctrl-C abandons the current line, not the session.
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(err).context("failed to read input"),
        }
    }
}

/// Reads lines from any buffered source without echoing prompts.
/// Used for piped stdin and scripted sessions.
pub struct BufReadReader<R> {
    inner: R,
}

impl<R: BufRead> BufReadReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: BufRead> LineReader for BufReadReader<R> {
    fn read_line(&mut self, _prompt: &str) -> Result<Option<String>> {
        let mut line = String::new();
        let n = self
            .inner
            .read_line(&mut line)
            .context("failed to read input")?;
        if n == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(&['\r', '\n'][..]).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }
}

/// Pick the reader for the current stdin: a line editor on a terminal,
/// plain line reads otherwise.
pub fn default_reader() -> Result<Box<dyn LineReader>> {
    if atty::is(atty::Stream::Stdin) {
        Ok(Box::new(EditorReader::new()?))
    } else {
        Ok(Box::new(BufReadReader::new(std::io::stdin().lock())))
    }
}

// ============================================================================
// Prompts
// ============================================================================

/// Ask a yes/no question. Only an explicit "yes" (or "y") counts as yes;
/// end of input counts as no.
pub fn confirm(reader: &mut dyn LineReader, question: &str) -> Result<bool> {
    let answer = reader.read_line(&format!("{question} (yes/no) "))?;
    Ok(matches!(
        answer.as_deref().map(|a| a.trim().to_ascii_lowercase()).as_deref(),
        Some("yes") | Some("y")
    ))
}

// ============================================================================
// Tests
// ============================================================================
