//! Score input resolution.
//!
//! A `play` or `parse` request takes its score from exactly one of a file,
//! an inline `--code` string, or standard input. Supplying both a file and
//! code is a conflict; supplying nothing (and having nothing piped on stdin)
//! is missing input.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::error::AldaError;

/// Where a score came from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InputSource {
    File(PathBuf),
    Code(String),
    Stdin,
}

/// A resolved score: its origin plus its full text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedInput {
    pub source: InputSource,
    pub text: String,
}

impl ResolvedInput {
    /// The file path, when the score came from a file.
    pub fn file_path(&self) -> Option<&Path> {
        match &self.source {
            InputSource::File(path) => Some(path),
            _ => None,
        }
    }
}

/// Standard input as seen by the resolver.
pub trait StdinSource {
    /// Read everything available. Returns an empty string when there is
    /// nothing to read (e.g. an interactive terminal).
    fn read_available(&mut self) -> io::Result<String>;
}

/// The process's real standard input.
pub struct ProcessStdin;

impl StdinSource for ProcessStdin {
    fn read_available(&mut self) -> io::Result<String> {
        // A terminal has no piped data; reading it would block for user input.
        if atty::is(atty::Stream::Stdin) {
            return Ok(String::new());
        }
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    }
}

/// Fixed stdin contents, for tests and for callers that already hold the text.
pub struct StaticStdin(pub String);

impl StdinSource for StaticStdin {
    fn read_available(&mut self) -> io::Result<String> {
        Ok(std::mem::take(&mut self.0))
    }
}

fn non_empty<T: AsRef<str>>(value: Option<T>) -> Option<T> {
    value.filter(|v| !v.as_ref().is_empty())
}

/// Read a score or history file, mapping failures to a user-facing error.
pub fn read_score_file(path: &Path) -> Result<String, AldaError> {
    std::fs::read_to_string(path).map_err(|err| {
        AldaError::MissingInput(format!("Unable to read '{}': {}", path.display(), err))
    })
}

/// Resolve a score from `file`, `code`, or stdin.
///
/// The conflict check happens before any file is touched.
pub fn resolve(
    file: Option<&Path>,
    code: Option<&str>,
    stdin: &mut dyn StdinSource,
) -> Result<ResolvedInput, AldaError> {
    let file = file.filter(|p| !p.as_os_str().is_empty());
    let code = non_empty(code);

    match (file, code) {
        (Some(_), Some(_)) => Err(AldaError::ConflictingOptions(
            "--code and --file options cannot be used together.".to_string(),
        )),
        (Some(path), None) => Ok(ResolvedInput {
            source: InputSource::File(path.to_path_buf()),
            text: read_score_file(path)?,
        }),
        (None, Some(code)) => Ok(ResolvedInput {
            source: InputSource::Code(code.to_string()),
            text: code.to_string(),
        }),
        (None, None) => {
            let text = stdin.read_available().map_err(|err| {
                AldaError::MissingInput(format!("Unable to read standard input: {err}"))
            })?;
            if text.is_empty() {
                return Err(AldaError::MissingInput(
                    "Please provide some Alda code in the form of a string, file, or STDIN."
                        .to_string(),
                ));
            }
            Ok(ResolvedInput {
                source: InputSource::Stdin,
                text,
            })
        }
    }
}

/// Resolve playback history from `--history` or `--history-file`.
pub fn resolve_history(history: &str, history_file: Option<&Path>) -> Result<String, AldaError> {
    match history_file.filter(|p| !p.as_os_str().is_empty()) {
        Some(_) if !history.is_empty() => Err(AldaError::ConflictingOptions(
            "--history and --history-file options cannot be used together.".to_string(),
        )),
        Some(path) => read_score_file(path),
        None => Ok(history.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================
