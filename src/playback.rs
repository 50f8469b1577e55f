//! `play`, `parse`, and `stop` execution.

use anyhow::{Context, Result};
use serde_json::Value as JsonValue;

use crate::error::AldaError;
use crate::input::{self, StdinSource};
use crate::logging::Console;
use crate::transport::{OutputType, ParseSource, PlayRequest, PlayResult, ServerApi};
use crate::{ParseOptions, PlayOptions};

fn is_set<T: AsRef<std::ffi::OsStr>>(value: &Option<T>) -> bool {
    value.as_ref().is_some_and(|v| !v.as_ref().is_empty())
}

/// Reject option combinations that can never succeed, before any file is
/// read or any request is sent.
pub fn validate_play_options(opts: &PlayOptions) -> Result<(), AldaError> {
    if is_set(&opts.file) && is_set(&opts.code) {
        return Err(AldaError::ConflictingOptions(
            "--code and --file options cannot be used together.".to_string(),
        ));
    }
    if is_set(&opts.history_file) && !opts.history.is_empty() {
        return Err(AldaError::ConflictingOptions(
            "--history and --history-file options cannot be used together.".to_string(),
        ));
    }
    Ok(())
}

/// Resolve the score and history, then ask the server to play them.
pub fn play(
    opts: &PlayOptions,
    api: &dyn ServerApi,
    stdin: &mut dyn StdinSource,
    console: &Console,
) -> Result<PlayResult> {
    validate_play_options(opts)?;
    let history = input::resolve_history(&opts.history, opts.history_file.as_deref())?;
    let score = input::resolve(opts.file.as_deref(), opts.code.as_deref(), stdin)?;

    let request = PlayRequest {
        code: score.text,
        history,
        from: opts.from.clone(),
        to: opts.to.clone(),
    };
    console.msg("Playing...");
    api.play(&request)
}

/// Parse a score on the server and return its structured output.
pub fn parse(
    opts: &ParseOptions,
    api: &dyn ServerApi,
    stdin: &mut dyn StdinSource,
) -> Result<JsonValue> {
    let output: OutputType = opts.output.parse()?;
    let score = input::resolve(opts.file.as_deref(), opts.code.as_deref(), stdin)?;
    let source = match score.file_path() {
        Some(path) => ParseSource::File(path),
        None => ParseSource::Code(&score.text),
    };
    api.parse(source, output)
}

/// Print parse output to stdout.
pub fn print_parse_result(result: &JsonValue) -> Result<()> {
    let text = serde_json::to_string_pretty(result).context("failed to render parse output")?;
    println!("{}", text);
    Ok(())
}

/// Stop any active playback.
pub fn stop(api: &dyn ServerApi, console: &Console) -> Result<()> {
    api.stop_playback()?;
    console.msg("Sent stop signal to the server");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
