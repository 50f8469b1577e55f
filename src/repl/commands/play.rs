//! `:play` and `:stop`.

use anyhow::Result;

use super::{CommandContext, CommandOutcome, ReplCommand};
use crate::error::AldaError;
use crate::transport::PlayRequest;

/// Markers parsed from `:play` arguments.
#[derive(Debug, Default, Eq, PartialEq)]
pub struct PlayRange {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Parse `[from <marker>] [to <marker>]`, in either order.
pub fn parse_play_range(args: &str) -> Result<PlayRange, AldaError> {
    let mut range = PlayRange::default();
    let mut words = args.split_whitespace();
    while let Some(word) = words.next() {
        let slot = match word {
            "from" => &mut range.from,
            "to" => &mut range.to,
            other => {
                return Err(AldaError::InvalidOption(format!(
                    "Unexpected argument '{other}'. Usage: :play [from <marker>] [to <marker>]"
                )))
            }
        };
        match words.next() {
            Some(marker) => *slot = Some(marker.to_string()),
            None => {
                return Err(AldaError::InvalidOption(format!(
                    "'{word}' needs a time marking or marker"
                )))
            }
        }
    }
    Ok(range)
}

pub struct PlayCommand;

impl ReplCommand for PlayCommand {
    fn key(&self) -> &'static str {
        "play"
    }

    fn summary(&self) -> &'static str {
        "Plays the current score."
    }

    fn details(&self) -> &'static str {
        "Usage:\n\n  \
         :play\n  \
         :play from 0:05\n  \
         :play to 0:10\n  \
         :play from 0:05 to 0:10\n  \
         :play from verseOne to chorus"
    }

    fn act(&self, args: &str, ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        let range = parse_play_range(args)?;
        if ctx.history.is_empty() {
            ctx.console.msg("Nothing to play yet.");
            return Ok(CommandOutcome::Continue);
        }
        ctx.server.play(&PlayRequest {
            code: ctx.history.text(),
            history: String::new(),
            from: range.from,
            to: range.to,
        })?;
        Ok(CommandOutcome::Continue)
    }
}

pub struct StopCommand;

impl ReplCommand for StopCommand {
    fn key(&self) -> &'static str {
        "stop"
    }

    fn summary(&self) -> &'static str {
        "Stops playback."
    }

    fn details(&self) -> &'static str {
        "Usage:\n\n  :stop"
    }

    fn act(&self, _args: &str, ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        ctx.server.stop_playback()?;
        Ok(CommandOutcome::Continue)
    }
}
