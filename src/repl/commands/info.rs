//! Commands that report on the session or server without changing the score.

use anyhow::Result;

use super::{CommandContext, CommandOutcome, ReplCommand};
use crate::constants::{millis_to_duration, PROBE_TIMEOUT_MS};
use crate::lifecycle::{describe_probe, probe_server, version_lines};

pub struct QuitCommand;

impl ReplCommand for QuitCommand {
    fn key(&self) -> &'static str {
        "quit"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["exit"]
    }

    fn summary(&self) -> &'static str {
        "Exits the Alda REPL session."
    }

    fn details(&self) -> &'static str {
        "Usage:\n\n  :quit\n  :exit"
    }

    fn act(&self, _args: &str, _ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        Ok(CommandOutcome::Quit)
    }
}

pub struct ScoreCommand;

impl ReplCommand for ScoreCommand {
    fn key(&self) -> &'static str {
        "score"
    }

    fn summary(&self) -> &'static str {
        "Displays the score entered so far in this session."
    }

    fn details(&self) -> &'static str {
        "Usage:\n\n  :score"
    }

    fn act(&self, _args: &str, ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        print!("{}", ctx.history.text());
        Ok(CommandOutcome::Continue)
    }
}

pub struct StatusCommand;

impl ReplCommand for StatusCommand {
    fn key(&self) -> &'static str {
        "status"
    }

    fn summary(&self) -> &'static str {
        "Displays whether the server is up."
    }

    fn details(&self) -> &'static str {
        "Usage:\n\n  :status"
    }

    fn act(&self, _args: &str, ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        let probe = probe_server(ctx.server, millis_to_duration(PROBE_TIMEOUT_MS));
        println!("{}", describe_probe(&probe));
        Ok(CommandOutcome::Continue)
    }
}

pub struct VersionCommand;

impl ReplCommand for VersionCommand {
    fn key(&self) -> &'static str {
        "version"
    }

    fn summary(&self) -> &'static str {
        "Displays the version of the Alda client and server."
    }

    fn details(&self) -> &'static str {
        "Usage:\n\n  :version"
    }

    fn act(&self, _args: &str, ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        for line in version_lines(ctx.server.version()) {
            println!("{}", line);
        }
        Ok(CommandOutcome::Continue)
    }
}
