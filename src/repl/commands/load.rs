//! `:load` and `:new`: the two commands that start a new score.

use anyhow::Result;
use log::debug;

use super::{expand_home, CommandContext, CommandOutcome, ReplCommand};
use crate::input::read_score_file;
use crate::repl::confirm;
use crate::transport::PlayRequest;

const DISCARD_QUESTION: &str = "This will discard the current score. Continue?";

/// Ask before throwing away a non-empty history.
fn may_discard(ctx: &mut CommandContext<'_>) -> Result<bool> {
    if ctx.history.is_empty() {
        return Ok(true);
    }
    confirm(ctx.reader, DISCARD_QUESTION)
}

pub struct LoadCommand;

impl ReplCommand for LoadCommand {
    fn key(&self) -> &'static str {
        "load"
    }

    fn summary(&self) -> &'static str {
        "Loads an Alda score into the current REPL session."
    }

    fn details(&self) -> &'static str {
        "Usage:\n\n  \
         :load test/examples/bach_cello_suite_no_1.alda\n  \
         :load ~/Scores/love_is_alright_tonite.alda\n\n\
         Once :save/:load has been executed once:\n  \
         :load"
    }

    fn act(&self, args: &str, ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        let args = args.trim();
        let path = if args.is_empty() {
            match ctx.save_path.clone() {
                Some(path) => path,
                None => {
                    ctx.console.msg(self.details());
                    return Ok(CommandOutcome::Continue);
                }
            }
        } else {
            expand_home(args)
        };

        if !may_discard(ctx)? {
            return Ok(CommandOutcome::Continue);
        }

        let contents = read_score_file(&path)?;
        // Evaluate as history only: the server checks it and reports the
        // instruments it sets up, without playing anything.
        let result = ctx.server.play(&PlayRequest {
            code: String::new(),
            history: contents.clone(),
            ..PlayRequest::default()
        })?;
        debug!("loaded {} ({} bytes)", path.display(), contents.len());

        ctx.history.restart(Some(contents));
        *ctx.save_path = Some(path);
        (ctx.on_instruments)(&result.instruments);
        Ok(CommandOutcome::Continue)
    }
}

pub struct NewCommand;

impl ReplCommand for NewCommand {
    fn key(&self) -> &'static str {
        "new"
    }

    fn summary(&self) -> &'static str {
        "Starts a new score."
    }

    fn details(&self) -> &'static str {
        "Clears the current score and forgets the file it was saved to.\n\
         Asks for confirmation first if anything has been entered."
    }

    fn act(&self, _args: &str, ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        if !may_discard(ctx)? {
            return Ok(CommandOutcome::Continue);
        }
        ctx.history.restart(None);
        *ctx.save_path = None;
        (ctx.on_instruments)(&[]);
        Ok(CommandOutcome::Continue)
    }
}

// ============================================================================
// Tests
// ============================================================================
