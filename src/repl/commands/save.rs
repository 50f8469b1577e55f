//! `:save` - write the session history to a score file.
//!
//! The first save to a path binds it to the session; a bare `:save` then
//! overwrites that path without asking. Saving to a different existing file
//! asks before overwriting.

use anyhow::Result;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use super::{expand_home, CommandContext, CommandOutcome, ReplCommand};
use crate::repl::confirm;

pub struct SaveCommand;

/// Create `path`, failing with `AlreadyExists` if it is already there.
fn write_new(path: &Path, contents: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(contents.as_bytes())
}

/// Create or truncate `path`.
fn overwrite(path: &Path, contents: &str) -> io::Result<()> {
    std::fs::write(path, contents)
}

impl SaveCommand {
    fn usage(&self, ctx: &CommandContext<'_>) {
        ctx.console.msg(&format!(
            "{}\n\n{}",
            "No file to save to yet. Give :save a path.",
            self.details()
        ));
    }

    fn report_failure(ctx: &CommandContext<'_>, path: &Path, err: &io::Error) {
        ctx.console.error(&format!(
            "There was an error writing to '{}': {}",
            path.display(),
            err
        ));
    }
}

impl ReplCommand for SaveCommand {
    fn key(&self) -> &'static str {
        "save"
    }

    fn summary(&self) -> &'static str {
        "Saves the current REPL session as an Alda score file."
    }

    fn details(&self) -> &'static str {
        "Usage:\n\n  \
         :save scores/bach_cello_suite_no_1.alda\n  \
         :save ~/Scores/love_is_alright_tonite.alda\n\n\
         Once :save/:load has been executed once:\n  \
         :save"
    }

    fn act(&self, args: &str, ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        let contents = ctx.history.text();
        let args = args.trim();

        if args.is_empty() {
            match ctx.save_path.clone() {
                Some(path) => {
                    if let Err(err) = overwrite(&path, &contents) {
                        Self::report_failure(ctx, &path, &err);
                    }
                }
                None => self.usage(ctx),
            }
            return Ok(CommandOutcome::Continue);
        }

        let path = expand_home(args);
        match write_new(&path, &contents) {
            Ok(()) => *ctx.save_path = Some(path),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                if confirm(ctx.reader, "File already present, overwrite?")? {
                    match overwrite(&path, &contents) {
                        Ok(()) => *ctx.save_path = Some(path),
                        Err(err) => Self::report_failure(ctx, &path, &err),
                    }
                }
            }
            Err(err) => Self::report_failure(ctx, &path, &err),
        }
        Ok(CommandOutcome::Continue)
    }
}

// ============================================================================
// Tests
// ============================================================================
