//! `:`-prefixed REPL commands.
//!
//! Each command implements [`ReplCommand`] and is registered by name in a
//! [`CommandRegistry`] built when the session starts.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::session::History;
use super::LineReader;
use crate::logging::Console;
use crate::transport::ServerApi;

mod info;
mod load;
mod play;
mod save;

pub use info::{QuitCommand, ScoreCommand, StatusCommand, VersionCommand};
pub use load::{LoadCommand, NewCommand};
pub use play::{PlayCommand, StopCommand};
pub use save::SaveCommand;

/// Whether the session keeps reading after a command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandOutcome {
    Continue,
    Quit,
}

/// Everything a command may read or change while it runs.
pub struct CommandContext<'a> {
    pub history: &'a mut History,
    pub save_path: &'a mut Option<PathBuf>,
    pub server: &'a dyn ServerApi,
    /// For prompting the user mid-command.
    pub reader: &'a mut dyn LineReader,
    /// Announces the instruments now active in the session.
    pub on_instruments: &'a mut dyn FnMut(&[String]),
    pub console: &'a Console,
}

/// A REPL session command.
pub trait ReplCommand {
    /// Name typed after the colon.
    fn key(&self) -> &'static str;

    /// Additional names that dispatch to this command.
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// One-line summary for `:help`.
    fn summary(&self) -> &'static str;

    /// Usage details for `:help <command>`.
    fn details(&self) -> &'static str;

    fn act(&self, args: &str, ctx: &mut CommandContext<'_>) -> Result<CommandOutcome>;
}

/// Name-keyed lookup of session commands.
#[derive(Default)]
pub struct CommandRegistry {
    commands: Vec<Box<dyn ReplCommand>>,
    by_name: BTreeMap<&'static str, usize>,
}

impl CommandRegistry {
    /// Registry with every built-in command.
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register(Box::new(LoadCommand));
        registry.register(Box::new(NewCommand));
        registry.register(Box::new(PlayCommand));
        registry.register(Box::new(QuitCommand));
        registry.register(Box::new(SaveCommand));
        registry.register(Box::new(ScoreCommand));
        registry.register(Box::new(StatusCommand));
        registry.register(Box::new(StopCommand));
        registry.register(Box::new(VersionCommand));
        registry
    }

    pub fn register(&mut self, command: Box<dyn ReplCommand>) {
        let idx = self.commands.len();
        self.by_name.insert(command.key(), idx);
        for alias in command.aliases() {
            self.by_name.insert(*alias, idx);
        }
        self.commands.push(command);
    }

    pub fn get(&self, name: &str) -> Option<&dyn ReplCommand> {
        self.by_name
            .get(name)
            .map(|&idx| self.commands[idx].as_ref())
    }

    /// Commands in registration order, once each.
    pub fn iter(&self) -> impl Iterator<Item = &dyn ReplCommand> {
        self.commands.iter().map(|c| c.as_ref())
    }
}

/// Replace a leading `~` with the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = home::home_dir() {
            return home.join(path.trim_start_matches('~').trim_start_matches('/'));
        }
    }
    PathBuf::from(path)
}

// ============================================================================
// Tests
// ============================================================================
