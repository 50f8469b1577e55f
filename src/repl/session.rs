//! The REPL read-eval loop and its per-session state.

use anyhow::Result;
use log::debug;
use std::path::PathBuf;

use super::commands::{CommandContext, CommandOutcome, CommandRegistry};
use super::LineReader;
use crate::logging::Console;
use crate::transport::{PlayRequest, ServerApi};

// ============================================================================
// History
// ============================================================================

/// Score text played and accepted during the session, in order.
///
/// Entries are only ever appended; [`History::restart`] begins a new score
/// for `:new` and `:load`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct History {
    entries: Vec<String>,
}

impl History {
    pub fn push(&mut self, fragment: impl Into<String>) {
        self.entries.push(fragment.into());
    }

    /// The whole history as one buffer, each entry newline-terminated.
    pub fn text(&self) -> String {
        let mut buf = String::new();
        for entry in &self.entries {
            buf.push_str(entry);
            if !entry.ends_with('\n') {
                buf.push('\n');
            }
        }
        buf
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Start a new score, optionally seeded with existing text.
    pub fn restart(&mut self, seed: Option<String>) {
        self.entries.clear();
        if let Some(seed) = seed.filter(|s| !s.is_empty()) {
            self.entries.push(seed);
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Mutable state owned by one running session.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    pub history: History,
    /// Bound by the first successful `:save` (or `:load`).
    pub save_path: Option<PathBuf>,
    /// Most recently active instrument, shown in the prompt.
    pub instrument: Option<String>,
}

/// A single-threaded interactive session against one server.
pub struct ReplSession<'a> {
    server: &'a dyn ServerApi,
    console: Console,
    commands: CommandRegistry,
    state: SessionState,
}

impl<'a> ReplSession<'a> {
    pub fn new(server: &'a dyn ServerApi, console: Console) -> Self {
        Self {
            server,
            console,
            commands: CommandRegistry::with_defaults(),
            state: SessionState::default(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn prompt(&self) -> String {
        match &self.state.instrument {
            Some(instrument) => format!("{instrument}> "),
            None => "> ".to_string(),
        }
    }

    /// Read and handle lines until `:quit` or end of input.
    pub fn run(&mut self, reader: &mut dyn LineReader) -> Result<()> {
        self.console
            .msg("Alda REPL. Type :help for a list of commands, :quit to exit.");
        loop {
            let prompt = self.prompt();
            let Some(line) = reader.read_line(&prompt)? else {
                break;
            };
            if self.handle_line(&line, reader)? == CommandOutcome::Quit {
                break;
            }
        }
        debug!(
            "session ended with {} history entries",
            self.state.history.len()
        );
        Ok(())
    }

    /// Handle one input line: a `:command` or score text.
    pub fn handle_line(
        &mut self,
        line: &str,
        reader: &mut dyn LineReader,
    ) -> Result<CommandOutcome> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(CommandOutcome::Continue);
        }
        match trimmed.strip_prefix(':') {
            Some(rest) => {
                let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                Ok(self.dispatch(name, args.trim(), reader))
            }
            None => {
                self.play_fragment(trimmed);
                Ok(CommandOutcome::Continue)
            }
        }
    }

    /// Play a score fragment in the context of the history; keep it on success.
    fn play_fragment(&mut self, fragment: &str) {
        let request = PlayRequest {
            code: fragment.to_string(),
            history: self.state.history.text(),
            from: None,
            to: None,
        };
        match self.server.play(&request) {
            Ok(result) => {
                self.state.history.push(fragment);
                if let Some(last) = result.instruments.last() {
                    self.state.instrument = Some(last.clone());
                }
            }
            Err(err) => self.console.error(&format!("{:#}", err)),
        }
    }

    fn dispatch(&mut self, name: &str, args: &str, reader: &mut dyn LineReader) -> CommandOutcome {
        if name == "help" {
            self.print_help(args);
            return CommandOutcome::Continue;
        }

        let Some(command) = self.commands.get(name) else {
            self.console.error(&format!(
                "Unrecognized command ':{name}'. Type :help for a list of commands."
            ));
            return CommandOutcome::Continue;
        };

        let SessionState {
            history,
            save_path,
            instrument,
        } = &mut self.state;
        let mut on_instruments = |instruments: &[String]| {
            *instrument = instruments.last().cloned();
        };
        let mut ctx = CommandContext {
            history,
            save_path,
            server: self.server,
            reader,
            on_instruments: &mut on_instruments,
            console: &self.console,
        };

        match command.act(args, &mut ctx) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.console.error(&format!("{:#}", err));
                CommandOutcome::Continue
            }
        }
    }

    fn print_help(&self, args: &str) {
        if !args.is_empty() {
            let name = args.trim_start_matches(':');
            match self.commands.get(name) {
                Some(command) => {
                    println!(":{} - {}\n\n{}", command.key(), command.summary(), command.details())
                }
                None => self
                    .console
                    .error(&format!("No documentation for ':{name}'.")),
            }
            return;
        }

        println!("Available commands:\n");
        println!("  {:<10} {}", ":help", "Displays this help text, or help for one command.");
        for command in self.commands.iter() {
            println!("  {:<10} {}", format!(":{}", command.key()), command.summary());
        }
        println!("\nAnything else is played as Alda code.");
    }
}

// ============================================================================
// Tests
// ============================================================================
