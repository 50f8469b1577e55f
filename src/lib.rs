//! Command-line client for the Alda music-performance runtime.
//!
//! The runtime runs as a long-lived server process coordinating a pool of
//! worker processes. This crate resolves the user's command, drives the
//! server's lifecycle, forwards scores to it, and hosts the interactive REPL.
//!
//! # Architecture
//!
//! ```text
//! argv -> Args -> router --+-> lifecycle --> ProcessHost (spawn, ps scan, pid files)
//!                          |        \------> ServerApi (status probe, shutdown)
//!                          +-> playback --> input (file | code | stdin) --> ServerApi
//!                          +-> repl session --> commands (:save, :load, ...) --> ServerApi
//! ```
//!
//! # Modules
//!
//! - [`constants`]: Defaults, timing, and protocol constants
//! - [`error`]: Domain error taxonomy and exit codes
//! - [`input`]: Score input resolution (file, inline code, stdin)
//! - [`lifecycle`]: Server state machine with bounded polling
//! - [`logging`]: Timestamps, logger setup, and the console reporter
//! - [`options`]: Immutable per-invocation server configuration
//! - [`playback`]: `play`, `parse`, and `stop` execution
//! - [`process`]: Runtime discovery, spawning, pid files, and signals
//! - [`repl`]: Interactive session and its `:`-commands
//! - [`router`]: Command dispatch and exit codes
//! - [`transport`]: JSON-RPC transport to the server
//! - [`update`]: Client self-update

use clap::Parser;
use std::path::PathBuf;

pub mod constants;
pub mod error;
pub mod input;
pub mod lifecycle;
pub mod logging;
pub mod options;
pub mod playback;
pub mod process;
pub mod repl;
pub mod router;
pub mod transport;
pub mod update;

// ============================================================================
// CLI Types
// ============================================================================

/// Alda command-line arguments.
///
/// Help and version handling are left to the router so that `-h` on a
/// subcommand prints that subcommand's usage and `version` can query the
/// server.
#[derive(Parser, Debug)]
#[command(
    name = "alda",
    about = "Command-line client for the Alda music-performance runtime",
    disable_help_flag = true,
    disable_help_subcommand = true,
    disable_version_flag = true
)]
pub struct Args {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Options shared by every command.
#[derive(clap::Args, Debug, Clone)]
pub struct GlobalOptions {
    /// Used to identify this as an Alda process
    #[arg(long = "alda-fingerprint", hide = true, global = true)]
    pub fingerprint: bool,

    /// Print this help text
    #[arg(short = 'h', long, global = true)]
    pub help: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable non-error messages
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable color output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// The hostname of the Alda server
    #[arg(short = 'H', long, global = true, default_value = constants::DEFAULT_HOST)]
    pub host: String,

    /// The port of the Alda server/worker
    #[arg(
        short,
        long,
        global = true,
        default_value_t = constants::DEFAULT_PORT,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub port: u16,

    /// Seconds to wait for a server to start up or shut down before giving up
    #[arg(
        short,
        long,
        global = true,
        default_value_t = constants::DEFAULT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: u64,

    /// The number of worker processes to start
    #[arg(short, long, global = true, default_value_t = constants::DEFAULT_WORKERS)]
    pub workers: u32,
}

/// The operation selected for this invocation.
#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Display this help text
    #[command(disable_help_flag = true)]
    Help,

    /// Download and install the latest release of Alda
    #[command(disable_help_flag = true)]
    Update,

    /// Start an Alda server in the foreground
    #[command(name = "server", hide = true, disable_help_flag = true)]
    ServerFg,

    /// Start an Alda worker in the foreground
    #[command(name = "worker", hide = true, disable_help_flag = true)]
    WorkerFg,

    /// Start an interactive Alda REPL session
    #[command(disable_help_flag = true)]
    Repl,

    /// Start the Alda server
    #[command(visible_aliases = ["start-server", "init"], disable_help_flag = true)]
    Up,

    /// Stop the Alda server
    #[command(visible_alias = "stop-server", disable_help_flag = true)]
    Down,

    /// Restart the Alda server
    #[command(name = "downup", visible_alias = "restart-server", disable_help_flag = true)]
    DownUp,

    /// List running Alda servers/workers
    #[command(disable_help_flag = true)]
    List,

    /// Display whether the server is up
    #[command(disable_help_flag = true)]
    Status,

    /// Display the version of the Alda client and server
    #[command(disable_help_flag = true)]
    Version,

    /// Evaluate and play Alda code
    #[command(disable_help_flag = true)]
    Play(PlayOptions),

    /// Stop playback
    #[command(visible_alias = "stop-playback", disable_help_flag = true)]
    Stop,

    /// Display the result of parsing Alda code
    #[command(disable_help_flag = true)]
    Parse(ParseOptions),
}

impl Command {
    /// Canonical subcommand name, as used for per-command usage.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::Update => "update",
            Command::ServerFg => "server",
            Command::WorkerFg => "worker",
            Command::Repl => "repl",
            Command::Up => "up",
            Command::Down => "down",
            Command::DownUp => "downup",
            Command::List => "list",
            Command::Status => "status",
            Command::Version => "version",
            Command::Play(_) => "play",
            Command::Stop => "stop",
            Command::Parse(_) => "parse",
        }
    }
}

/// Options for `play`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct PlayOptions {
    /// Read Alda code from a file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Supply Alda code as a string
    #[arg(short, long)]
    pub code: Option<String>,

    /// Alda code that can be referenced but will not be played
    #[arg(short = 'i', long, default_value = "")]
    pub history: String,

    /// A file containing Alda code that can be referenced but will not be played
    #[arg(short = 'I', long)]
    pub history_file: Option<PathBuf>,

    /// A time marking or marker from which to start playback
    #[arg(short = 'F', long)]
    pub from: Option<String>,

    /// A time marking or marker at which to end playback
    #[arg(short = 'T', long)]
    pub to: Option<String>,
}

/// Options for `parse`.
#[derive(clap::Args, Debug, Clone)]
pub struct ParseOptions {
    /// Read Alda code from a file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Supply Alda code as a string
    #[arg(short, long)]
    pub code: Option<String>,

    /// Return the output as "data" or "events"
    #[arg(short, long = "output", default_value = "data")]
    pub output: String,
}

// Re-exports for the binary and integration tests
pub use error::{AldaError, ExitCode};
pub use lifecycle::{Lifecycle, ServerProcessState};
pub use options::ServerOptions;
pub use router::run;
