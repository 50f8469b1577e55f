//! Command dispatch.
//!
//! [`run`] turns argv into exactly one operation and an [`ExitCode`]. The
//! collaborators an operation needs (server API, process host, stdin, line
//! reader) are passed in through [`Env`] so the whole dispatch path can be
//! driven without a real server.

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use log::{debug, warn};

use crate::constants::{millis_to_duration, PROBE_TIMEOUT_MS};
use crate::error::{exit_code_for, ExitCode};
use crate::input::{ProcessStdin, StdinSource};
use crate::lifecycle::{version_lines, Lifecycle};
use crate::logging::Console;
use crate::options::ServerOptions;
use crate::playback;
use crate::process::{ProcessHost, SystemHost};
use crate::repl::{self, LineReader, ReplSession};
use crate::transport::{ServerApi, TcpTransport};
use crate::update;
use crate::{Args, Command};

/// Collaborators for one invocation.
pub struct Env<'a> {
    pub api: &'a dyn ServerApi,
    pub host: &'a dyn ProcessHost,
    pub stdin: &'a mut dyn StdinSource,
    /// Input for `repl`. When None, a reader is chosen for the process stdin.
    pub lines: Option<&'a mut dyn LineReader>,
}

/// Parse `argv` and run the selected command against the real server and OS.
pub fn run<I, T>(argv: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let args = match parse_args(argv) {
        Ok(args) => args,
        Err(code) => return code,
    };
    let opts = ServerOptions::from_global(&args.global);
    crate::logging::init_logger(opts.verbose, opts.quiet);

    let api = TcpTransport::new(&opts);
    let host = SystemHost::new();
    let mut stdin = ProcessStdin;
    let mut env = Env {
        api: &api,
        host: &host,
        stdin: &mut stdin,
        lines: None,
    };
    dispatch(&args, &opts, &mut env)
}

/// Parse argv, printing usage problems. Returns the exit code to stop with
/// when parsing does not produce a command to run.
pub fn parse_args<I, T>(argv: I) -> Result<Args, ExitCode>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    match Args::try_parse_from(argv) {
        Ok(args) => Ok(args),
        // An unknown command name falls back to general help.
        Err(err) if err.kind() == ErrorKind::InvalidSubcommand => {
            debug!("{}", err);
            print_usage(None);
            Err(ExitCode::Success)
        }
        Err(err) => {
            eprint!("{}", err.render());
            eprintln!("For usage instructions, see --help.");
            Err(ExitCode::UserError)
        }
    }
}

/// Print general usage, or one subcommand's usage.
pub fn print_usage(command: Option<&str>) {
    let mut cli = Args::command();
    let help = match command.and_then(|name| cli.find_subcommand_mut(name)) {
        Some(sub) => sub.render_help(),
        None => cli.render_help(),
    };
    println!("{}", help);
}

/// Run exactly one command and report how it ended.
pub fn dispatch(args: &Args, opts: &ServerOptions, env: &mut Env<'_>) -> ExitCode {
    let console = opts.console();

    if args.global.help {
        print_usage(args.command.as_ref().map(Command::name));
        return ExitCode::Success;
    }

    let command = args.command.clone().unwrap_or(Command::Help);
    debug!("dispatching {}", command.name());

    match execute(&command, opts, env, &console) {
        Ok(()) => ExitCode::Success,
        Err(err) => {
            report(&console, &err);
            exit_code_for(&err)
        }
    }
}

fn report(console: &Console, err: &anyhow::Error) {
    console.error(&format!("{:#}", err));
    if console.verbose {
        eprintln!("{:?}", err);
    }
}

fn execute(command: &Command, opts: &ServerOptions, env: &mut Env<'_>, console: &Console) -> Result<()> {
    let mut lifecycle = Lifecycle::new(opts, env.api, env.host);

    match command {
        Command::Help => {
            print_usage(None);
            Ok(())
        }
        Command::Update => update::run(console),
        Command::ServerFg => lifecycle.up_fg(opts.workers),
        Command::WorkerFg => lifecycle.worker_fg(),
        Command::Up => lifecycle.up_bg(opts.workers),
        Command::Down => lifecycle.down(),
        Command::DownUp => lifecycle.down_up(opts.workers),
        Command::List => lifecycle.list().map(|_| ()),
        Command::Status => {
            lifecycle.status();
            Ok(())
        }
        Command::Version => {
            for line in version_lines(lifecycle.version()) {
                println!("{}", line);
            }
            Ok(())
        }
        Command::Play(play_opts) => {
            let result = playback::play(play_opts, env.api, env.stdin, console)?;
            debug!("playing with instruments {:?}", result.instruments);
            Ok(())
        }
        Command::Stop => playback::stop(env.api, console),
        Command::Parse(parse_opts) => {
            let result = playback::parse(parse_opts, env.api, env.stdin)?;
            playback::print_parse_result(&result)
        }
        Command::Repl => run_repl(env, console),
    }
}

fn run_repl(env: &mut Env<'_>, console: &Console) -> Result<()> {
    if let Err(err) = env.api.status_within(millis_to_duration(PROBE_TIMEOUT_MS)) {
        warn!("server is not responding yet: {:#}", err);
        console.warn("The Alda server is not up; run `alda up` before playing anything");
    }
    let mut session = ReplSession::new(env.api, console.clone());
    match env.lines.as_deref_mut() {
        Some(reader) => session.run(reader),
        None => {
            let mut reader = repl::default_reader()?;
            session.run(reader.as_mut())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
