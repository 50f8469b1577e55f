// Integration tests for the Alda client: command dispatch, the lifecycle
// controller, and REPL sessions, all driven through fake server and process
// collaborators so no runtime needs to be installed.

use alda_client::error::{exit_code_for, AldaError, ExitCode};
use alda_client::input::StaticStdin;
use alda_client::lifecycle::{Lifecycle, ServerProcessState};
use alda_client::options::ServerOptions;
use alda_client::process::{DiscoveredProcess, ProcessHost, ProcessRole};
use alda_client::repl::{BufReadReader, ReplSession};
use alda_client::router::{dispatch, parse_args, Env};
use alda_client::transport::{
    OutputType, ParseSource, PlayRequest, PlayResult, ServerApi, ServerStatus, TcpTransport,
};

use anyhow::Result;
use std::cell::{Cell, RefCell};
use std::io::Cursor;
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::rc::Rc;
use std::time::{Duration, Instant};

// ============================================================================
// Fakes
// ============================================================================

/// What the fake server process is doing, shared by both fakes so a spawn or
/// shutdown on one side is visible on the other.
#[derive(Default)]
struct World {
    /// The server answers requests.
    up: Cell<bool>,
    /// The server's OS process exists.
    process_alive: Cell<bool>,
}

struct FakeServer {
    world: Rc<World>,
    /// When false, `stop-server` is acknowledged but the server stays up.
    honours_shutdown: bool,
    plays: RefCell<Vec<PlayRequest>>,
    parses: Cell<u32>,
    shutdowns: Cell<u32>,
}

/// Score text containing this marker is rejected by `play`.
const REJECT_MARKER: &str = "@@bad@@";

impl FakeServer {
    fn new(world: Rc<World>) -> Self {
        Self {
            world,
            honours_shutdown: true,
            plays: RefCell::new(Vec::new()),
            parses: Cell::new(0),
            shutdowns: Cell::new(0),
        }
    }

    fn is_up(&self) -> bool {
        self.world.up.get()
    }

    fn ensure_up(&self) -> Result<()> {
        if self.is_up() {
            Ok(())
        } else {
            Err(AldaError::ServerDown {
                host: "localhost".into(),
                port: 27713,
            }
            .into())
        }
    }
}

/// Instruments named by `name:` prefixes, in order of appearance.
fn instruments_in(score: &str) -> Vec<String> {
    score
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, _)| name.trim().to_string())
        .collect()
}

impl ServerApi for FakeServer {
    fn status(&self) -> Result<ServerStatus> {
        self.ensure_up()?;
        Ok(ServerStatus {
            version: "2.0.0".into(),
            workers_available: 2,
            workers_total: 2,
        })
    }

    fn version(&self) -> Result<String> {
        self.ensure_up()?;
        Ok("2.0.0".into())
    }

    fn play(&self, request: &PlayRequest) -> Result<PlayResult> {
        self.ensure_up()?;
        if request.code.contains(REJECT_MARKER) {
            return Err(AldaError::Remote {
                code: 1,
                message: "Invalid Alda syntax".into(),
            }
            .into());
        }
        self.plays.borrow_mut().push(request.clone());
        let score = format!("{}\n{}", request.history, request.code);
        Ok(PlayResult {
            instruments: instruments_in(&score),
        })
    }

    fn parse(&self, _source: ParseSource<'_>, _output: OutputType) -> Result<serde_json::Value> {
        self.ensure_up()?;
        self.parses.set(self.parses.get() + 1);
        Ok(serde_json::json!({"events": []}))
    }

    fn stop_playback(&self) -> Result<()> {
        self.ensure_up()
    }

    fn shutdown(&self) -> Result<()> {
        self.ensure_up()?;
        self.shutdowns.set(self.shutdowns.get() + 1);
        if self.honours_shutdown {
            self.world.up.set(false);
            self.world.process_alive.set(false);
        }
        Ok(())
    }
}

struct FakeHost {
    world: Rc<World>,
    /// Whether a spawned server ever starts answering.
    spawn_comes_up: bool,
    spawns: Cell<u32>,
    /// Recorded server pid, as a pid file would hold it.
    pid: Cell<Option<u32>>,
    state_dir: tempfile::TempDir,
    /// Exit code of every foreground run.
    attached_exit: i32,
    attached_runs: Cell<u32>,
}

impl FakeHost {
    fn new(world: Rc<World>) -> Self {
        Self {
            world,
            spawn_comes_up: true,
            spawns: Cell::new(0),
            pid: Cell::new(None),
            state_dir: tempfile::tempdir().unwrap(),
            attached_exit: 0,
            attached_runs: Cell::new(0),
        }
    }

    /// Pretend a server process was left running from an earlier session.
    fn adopt(&self, pid: u32) {
        self.pid.set(Some(pid));
        self.world.process_alive.set(true);
    }
}

impl ProcessHost for FakeHost {
    fn run_server_attached(&self, _opts: &ServerOptions, _workers: u32) -> Result<ExitStatus> {
        self.attached_runs.set(self.attached_runs.get() + 1);
        Ok(exit_status(self.attached_exit))
    }

    fn run_worker_attached(&self, _opts: &ServerOptions) -> Result<ExitStatus> {
        self.attached_runs.set(self.attached_runs.get() + 1);
        Ok(exit_status(self.attached_exit))
    }

    fn spawn_server_detached(&self, _opts: &ServerOptions, _workers: u32) -> Result<u32> {
        self.spawns.set(self.spawns.get() + 1);
        self.adopt(4242);
        if self.spawn_comes_up {
            self.world.up.set(true);
        }
        Ok(4242)
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.pid.get() == Some(pid) && self.world.process_alive.get()
    }

    fn server_pid(&self, _port: u16) -> Option<u32> {
        self.pid.get()
    }

    fn clear_server(&self, _port: u16) {
        self.pid.set(None);
    }

    fn terminate(&self, _pid: u32) -> Result<()> {
        self.world.process_alive.set(false);
        self.world.up.set(false);
        Ok(())
    }

    fn discover(&self) -> Result<Vec<DiscoveredProcess>> {
        Ok(self
            .pid
            .get()
            .filter(|_| self.world.process_alive.get())
            .map(|pid| DiscoveredProcess {
                role: ProcessRole::Server,
                pid,
                port: 27713,
            })
            .into_iter()
            .collect())
    }

    fn state_dir(&self) -> PathBuf {
        self.state_dir.path().to_path_buf()
    }
}

#[cfg(unix)]
fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    ExitStatus::from_raw(code as u32)
}

/// A port that accepts connections into its backlog and never answers.
fn silent_server() -> (TcpListener, ServerOptions) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let opts = ServerOptions {
        host: "127.0.0.1".into(),
        port: listener.local_addr().unwrap().port(),
        ..quiet_opts()
    };
    (listener, opts)
}

fn fakes(up: bool) -> (FakeServer, FakeHost) {
    let world = Rc::new(World::default());
    world.up.set(up);
    (FakeServer::new(world.clone()), FakeHost::new(world))
}

fn quiet_opts() -> ServerOptions {
    ServerOptions {
        quiet: true,
        ..ServerOptions::default()
    }
}

/// Parse `argv` and dispatch it against the fakes.
fn run_cli(argv: &[&str], api: &FakeServer, host: &FakeHost, stdin: &str) -> ExitCode {
    let args = parse_args(argv.iter().copied()).expect("argv should parse");
    let opts = ServerOptions::from_global(&args.global);
    let mut stdin = StaticStdin(stdin.to_string());
    let mut env = Env {
        api,
        host,
        stdin: &mut stdin,
        lines: None,
    };
    dispatch(&args, &opts, &mut env)
}

const POLL: Duration = Duration::from_millis(10);

// ============================================================================
// Router
// ============================================================================

#[test]
fn test_play_with_file_and_code_is_user_error() {
    let (api, host) = fakes(true);
    let code = run_cli(
        &["alda", "-q", "play", "-f", "does-not-exist.alda", "-c", "piano: c"],
        &api,
        &host,
        "",
    );
    assert_eq!(code, ExitCode::UserError);
    assert!(api.plays.borrow().is_empty());
}

#[test]
fn test_play_code_reaches_server() {
    let (api, host) = fakes(true);
    let code = run_cli(&["alda", "-q", "play", "-c", "piano: c d e"], &api, &host, "");
    assert_eq!(code, ExitCode::Success);
    assert_eq!(api.plays.borrow()[0].code, "piano: c d e");
}

#[test]
fn test_play_from_stdin() {
    let (api, host) = fakes(true);
    let code = run_cli(&["alda", "-q", "play"], &api, &host, "flute: e f g");
    assert_eq!(code, ExitCode::Success);
    assert_eq!(api.plays.borrow()[0].code, "flute: e f g");
}

#[test]
fn test_play_without_any_input_is_user_error() {
    let (api, host) = fakes(true);
    assert_eq!(run_cli(&["alda", "-q", "play"], &api, &host, ""), ExitCode::UserError);
}

#[test]
fn test_play_against_down_server_is_network_error() {
    let (api, host) = fakes(false);
    let code = run_cli(&["alda", "-q", "play", "-c", "piano: c"], &api, &host, "");
    assert_eq!(code, ExitCode::NetworkError);
}

#[test]
fn test_parse_with_invalid_output_never_contacts_server() {
    let (api, host) = fakes(true);
    let code = run_cli(
        &["alda", "-q", "parse", "-c", "piano: c", "-o", "xml"],
        &api,
        &host,
        "",
    );
    assert_eq!(code, ExitCode::UserError);
    assert_eq!(api.parses.get(), 0);
}

#[test]
fn test_parse_events() {
    let (api, host) = fakes(true);
    let code = run_cli(
        &["alda", "-q", "parse", "-c", "piano: c", "-o", "events"],
        &api,
        &host,
        "",
    );
    assert_eq!(code, ExitCode::Success);
    assert_eq!(api.parses.get(), 1);
}

#[test]
fn test_help_for_command_short_circuits() {
    let (api, host) = fakes(false);
    let code = run_cli(&["alda", "play", "-h", "-c", "x"], &api, &host, "");
    assert_eq!(code, ExitCode::Success);
    assert!(api.plays.borrow().is_empty());
}

#[test]
fn test_no_command_prints_help() {
    let (api, host) = fakes(false);
    assert_eq!(run_cli(&["alda"], &api, &host, ""), ExitCode::Success);
    assert_eq!(host.spawns.get(), 0);
}

#[test]
fn test_status_reports_without_failing_when_down() {
    let (api, host) = fakes(false);
    assert_eq!(run_cli(&["alda", "-q", "status"], &api, &host, ""), ExitCode::Success);
}

#[test]
fn test_up_then_down_through_router() {
    let (api, host) = fakes(false);
    assert_eq!(run_cli(&["alda", "-q", "up"], &api, &host, ""), ExitCode::Success);
    assert_eq!(host.spawns.get(), 1);
    assert!(api.is_up());

    assert_eq!(run_cli(&["alda", "-q", "down"], &api, &host, ""), ExitCode::Success);
    assert_eq!(api.shutdowns.get(), 1);
    assert!(!api.is_up());
}

#[test]
fn test_list_with_running_server() {
    let (api, host) = fakes(false);
    run_cli(&["alda", "-q", "up"], &api, &host, "");
    assert_eq!(run_cli(&["alda", "-q", "list"], &api, &host, ""), ExitCode::Success);
    assert_eq!(host.discover().unwrap().len(), 1);
}

#[test]
fn test_version_with_server_down_still_succeeds() {
    let (api, host) = fakes(false);
    assert_eq!(run_cli(&["alda", "version"], &api, &host, ""), ExitCode::Success);
}

#[test]
fn test_repl_through_router_with_scripted_input() {
    let (api, host) = fakes(true);
    let args = parse_args(["alda", "-q", "repl"]).unwrap();
    let opts = ServerOptions::from_global(&args.global);
    let mut stdin = StaticStdin(String::new());
    let mut lines = BufReadReader::new(Cursor::new("piano: c d e\n:quit\nviolin: g\n"));
    let mut env = Env {
        api: &api,
        host: &host,
        stdin: &mut stdin,
        lines: Some(&mut lines),
    };
    assert_eq!(dispatch(&args, &opts, &mut env), ExitCode::Success);
    // Nothing after :quit is read.
    assert_eq!(api.plays.borrow().len(), 1);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_up_timeout_waits_full_timeout_and_leaves_stopped() {
    let (api, mut host) = fakes(false);
    host.spawn_comes_up = false;
    let timeout = Duration::from_millis(200);
    let opts = quiet_opts().with_timeout(timeout);
    let mut lifecycle = Lifecycle::new(&opts, &api, &host).with_poll_interval(POLL);

    let started = Instant::now();
    let err = lifecycle.up_bg(2).unwrap_err();
    assert!(started.elapsed() >= timeout);
    match err.downcast_ref::<AldaError>() {
        Some(AldaError::StartupTimeout { elapsed }) => assert!(*elapsed >= timeout),
        other => panic!("expected startup timeout, got {:?}", other),
    }
    assert_eq!(exit_code_for(&err), ExitCode::Timeout);
    assert_eq!(lifecycle.state(), ServerProcessState::Stopped);
    // The unresponsive server is never killed.
    assert!(host.is_alive(4242));
}

#[test]
fn test_up_against_silent_server_honours_timeout() {
    let (listener, opts) = silent_server();
    let opts = opts.with_timeout(Duration::from_secs(1));
    let api = TcpTransport::new(&opts);
    let (_, mut host) = fakes(false);
    host.spawn_comes_up = false;
    let mut lifecycle = Lifecycle::new(&opts, &api, &host).with_poll_interval(POLL);

    let started = Instant::now();
    let err = lifecycle.up_bg(2).unwrap_err();
    let elapsed = started.elapsed();

    assert!(elapsed >= opts.timeout);
    assert!(elapsed < opts.timeout + Duration::from_millis(700), "took {:?}", elapsed);
    assert_eq!(exit_code_for(&err), ExitCode::Timeout);
    assert_eq!(lifecycle.state(), ServerProcessState::Stopped);
    drop(listener);
}

#[test]
fn test_down_against_silent_server_honours_timeout() {
    let (listener, opts) = silent_server();
    let opts = opts.with_timeout(Duration::from_secs(1));
    let api = TcpTransport::new(&opts);
    let (_, host) = fakes(false);
    host.adopt(4242);
    let mut lifecycle = Lifecycle::new(&opts, &api, &host).with_poll_interval(POLL);

    let started = Instant::now();
    lifecycle.down().unwrap();
    let elapsed = started.elapsed();

    // The silent server counts as down; the recorded process gets SIGTERM.
    assert!(!host.is_alive(4242));
    assert!(elapsed < opts.timeout + Duration::from_millis(700), "took {:?}", elapsed);
    assert_eq!(lifecycle.state(), ServerProcessState::Stopped);
    drop(listener);
}

#[test]
fn test_status_against_silent_server_is_short() {
    let (listener, opts) = silent_server();
    let opts = opts.with_timeout(Duration::from_secs(30));
    let api = TcpTransport::new(&opts);
    let (_, host) = fakes(false);
    let mut lifecycle = Lifecycle::new(&opts, &api, &host);

    let started = Instant::now();
    assert_eq!(lifecycle.status(), ServerProcessState::Stopped);
    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    drop(listener);
}

#[test]
fn test_foreground_server_leaves_state_stopped() {
    let (api, host) = fakes(false);
    let opts = quiet_opts();
    let lifecycle = Lifecycle::new(&opts, &api, &host);

    lifecycle.up_fg(2).unwrap();
    assert_eq!(host.attached_runs.get(), 1);
    assert_eq!(lifecycle.state(), ServerProcessState::Stopped);
}

#[test]
fn test_foreground_server_failure_is_system_error() {
    let (api, mut host) = fakes(false);
    host.attached_exit = 3;
    let opts = quiet_opts();
    let lifecycle = Lifecycle::new(&opts, &api, &host);

    let err = lifecycle.up_fg(2).unwrap_err();
    assert!(matches!(err.downcast_ref::<AldaError>(), Some(AldaError::Runtime(_))));
    assert_eq!(exit_code_for(&err), ExitCode::SystemError);
    assert_eq!(lifecycle.state(), ServerProcessState::Stopped);
}

#[test]
fn test_worker_command_runs_attached() {
    let (api, host) = fakes(false);
    assert_eq!(run_cli(&["alda", "worker"], &api, &host, ""), ExitCode::Success);
    assert_eq!(host.attached_runs.get(), 1);
}

#[test]
fn test_up_when_already_up_does_not_spawn() {
    let (api, host) = fakes(true);
    let opts = quiet_opts();
    let mut lifecycle = Lifecycle::new(&opts, &api, &host).with_poll_interval(POLL);
    lifecycle.up_bg(2).unwrap();
    assert_eq!(host.spawns.get(), 0);
    assert_eq!(lifecycle.state(), ServerProcessState::Running);
}

#[test]
fn test_up_reaches_running() {
    let (api, host) = fakes(false);
    let opts = quiet_opts();
    let mut lifecycle = Lifecycle::new(&opts, &api, &host).with_poll_interval(POLL);
    lifecycle.up_bg(2).unwrap();
    assert_eq!(host.spawns.get(), 1);
    assert_eq!(lifecycle.state(), ServerProcessState::Running);
}

#[test]
fn test_down_when_already_down() {
    let (api, host) = fakes(false);
    let opts = quiet_opts();
    let mut lifecycle = Lifecycle::new(&opts, &api, &host).with_poll_interval(POLL);
    lifecycle.down().unwrap();
    assert_eq!(api.shutdowns.get(), 0);
    assert_eq!(lifecycle.state(), ServerProcessState::Stopped);
}

#[test]
fn test_down_without_api_falls_back_to_signal() {
    let (api, host) = fakes(false);
    host.adopt(4242);
    let opts = quiet_opts();
    let mut lifecycle = Lifecycle::new(&opts, &api, &host).with_poll_interval(POLL);
    lifecycle.down().unwrap();
    assert_eq!(api.shutdowns.get(), 0);
    assert!(!host.is_alive(4242));
    assert_eq!(host.pid.get(), None);
    assert_eq!(lifecycle.state(), ServerProcessState::Stopped);
}

#[test]
fn test_downup_skips_up_when_down_times_out() {
    let (mut api, host) = fakes(true);
    api.honours_shutdown = false;
    let timeout = Duration::from_millis(150);
    let opts = quiet_opts().with_timeout(timeout);
    let mut lifecycle = Lifecycle::new(&opts, &api, &host).with_poll_interval(POLL);

    let err = lifecycle.down_up(2).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AldaError>(),
        Some(AldaError::ShutdownTimeout { .. })
    ));
    assert_eq!(host.spawns.get(), 0);
    assert_eq!(lifecycle.state(), ServerProcessState::Stopping);
}

#[test]
fn test_downup_restarts() {
    let (api, host) = fakes(true);
    let opts = quiet_opts();
    let mut lifecycle = Lifecycle::new(&opts, &api, &host).with_poll_interval(POLL);
    lifecycle.down_up(2).unwrap();
    assert_eq!(api.shutdowns.get(), 1);
    assert_eq!(host.spawns.get(), 1);
    assert_eq!(lifecycle.state(), ServerProcessState::Running);
}

// ============================================================================
// REPL
// ============================================================================

fn feed(session: &mut ReplSession<'_>, lines: &[&str], answers: &str) {
    let mut reader = BufReadReader::new(Cursor::new(answers.to_string()));
    for line in lines {
        session.handle_line(line, &mut reader).unwrap();
    }
}

#[test]
fn test_repl_history_grows_only_on_success() {
    let (api, _host) = fakes(true);
    let mut session = ReplSession::new(&api, quiet_opts().console());
    feed(&mut session, &["piano: c d e", "@@bad@@", "f g a"], "");

    assert_eq!(session.state().history.text(), "piano: c d e\nf g a\n");
    assert_eq!(session.prompt(), "piano> ");
    // Each fragment is played against the history before it.
    let plays = api.plays.borrow();
    assert_eq!(plays[1].history, "piano: c d e\n");
}

#[test]
fn test_repl_empty_line_then_bare_save_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (api, _host) = fakes(true);
    let mut session = ReplSession::new(&api, quiet_opts().console());
    feed(&mut session, &["", ":save"], "");

    assert!(session.state().save_path.is_none());
    assert!(session.state().history.is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert!(api.plays.borrow().is_empty());
}

#[test]
fn test_repl_first_save_then_bare_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("song.alda");
    let (api, _host) = fakes(true);
    let mut session = ReplSession::new(&api, quiet_opts().console());

    let save = format!(":save {}", path.display());
    feed(&mut session, &["piano: c", &save, "d e"], "");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "piano: c\n");
    assert_eq!(session.state().save_path.as_deref(), Some(path.as_path()));

    feed(&mut session, &[":save"], "");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "piano: c\nd e\n");
}

#[test]
fn test_repl_save_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("same.alda");
    let (api, _host) = fakes(true);
    let mut session = ReplSession::new(&api, quiet_opts().console());
    feed(&mut session, &["piano: c d e"], "");

    feed(&mut session, &[":save"], "");
    let save = format!(":save {}", path.display());
    feed(&mut session, &[&save], "");
    let first = std::fs::read(&path).unwrap();
    feed(&mut session, &[":save"], "");
    assert_eq!(std::fs::read(&path).unwrap(), first);
}

#[test]
fn test_repl_save_conflict_no_then_yes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("existing.alda");
    std::fs::write(&path, "cello: o2 c1").unwrap();
    let (api, _host) = fakes(true);
    let mut session = ReplSession::new(&api, quiet_opts().console());
    feed(&mut session, &["piano: c"], "");

    let save = format!(":save {}", path.display());
    feed(&mut session, &[&save], "no\n");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "cello: o2 c1");
    assert!(session.state().save_path.is_none());

    feed(&mut session, &[&save], "yes\n");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "piano: c\n");
    assert_eq!(session.state().save_path.as_deref(), Some(path.as_path()));
}

#[test]
fn test_repl_load_then_continue() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("start.alda");
    std::fs::write(&path, "cello: o2 c1\n").unwrap();
    let (api, _host) = fakes(true);
    let mut session = ReplSession::new(&api, quiet_opts().console());

    let load = format!(":load {}", path.display());
    feed(&mut session, &[&load, "d e"], "");
    assert_eq!(session.state().history.text(), "cello: o2 c1\nd e\n");
    assert_eq!(session.prompt(), "cello> ");
    assert_eq!(session.state().save_path.as_deref(), Some(path.as_path()));
}

#[test]
fn test_repl_unknown_command_keeps_session_alive() {
    let (api, _host) = fakes(true);
    let mut session = ReplSession::new(&api, quiet_opts().console());
    let mut reader = BufReadReader::new(Cursor::new(String::new()));
    let outcome = session.handle_line(":frobnicate", &mut reader).unwrap();
    assert_eq!(outcome, alda_client::repl::commands::CommandOutcome::Continue);
    let outcome = session.handle_line(":exit", &mut reader).unwrap();
    assert_eq!(outcome, alda_client::repl::commands::CommandOutcome::Quit);
}

#[test]
fn test_repl_info_commands_with_server_down() {
    let (api, _host) = fakes(true);
    let mut session = ReplSession::new(&api, quiet_opts().console());
    feed(&mut session, &["piano: c d e"], "");
    api.world.up.set(false);

    let mut reader = BufReadReader::new(Cursor::new(String::new()));
    for line in [":status", ":version", ":score", ":stop"] {
        let outcome = session.handle_line(line, &mut reader).unwrap();
        assert_eq!(outcome, alda_client::repl::commands::CommandOutcome::Continue, "{}", line);
    }
    assert_eq!(session.state().history.text(), "piano: c d e\n");
    assert_eq!(session.prompt(), "piano> ");
}
