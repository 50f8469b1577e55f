//! Server lifecycle state machine.
//!
//! ```text
//! Stopped --up--> Starting --ready--> Running --down--> Stopping --gone--> Stopped
//! ```
//!
//! Every blocking phase is a bounded poll: a fixed probe interval and a hard
//! deadline of `timeout` after the phase starts. Each probe is itself cut off
//! at that deadline, so a server that accepts connections but never answers
//! cannot stretch the wait. Missing the deadline is reported as an error; the
//! process being waited on is never killed.

use anyhow::Result;
use log::{debug, info};
use std::thread;
use std::time::{Duration, Instant};

use crate::constants::*;
use crate::error::AldaError;
use crate::options::ServerOptions;
use crate::process::{acquire_port_lock, DiscoveredProcess, ProcessHost};
use crate::transport::{ServerApi, ServerStatus};

// ============================================================================
// State Types
// ============================================================================

/// Lifecycle state of the server on one (host, port).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ServerProcessState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Result of a single liveness probe.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Probe {
    Up(ServerStatus),
    Down,
}

/// How a bounded poll ended.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PollOutcome {
    Reached,
    TimedOut(Duration),
}

/// Time left before `deadline`, zero once it has passed.
pub fn time_left(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// Call `check` every `interval` until it reports true or `timeout` elapses.
///
/// `check` receives the time left before the deadline and must not block for
/// longer than that. The final check happens at or after the deadline, so a
/// timed-out poll has always waited at least `timeout`. An error from `check`
/// aborts the poll.
pub fn poll_until<F>(timeout: Duration, interval: Duration, mut check: F) -> Result<PollOutcome>
where
    F: FnMut(Duration) -> Result<bool>,
{
    let start = Instant::now();
    let deadline = start + timeout;
    loop {
        if check(time_left(deadline))? {
            return Ok(PollOutcome::Reached);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(PollOutcome::TimedOut(now - start));
        }
        thread::sleep(interval.min(deadline - now));
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Drives the server on `opts.host:opts.port` through its lifecycle.
pub struct Lifecycle<'a> {
    opts: &'a ServerOptions,
    api: &'a dyn ServerApi,
    host: &'a dyn ProcessHost,
    state: ServerProcessState,
    poll_interval: Duration,
}

impl<'a> Lifecycle<'a> {
    pub fn new(opts: &'a ServerOptions, api: &'a dyn ServerApi, host: &'a dyn ProcessHost) -> Self {
        Self {
            opts,
            api,
            host,
            state: ServerProcessState::Stopped,
            poll_interval: millis_to_duration(LIFECYCLE_POLL_MS),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn state(&self) -> ServerProcessState {
        self.state
    }

    /// Single-shot liveness probe, bounded by the probe timeout.
    pub fn probe(&self) -> Probe {
        probe_server(self.api, millis_to_duration(PROBE_TIMEOUT_MS))
    }

    /// Liveness probe that gives up at `deadline` (or the probe timeout,
    /// whichever comes first).
    fn probe_until(&self, deadline: Instant) -> Probe {
        let limit = time_left(deadline).min(millis_to_duration(PROBE_TIMEOUT_MS));
        probe_server(self.api, limit)
    }

    // ------------------------------------------------------------------------
    // Foreground
    // ------------------------------------------------------------------------

    /// Run the server attached to this terminal. Blocks for its lifetime,
    /// so the controller never observes it running; the state is unchanged.
    pub fn up_fg(&self, workers: u32) -> Result<()> {
        info!("starting server in foreground on port {}", self.opts.port);
        let status = self.host.run_server_attached(self.opts, workers)?;
        check_exit("server", status)
    }

    /// Run one worker attached to this terminal. Blocks for its lifetime.
    pub fn worker_fg(&self) -> Result<()> {
        info!("starting worker in foreground for port {}", self.opts.port);
        let status = self.host.run_worker_attached(self.opts)?;
        check_exit("worker", status)
    }

    // ------------------------------------------------------------------------
    // Background
    // ------------------------------------------------------------------------

    /// Launch the server in the background and wait until it and `workers`
    /// workers are ready.
    pub fn up_bg(&mut self, workers: u32) -> Result<()> {
        let _lock = acquire_port_lock(&self.host.state_dir(), self.opts.port)?;
        self.up_bg_locked(workers)
    }

    /// Stop the server and wait until it is gone.
    pub fn down(&mut self) -> Result<()> {
        let _lock = acquire_port_lock(&self.host.state_dir(), self.opts.port)?;
        self.down_locked()
    }

    /// Stop, then start. The up phase is skipped if the down phase fails.
    pub fn down_up(&mut self, workers: u32) -> Result<()> {
        let _lock = acquire_port_lock(&self.host.state_dir(), self.opts.port)?;
        self.down_locked()?;
        self.up_bg_locked(workers)
    }

    fn up_bg_locked(&mut self, workers: u32) -> Result<()> {
        let console = self.opts.console();
        let started = Instant::now();
        let deadline = started + self.opts.timeout;

        if let Probe::Up(status) = self.probe_until(deadline) {
            self.state = ServerProcessState::Running;
            console.msg(&format!("Server already up ({})", describe_workers(&status)));
            return Ok(());
        }

        self.state = ServerProcessState::Starting;
        console.msg("Starting Alda server...");
        let pid = match self.host.spawn_server_detached(self.opts, workers) {
            Ok(pid) => pid,
            Err(err) => {
                self.state = ServerProcessState::Stopped;
                return Err(err);
            }
        };

        let mut last_status = None;
        let outcome = poll_until(time_left(deadline), self.poll_interval, |left| {
            match probe_server(self.api, left.min(millis_to_duration(PROBE_TIMEOUT_MS))) {
                Probe::Up(status) => {
                    let ready = status.workers_available >= workers;
                    if !ready {
                        debug!("{}", describe_workers(&status));
                    }
                    last_status = Some(status);
                    Ok(ready)
                }
                Probe::Down if !self.host.is_alive(pid) => Err(AldaError::Runtime(format!(
                    "server process {} exited during startup; see {}",
                    pid,
                    crate::logging::server_log_path(self.opts.port).display()
                ))
                .into()),
                Probe::Down => Ok(false),
            }
        });

        match outcome {
            Ok(PollOutcome::Reached) => {
                self.state = ServerProcessState::Running;
                let status = last_status.unwrap_or_default();
                console.msg(&format!("Server up ({})", describe_workers(&status)));
                Ok(())
            }
            Ok(PollOutcome::TimedOut(_)) => {
                let elapsed = started.elapsed();
                self.state = ServerProcessState::Stopped;
                console.warn(&format!(
                    "server process {} did not become ready; it may still be running (`alda down` stops it)",
                    pid
                ));
                Err(AldaError::StartupTimeout { elapsed }.into())
            }
            Err(err) => {
                self.state = ServerProcessState::Stopped;
                Err(err)
            }
        }
    }

    fn down_locked(&mut self) -> Result<()> {
        let console = self.opts.console();
        let port = self.opts.port;
        let started = Instant::now();
        let deadline = started + self.opts.timeout;
        let recorded_pid = self
            .host
            .server_pid(port)
            .filter(|pid| self.host.is_alive(*pid));

        let responding = matches!(self.probe_until(deadline), Probe::Up(_));
        if !responding && recorded_pid.is_none() {
            self.host.clear_server(port);
            self.state = ServerProcessState::Stopped;
            console.msg("Server already down");
            return Ok(());
        }

        self.state = ServerProcessState::Stopping;
        console.msg("Stopping Alda server...");

        // Ask politely over the wire; fall back to SIGTERM on the recorded pid.
        let requested = if responding {
            self.api.shutdown_within(time_left(deadline))
        } else {
            Err(anyhow::anyhow!("server is not answering requests"))
        };
        if let Err(err) = requested {
            debug!("shutdown request failed: {:#}", err);
            match recorded_pid {
                Some(pid) => self.host.terminate(pid)?,
                None => {
                    self.state = ServerProcessState::Running;
                    return Err(err);
                }
            }
        }

        let outcome = poll_until(time_left(deadline), self.poll_interval, |left| {
            let pid_gone = recorded_pid.map_or(true, |pid| !self.host.is_alive(pid));
            let limit = left.min(millis_to_duration(PROBE_TIMEOUT_MS));
            Ok(pid_gone && probe_server(self.api, limit) == Probe::Down)
        })?;

        match outcome {
            PollOutcome::Reached => {
                self.host.clear_server(port);
                self.state = ServerProcessState::Stopped;
                console.msg("Server down");
                Ok(())
            }
            // The server was asked to stop and may still do so; leave it Stopping.
            PollOutcome::TimedOut(_) => Err(AldaError::ShutdownTimeout {
                elapsed: started.elapsed(),
            }
            .into()),
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Report whether the server is up. Never blocks beyond one probe.
    pub fn status(&mut self) -> ServerProcessState {
        let probe = self.probe();
        self.state = match probe {
            Probe::Up(_) => ServerProcessState::Running,
            Probe::Down => ServerProcessState::Stopped,
        };
        self.opts.console().msg(&describe_probe(&probe));
        self.state
    }

    /// Print every discoverable server and worker.
    pub fn list(&self) -> Result<Vec<DiscoveredProcess>> {
        let processes = self.host.discover()?;
        if processes.is_empty() {
            println!("No Alda processes found");
        }
        for process in &processes {
            println!(
                "[{}] {} (pid {})",
                process.port,
                process.role.as_str(),
                process.pid
            );
        }
        Ok(processes)
    }

    /// The server's reported version string.
    pub fn version(&self) -> Result<String> {
        self.api.version()
    }
}

/// Probe `api` once, giving up after `limit`.
pub fn probe_server(api: &dyn ServerApi, limit: Duration) -> Probe {
    match api.status_within(limit) {
        Ok(status) => Probe::Up(status),
        Err(err) => {
            debug!("status probe failed: {:#}", err);
            Probe::Down
        }
    }
}

/// The line `status` prints for a probe result.
pub fn describe_probe(probe: &Probe) -> String {
    match probe {
        Probe::Up(status) => format!("Server up ({})", describe_workers(status)),
        Probe::Down => "Server down".to_string(),
    }
}

/// The two lines `version` prints. A server that cannot be reached is
/// reported as unavailable rather than as an error.
pub fn version_lines(server_version: Result<String>) -> [String; 2] {
    let server = match server_version {
        Ok(version) => version,
        Err(err) => {
            debug!("version request failed: {:#}", err);
            "unavailable (server not up)".to_string()
        }
    };
    [
        format!("Client version: {}", env!("CARGO_PKG_VERSION")),
        format!("Server version: {}", server),
    ]
}

fn describe_workers(status: &ServerStatus) -> String {
    format!(
        "{}/{} workers available",
        status.workers_available, status.workers_total
    )
}

fn check_exit(role: &str, status: std::process::ExitStatus) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(AldaError::Runtime(format!("{role} exited with {status}")).into())
    }
}

// ============================================================================
// Tests
// ============================================================================
