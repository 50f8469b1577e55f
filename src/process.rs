//! Process management for the Alda runtime.
//!
//! Handles runtime executable detection, launching the server and workers
//! (attached or detached), PID file management, port locks, and discovery of
//! running Alda processes.

use anyhow::{anyhow, Context, Result};
use fslock::LockFile;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use crate::constants::*;
use crate::error::AldaError;
use crate::logging::{log_dir, server_log_path};
use crate::options::ServerOptions;

// ============================================================================
// Safe Signal Wrapper
// ============================================================================

/// Safe wrappers around libc signal operations.
/// All unsafe code is isolated here with SAFETY documentation.
#[cfg(unix)]
pub mod signal {
    use std::io;

    /// Check if a process exists (signal 0 is POSIX standard).
    pub fn process_exists(pid: u32) -> bool {
        // SAFETY: kill(pid, 0) only checks existence, no signal sent.
        unsafe { libc::kill(pid as i32, 0) == 0 }
    }

    /// Send SIGTERM for graceful termination.
    pub fn send_sigterm(pid: u32) -> io::Result<()> {
        // SAFETY: SIGTERM requests graceful termination; the target may
        // catch it and clean up.
        let result = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

/// Check if a process is alive.
pub fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        // Guard against pid 0 / -1 semantics of kill(2).
        pid > 0 && pid <= i32::MAX as u32 && signal::process_exists(pid)
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

// ============================================================================
// Process Roles & Discovery
// ============================================================================

/// Role of a process launched by this client.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessRole {
    Server,
    Worker,
}

impl ProcessRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessRole::Server => "server",
            ProcessRole::Worker => "worker",
        }
    }
}

/// A running Alda process found by [`ProcessHost::discover`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiscoveredProcess {
    pub role: ProcessRole,
    pub pid: u32,
    pub port: u16,
}

/// Parse one line of `ps -eo pid,args` output.
/// Returns None unless the command line carries the Alda fingerprint flag.
pub fn parse_ps_line(line: &str) -> Option<DiscoveredProcess> {
    let mut parts = line.split_whitespace();
    let pid = parts.next()?.parse::<u32>().ok()?;
    let args: Vec<&str> = parts.collect();
    if !args.contains(&FINGERPRINT_FLAG) {
        return None;
    }

    let role = args.iter().rev().find_map(|arg| match *arg {
        "server" => Some(ProcessRole::Server),
        "worker" => Some(ProcessRole::Worker),
        _ => None,
    })?;

    let mut port = DEFAULT_PORT;
    for (i, arg) in args.iter().enumerate() {
        let value = if *arg == "--port" || *arg == "-p" {
            args.get(i + 1).copied()
        } else {
            arg.strip_prefix("--port=")
        };
        if let Some(parsed) = value.and_then(|v| v.parse::<u16>().ok()) {
            port = parsed;
        }
    }

    Some(DiscoveredProcess { role, pid, port })
}

/// Scan the process table for fingerprinted Alda processes.
#[cfg(unix)]
fn scan_process_table() -> Result<Vec<DiscoveredProcess>> {
    let output = Command::new("ps")
        .args(["-eo", "pid,args"])
        .output()
        .context("failed to run ps")?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().skip(1).filter_map(parse_ps_line).collect())
}

#[cfg(not(unix))]
fn scan_process_table() -> Result<Vec<DiscoveredProcess>> {
    Ok(Vec::new())
}

// ============================================================================
// PID File Management
// ============================================================================

/// Contents of a server PID file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PidFileInfo {
    pub pid: u32,
    pub port: u16,
    pub workers: u32,
}

/// Path to the PID file of the server on `port`.
pub fn pid_file_path(dir: &Path, port: u16) -> PathBuf {
    dir.join(format!("alda-server-{port}.pid"))
}

/// Write the PID file for a background server.
pub fn write_pid_file(dir: &Path, info: &PidFileInfo) -> Result<()> {
    let path = pid_file_path(dir, info.port);
    let content = serde_json::to_string(info).context("failed to encode PID file")?;
    std::fs::write(&path, content)
        .with_context(|| format!("failed to write PID file at {:?}", path))?;
    debug!("wrote PID file at {:?}", path);
    Ok(())
}

/// Read a PID file, returning None if it doesn't exist or is malformed.
pub fn read_pid_file(dir: &Path, port: u16) -> Option<PidFileInfo> {
    let content = std::fs::read_to_string(pid_file_path(dir, port)).ok()?;
    serde_json::from_str(&content).ok()
}

/// Remove the PID file of the server on `port`, if any.
pub fn remove_pid_file(dir: &Path, port: u16) {
    let path = pid_file_path(dir, port);
    if path.exists() {
        if let Err(e) = std::fs::remove_file(&path) {
            warn!("failed to remove PID file {:?}: {}", path, e);
        } else {
            debug!("removed PID file at {:?}", path);
        }
    }
}

/// All readable PID files in `dir`.
fn list_pid_files(dir: &Path) -> Vec<PidFileInfo> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let port = name
                .strip_prefix("alda-server-")?
                .strip_suffix(".pid")?
                .parse::<u16>()
                .ok()?;
            read_pid_file(dir, port)
        })
        .collect()
}

// ============================================================================
// Port Lock
// ============================================================================

/// Acquire the exclusive lifecycle lock for `port`, blocking while another
/// client holds it. The lock is released when the returned file is dropped.
pub fn acquire_port_lock(dir: &Path, port: u16) -> Result<LockFile> {
    let lock_path = dir.join(format!("alda-server-{port}.lock"));
    let mut lock = LockFile::open(&lock_path)
        .map_err(|e| anyhow!("failed to open lock file {:?}: {}", lock_path, e))?;
    if !lock.try_lock().unwrap_or(false) {
        debug!("waiting for another client to release {:?}...", lock_path);
        lock.lock()
            .map_err(|e| anyhow!("failed to acquire lock: {}", e))?;
    }
    Ok(lock)
}

// ============================================================================
// Runtime Detection & Command Building
// ============================================================================

/// Detect the Alda runtime executable.
/// Checks: ALDA_RUNTIME env, then `alda-runtime` on PATH.
pub fn detect_runtime() -> Result<PathBuf> {
    if let Some(env_path) = std::env::var_os("ALDA_RUNTIME") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            debug!("using runtime from ALDA_RUNTIME={}", path.display());
            return Ok(path);
        }
        warn!("ALDA_RUNTIME={} does not exist; searching PATH", path.display());
    }

    which::which("alda-runtime").map_err(|_| {
        AldaError::Runtime(
            "alda-runtime not found; set ALDA_RUNTIME or add alda-runtime to PATH".to_string(),
        )
        .into()
    })
}

/// Arguments passed to the runtime for the given role.
pub fn runtime_args(role: ProcessRole, port: u16, workers: Option<u32>) -> Vec<String> {
    let mut args = vec![
        FINGERPRINT_FLAG.to_string(),
        "--port".to_string(),
        port.to_string(),
    ];
    if let Some(workers) = workers {
        args.push("--workers".to_string());
        args.push(workers.to_string());
    }
    args.push(role.as_str().to_string());
    args
}

// ============================================================================
// Process Host
// ============================================================================

/// Host operations the lifecycle controller needs: launching processes,
/// checking liveness, and locating what is already running.
pub trait ProcessHost {
    /// Run the server attached to this terminal until it exits.
    fn run_server_attached(&self, opts: &ServerOptions, workers: u32) -> Result<ExitStatus>;

    /// Run a single worker attached to this terminal until it exits.
    fn run_worker_attached(&self, opts: &ServerOptions) -> Result<ExitStatus>;

    /// Launch the server detached from this session, returning its pid.
    fn spawn_server_detached(&self, opts: &ServerOptions, workers: u32) -> Result<u32>;

    fn is_alive(&self, pid: u32) -> bool;

    /// Pid of the background server on `port`, as recorded at launch.
    fn server_pid(&self, port: u16) -> Option<u32>;

    /// Forget the background server on `port` once it is gone.
    fn clear_server(&self, port: u16);

    /// Ask a process to terminate gracefully.
    fn terminate(&self, pid: u32) -> Result<()>;

    /// Enumerate running Alda servers and workers.
    fn discover(&self) -> Result<Vec<DiscoveredProcess>>;

    /// Directory holding lock files.
    fn state_dir(&self) -> PathBuf;
}

/// [`ProcessHost`] backed by the real OS.
pub struct SystemHost {
    state_dir: PathBuf,
    /// Children launched by this client, kept so they can be reaped.
    children: RefCell<Vec<Child>>,
}

impl SystemHost {
    pub fn new() -> Self {
        Self::with_state_dir(log_dir())
    }

    pub fn with_state_dir(state_dir: PathBuf) -> Self {
        Self {
            state_dir,
            children: RefCell::new(Vec::new()),
        }
    }

    fn run_attached(&self, args: Vec<String>) -> Result<ExitStatus> {
        let runtime = detect_runtime()?;
        debug!("running {} {}", runtime.display(), args.join(" "));
        let status = Command::new(&runtime)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| {
                AldaError::Runtime(format!("failed to launch {}: {}", runtime.display(), e))
            })?;
        Ok(status)
    }

    /// Reap an owned child if it has exited. Returns true if the pid belongs
    /// to an owned child that is no longer running.
    fn reap_owned(&self, pid: u32) -> bool {
        let mut children = self.children.borrow_mut();
        let Some(idx) = children.iter().position(|c| c.id() == pid) else {
            return false;
        };
        match children[idx].try_wait() {
            Ok(Some(status)) => {
                debug!("background process {} exited with {}", pid, status);
                children.remove(idx);
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!("failed to poll process {}: {}", pid, err);
                false
            }
        }
    }
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessHost for SystemHost {
    fn run_server_attached(&self, opts: &ServerOptions, workers: u32) -> Result<ExitStatus> {
        self.run_attached(runtime_args(ProcessRole::Server, opts.port, Some(workers)))
    }

    fn run_worker_attached(&self, opts: &ServerOptions) -> Result<ExitStatus> {
        self.run_attached(runtime_args(ProcessRole::Worker, opts.port, None))
    }

    fn spawn_server_detached(&self, opts: &ServerOptions, workers: u32) -> Result<u32> {
        let runtime = detect_runtime()?;
        let log_path = server_log_path(opts.port);
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("failed to open server log {:?}", log_path))?;
        let log_err = log
            .try_clone()
            .context("failed to clone server log handle")?;

        let mut command = Command::new(&runtime);
        command
            .args(runtime_args(ProcessRole::Server, opts.port, Some(workers)))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));

        // Own process group so the server outlives this terminal session.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command.spawn().map_err(|e| {
            AldaError::Runtime(format!("failed to launch {}: {}", runtime.display(), e))
        })?;
        let pid = child.id();
        debug!("spawned server pid={} (log: {})", pid, log_path.display());

        let info = PidFileInfo {
            pid,
            port: opts.port,
            workers,
        };
        if let Err(e) = write_pid_file(&self.state_dir, &info) {
            warn!("{}", e);
        }
        self.children.borrow_mut().push(child);
        Ok(pid)
    }

    fn is_alive(&self, pid: u32) -> bool {
        !self.reap_owned(pid) && is_process_alive(pid)
    }

    fn server_pid(&self, port: u16) -> Option<u32> {
        read_pid_file(&self.state_dir, port).map(|info| info.pid)
    }

    fn clear_server(&self, port: u16) {
        remove_pid_file(&self.state_dir, port);
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        #[cfg(unix)]
        {
            signal::send_sigterm(pid).with_context(|| format!("failed to signal pid {pid}"))
        }
        #[cfg(not(unix))]
        {
            Err(anyhow!("cannot signal pid {pid} on this platform"))
        }
    }

    fn discover(&self) -> Result<Vec<DiscoveredProcess>> {
        let mut found = scan_process_table()?;

        for info in list_pid_files(&self.state_dir) {
            if found.iter().any(|p| p.pid == info.pid) {
                continue;
            }
            if is_process_alive(info.pid) {
                found.push(DiscoveredProcess {
                    role: ProcessRole::Server,
                    pid: info.pid,
                    port: info.port,
                });
            } else {
                debug!("removing stale PID file for port {}", info.port);
                remove_pid_file(&self.state_dir, info.port);
            }
        }

        found.sort_by_key(|p| (p.port, p.role != ProcessRole::Server, p.pid));
        Ok(found)
    }

    fn state_dir(&self) -> PathBuf {
        self.state_dir.clone()
    }
}

// ============================================================================
// Tests
// ============================================================================
