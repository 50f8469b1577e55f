//! Logging utilities for the Alda client.
//!
//! Provides timestamp generation, the temp directory for pid/lock/log files,
//! `env_logger` setup, and the [`Console`] reporter used for user-facing
//! messages.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Timestamp Generation
// ============================================================================

/// Generate a timestamp string in format "YYYY-MM-DD HH:MM:SS.mmm".
/// Uses libc for local time conversion to avoid heavy chrono dependency.
pub fn timestamp() -> String {
    use libc::{localtime_r, strftime, time_t, tm};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let secs = now.as_secs() as time_t;
    let millis = now.subsec_millis();

    // SAFETY: localtime_r is thread-safe (uses caller-provided tm struct)
    let mut tm: tm = unsafe { std::mem::zeroed() };
    unsafe {
        localtime_r(&secs, &mut tm);
    }

    let mut buf = [0u8; 32];
    let fmt = b"%Y-%m-%d %H:%M:%S\0";
    // SAFETY: strftime writes to our buffer, format string is null-terminated
    let len = unsafe {
        strftime(
            buf.as_mut_ptr() as *mut libc::c_char,
            buf.len(),
            fmt.as_ptr() as *const libc::c_char,
            &tm,
        )
    };
    let prefix = std::str::from_utf8(&buf[..len]).unwrap_or("1970-01-01 00:00:00");
    format!("{prefix}.{millis:03}")
}

// ============================================================================
// Directories
// ============================================================================

/// Directory for pid, lock, and background server log files.
/// Prefers ALDA_TMP_DIR, then TMPDIR, then system temp dir.
pub fn log_dir() -> PathBuf {
    std::env::var_os("ALDA_TMP_DIR")
        .or_else(|| std::env::var_os("TMPDIR"))
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

/// Log file receiving stdout/stderr of a background server.
pub fn server_log_path(port: u16) -> PathBuf {
    log_dir().join(format!("alda-server-{port}.log"))
}

// ============================================================================
// Logger Setup
// ============================================================================

/// Default log filter for the given verbosity flags.
pub fn default_filter(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    }
}

/// Initialise `env_logger`. RUST_LOG overrides the flag-derived filter.
pub fn init_logger(verbose: bool, quiet: bool) {
    let env = env_logger::Env::default().default_filter_or(default_filter(verbose, quiet));
    let _ = env_logger::Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} [alda] {}",
                timestamp(),
                record.level(),
                record.args()
            )
        })
        .try_init();
}

// ============================================================================
// Console Reporting
// ============================================================================

/// Whether ANSI colour should be used on the given stream.
pub fn color_enabled(no_color: bool, stream: atty::Stream) -> bool {
    !no_color && std::env::var_os("NO_COLOR").is_none() && atty::is(stream)
}

/// Wrap `text` in an ANSI colour sequence when `enabled`.
pub fn paint(enabled: bool, code: &str, text: &str) -> String {
    if enabled {
        format!("{code}{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

/// User-facing reporter bound to one server's port.
///
/// `msg` respects `--quiet`; `warn` and `error` always print.
#[derive(Clone, Debug)]
pub struct Console {
    pub port: u16,
    pub quiet: bool,
    pub verbose: bool,
    pub no_color: bool,
}

impl Console {
    fn prefix(&self, color: bool) -> String {
        paint(color, "\x1b[34m", &format!("[{}]", self.port))
    }

    pub fn msg(&self, text: &str) {
        if self.quiet {
            return;
        }
        let color = color_enabled(self.no_color, atty::Stream::Stdout);
        println!("{} {}", self.prefix(color), text);
    }

    pub fn warn(&self, text: &str) {
        let color = color_enabled(self.no_color, atty::Stream::Stderr);
        eprintln!(
            "{} {} {}",
            self.prefix(color),
            paint(color, "\x1b[33m", "WARNING"),
            text
        );
    }

    pub fn error(&self, text: &str) {
        let color = color_enabled(self.no_color, atty::Stream::Stderr);
        eprintln!(
            "{} {} {}",
            self.prefix(color),
            paint(color, "\x1b[31m", "ERROR"),
            text
        );
    }
}

// ============================================================================
// Tests
// ============================================================================
