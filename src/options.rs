//! Immutable per-invocation server configuration.

use std::time::Duration;

use crate::logging::Console;
use crate::GlobalOptions;

/// Everything an operation needs to know about the server it talks to.
///
/// Built once from the parsed [`GlobalOptions`] and passed by reference;
/// never stored globally.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    pub workers: u32,
    pub verbose: bool,
    pub quiet: bool,
    pub no_color: bool,
}

impl ServerOptions {
    pub fn from_global(global: &GlobalOptions) -> Self {
        Self {
            host: global.host.clone(),
            port: global.port,
            timeout: Duration::from_secs(global.timeout),
            workers: global.workers,
            verbose: global.verbose,
            quiet: global.quiet,
            no_color: global.no_color,
        }
    }

    /// Copy with a different lifecycle timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `host:port` for socket connections.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn console(&self) -> Console {
        Console {
            port: self.port,
            quiet: self.quiet,
            verbose: self.verbose,
            no_color: self.no_color,
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            workers: DEFAULT_WORKERS,
            verbose: false,
            quiet: false,
            no_color: false,
        }
    }
}
