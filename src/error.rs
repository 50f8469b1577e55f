//! Domain error taxonomy and process exit codes.
//!
//! Every failure the router can report maps to exactly one [`AldaError`]
//! variant, and every variant declares the [`ExitCode`] the process exits
//! with. Anything outside the taxonomy exits with [`ExitCode::SystemError`].

use std::path::PathBuf;
use std::time::Duration;

/// Process exit codes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExitCode {
    Success,
    /// Bad option combination or malformed invocation
    UserError,
    SystemError,
    NetworkError,
    /// Server did not reach the requested state in time
    Timeout,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::UserError => 1,
            ExitCode::SystemError => 2,
            ExitCode::NetworkError => 3,
            ExitCode::Timeout => 4,
        }
    }
}

/// Recognized domain errors.
#[derive(Debug, thiserror::Error)]
pub enum AldaError {
    #[error("{0}")]
    ConflictingOptions(String),

    #[error("{0}")]
    MissingInput(String),

    #[error("{0}")]
    InvalidOption(String),

    #[error("Timed out after {}s waiting for the server to start", .elapsed.as_secs())]
    StartupTimeout { elapsed: Duration },

    #[error("Timed out after {}s waiting for the server to stop", .elapsed.as_secs())]
    ShutdownTimeout { elapsed: Duration },

    #[error("Server is not up at {host}:{port}. Run `alda up` to start it")]
    ServerDown { host: String, port: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("{message}")]
    Remote { code: i64, message: String },

    #[error("{0}")]
    Runtime(String),

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Update failed: {0}")]
    Update(String),
}

impl AldaError {
    /// Exit code implied by this error kind.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            AldaError::ConflictingOptions(_)
            | AldaError::MissingInput(_)
            | AldaError::InvalidOption(_)
            | AldaError::Remote { .. } => ExitCode::UserError,
            AldaError::StartupTimeout { .. } | AldaError::ShutdownTimeout { .. } => {
                ExitCode::Timeout
            }
            AldaError::ServerDown { .. } | AldaError::Network(_) => ExitCode::NetworkError,
            AldaError::Runtime(_) | AldaError::Io { .. } | AldaError::Update(_) => {
                ExitCode::SystemError
            }
        }
    }
}

/// Pick the exit code for an arbitrary error, falling back to
/// [`ExitCode::SystemError`] for errors outside the taxonomy.
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<AldaError>())
        .map(AldaError::exit_code)
        .unwrap_or(ExitCode::SystemError)
}
