//! Centralized constants for the Alda client: defaults, timing, and wire
//! protocol values.
//!
//! Keeps magic numbers out of the lifecycle, transport, and REPL code.

use std::time::Duration;

// ============================================================================
// Server Defaults
// ============================================================================

/// Default hostname of the Alda server
pub const DEFAULT_HOST: &str = "localhost";

/// Default port of the Alda server
pub const DEFAULT_PORT: u16 = 27713;

/// Default seconds to wait for the server to start up or shut down
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of worker processes to start
pub const DEFAULT_WORKERS: u32 = 2;

/// Hidden flag passed to every process we launch so `list` can find it
pub const FINGERPRINT_FLAG: &str = "--alda-fingerprint";

// ============================================================================
// Polling Constants
// ============================================================================

/// Interval between liveness probes while waiting for up/down
pub const LIFECYCLE_POLL_MS: u64 = 250;

/// Connect timeout for a single transport request
pub const CONNECT_TIMEOUT_MS: u64 = 1_000;

/// Upper bound on one status probe, connect plus reply
pub const PROBE_TIMEOUT_MS: u64 = 1_000;

/// Floor for a probe squeezed against a deadline (sockets reject zero)
pub const MIN_PROBE_MS: u64 = 10;

/// Read timeout for a single transport request. Playback requests return as
/// soon as the score is scheduled, so this only bounds a wedged server.
pub const READ_TIMEOUT_MS: u64 = 30_000;

// ============================================================================
// Protocol Constants
// ============================================================================

/// JSON-RPC protocol version
pub const JSONRPC_VERSION: &str = "2.0";

/// Initial request ID for client-originated requests
pub const INITIAL_REQUEST_ID: u64 = 1;

/// Upper bound on a framed response body (16 MiB)
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================
// Update Constants
// ============================================================================

/// Release metadata endpoint queried by `alda update`
pub const RELEASES_URL: &str = "https://api.github.com/repos/alda-lang/alda/releases/latest";

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert milliseconds to Duration (const fn for compile-time evaluation)
pub const fn millis_to_duration(ms: u64) -> Duration {
    Duration::from_millis(ms)
}
