//! Request/response transport between the client and the Alda server.
//!
//! Each request opens one TCP connection, sends a JSON-RPC 2.0 message framed
//! with a `Content-Length` header, and reads one framed response back:
//!
//! ```text
//! Content-Length: 57\r\n
//! \r\n
//! {"jsonrpc":"2.0","id":1,"method":"status","params":{}}
//! ```

use anyhow::{anyhow, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::constants::*;
use crate::error::AldaError;
use crate::options::ServerOptions;

// ============================================================================
// Request ID Counter
// ============================================================================

/// Global request ID counter for client-originated requests.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(INITIAL_REQUEST_ID);

/// Get the next request ID.
pub fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::SeqCst)
}

// ============================================================================
// Message Builders & Framing
// ============================================================================

/// Build a JSON-RPC request.
pub fn create_request(id: u64, method: &str, params: JsonValue) -> JsonValue {
    serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "method": method,
        "params": params
    })
}

/// Write one framed message.
pub fn write_frame<W: Write>(writer: &mut W, payload: &JsonValue) -> io::Result<()> {
    let body = serde_json::to_string(payload).map_err(io::Error::other)?;
    write!(writer, "Content-Length: {}\r\n\r\n{}", body.len(), body)?;
    writer.flush()
}

/// Read one framed message.
pub fn read_frame<R: BufRead>(reader: &mut R) -> io::Result<JsonValue> {
    let mut content_length: Option<usize> = None;
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before frame header",
            ));
        }
        let trimmed = line.trim_end_matches(&['\r', '\n'][..]);
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                let len = value.trim().parse::<usize>().map_err(|e| {
                    io::Error::new(io::ErrorKind::InvalidData, format!("bad Content-Length: {e}"))
                })?;
                content_length = Some(len);
            }
        }
    }

    let len = content_length.ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "missing Content-Length header")
    })?;
    if len > MAX_FRAME_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds limit"),
        ));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    serde_json::from_slice(&body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

// ============================================================================
// Payload Types
// ============================================================================

/// Server health as reported by `status`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServerStatus {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub workers_available: u32,
    #[serde(default)]
    pub workers_total: u32,
}

/// A playback request.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct PlayRequest {
    pub code: String,
    pub history: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

/// Result of a successful playback request.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
pub struct PlayResult {
    /// Instruments active once the score was evaluated, most recent last.
    #[serde(default)]
    pub instruments: Vec<String>,
}

/// Shape of `parse` output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputType {
    Data,
    Events,
}

impl OutputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputType::Data => "data",
            OutputType::Events => "events",
        }
    }
}

impl std::str::FromStr for OutputType {
    type Err = AldaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data" => Ok(OutputType::Data),
            "events" => Ok(OutputType::Events),
            _ => Err(AldaError::ConflictingOptions(
                "Invalid --output type. Valid output types are: data, events".to_string(),
            )),
        }
    }
}

/// What to parse: inline code, or a file the server reads itself.
#[derive(Clone, Copy, Debug)]
pub enum ParseSource<'a> {
    Code(&'a str),
    File(&'a Path),
}

// ============================================================================
// Server API
// ============================================================================

/// Operations the client performs against a running server.
pub trait ServerApi {
    fn status(&self) -> Result<ServerStatus>;

    /// `status`, giving up once `limit` has passed. Implementations that
    /// cannot block may ignore the limit.
    fn status_within(&self, limit: Duration) -> Result<ServerStatus> {
        let _ = limit;
        self.status()
    }

    fn version(&self) -> Result<String>;
    fn play(&self, request: &PlayRequest) -> Result<PlayResult>;
    fn parse(&self, source: ParseSource<'_>, output: OutputType) -> Result<JsonValue>;
    fn stop_playback(&self) -> Result<()>;
    /// Ask the server to shut down gracefully. Returns once the request is
    /// acknowledged, not once the server has exited.
    fn shutdown(&self) -> Result<()>;

    /// `shutdown`, giving up once `limit` has passed.
    fn shutdown_within(&self, limit: Duration) -> Result<()> {
        let _ = limit;
        self.shutdown()
    }
}

/// TCP implementation of [`ServerApi`].
#[derive(Clone, Debug)]
pub struct TcpTransport {
    host: String,
    port: u16,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl TcpTransport {
    pub fn new(opts: &ServerOptions) -> Self {
        Self {
            host: opts.host.clone(),
            port: opts.port,
            connect_timeout: millis_to_duration(CONNECT_TIMEOUT_MS),
            read_timeout: millis_to_duration(READ_TIMEOUT_MS),
        }
    }

    fn server_down(&self) -> anyhow::Error {
        AldaError::ServerDown {
            host: self.host.clone(),
            port: self.port,
        }
        .into()
    }

    fn connect(&self) -> Result<TcpStream> {
        let addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| AldaError::Network(format!("cannot resolve {}: {}", self.host, e)))?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(err) => {
                    debug!("connect to {} failed: {}", addr, err);
                    last_err = Some(err);
                }
            }
        }
        match last_err {
            Some(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::ConnectionRefused | io::ErrorKind::TimedOut
                ) =>
            {
                Err(self.server_down())
            }
            Some(err) => Err(AldaError::Network(err.to_string()).into()),
            None => Err(AldaError::Network(format!("no address for {}", self.host)).into()),
        }
    }

    /// Send one request and return its `result` value.
    /// Copy whose connect and read timeouts never exceed `limit`.
    fn bounded(&self, limit: Duration) -> TcpTransport {
        let limit = limit.max(millis_to_duration(MIN_PROBE_MS));
        TcpTransport {
            connect_timeout: self.connect_timeout.min(limit),
            read_timeout: self.read_timeout.min(limit),
            ..self.clone()
        }
    }

    pub fn call(&self, method: &str, params: JsonValue) -> Result<JsonValue> {
        let stream = self.connect()?;
        stream
            .set_read_timeout(Some(self.read_timeout))
            .context("failed to set read timeout")?;

        let id = next_request_id();
        let request = create_request(id, method, params);
        debug!("-> {} (id={})", method, id);

        let mut writer = stream.try_clone().context("failed to clone stream")?;
        write_frame(&mut writer, &request)
            .map_err(|e| AldaError::Network(format!("failed to send {method}: {e}")))?;

        let mut reader = BufReader::new(stream);
        let response = read_frame(&mut reader)
            .map_err(|e| AldaError::Network(format!("no response to {method}: {e}")))?;
        debug!("<- {} (id={})", method, id);

        decode_response(response)
    }
}

/// Split a JSON-RPC response into its result or a remote error.
pub fn decode_response(response: JsonValue) -> Result<JsonValue> {
    if let Some(err) = response.get("error") {
        let code = err.get("code").and_then(JsonValue::as_i64).unwrap_or(-1);
        let message = err
            .get("message")
            .and_then(JsonValue::as_str)
            .unwrap_or("unknown server error")
            .to_string();
        return Err(AldaError::Remote { code, message }.into());
    }
    response
        .get("result")
        .cloned()
        .ok_or_else(|| anyhow!("malformed response: missing result"))
}

impl ServerApi for TcpTransport {
    fn status(&self) -> Result<ServerStatus> {
        let result = self.call("status", serde_json::json!({}))?;
        serde_json::from_value(result).context("malformed status response")
    }

    fn status_within(&self, limit: Duration) -> Result<ServerStatus> {
        self.bounded(limit).status()
    }

    fn version(&self) -> Result<String> {
        let result = self.call("version", serde_json::json!({}))?;
        Ok(result
            .get("version")
            .and_then(JsonValue::as_str)
            .unwrap_or("unknown")
            .to_string())
    }

    fn play(&self, request: &PlayRequest) -> Result<PlayResult> {
        let params = serde_json::to_value(request).context("failed to encode play request")?;
        let result = self.call("play", params)?;
        serde_json::from_value(result).context("malformed play response")
    }

    fn parse(&self, source: ParseSource<'_>, output: OutputType) -> Result<JsonValue> {
        let params = match source {
            ParseSource::Code(code) => serde_json::json!({ "code": code, "output": output.as_str() }),
            ParseSource::File(path) => {
                let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
                serde_json::json!({ "file": path.display().to_string(), "output": output.as_str() })
            }
        };
        self.call("parse", params)
    }

    fn stop_playback(&self) -> Result<()> {
        self.call("stop-playback", serde_json::json!({}))?;
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        self.call("stop-server", serde_json::json!({}))?;
        Ok(())
    }

    fn shutdown_within(&self, limit: Duration) -> Result<()> {
        self.bounded(limit).shutdown()
    }
}

// ============================================================================
// Tests
// ============================================================================
