//! MCP Transport configuration.
//!
//! The server speaks MCP over one of two transports:
//!
//! - **Stdio**: Default mode for local subprocess communication
//! - **HTTP**: Streamable HTTP transport mounted at a configurable path
//!   (`rest` is accepted as an alias on the command line)
//!
//! # Example
//!
//! ```ignore
//! use mcp_falai_common::transport::{Transport, TransportArgs};
//! use clap::Parser;
//!
//! #[derive(Parser)]
//! struct Args {
//!     #[command(flatten)]
//!     transport: TransportArgs,
//! }
//!
//! let args = Args::parse();
//! let transport = args.transport.into_transport();
//! ```

use clap::Args;
use std::fmt;

/// Default port for the HTTP transport.
pub const DEFAULT_PORT: u16 = 9593;

/// Default mount path for the HTTP transport.
pub const DEFAULT_PATH: &str = "/rest";

/// Transport mode for MCP server communication.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Transport {
    /// Standard input/output transport (default).
    #[default]
    Stdio,
    /// HTTP streamable transport listening on `port`, serving MCP at `path`.
    Http {
        /// Port to listen on
        port: u16,
        /// Path the MCP service is mounted at
        path: String,
    },
}

impl Transport {
    /// Create a new stdio transport.
    pub fn stdio() -> Self {
        Transport::Stdio
    }

    /// Create a new HTTP transport on the specified port and path.
    ///
    /// The path is normalized to start with exactly one `/`.
    pub fn http(port: u16, path: impl AsRef<str>) -> Self {
        Transport::Http {
            port,
            path: normalize_path(path.as_ref()),
        }
    }

    /// Check if this is a stdio transport.
    pub fn is_stdio(&self) -> bool {
        matches!(self, Transport::Stdio)
    }

    /// Check if this is an HTTP transport.
    pub fn is_http(&self) -> bool {
        matches!(self, Transport::Http { .. })
    }

    /// Get the port if this is a network transport.
    pub fn port(&self) -> Option<u16> {
        match self {
            Transport::Stdio => None,
            Transport::Http { port, .. } => Some(*port),
        }
    }

    /// Get the mount path if this is a network transport.
    pub fn path(&self) -> Option<&str> {
        match self {
            Transport::Stdio => None,
            Transport::Http { path, .. } => Some(path),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Stdio => write!(f, "stdio"),
            Transport::Http { port, path } => write!(f, "http (port {}, path {})", port, path),
        }
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        DEFAULT_PATH.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Command-line arguments for transport configuration.
#[derive(Args, Debug, Clone)]
pub struct TransportArgs {
    /// Transport mode: stdio or http (alias: rest)
    #[arg(long, default_value = "stdio", value_parser = parse_transport_mode)]
    pub transport: TransportMode,

    /// Port for the HTTP transport (default: 9593, or from PORT env var)
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Path the HTTP transport serves MCP on
    #[arg(long, default_value = DEFAULT_PATH)]
    pub path: String,
}

/// Transport mode parsed from command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    #[default]
    Stdio,
    Http,
}

fn parse_transport_mode(s: &str) -> Result<TransportMode, String> {
    match s.to_lowercase().as_str() {
        "stdio" => Ok(TransportMode::Stdio),
        "http" | "rest" => Ok(TransportMode::Http),
        _ => Err(format!(
            "Invalid transport mode '{}'. Valid options: stdio, http, rest",
            s
        )),
    }
}

impl TransportArgs {
    /// Convert command-line arguments into a Transport configuration.
    pub fn into_transport(self) -> Transport {
        match self.transport {
            TransportMode::Stdio => Transport::Stdio,
            TransportMode::Http => Transport::http(self.port, &self.path),
        }
    }
}

impl Default for TransportArgs {
    fn default() -> Self {
        Self {
            transport: TransportMode::Stdio,
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) fn parse_mode_for_test(s: &str) -> Result<TransportMode, String> {
    parse_transport_mode(s)
}
