//! Configuration types for the session layer and the MCP HTTP server

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{SessionError, SessionResult};

/// Idle-tracking configuration for sessions
///
/// `cleanup_interval` must be strictly shorter than `max_idle_time` and both
/// must be non-zero. Use [`SessionConfig::new`] or call
/// [`SessionConfig::validate`] before handing a hand-built value around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long a session may go without activity before it is considered idle
    pub max_idle_time: Duration,
    /// Period of the idle sweeper
    pub cleanup_interval: Duration,
}

impl SessionConfig {
    pub fn new(max_idle_time: Duration, cleanup_interval: Duration) -> SessionResult<Self> {
        let config = Self {
            max_idle_time,
            cleanup_interval,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_millis(max_idle_ms: u64, cleanup_interval_ms: u64) -> SessionResult<Self> {
        Self::new(
            Duration::from_millis(max_idle_ms),
            Duration::from_millis(cleanup_interval_ms),
        )
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.max_idle_time.is_zero() {
            return Err(SessionError::invalid_config("max_idle_time must be greater than zero"));
        }
        if self.cleanup_interval.is_zero() {
            return Err(SessionError::invalid_config(
                "cleanup_interval must be greater than zero",
            ));
        }
        if self.cleanup_interval >= self.max_idle_time {
            return Err(SessionError::invalid_config(format!(
                "cleanup_interval ({:?}) must be shorter than max_idle_time ({:?})",
                self.cleanup_interval, self.max_idle_time
            )));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_idle_time: Duration::from_secs(30 * 60),
            cleanup_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// MCP HTTP server configuration
#[derive(Debug, Clone)]
pub struct McpHttpConfig {
    pub addr: SocketAddr,
    pub server_name: String,
    pub server_version: String,
    pub session: SessionConfig,
}

impl McpHttpConfig {
    pub fn new(port: u16) -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], port)),
            server_name: env!("CARGO_PKG_NAME").to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            session: SessionConfig::default(),
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_server_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.server_name = name.into();
        self.server_version = version.into();
        self
    }

    pub fn with_session_config(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}
