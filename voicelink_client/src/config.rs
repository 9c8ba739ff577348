use crate::logging::LogConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PIPE_NAME: &str = r"\\.\pipe\DVC_voice_local";

pub const INBOUND_CAP: usize = 128;
pub const POLL_INTERVAL: Duration = Duration::from_millis(150);
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);
pub const IDLE_SLEEP: Duration = Duration::from_millis(15);

/// Where the recognition server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Local named pipe (the production transport on Windows).
    NamedPipe(PathBuf),
    /// Loopback TCP, used by the mock server and tests.
    Tcp(SocketAddr),
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::NamedPipe(PathBuf::from(DEFAULT_PIPE_NAME))
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    pub poll_interval: Duration,
    pub reconnect_backoff: Duration,
    /// I/O loop sleep after a pass that wrote nothing.
    pub idle_sleep: Duration,
    pub inbound_capacity: usize,
    /// Installed by [`crate::VoiceLinkRuntime::start`]; `None` leaves the
    /// global subscriber alone.
    pub log: Option<LogConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            poll_interval: POLL_INTERVAL,
            reconnect_backoff: RECONNECT_BACKOFF,
            idle_sleep: IDLE_SLEEP,
            inbound_capacity: INBOUND_CAP,
            log: Some(LogConfig::default()),
        }
    }
}

impl ClientConfig {
    pub fn with_endpoint(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }
}
