use thiserror::Error;

/// Transport failures. Every variant means "drop the connection and reconnect".
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("peer closed the channel")]
    Closed,
    #[error("not connected")]
    NotConnected,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings record is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported settings record version {0}")]
    UnsupportedVersion(u32),
}

/// Reasons a recognized command could not be carried out in game.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("unparsable form id {0:?}")]
    BadFormId(String),
    #[error("plugin {0:?} is not loaded")]
    PluginNotLoaded(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("player does not own {0}")]
    NotOwned(String),
    #[error("player does not know {0}")]
    NotKnown(String),
    #[error("host service unavailable: {0}")]
    HostUnavailable(&'static str),
}
