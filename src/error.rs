use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Errors surfaced by the feed collaborator.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("login failed: {0}")]
    LoginFailed(String),

    #[error("logout failed: {0}")]
    LogoutFailed(String),

    #[error("catalog query failed: {0}")]
    Catalog(String),

    #[error("snapshot query failed: {0}")]
    Snapshot(String),

    #[error("subscribe failed for {code}: {reason}")]
    Subscribe { code: String, reason: String },

    #[error("unsubscribe failed for {code}: {reason}")]
    Unsubscribe { code: String, reason: String },

    #[error("unknown feed driver: {0}")]
    UnknownDriver(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("engine stopped: {0}")]
    EngineStopped(String),
}

pub type Result<T> = std::result::Result<T, Error>;
