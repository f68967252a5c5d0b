use chromiumoxide::error::CdpError;
use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Debug, Error)]
pub enum KeeperError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Remote session error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Browser error: {0}")]
    Browser(#[from] CdpError),

    #[error("Browser launch error: {0}")]
    Launch(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Worker thread panicked")]
    WorkerPanicked,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Failure of a job that has already been reported to the log.
///
/// Jobs return this instead of a real error so the worker never has to
/// decide how to report anything; it only learns where the job gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{origin} failed (already logged)")]
pub struct LoggedError {
    pub origin: &'static str,
}

impl LoggedError {
    pub fn new(origin: &'static str) -> Self {
        Self { origin }
    }
}
