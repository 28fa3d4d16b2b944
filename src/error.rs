//! Error types shared by every stage of the guide pipeline

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GuideError>;

#[derive(Debug, Error)]
pub enum GuideError {
    /// Connection-level failure: unreachable host, timeout, unreadable body
    #[error("Connection Error. {0}")]
    Transport(String),

    #[error("HTTP failure {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// The region has a session, but it carries no bearer token
    #[error("no session token available for region {region}")]
    NotReady { region: String },

    #[error("failed to write {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected upstream payload: {0}")]
    Decode(String),

    /// Guide could not be serialized to XMLTV
    #[error("failed to render guide: {0}")]
    Render(String),

    #[error("unknown region code {0:?}")]
    UnknownRegion(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl GuideError {
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GuideError::Persistence {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for GuideError {
    fn from(e: serde_json::Error) -> Self {
        GuideError::Decode(e.to_string())
    }
}
