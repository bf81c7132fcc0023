use std::path::PathBuf;

use crate::orchestrator::DownloadPhase;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("download cancelled")]
    Cancelled,

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("proxy configuration error: {reason}")]
    ProxyConfiguration { reason: String },

    #[error("HTTP client error: {source}")]
    Client {
        #[from]
        source: reqwest::Error,
    },

    #[error("size probe failed for {url}: {reason}")]
    Probe { url: String, reason: String },

    #[error("cannot plan segments: {reason}")]
    Planning { reason: String },

    #[error("transfer of range {range} failed: {reason}")]
    Transfer { range: String, reason: String },

    #[error("merge into {} failed: {source}", path.display())]
    Merge {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl DownloadError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn proxy_configuration(reason: impl Into<String>) -> Self {
        Self::ProxyConfiguration {
            reason: reason.into(),
        }
    }

    pub fn probe(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Probe {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn planning(reason: impl Into<String>) -> Self {
        Self::Planning {
            reason: reason.into(),
        }
    }

    pub fn transfer(range: impl ToString, reason: impl Into<String>) -> Self {
        Self::Transfer {
            range: range.to_string(),
            reason: reason.into(),
        }
    }

    pub fn merge(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Merge {
            path: path.into(),
            source,
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// The download phase this error aborts, if it belongs to one.
    pub fn phase(&self) -> Option<DownloadPhase> {
        match self {
            Self::Probe { .. } => Some(DownloadPhase::Probing),
            Self::Planning { .. } => Some(DownloadPhase::Planned),
            Self::Transfer { .. } | Self::Cancelled => Some(DownloadPhase::Fetching),
            Self::Merge { .. } => Some(DownloadPhase::Merging),
            Self::InvalidUrl { .. }
            | Self::ProxyConfiguration { .. }
            | Self::Client { .. }
            | Self::Internal { .. } => None,
        }
    }
}

/// Failures of the external encoder used to mux the two elementary streams.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    #[error("failed to spawn encoder `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("encoder `{binary}` exited with {status}")]
    ExitStatus {
        binary: String,
        status: std::process::ExitStatus,
    },

    #[error("failed to remove intermediate stream {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
