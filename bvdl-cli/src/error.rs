use std::path::PathBuf;

use bili_api::ApiError;
use bvdl_engine::{DownloadError, MuxError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{}", describe_download_error(.0))]
    Download(#[from] DownloadError),

    #[error("Muxing failed: {0}")]
    Mux(#[from] MuxError),

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("Settings file {}: {reason}", path.display())]
    Settings { path: PathBuf, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AppError {
    pub fn settings(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Settings {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Name the phase a download died in, e.g. `Download failed while fetching: ...`.
fn describe_download_error(error: &DownloadError) -> String {
    match (error, error.phase()) {
        (DownloadError::Cancelled, _) => "Download cancelled".to_string(),
        (_, Some(phase)) => format!("Download failed while {phase}: {error}"),
        (_, None) => format!("Download failed: {error}"),
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
