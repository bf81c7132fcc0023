use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid video id `{0}`: expected a BV id or av<number>")]
    InvalidId(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid API url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid cookie: {0}")]
    InvalidCookie(String),

    #[error("API responded with code {code}: {message}")]
    Api { code: i64, message: String },

    #[error("API response from {endpoint} carries no data")]
    MissingData { endpoint: String },

    #[error("no video stream with a height of at most {max_height}")]
    NoVideoBelowHeight { max_height: u32 },

    #[error("no audio stream available")]
    NoAudioStream,

    #[error("invalid page `{0}`: expected a page number or \"all\"")]
    InvalidPageSelection(String),

    #[error("page must be at least 1, got {0}")]
    PageTooLow(i64),

    #[error("page {page} exceeds the video's page count ({available})")]
    PageOutOfRange { page: i64, available: usize },
}

impl ApiError {
    pub fn missing_data(endpoint: impl Into<String>) -> Self {
        Self::MissingData {
            endpoint: endpoint.into(),
        }
    }
}
