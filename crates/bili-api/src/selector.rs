//! Choosing what to download: which DASH representations, which pages.

use std::fmt;
use std::str::FromStr;

use crate::{
    ApiError,
    models::{DashStream, Page},
};

pub const DEFAULT_MAX_HEIGHT: u32 = 2160;

/// First video stream, in API order, no taller than `max_height`.
pub fn select_video(streams: &[DashStream], max_height: u32) -> Result<&DashStream, ApiError> {
    streams
        .iter()
        .find(|stream| stream.height <= max_height)
        .ok_or(ApiError::NoVideoBelowHeight { max_height })
}

pub fn select_audio(streams: &[DashStream]) -> Result<&DashStream, ApiError> {
    streams.first().ok_or(ApiError::NoAudioStream)
}

/// Which pages of a multi-part video to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSelection {
    All,
    /// 1-based. Kept signed so that `0` and negatives reach [`resolve`](Self::resolve)
    /// and get a precise error.
    Index(i64),
}

impl Default for PageSelection {
    fn default() -> Self {
        Self::Index(1)
    }
}

impl FromStr for PageSelection {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse::<i64>()
            .map(Self::Index)
            .map_err(|_| ApiError::InvalidPageSelection(s.to_string()))
    }
}

impl fmt::Display for PageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl PageSelection {
    pub fn resolve<'a>(&self, pages: &'a [Page]) -> Result<Vec<&'a Page>, ApiError> {
        match *self {
            Self::All => Ok(pages.iter().collect()),
            Self::Index(index) if index < 1 => Err(ApiError::PageTooLow(index)),
            Self::Index(index) => usize::try_from(index - 1)
                .ok()
                .and_then(|i| pages.get(i))
                .map(|page| vec![page])
                .ok_or(ApiError::PageOutOfRange {
                    page: index,
                    available: pages.len(),
                }),
        }
    }
}
