//! # Range planning
//!
//! Splits a resource of known size into a fixed number of contiguous byte ranges,
//! one per fetch task. Every range but the last has the same length
//! (`total / parallelism`); the last one is open-ended so it also absorbs the
//! division remainder and any off-by-one in the reported size.
//!
//! When `total < parallelism` the leading ranges are empty. Empty ranges stay in
//! the plan (the reassembled output depends on the plan's order, not on how
//! many ranges carry bytes) but are never sent to the server.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::DownloadError;

/// A contiguous byte range of the remote resource.
///
/// `length == None` marks the open-ended final range (`start-`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub length: Option<u64>,
}

impl ByteRange {
    pub const fn bounded(start: u64, length: u64) -> Self {
        Self {
            start,
            length: Some(length),
        }
    }

    pub const fn open(start: u64) -> Self {
        Self {
            start,
            length: None,
        }
    }

    pub const fn is_open(&self) -> bool {
        self.length.is_none()
    }

    pub const fn is_empty(&self) -> bool {
        matches!(self.length, Some(0))
    }

    /// Inclusive end offset; `None` for open-ended and empty ranges.
    pub fn end_inclusive(&self) -> Option<u64> {
        match self.length {
            Some(len) if len > 0 => Some(self.start + len - 1),
            _ => None,
        }
    }

    /// Value for the HTTP `Range` header, `None` when there is nothing to request.
    pub fn header_value(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(format!("bytes={self}"))
    }

    /// Number of bytes this range covers of a resource of `total_size` bytes.
    pub fn len_within(&self, total_size: u64) -> u64 {
        match self.length {
            Some(len) => len.min(total_size.saturating_sub(self.start)),
            None => total_size.saturating_sub(self.start),
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.length, self.end_inclusive()) {
            (None, _) => write!(f, "{}-", self.start),
            (Some(_), Some(end)) => write!(f, "{}-{}", self.start, end),
            (Some(_), None) => write!(f, "{}-empty", self.start),
        }
    }
}

/// One planned unit of work: a range and the temporary file holding its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    pub range: ByteRange,
    pub path: PathBuf,
}

/// Compute `parallelism` ordered, non-overlapping ranges covering `[0, total_size)`.
pub fn plan_ranges(total_size: u64, parallelism: usize) -> Result<Vec<ByteRange>, DownloadError> {
    if parallelism == 0 {
        return Err(DownloadError::planning("parallelism must be at least 1"));
    }

    let count = parallelism as u64;
    let chunk_size = total_size / count;
    let mut ranges = Vec::with_capacity(parallelism);

    for index in 0..count {
        let start = index * chunk_size;
        if index + 1 == count {
            // A 0-byte resource has nothing for the final range to absorb, and
            // `bytes=0-` against it would be unsatisfiable.
            if start >= total_size {
                ranges.push(ByteRange::bounded(start, 0));
            } else {
                ranges.push(ByteRange::open(start));
            }
        } else {
            ranges.push(ByteRange::bounded(start, chunk_size));
        }
    }

    Ok(ranges)
}

/// Plan ranges and assign each one its temporary file next to `output`.
pub fn plan_segments(
    output: &Path,
    total_size: u64,
    parallelism: usize,
) -> Result<Vec<Segment>, DownloadError> {
    let ranges = plan_ranges(total_size, parallelism)?;
    Ok(ranges
        .into_iter()
        .enumerate()
        .map(|(index, range)| Segment {
            index,
            range,
            path: segment_path(output, index, &range),
        })
        .collect())
}

/// Temporary file for segment `index`: `<output>.seg<index>_<range>`.
pub fn segment_path(output: &Path, index: usize, range: &ByteRange) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(format!(".seg{index}_{range}"));
    PathBuf::from(name)
}

/// Parse a `Content-Length` style value into a total size.
pub fn parse_total_size(value: &str) -> Result<u64, DownloadError> {
    value.trim().parse::<u64>().map_err(|_| {
        DownloadError::planning(format!(
            "resource size `{value}` is not a non-negative integer"
        ))
    })
}
