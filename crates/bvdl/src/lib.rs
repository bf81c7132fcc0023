//! Parallel ranged HTTP downloading.
//!
//! A [`RangeDownloader`] probes the size of a resource, splits it into
//! contiguous byte ranges, fetches them concurrently into segment files and
//! concatenates those in order into the output file. [`FfmpegMuxer`] joins a
//! separately downloaded video and audio track afterwards.

pub mod client;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod mux;
pub mod orchestrator;
pub mod probe;
pub mod progress;
pub mod proxy;
pub mod range;
pub mod reassembler;

pub use client::{create_client, install_rustls_provider};
pub use config::{DEFAULT_PARALLELISM, DEFAULT_USER_AGENT, DownloaderConfig};
pub use error::{DownloadError, MuxError};
pub use fetcher::SegmentFetcher;
pub use mux::FfmpegMuxer;
pub use orchestrator::{DownloadPhase, RangeDownloader};
pub use probe::probe_size;
pub use progress::ProgressAggregator;
pub use proxy::{ProxyAuth, ProxyConfig, ProxyType};
pub use range::{ByteRange, Segment, plan_ranges, plan_segments};
pub use reassembler::merge_segments;

// Re-exported so callers can cancel downloads without a direct dependency.
pub use tokio_util::sync::CancellationToken;
