//! # Range Downloader
//!
//! Drives one download from probe to finished file:
//!
//! ```text
//! Probing -> Planned -> Fetching -> Merging -> Done
//!     \_________\__________\__________\______> Failed
//! ```
//!
//! All segments are fetched concurrently on the shared client and joined
//! together; a failed segment does not stop the others, but once every task
//! has finished the whole download fails and all segment files are removed.
//! Merging starts only after every fetch succeeded and always follows plan
//! order, whatever order the fetches completed in. An output shorter than the
//! probed size is a failure; a longer one is accepted since the open-ended
//! last range may outgrow an under-reported size.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use humansize::{BINARY, format_size};
use reqwest::{Client, Url};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::{
    DownloadError,
    client::create_client,
    config::DownloaderConfig,
    fetcher::SegmentFetcher,
    probe::probe_size,
    progress::ProgressAggregator,
    range::{Segment, plan_segments},
    reassembler::merge_segments,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Probing,
    Planned,
    Fetching,
    Merging,
    Done,
    Failed,
}

impl fmt::Display for DownloadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Probing => "probing",
            Self::Planned => "planning",
            Self::Fetching => "fetching",
            Self::Merging => "merging",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Parallel ranged downloader. One instance can run any number of downloads,
/// sequentially or concurrently; per-download state lives inside each call.
#[derive(Debug, Clone)]
pub struct RangeDownloader {
    client: Client,
    fetcher: SegmentFetcher,
}

impl RangeDownloader {
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_config(DownloaderConfig::default())
    }

    pub fn with_config(config: DownloaderConfig) -> Result<Self, DownloadError> {
        let client = create_client(&config)?;
        Ok(Self::with_client(client, &config))
    }

    /// Use an existing client, e.g. one shared with a metadata resolver.
    pub fn with_client(client: Client, config: &DownloaderConfig) -> Self {
        let fetcher = SegmentFetcher::new(client.clone(), config.write_buffer_size);
        Self { client, fetcher }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Download `url` into `output` using `parallelism` concurrent ranged requests.
    ///
    /// `on_progress` receives the fraction complete, never decreasing, while
    /// segments are fetched, and exactly `1.0` once the output is assembled.
    pub async fn download<P>(
        &self,
        url: &str,
        output: &Path,
        parallelism: usize,
        on_progress: P,
    ) -> Result<PathBuf, DownloadError>
    where
        P: FnMut(f64),
    {
        self.download_with_token(url, output, parallelism, on_progress, CancellationToken::new())
            .await
    }

    /// Like [`download`](Self::download), aborting all transfers and removing
    /// their segment files when `token` is cancelled.
    #[instrument(skip(self, on_progress, token), fields(output = %output.display()))]
    pub async fn download_with_token<P>(
        &self,
        url: &str,
        output: &Path,
        parallelism: usize,
        mut on_progress: P,
        token: CancellationToken,
    ) -> Result<PathBuf, DownloadError>
    where
        P: FnMut(f64),
    {
        let url = Url::parse(url).map_err(|e| DownloadError::invalid_url(url, e.to_string()))?;
        let mut phase = PhaseTracker::default();

        let result = self
            .run(&url, output, parallelism, &mut on_progress, &token, &mut phase)
            .await;

        match &result {
            Ok(path) => info!(output = %path.display(), "Download complete"),
            Err(e) => {
                warn!(phase = %phase.current, error = %e, "Download failed");
                phase.enter(DownloadPhase::Failed);
            }
        }
        result
    }

    async fn run<P>(
        &self,
        url: &Url,
        output: &Path,
        parallelism: usize,
        on_progress: &mut P,
        token: &CancellationToken,
        phase: &mut PhaseTracker,
    ) -> Result<PathBuf, DownloadError>
    where
        P: FnMut(f64),
    {
        let total = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(DownloadError::Cancelled),
            total = probe_size(&self.client, url) => total?,
        };
        info!(url = %url, size = %format_size(total, BINARY), "Resource size probed");

        let segments = plan_segments(output, total, parallelism)?;
        phase.enter(DownloadPhase::Planned);
        debug!(
            segments = segments.len(),
            ranges = ?segments.iter().map(|s| s.range.to_string()).collect::<Vec<_>>(),
            "Ranges planned"
        );

        phase.enter(DownloadPhase::Fetching);
        if let Err(e) = self
            .fetch_all(url, &segments, total, on_progress, token)
            .await
        {
            remove_segment_files(&segments).await;
            return Err(e);
        }

        phase.enter(DownloadPhase::Merging);
        let paths: Vec<PathBuf> = segments.iter().map(|s| s.path.clone()).collect();
        let merged = merge_segments(&paths, output).await.and_then(|written| {
            if written < total {
                return Err(DownloadError::merge(
                    output,
                    std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("assembled {written} of {total} bytes"),
                    ),
                ));
            }
            if written > total {
                debug!(expected = total, written, "Output larger than the probed size");
            }
            Ok(written)
        });
        if let Err(e) = merged {
            // Segments consumed before the failure are already gone.
            remove_segment_files(&segments).await;
            remove_quietly(output).await;
            return Err(e);
        }

        phase.enter(DownloadPhase::Done);
        on_progress(1.0);
        Ok(output.to_path_buf())
    }

    /// Fan out one fetch task per segment and wait for all of them.
    async fn fetch_all<P>(
        &self,
        url: &Url,
        segments: &[Segment],
        total: u64,
        on_progress: &mut P,
        token: &CancellationToken,
    ) -> Result<(), DownloadError>
    where
        P: FnMut(f64),
    {
        let aggregator = Arc::new(ProgressAggregator::new(total));
        // Holds at most one pending wakeup, however many chunks arrive meanwhile.
        let received = Arc::new(Notify::new());

        let handles: Vec<_> = segments
            .iter()
            .map(|segment| {
                let fetcher = self.fetcher.clone();
                let url = url.clone();
                let range = segment.range;
                let path = segment.path.clone();
                let aggregator = aggregator.clone();
                let received = received.clone();
                tokio::spawn(async move {
                    fetcher
                        .fetch(&url, range, &path, |bytes| {
                            aggregator.add(bytes);
                            received.notify_one();
                        })
                        .await
                })
            })
            .collect();

        let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        let joined = join_all(handles);
        tokio::pin!(joined);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break None,
                results = &mut joined => break Some(results),
                _ = received.notified() => on_progress(aggregator.fraction()),
            }
        };

        let Some(results) = outcome else {
            info!("Cancellation requested, aborting segment transfers");
            for handle in &abort_handles {
                handle.abort();
            }
            joined.await;
            return Err(DownloadError::Cancelled);
        };

        let mut first_error = None;
        for (segment, result) in segments.iter().zip(results) {
            let error = match result {
                Ok(Ok(bytes)) => {
                    trace!(index = segment.index, range = %segment.range, bytes, "Segment fetched");
                    continue;
                }
                Ok(Err(e)) => e,
                Err(join_error) => DownloadError::transfer(
                    segment.range,
                    format!("fetch task failed: {join_error}"),
                ),
            };
            warn!(index = segment.index, range = %segment.range, error = %error, "Segment failed");
            first_error.get_or_insert(error);
        }

        if let Some(error) = first_error {
            return Err(error);
        }

        on_progress(aggregator.fraction());
        Ok(())
    }
}

#[derive(Debug)]
struct PhaseTracker {
    current: DownloadPhase,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self {
            current: DownloadPhase::Probing,
        }
    }
}

impl PhaseTracker {
    fn enter(&mut self, next: DownloadPhase) {
        debug!(from = %self.current, to = %next, "Download phase transition");
        self.current = next;
    }
}

async fn remove_segment_files(segments: &[Segment]) {
    for segment in segments {
        remove_quietly(&segment.path).await;
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => trace!(path = %path.display(), "Removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_client;

    #[test]
    fn phase_display() {
        assert_eq!(DownloadPhase::Fetching.to_string(), "fetching");
        assert_eq!(DownloadPhase::Failed.to_string(), "failed");
    }

    #[tokio::test]
    async fn invalid_url_is_rejected_before_probing() {
        let downloader = RangeDownloader::with_client(test_client(), &DownloaderConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let err = downloader
            .download("not a url", &dir.path().join("out"), 4, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_probe() {
        let downloader = RangeDownloader::with_client(test_client(), &DownloaderConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let err = downloader
            .download_with_token(
                "http://127.0.0.1:9/video.m4s",
                &dir.path().join("out"),
                4,
                |_| panic!("no progress expected"),
                token,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Cancelled));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
