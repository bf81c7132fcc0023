//! Ranged segment transfer: one GET per segment, streamed straight to disk.

use std::path::Path;

use futures::StreamExt;
use reqwest::header::CONTENT_RANGE;
use reqwest::{Client, Response, StatusCode, Url};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, trace};

use crate::{DownloadError, range::ByteRange};

/// Fetches single byte ranges. Cloning is cheap and every clone shares the
/// client's connection pool, so one fetcher can back any number of concurrent
/// transfers.
#[derive(Debug, Clone)]
pub struct SegmentFetcher {
    client: Client,
    write_buffer_size: usize,
}

impl SegmentFetcher {
    pub fn new(client: Client, write_buffer_size: usize) -> Self {
        Self {
            client,
            write_buffer_size: write_buffer_size.max(1),
        }
    }

    /// Download `range` of `url` into `destination`, calling `on_bytes` with the
    /// length of every received chunk. Returns the number of bytes written.
    ///
    /// On error `destination` may hold a partial segment and must be discarded.
    pub async fn fetch<F>(
        &self,
        url: &Url,
        range: ByteRange,
        destination: &Path,
        mut on_bytes: F,
    ) -> Result<u64, DownloadError>
    where
        F: FnMut(u64),
    {
        let file = File::create(destination).await.map_err(|e| {
            DownloadError::transfer(
                range,
                format!("cannot create {}: {e}", destination.display()),
            )
        })?;
        let mut writer = BufWriter::with_capacity(self.write_buffer_size, file);

        let Some(range_header) = range.header_value() else {
            trace!(%range, "Empty range, nothing to request");
            writer
                .shutdown()
                .await
                .map_err(|e| DownloadError::transfer(range, e.to_string()))?;
            return Ok(0);
        };

        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::RANGE, &range_header)
            .send()
            .await
            .map_err(|e| DownloadError::transfer(range, format!("request failed: {e}")))?;

        let status = response.status();
        let whole_resource_requested = range.start == 0 && range.is_open();
        let accepted = status == StatusCode::PARTIAL_CONTENT
            || (status == StatusCode::OK && whole_resource_requested);
        if !accepted {
            return Err(DownloadError::transfer(
                range,
                format!("unexpected HTTP status {status} for `{range_header}`"),
            ));
        }

        if status == StatusCode::PARTIAL_CONTENT {
            check_content_range(&response, range)?;
        }

        debug!(%range, %status, content_length = ?response.content_length(), "Segment transfer started");

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| DownloadError::transfer(range, format!("body stream error: {e}")))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| DownloadError::transfer(range, format!("write failed: {e}")))?;
            written += chunk.len() as u64;
            on_bytes(chunk.len() as u64);
        }

        writer
            .shutdown()
            .await
            .map_err(|e| DownloadError::transfer(range, format!("flush failed: {e}")))?;

        if let Some(expected) = range.length.filter(|&expected| expected != written) {
            return Err(DownloadError::transfer(
                range,
                format!("short body: expected {expected} bytes, received {written}"),
            ));
        }

        debug!(%range, bytes = written, "Segment transfer finished");
        Ok(written)
    }
}

/// A `206` must describe the range that was asked for. Servers that omit
/// `Content-Range` are trusted; the body length is checked afterwards.
fn check_content_range(response: &Response, range: ByteRange) -> Result<(), DownloadError> {
    let Some(value) = response.headers().get(CONTENT_RANGE) else {
        return Ok(());
    };
    let value = value.to_str().unwrap_or_default();

    match content_range_start(value) {
        Some(start) if start == range.start => Ok(()),
        _ => Err(DownloadError::transfer(
            range,
            format!("server answered with mismatched Content-Range `{value}`"),
        )),
    }
}

/// First byte offset of `bytes 250-499/1000`.
fn content_range_start(value: &str) -> Option<u64> {
    let spec = value.trim().strip_prefix("bytes ")?;
    let (start, _) = spec.split_once('-')?;
    start.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_client;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> SegmentFetcher {
        SegmentFetcher::new(test_client(), 16)
    }

    #[tokio::test]
    async fn streams_partial_content_to_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("range", "bytes=2-5"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(b"cdef".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("seg");
        let url = Url::parse(&server.uri()).unwrap();
        let mut reported = 0u64;

        let written = fetcher()
            .fetch(&url, ByteRange::bounded(2, 4), &dest, |n| reported += n)
            .await
            .unwrap();

        assert_eq!(written, 4);
        assert_eq!(reported, 4);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"cdef");
    }

    #[tokio::test]
    async fn empty_range_writes_empty_file_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(206))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("empty");
        let url = Url::parse(&server.uri()).unwrap();

        let written = fetcher()
            .fetch(&url, ByteRange::bounded(0, 0), &dest, |_| panic!("no bytes expected"))
            .await
            .unwrap();

        assert_eq!(written, 0);
        assert_eq!(tokio::fs::metadata(&dest).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn server_error_is_a_transfer_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let err = fetcher()
            .fetch(&url, ByteRange::bounded(0, 10), &dir.path().join("s"), |_| {})
            .await
            .unwrap_err();

        match err {
            DownloadError::Transfer { range, reason } => {
                assert_eq!(range, "0-9");
                assert!(reason.contains("500"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn full_body_for_inner_range_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 32]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let result = fetcher()
            .fetch(&url, ByteRange::open(16), &dir.path().join("s"), |_| {})
            .await;

        assert!(matches!(result, Err(DownloadError::Transfer { .. })));
    }

    #[tokio::test]
    async fn short_body_for_bounded_range_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("range", "bytes=10-19"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("content-range", "bytes 10-19/100")
                    .set_body_bytes(vec![1u8; 4]),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let err = fetcher()
            .fetch(&url, ByteRange::bounded(10, 10), &dir.path().join("s"), |_| {})
            .await
            .unwrap_err();

        match err {
            DownloadError::Transfer { range, reason } => {
                assert_eq!(range, "10-19");
                assert!(reason.contains("short body"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn mismatched_content_range_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("content-range", "bytes 0-9/100")
                    .set_body_bytes(vec![0u8; 10]),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let result = fetcher()
            .fetch(&url, ByteRange::bounded(10, 10), &dir.path().join("s"), |_| {})
            .await;

        assert!(matches!(result, Err(DownloadError::Transfer { .. })));
    }

    #[test]
    fn content_range_start_parsing() {
        assert_eq!(content_range_start("bytes 250-499/1000"), Some(250));
        assert_eq!(content_range_start("bytes 0-0/*"), Some(0));
        assert_eq!(content_range_start("bytes */1000"), None);
        assert_eq!(content_range_start("items 1-2/3"), None);
    }

    #[tokio::test]
    async fn full_body_accepted_when_whole_resource_requested() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("range", "bytes=0-"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("s");
        let url = Url::parse(&server.uri()).unwrap();
        let written = fetcher()
            .fetch(&url, ByteRange::open(0), &dest, |_| {})
            .await
            .unwrap();

        assert_eq!(written, 3);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"abc");
    }
}
