//! Size discovery ahead of range planning.

use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, HeaderMap};
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, warn};

use crate::{DownloadError, range::parse_total_size};

/// Determine the total size of `url` in bytes.
///
/// Asks with `HEAD` first. Servers that refuse `HEAD` or omit the length are
/// asked for `bytes=0-0` and the total is read from `Content-Range`.
pub async fn probe_size(client: &Client, url: &Url) -> Result<u64, DownloadError> {
    match client.head(url.clone()).send().await {
        Ok(response) if response.status().is_success() => {
            if let Some(length) = header_str(response.headers(), CONTENT_LENGTH) {
                let total = parse_total_size(length)?;
                debug!(url = %url, total, "Size probe answered by HEAD");
                return Ok(total);
            }
            debug!(url = %url, "HEAD response carries no Content-Length");
        }
        Ok(response) => {
            debug!(url = %url, status = %response.status(), "HEAD rejected, retrying with a ranged GET");
        }
        Err(e) => {
            warn!(url = %url, error = %e, "HEAD request failed, retrying with a ranged GET");
        }
    }

    probe_with_range(client, url).await
}

async fn probe_with_range(client: &Client, url: &Url) -> Result<u64, DownloadError> {
    let response = client
        .get(url.clone())
        .header(reqwest::header::RANGE, "bytes=0-0")
        .send()
        .await
        .map_err(|e| DownloadError::probe(url.as_str(), e.to_string()))?;

    let status = response.status();
    if status != StatusCode::PARTIAL_CONTENT {
        return Err(DownloadError::probe(
            url.as_str(),
            format!("server answered a ranged probe with HTTP {status}"),
        ));
    }

    let content_range = header_str(response.headers(), CONTENT_RANGE).ok_or_else(|| {
        DownloadError::probe(url.as_str(), "partial response without Content-Range")
    })?;

    let total = total_from_content_range(content_range).ok_or_else(|| {
        DownloadError::probe(
            url.as_str(),
            format!("Content-Range `{content_range}` does not state a total size"),
        )
    })?;

    let total = parse_total_size(total)?;
    debug!(url = %url, total, "Size probe answered by ranged GET");
    Ok(total)
}

fn header_str(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Extract the complete-length part of `bytes 0-0/1234`; `None` for `*`.
fn total_from_content_range(value: &str) -> Option<&str> {
    let (_, total) = value.rsplit_once('/')?;
    let total = total.trim();
    (total != "*" && !total.is_empty()).then_some(total)
}
