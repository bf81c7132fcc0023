//! Ordered reassembly of downloaded segments into the final file.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, trace};

use crate::DownloadError;

const MERGE_BUFFER_SIZE: usize = 1024 * 1024;

/// Concatenate `segments`, in the given order, into `output`.
///
/// Each segment file is deleted as soon as it has been appended. A failure part
/// way through therefore leaves the already consumed segments gone for good;
/// the merge cannot be resumed.
pub async fn merge_segments(segments: &[PathBuf], output: &Path) -> Result<u64, DownloadError> {
    let file = File::create(output)
        .await
        .map_err(|e| DownloadError::merge(output, e))?;
    let mut writer = BufWriter::with_capacity(MERGE_BUFFER_SIZE, file);
    let mut total = 0u64;

    for segment in segments {
        let mut source = File::open(segment)
            .await
            .map_err(|e| DownloadError::merge(segment, e))?;
        let copied = tokio::io::copy(&mut source, &mut writer)
            .await
            .map_err(|e| DownloadError::merge(output, e))?;
        drop(source);

        tokio::fs::remove_file(segment)
            .await
            .map_err(|e| DownloadError::merge(segment, e))?;

        trace!(segment = %segment.display(), bytes = copied, "Segment appended");
        total += copied;
    }

    writer
        .shutdown()
        .await
        .map_err(|e| DownloadError::merge(output, e))?;

    debug!(output = %output.display(), bytes = total, segments = segments.len(), "Segments merged");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_segments(dir: &Path, contents: &[&[u8]]) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for (i, data) in contents.iter().enumerate() {
            let path = dir.join(format!("part{i}"));
            tokio::fs::write(&path, data).await.unwrap();
            paths.push(path);
        }
        paths
    }

    #[tokio::test]
    async fn concatenates_in_given_order_and_removes_segments() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_segments(dir.path(), &[b"hello ", b"", b"ordered ", b"world"]).await;
        let output = dir.path().join("out");

        let written = merge_segments(&paths, &output).await.unwrap();

        assert_eq!(written, 19);
        assert_eq!(
            tokio::fs::read(&output).await.unwrap(),
            b"hello ordered world"
        );
        for path in &paths {
            assert!(!path.exists(), "{} should be removed", path.display());
        }
    }

    #[tokio::test]
    async fn order_follows_the_plan_not_the_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = write_segments(dir.path(), &[b"B", b"A"]).await;
        paths.reverse();
        let output = dir.path().join("out");

        merge_segments(&paths, &output).await.unwrap();

        assert_eq!(tokio::fs::read(&output).await.unwrap(), b"AB");
    }

    #[tokio::test]
    async fn missing_segment_is_a_merge_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = write_segments(dir.path(), &[b"first"]).await;
        paths.push(dir.path().join("never-downloaded"));
        let output = dir.path().join("out");

        let err = merge_segments(&paths, &output).await.unwrap_err();

        match err {
            DownloadError::Merge { path, .. } => assert!(path.ends_with("never-downloaded")),
            other => panic!("unexpected error: {other}"),
        }
        // The first segment was consumed before the failure.
        assert!(!paths[0].exists());
    }
}
