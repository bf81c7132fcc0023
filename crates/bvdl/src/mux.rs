//! Stream-copy muxing of separate video and audio tracks through ffmpeg.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::MuxError;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Combines a video-only and an audio-only file into one container without
/// re-encoding.
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    binary: String,
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self::new(DEFAULT_FFMPEG)
    }
}

impl FfmpegMuxer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Mux `video` and `audio` into `output`, overwriting it.
    ///
    /// Both inputs are deleted once ffmpeg reports success. On failure they are
    /// left in place.
    pub async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<PathBuf, MuxError> {
        let args = build_args(video, audio, output);
        debug!(binary = %self.binary, ?args, "Starting ffmpeg");

        let mut cmd = Command::new(&self.binary);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }

        let status = cmd.status().await.map_err(|source| MuxError::Spawn {
            binary: self.binary.clone(),
            source,
        })?;

        if !status.success() {
            return Err(MuxError::ExitStatus {
                binary: self.binary.clone(),
                status,
            });
        }

        for input in [video, audio] {
            tokio::fs::remove_file(input)
                .await
                .map_err(|source| MuxError::Cleanup {
                    path: input.to_path_buf(),
                    source,
                })?;
        }

        info!(output = %output.display(), "Muxing complete");
        Ok(output.to_path_buf())
    }
}

/// `-i <video> -i <audio> -c:v copy -c:a copy -y <output>`
fn build_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-i".into(),
        video.into(),
        "-i".into(),
        audio.into(),
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        "copy".into(),
        "-y".into(),
        output.into(),
    ]
}
