use std::path::{Path, PathBuf};
use std::time::Duration;

use bili_api::{
    BILI_USER_AGENT, BiliClient, DashStream, Page, VideoMeta, download_headers, select_audio,
    select_video,
};
use bvdl_engine::{
    CancellationToken, DownloadError, DownloaderConfig, FfmpegMuxer, ProxyConfig,
    RangeDownloader,
};
use humansize::{BINARY, format_size};
use tracing::{debug, info, warn};

use crate::{
    cli::DownloadArgs,
    error::{AppError, Result},
    progress::StreamProgress,
    settings::Settings,
    utils::sanitize_filename,
};

/// Everything needed to turn a page into a muxed `.mp4`.
struct PagePipeline {
    api: BiliClient,
    downloader: RangeDownloader,
    muxer: FfmpegMuxer,
    output_dir: PathBuf,
    max_height: u32,
    threads: usize,
    quiet: bool,
    token: CancellationToken,
}

pub async fn run(
    args: DownloadArgs,
    settings: &Settings,
    quiet: bool,
    token: CancellationToken,
) -> Result<()> {
    let output_dir = match &args.output {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    tokio::fs::create_dir_all(&output_dir).await?;

    let cookie = settings.cookie();
    let config = downloader_config(&args, cookie)?;
    let downloader = RangeDownloader::with_config(config)?;
    let api = BiliClient::new(downloader.client().clone()).with_cookie(cookie.map(str::to_owned));

    let pipeline = PagePipeline {
        api,
        downloader,
        muxer: FfmpegMuxer::new(settings.ffmpeg()),
        output_dir,
        max_height: args.height,
        threads: args.threads,
        quiet,
        token,
    };

    if let Some(batch) = &args.batch {
        let contents = tokio::fs::read_to_string(batch).await?;
        let ids = parse_batch(&contents);
        info!(file = %batch.display(), videos = ids.len(), "Batch download");

        for id in ids {
            let meta = pipeline.api.fetch_meta(&id).await?;
            let pages: Vec<&Page> = meta.pages.iter().collect();
            pipeline.download_pages(&meta, &pages).await?;
        }
        return Ok(());
    }

    let id = args
        .id
        .as_deref()
        .ok_or_else(|| AppError::InvalidInput("either --id or --batch is required".to_string()))?;
    let meta = pipeline.api.fetch_meta(id).await?;
    let pages = args.page.resolve(&meta.pages)?;
    pipeline.download_pages(&meta, &pages).await
}

fn downloader_config(args: &DownloadArgs, cookie: Option<&str>) -> Result<DownloaderConfig> {
    let mut builder = DownloaderConfig::builder()
        .user_agent(BILI_USER_AGENT)
        .headers(download_headers(cookie)?)
        .connect_timeout(Duration::from_secs(args.connect_timeout))
        .pool_max_idle_per_host(args.threads * 2);

    if let Some(url) = &args.proxy {
        let mut proxy = ProxyConfig::new(url, args.proxy_type);
        if let Some(username) = &args.proxy_username {
            proxy = proxy.with_auth(username, args.proxy_password.as_deref().unwrap_or_default());
        }
        builder = builder.proxy(proxy);
    }

    Ok(builder.build())
}

impl PagePipeline {
    async fn download_pages(&self, meta: &VideoMeta, pages: &[&Page]) -> Result<()> {
        for page in pages {
            self.download_page(meta, page).await?;
        }
        Ok(())
    }

    async fn download_page(&self, meta: &VideoMeta, page: &Page) -> Result<PathBuf> {
        let name = output_name(meta, page);
        let output = self.output_dir.join(format!("{name}.mp4"));
        println!("Downloading {name}");

        let play_url = self.api.fetch_play_url(&meta.bvid, page.cid).await?;
        let video = select_video(&play_url.dash.video, self.max_height)?;
        let audio = select_audio(&play_url.dash.audio)?;
        println!("Resolution: {}x{}", video.width, video.height);
        debug!(
            video_id = video.id,
            codecs = %video.codecs,
            video_bandwidth = video.bandwidth,
            audio_id = audio.id,
            audio_bandwidth = audio.bandwidth,
            "Streams selected"
        );

        let (video_temp, audio_temp) = temp_paths(&self.output_dir, &name);
        self.fetch_stream("video", video, &video_temp).await?;
        if let Err(e) = self.fetch_stream("audio", audio, &audio_temp).await {
            remove_temp(&video_temp).await;
            return Err(e);
        }

        println!("Muxing");
        self.muxer.mux(&video_temp, &audio_temp, &output).await?;

        let size = tokio::fs::metadata(&output).await.map(|m| m.len()).unwrap_or(0);
        println!("Saved to {} ({})\n", output.display(), format_size(size, BINARY));
        Ok(output)
    }

    /// Download `stream` to `destination`, moving on to the next mirror when a
    /// URL fails. Cancellation is never retried.
    async fn fetch_stream(
        &self,
        label: &str,
        stream: &DashStream,
        destination: &Path,
    ) -> Result<()> {
        let progress = StreamProgress::new(label, self.quiet);
        let mut last_error = None;

        for url in stream.urls() {
            progress.set_fraction(0.0);
            let result = self
                .downloader
                .download_with_token(
                    url,
                    destination,
                    self.threads,
                    |fraction| progress.set_fraction(fraction),
                    self.token.clone(),
                )
                .await;

            match result {
                Ok(_) => {
                    progress.finish();
                    return Ok(());
                }
                Err(DownloadError::Cancelled) => {
                    progress.abandon();
                    return Err(DownloadError::Cancelled.into());
                }
                Err(e) => {
                    warn!(stream = label, url, error = %e, "Stream URL failed");
                    last_error = Some(e);
                }
            }
        }

        progress.abandon();
        Err(last_error
            .map(AppError::from)
            .unwrap_or_else(|| AppError::InvalidInput(format!("{label} stream has no URL"))))
    }
}

async fn remove_temp(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove temporary stream");
        }
    }
}

/// `"{bvid} p{page} {part}-{title}"`, with both titles made filesystem safe.
fn output_name(meta: &VideoMeta, page: &Page) -> String {
    format!(
        "{} p{} {}-{}",
        meta.bvid,
        page.page,
        sanitize_filename(&page.part),
        sanitize_filename(&meta.title)
    )
}

fn temp_paths(output_dir: &Path, name: &str) -> (PathBuf, PathBuf) {
    (
        output_dir.join(format!("{name}_video_temp.m4s")),
        output_dir.join(format!("{name}_audio_temp.m4s")),
    )
}

/// One id per line; surrounding whitespace and blank lines are ignored.
fn parse_batch(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bvdl_engine::ProxyType;

    fn meta(title: &str) -> VideoMeta {
        VideoMeta {
            bvid: "BV17x411w7KC".to_string(),
            aid: 170001,
            title: title.to_string(),
            pages: Vec::new(),
        }
    }

    fn page(number: u32, part: &str) -> Page {
        Page {
            cid: 1,
            page: number,
            part: part.to_string(),
            duration: 0,
        }
    }

    #[test]
    fn output_name_sanitizes_titles() {
        assert_eq!(
            output_name(&meta("Cats: a study?"), &page(2, "Part/1")),
            "BV17x411w7KC p2 Part1-Cats a study"
        );
    }

    #[test]
    fn temp_files_sit_next_to_output() {
        let (video, audio) = temp_paths(Path::new("/out"), "BV1 p1 a-b");
        assert_eq!(video, Path::new("/out/BV1 p1 a-b_video_temp.m4s"));
        assert_eq!(audio, Path::new("/out/BV1 p1 a-b_audio_temp.m4s"));
    }

    #[tokio::test]
    async fn remove_temp_deletes_and_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let (video, audio) = temp_paths(dir.path(), "BV1 p1 a-b");
        std::fs::write(&video, b"partial").unwrap();

        remove_temp(&video).await;
        remove_temp(&audio).await;

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn batch_skips_blank_lines() {
        let ids = parse_batch("BV17x411w7KC\n\n  av170001  \r\n\t\nBV1xx411c7mD");
        assert_eq!(ids, ["BV17x411w7KC", "av170001", "BV1xx411c7mD"]);
    }

    fn args(extra: &[&str]) -> DownloadArgs {
        use clap::Parser;
        let mut argv = vec!["bvdl", "download", "-i", "BV17x411w7KC"];
        argv.extend_from_slice(extra);
        match crate::cli::Args::parse_from(argv).command {
            crate::cli::Commands::Download(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn config_carries_bilibili_headers() {
        let config = downloader_config(&args(&[]), Some("SESSDATA=abc")).unwrap();
        assert_eq!(config.user_agent, BILI_USER_AGENT);
        assert_eq!(config.headers["referer"], "https://www.bilibili.com/");
        assert_eq!(config.headers["cookie"], "SESSDATA=abc");
        assert!(config.proxy.is_none());
    }

    #[test]
    fn config_carries_proxy() {
        let config = downloader_config(
            &args(&[
                "--proxy",
                "socks5://127.0.0.1:1080",
                "--proxy-type",
                "socks5",
                "--proxy-username",
                "u",
            ]),
            None,
        )
        .unwrap();
        let proxy = config.proxy.unwrap();
        assert_eq!(proxy.proxy_type, ProxyType::Socks5);
        assert_eq!(proxy.auth.unwrap().password, "");
    }
}
