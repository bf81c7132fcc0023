use std::path::PathBuf;

use bili_api::{DEFAULT_MAX_HEIGHT, PageSelection};
use bvdl_engine::{DEFAULT_PARALLELISM, ProxyType};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "bvdl",
    author,
    version,
    about = "Download Bilibili videos with parallel ranged transfers",
    after_help = "Settings:\n  bili-vd.cookie  Cookie sent to the API and CDN, for logged-in quality levels\n  bili-vd.ffmpeg  Path to the ffmpeg binary (default: ffmpeg)"
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Settings file (default: <config dir>/bvdl/settings.json)
    #[arg(long, global = true, env = "BVDL_SETTINGS")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download videos by BV/av id
    Download(DownloadArgs),

    /// Manage persistent settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(clap::Args, Debug)]
pub struct DownloadArgs {
    /// BV or av id of the video to download
    #[arg(short, long, required_unless_present = "batch", conflicts_with = "batch")]
    pub id: Option<String>,

    /// Text file with one id per line; every page of each video is downloaded
    #[arg(short, long)]
    pub batch: Option<PathBuf>,

    /// Page to download (1-based), or "all"
    #[arg(short, long, default_value = "1")]
    pub page: PageSelection,

    /// Output directory (default: current directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Maximum video height (2160, 1080, 720, 480, ...)
    #[arg(long, default_value_t = DEFAULT_MAX_HEIGHT)]
    pub height: u32,

    /// Concurrent ranged requests per stream
    #[arg(short, long, default_value_t = DEFAULT_PARALLELISM, value_parser = parse_threads)]
    pub threads: usize,

    /// Proxy server URL
    #[arg(long)]
    pub proxy: Option<String>,

    /// Proxy protocol
    #[arg(long, value_enum, default_value = "http")]
    pub proxy_type: ProxyType,

    /// Proxy username
    #[arg(long, requires = "proxy")]
    pub proxy_username: Option<String>,

    /// Proxy password
    #[arg(long, requires = "proxy_username")]
    pub proxy_password: Option<String>,

    /// Connection timeout in seconds (0 = none)
    #[arg(long, default_value_t = 30)]
    pub connect_timeout: u64,
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Set a key
    Set { key: String, value: String },
    /// Print a key
    Get { key: String },
    /// Delete a key
    Remove { key: String },
    /// Print all settings
    List,
}

fn parse_threads(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(threads) => Ok(threads),
        Err(e) => Err(e.to_string()),
    }
}
