//! Resolves Bilibili video ids into the DASH stream URLs to download.

pub mod client;
pub mod error;
pub mod id;
pub mod models;
pub mod selector;

pub use client::{BILI_REFERER, BILI_USER_AGENT, BiliClient, download_headers};
pub use error::ApiError;
pub use id::{av_to_bv, bv_to_av, normalize_id};
pub use models::{Dash, DashStream, Page, PlayUrl, VideoMeta};
pub use selector::{DEFAULT_MAX_HEIGHT, PageSelection, select_audio, select_video};
