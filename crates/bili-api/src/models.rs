use serde::{Deserialize, Deserializer};

/// The `{code, message, data}` envelope every web API response is wrapped in.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

/// `/x/web-interface/view`
#[derive(Debug, Clone, Deserialize)]
pub struct VideoMeta {
    pub bvid: String,
    pub aid: u64,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Page {
    pub cid: u64,
    /// 1-based position within the video.
    pub page: u32,
    /// Per-page title.
    pub part: String,
    /// Seconds.
    #[serde(default)]
    pub duration: u64,
}

/// `/x/player/playurl`
#[derive(Debug, Clone, Deserialize)]
pub struct PlayUrl {
    #[serde(default)]
    pub quality: u32,
    pub dash: Dash,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dash {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub video: Vec<DashStream>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub audio: Vec<DashStream>,
}

/// One DASH representation, listed by the API best quality first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DashStream {
    pub id: u32,
    #[serde(rename = "baseUrl", alias = "base_url")]
    pub base_url: String,
    #[serde(
        default,
        rename = "backupUrl",
        alias = "backup_url",
        deserialize_with = "null_as_empty"
    )]
    pub backup_url: Vec<String>,
    #[serde(default)]
    pub bandwidth: u64,
    #[serde(default)]
    pub codecs: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl DashStream {
    /// The primary URL followed by the CDN mirrors.
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.base_url.as_str()).chain(self.backup_url.iter().map(String::as_str))
    }
}

/// Bilibili sends `null` rather than `[]` for absent lists (e.g. `dash.audio`
/// of silent videos).
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
