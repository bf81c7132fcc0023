use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::{DownloadError, proxy::ProxyConfig};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// Number of concurrent segment fetches when the caller has no preference.
pub const DEFAULT_PARALLELISM: usize = 5;

/// Configurable options for the ranged downloader
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Overall timeout for a single HTTP request. Zero leaves the client default (none).
    pub timeout: Duration,

    /// Connection timeout. Zero leaves the client default.
    pub connect_timeout: Duration,

    /// Maximum time between two body reads. Zero leaves the client default.
    pub read_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Headers sent with the probe and every segment request
    pub headers: HeaderMap,

    /// Proxy configuration (optional)
    pub proxy: Option<ProxyConfig>,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,

    /// Capacity of the buffered writer behind each segment file
    pub write_buffer_size: usize,

    /// Maximum idle connections kept per host; segment fetches share this pool
    pub pool_max_idle_per_host: usize,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            connect_timeout: Duration::ZERO,
            read_timeout: Duration::ZERO,
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: DownloaderConfig::get_default_headers(),
            proxy: None,
            use_system_proxy: true,
            write_buffer_size: 256 * 1024,
            pool_max_idle_per_host: DEFAULT_PARALLELISM * 2,
        }
    }
}

impl DownloaderConfig {
    pub fn builder() -> DownloaderConfigBuilder {
        DownloaderConfigBuilder::new()
    }

    /// Merge `config` onto the defaults. Custom headers take precedence over the
    /// default ones with the same name.
    pub fn with_config(config: DownloaderConfig) -> Self {
        let mut headers = DownloaderConfig::get_default_headers();
        for (name, value) in config.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        Self { headers, ..config }
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        // Segment bodies must arrive byte-exact, never content-encoded.
        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("identity"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5,zh-CN;q=0.3,zh;q=0.2"),
        );
        default_headers
    }
}

/// Builder for [`DownloaderConfig`]
#[derive(Debug, Clone, Default)]
pub struct DownloaderConfigBuilder {
    config: DownloaderConfig,
}

impl DownloaderConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.config.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Add a single header, validating both name and value.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, DownloadError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| DownloadError::internal(format!("invalid header name `{name}`: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| DownloadError::internal(format!("invalid value for `{name}`: {e}")))?;
        self.config.headers.insert(name, value);
        Ok(self)
    }

    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = Some(proxy);
        self
    }

    pub fn use_system_proxy(mut self, enabled: bool) -> Self {
        self.config.use_system_proxy = enabled;
        self
    }

    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.config.write_buffer_size = size.max(1);
        self
    }

    pub fn pool_max_idle_per_host(mut self, size: usize) -> Self {
        self.config.pool_max_idle_per_host = size;
        self
    }

    pub fn build(self) -> DownloaderConfig {
        self.config
    }
}
