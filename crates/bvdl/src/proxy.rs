use reqwest::Proxy;

use crate::DownloadError;

/// Kind of proxy server
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ProxyType {
    Http,
    Https,
    Socks5,
}

#[derive(Debug, Clone)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

/// Proxy used for both the size probe and the segment transfers
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy server URL (e.g., "http://proxy.example.com:8080")
    pub url: String,
    pub proxy_type: ProxyType,
    pub auth: Option<ProxyAuth>,
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>, proxy_type: ProxyType) -> Self {
        Self {
            url: url.into(),
            proxy_type,
            auth: None,
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(ProxyAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

/// Build a reqwest Proxy from a [`ProxyConfig`].
pub fn build_proxy(config: &ProxyConfig) -> Result<Proxy, DownloadError> {
    let mut proxy = match config.proxy_type {
        ProxyType::Http => Proxy::http(&config.url).map_err(|e| {
            DownloadError::proxy_configuration(format!("invalid HTTP proxy URL: {e}"))
        })?,
        ProxyType::Https => Proxy::https(&config.url).map_err(|e| {
            DownloadError::proxy_configuration(format!("invalid HTTPS proxy URL: {e}"))
        })?,
        ProxyType::Socks5 => {
            let url = if config.url.starts_with("socks5://") || config.url.starts_with("socks5h://")
            {
                config.url.clone()
            } else {
                format!("socks5://{}", config.url)
            };
            Proxy::all(&url).map_err(|e| {
                DownloadError::proxy_configuration(format!("invalid SOCKS5 proxy URL: {e}"))
            })?
        }
    };

    if let Some(auth) = &config.auth {
        proxy = proxy.basic_auth(&auth.username, &auth.password);
    }

    Ok(proxy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_http_proxy() {
        let config = ProxyConfig::new("http://[::1", ProxyType::Http);
        let err = build_proxy(&config).unwrap_err();
        assert!(matches!(err, DownloadError::ProxyConfiguration { .. }));
    }

    #[test]
    fn accepts_proxy_with_credentials() {
        let config =
            ProxyConfig::new("http://127.0.0.1:8080", ProxyType::Http).with_auth("user", "pass");
        assert!(build_proxy(&config).is_ok());
    }
}
