use std::sync::OnceLock;

use reqwest::Client;
use tracing::{debug, info};

use crate::{DownloadError, config::DownloaderConfig, proxy::build_proxy};

/// Install the process-wide rustls crypto provider once.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate may have installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Create the HTTP client shared by the size probe and all segment fetchers.
pub fn create_client(config: &DownloaderConfig) -> Result<Client, DownloadError> {
    install_rustls_provider();

    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .no_gzip()
        .no_deflate()
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if !config.read_timeout.is_zero() {
        client_builder = client_builder.read_timeout(config.read_timeout);
    }

    if let Some(proxy_config) = &config.proxy {
        client_builder = client_builder.proxy(build_proxy(proxy_config)?);
        info!(proxy_url = %proxy_config.url, "Using explicitly configured proxy for downloads");
    } else if config.use_system_proxy {
        // reqwest picks up system proxy settings unless `no_proxy()` is called
        debug!("Using system proxy settings for downloads");
    } else {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled for downloads");
    }

    client_builder.build().map_err(DownloadError::from)
}

#[cfg(test)]
pub(crate) fn test_client() -> Client {
    let config = DownloaderConfig::builder().use_system_proxy(false).build();
    create_client(&config).expect("test client")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{ProxyConfig, ProxyType};

    #[test]
    fn builds_with_default_config() {
        assert!(create_client(&DownloaderConfig::default()).is_ok());
    }

    #[test]
    fn invalid_proxy_fails_client_creation() {
        let config = DownloaderConfig::builder()
            .proxy(ProxyConfig::new("http://[::1", ProxyType::Http))
            .build();
        assert!(matches!(
            create_client(&config),
            Err(DownloadError::ProxyConfiguration { .. })
        ));
    }
}
