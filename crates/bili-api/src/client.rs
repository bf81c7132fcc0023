use reqwest::Client;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::{
    ApiError,
    id::normalize_id,
    models::{ApiResponse, PlayUrl, VideoMeta},
};

pub const DEFAULT_BASE_URL: &str = "https://api.bilibili.com";
pub const BILI_USER_AGENT: &str = "Mozilla/5.0";
pub const BILI_REFERER: &str = "https://www.bilibili.com/";

const VIEW_PATH: &str = "/x/web-interface/view";
const PLAY_URL_PATH: &str = "/x/player/playurl";

/// Headers Bilibili expects on API calls and on CDN stream transfers alike.
pub fn download_headers(cookie: Option<&str>) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BILI_USER_AGENT));
    headers.insert(REFERER, HeaderValue::from_static(BILI_REFERER));
    if let Some(cookie) = cookie.filter(|c| !c.is_empty()) {
        let value = HeaderValue::from_str(cookie)
            .map_err(|e| ApiError::InvalidCookie(e.to_string()))?;
        headers.insert(COOKIE, value);
    }
    Ok(headers)
}

/// Client for the two web API endpoints needed to locate a video's streams.
#[derive(Debug, Clone)]
pub struct BiliClient {
    client: Client,
    base_url: String,
    cookie: Option<String>,
}

impl BiliClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            cookie: None,
        }
    }

    pub fn with_cookie(mut self, cookie: Option<String>) -> Self {
        self.cookie = cookie.filter(|c| !c.is_empty());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    /// Title, ids and page list for `id` (`BV...` or `av...`).
    #[instrument(skip(self))]
    pub async fn fetch_meta(&self, id: &str) -> Result<VideoMeta, ApiError> {
        let bvid = normalize_id(id)?;
        let meta: VideoMeta = self.get(VIEW_PATH, &[("bvid", bvid)]).await?;
        debug!(bvid = %meta.bvid, pages = meta.pages.len(), "Video metadata fetched");
        Ok(meta)
    }

    /// DASH representations for one page of a video.
    #[instrument(skip(self))]
    pub async fn fetch_play_url(&self, bvid: &str, cid: u64) -> Result<PlayUrl, ApiError> {
        let params = [
            ("cid", cid.to_string()),
            ("qn", "120".to_string()),
            ("type", String::new()),
            ("otype", "json".to_string()),
            ("fourk", "1".to_string()),
            ("bvid", bvid.to_string()),
            ("fnver", "0".to_string()),
            ("fnval", "976".to_string()),
        ];

        let play_url: PlayUrl = self.get(PLAY_URL_PATH, &params).await?;
        debug!(
            quality = play_url.quality,
            video_streams = play_url.dash.video.len(),
            audio_streams = play_url.dash.audio.len(),
            "Play url fetched"
        );
        Ok(play_url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = Url::parse_with_params(&format!("{}{path}", self.base_url), params)?;
        debug!(%url, "Calling API");

        let response = self
            .client
            .get(url)
            .headers(download_headers(self.cookie())?)
            .send()
            .await?
            .error_for_status()?;

        let body: ApiResponse<T> = response.json().await?;
        if body.code != 0 {
            return Err(ApiError::Api {
                code: body.code,
                message: body.message,
            });
        }

        body.data.ok_or_else(|| ApiError::missing_data(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bvdl_engine::{DownloaderConfig, create_client};
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, BiliClient) {
        let server = MockServer::start().await;
        let config = DownloaderConfig::builder().use_system_proxy(false).build();
        let client = BiliClient::new(create_client(&config).unwrap())
            .with_cookie(Some("SESSDATA=abc".to_string()))
            .with_base_url(format!("{}/", server.uri()));
        (server, client)
    }

    #[test]
    fn headers_include_cookie_when_set() {
        let headers = download_headers(Some("SESSDATA=abc")).unwrap();
        assert_eq!(headers[USER_AGENT], BILI_USER_AGENT);
        assert_eq!(headers[REFERER], BILI_REFERER);
        assert_eq!(headers[COOKIE], "SESSDATA=abc");

        assert!(download_headers(None).unwrap().get(COOKIE).is_none());
        assert!(download_headers(Some("")).unwrap().get(COOKIE).is_none());
        assert!(matches!(
            download_headers(Some("bad\ncookie")),
            Err(ApiError::InvalidCookie(_))
        ));
    }

    #[tokio::test]
    async fn fetch_meta_converts_av_ids_and_sends_headers() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path(VIEW_PATH))
            .and(query_param("bvid", "BV17x411w7KC"))
            .and(header("referer", BILI_REFERER))
            .and(header("user-agent", BILI_USER_AGENT))
            .and(header("cookie", "SESSDATA=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "message": "0",
                "data": {
                    "bvid": "BV17x411w7KC",
                    "aid": 170001,
                    "title": "Title",
                    "pages": [{"cid": 1, "page": 1, "part": "P1", "duration": 10}]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let meta = client.fetch_meta("av170001").await.unwrap();
        assert_eq!(meta.bvid, "BV17x411w7KC");
        assert_eq!(meta.pages[0].cid, 1);
    }

    #[tokio::test]
    async fn non_zero_code_is_an_api_error() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path(VIEW_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": -404,
                "message": "not found"
            })))
            .mount(&server)
            .await;

        let err = client.fetch_meta("BV1xx411c7mD").await.unwrap_err();
        match err {
            ApiError::Api { code, message } => {
                assert_eq!(code, -404);
                assert_eq!(message, "not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn invalid_id_fails_without_a_request() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        assert!(matches!(
            client.fetch_meta("ep1234").await,
            Err(ApiError::InvalidId(_))
        ));
    }

    #[tokio::test]
    async fn fetch_play_url_sends_dash_parameters() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path(PLAY_URL_PATH))
            .and(query_param("bvid", "BV17x411w7KC"))
            .and(query_param("cid", "279786"))
            .and(query_param("qn", "120"))
            .and(query_param("fnval", "976"))
            .and(query_param("fnver", "0"))
            .and(query_param("fourk", "1"))
            .and(query_param("otype", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "message": "0",
                "data": {
                    "quality": 120,
                    "dash": {
                        "video": [
                            {"id": 120, "baseUrl": "https://cdn/v120.m4s", "width": 3840, "height": 2160},
                            {"id": 80, "baseUrl": "https://cdn/v80.m4s", "width": 1920, "height": 1080}
                        ],
                        "audio": [
                            {"id": 30280, "baseUrl": "https://cdn/a.m4s"}
                        ]
                    }
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let play_url = client.fetch_play_url("BV17x411w7KC", 279786).await.unwrap();
        assert_eq!(play_url.dash.video.len(), 2);
        assert_eq!(play_url.dash.audio[0].base_url, "https://cdn/a.m4s");
    }

    #[tokio::test]
    async fn http_failure_surfaces_as_http_error() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(412))
            .mount(&server)
            .await;

        assert!(matches!(
            client.fetch_play_url("BV17x411w7KC", 1).await,
            Err(ApiError::Http(_))
        ));
    }
}
