use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

pub const USER_AGENT_VALUE: &str = concat!("domain-checker/", env!("CARGO_PKG_VERSION"));
pub const ACCEPT_VALUE: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9";

/// Bodies are cut here before scanning, matching clamd's default `StreamMaxLength`.
pub const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

const BROWSER_HEADERS: [(&str, &str); 6] = [
    ("connection", "keep-alive"),
    ("upgrade-insecure-requests", "1"),
    ("sec-fetch-site", "same-origin"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-user", "?1"),
    ("sec-fetch-dest", "document"),
];

/// What the checker needs to know about one GET.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: StatusCode,
    /// URL the response was finally served from
    pub url: String,
    pub location: Option<String>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Absolute target of the `Location` header, if any.
    pub fn redirect_target(&self) -> Option<String> {
        let location = self.location.as_deref()?;
        resolve_location(&self.url, location)
    }
}

#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

/// reqwest-backed fetcher that presents itself like a browser.
pub struct UrlFetcher {
    client: Client,
    max_body_bytes: usize,
}

impl UrlFetcher {
    pub fn new(timeout: Duration, max_redirects: usize) -> Result<Self, FetchError> {
        let redirect = if max_redirects == 0 {
            reqwest::redirect::Policy::none()
        } else {
            reqwest::redirect::Policy::limited(max_redirects)
        };

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT_VALUE)
            .default_headers(Self::default_headers())
            .redirect(redirect)
            .cookie_store(true)
            .gzip(true)
            .deflate(true)
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static(ACCEPT_VALUE),
        );
        for (name, value) in BROWSER_HEADERS {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
        headers
    }
}

#[async_trait]
impl HttpFetcher for UrlFetcher {
    async fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        let final_url = response.url().to_string();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let room = self.max_body_bytes - body.len();
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                if chunk.len() > room {
                    log::warn!("Body of {final_url} cut at {} bytes", self.max_body_bytes);
                    break;
                }
            } else {
                body.extend_from_slice(&chunk);
            }
        }

        log::debug!("GET {url} -> {status} from {final_url} ({} bytes)", body.len());

        Ok(FetchResponse {
            status,
            url: final_url,
            location,
            body,
        })
    }
}

/// Resolve a `Location` header against the URL that sent it.
pub fn resolve_location(base: &str, location: &str) -> Option<String> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return Some(location.to_string());
    }
    let base = Url::parse(base).ok()?;
    base.join(location).ok().map(|url| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_http;

    #[test]
    fn test_resolve_location() {
        assert_eq!(
            resolve_location("https://example.com/a/b", "https://other.org/x"),
            Some("https://other.org/x".to_string())
        );
        assert_eq!(
            resolve_location("https://example.com/a/b", "/landing"),
            Some("https://example.com/landing".to_string())
        );
        assert_eq!(
            resolve_location("https://example.com/a/b", "c?d=1"),
            Some("https://example.com/a/c?d=1".to_string())
        );
        assert_eq!(resolve_location("not a url", "/landing"), None);
    }

    #[test]
    fn test_default_headers() {
        let headers = UrlFetcher::default_headers();
        assert_eq!(headers.get("connection").unwrap(), "keep-alive");
        assert_eq!(headers.get("sec-fetch-dest").unwrap(), "document");
        assert!(headers
            .get(reqwest::header::ACCEPT)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/html"));
    }

    #[tokio::test]
    async fn test_get_follows_redirects() {
        let base = serve_http(vec![
            (
                301,
                vec![("Location".to_string(), "/final".to_string())],
                String::new(),
            ),
            (200, vec![], "landed".to_string()),
        ])
        .await;

        let fetcher = UrlFetcher::new(Duration::from_secs(5), 10).unwrap();
        let response = fetcher.get(&format!("{base}/start")).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.url, format!("{base}/final"));
        assert_eq!(response.body, b"landed".to_vec());
    }

    #[tokio::test]
    async fn test_get_without_redirects_exposes_location() {
        let base = serve_http(vec![(
            301,
            vec![("Location".to_string(), "/moved".to_string())],
            String::new(),
        )])
        .await;

        let fetcher = UrlFetcher::new(Duration::from_secs(5), 0).unwrap();
        let response = fetcher.get(&format!("{base}/old")).await.unwrap();

        assert_eq!(response.status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.redirect_target(), Some(format!("{base}/moved")));
    }

    #[tokio::test]
    async fn test_body_is_capped() {
        let base = serve_http(vec![(200, vec![], "x".repeat(4096))]).await;

        let fetcher = UrlFetcher::new(Duration::from_secs(5), 10)
            .unwrap()
            .with_max_body_bytes(100);
        let response = fetcher.get(&format!("{base}/big")).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body.len(), 100);
    }

    #[tokio::test]
    async fn test_connection_refused_is_request_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let fetcher = UrlFetcher::new(Duration::from_secs(5), 10).unwrap();

        let err = fetcher
            .get(&format!("http://127.0.0.1:{port}/"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Request(_)));
    }
}
