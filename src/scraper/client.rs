//! Blocking HTTP page source. The index request carries a browser-like User-Agent; chapter
//! requests send none.

use crate::scraper::error::FetchError;
use crate::scraper::{PageKind, PageSource};
use reqwest::header::USER_AGENT;
use reqwest::Url;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
const MAX_REDIRECTS: usize = 10;

/// Blocking HTTP client shared by all dispatcher workers.
///
/// Bodies are decoded as UTF-8 regardless of the declared charset. Non-2xx responses are
/// returned as [FetchError::HttpStatus]; retrying is left to the caller's policy.
#[derive(Debug, Clone)]
pub struct HttpSource {
    inner: reqwest::blocking::Client,
    index_user_agent: Option<String>,
}

impl HttpSource {
    /// Build a source with the default index User-Agent and timeout.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    pub fn builder() -> HttpSourceBuilder {
        HttpSourceBuilder::default()
    }
}

impl PageSource for HttpSource {
    fn fetch_page(&self, url: &str, kind: PageKind) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            input: url.to_string(),
            reason: e.to_string(),
        })?;
        let mut request = self.inner.get(parsed);
        if kind == PageKind::Index {
            if let Some(ref ua) = self.index_user_agent {
                request = request.header(USER_AGENT, ua.as_str());
            }
        }
        let response = request.send().map_err(|e| send_error(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let bytes = response.bytes().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::BodyRead {
                    url: url.to_string(),
                    source: Box::new(e),
                }
            }
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn send_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            source: Box::new(e),
        }
    }
}

/// Builder for [HttpSource] with optional index User-Agent and timeout.
#[derive(Debug)]
pub struct HttpSourceBuilder {
    index_user_agent: Option<String>,
    timeout_secs: u64,
}

impl Default for HttpSourceBuilder {
    fn default() -> Self {
        Self {
            index_user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl HttpSourceBuilder {
    /// User-Agent sent with the index request. Chapter requests never carry one.
    pub fn index_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.index_user_agent = Some(ua.into());
        self
    }

    /// Per-request timeout in seconds. Default 15.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<HttpSource, reqwest::Error> {
        let inner = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(HttpSource {
            inner,
            index_user_agent: self.index_user_agent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(route: &str, template: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(template)
            .mount(&server)
            .await;
        server
    }

    /// The blocking client must not run on the async test thread.
    async fn fetch(
        builder: HttpSourceBuilder,
        url: String,
        kind: PageKind,
    ) -> Result<String, FetchError> {
        tokio::task::spawn_blocking(move || {
            let source = builder.build().unwrap();
            source.fetch_page(&url, kind)
        })
        .await
        .unwrap()
    }

    #[test]
    fn builder_defaults() {
        let b = HttpSource::builder();
        assert_eq!(b.timeout_secs, 15);
        assert_eq!(b.index_user_agent.as_deref(), Some(DEFAULT_USER_AGENT));
    }

    #[test]
    fn builder_overrides() {
        let b = HttpSource::builder()
            .index_user_agent("Custom/1.0")
            .timeout_secs(3);
        assert_eq!(b.timeout_secs, 3);
        assert_eq!(b.index_user_agent.as_deref(), Some("Custom/1.0"));
    }

    #[test]
    fn malformed_url_is_a_fetch_error_not_a_panic() -> Result<(), reqwest::Error> {
        let source = HttpSource::new()?;
        match source.fetch_page("not a url", PageKind::Chapter) {
            Err(FetchError::InvalidUrl { input, .. }) => assert_eq!(input, "not a url"),
            other => panic!("expected InvalidUrl, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn user_agent_is_sent_on_index_requests_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;
        let builder = || HttpSource::builder().index_user_agent("Custom/1.0");

        let body = fetch(builder(), format!("{}/book/", server.uri()), PageKind::Index).await;
        assert_eq!(body.unwrap(), "ok");
        let body = fetch(builder(), format!("{}/c/1", server.uri()), PageKind::Chapter).await;
        assert_eq!(body.unwrap(), "ok");

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].url.path(), "/book/");
        assert_eq!(
            requests[0]
                .headers
                .get("user-agent")
                .and_then(|v| v.to_str().ok()),
            Some("Custom/1.0")
        );
        assert_eq!(requests[1].url.path(), "/c/1");
        assert!(requests[1].headers.get("user-agent").is_none());
    }

    #[tokio::test]
    async fn non_success_status_maps_to_http_status() {
        let server = serve("/c/1", ResponseTemplate::new(503)).await;
        let url = format!("{}/c/1", server.uri());
        match fetch(HttpSource::builder(), url.clone(), PageKind::Chapter).await {
            Err(FetchError::HttpStatus { status, url: got }) => {
                assert_eq!(status, 503);
                assert_eq!(got, url);
            }
            other => panic!("expected HttpStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn slow_response_maps_to_timeout() {
        let server = serve(
            "/c/1",
            ResponseTemplate::new(200).set_delay(Duration::from_secs(3)),
        )
        .await;
        let builder = HttpSource::builder().timeout_secs(1);
        match fetch(builder, format!("{}/c/1", server.uri()), PageKind::Chapter).await {
            Err(e @ FetchError::Timeout { .. }) => assert!(e.is_transient()),
            other => panic!("expected Timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_utf8_body_is_decoded_lossily() {
        let mut body = "第一章".as_bytes().to_vec();
        body.extend_from_slice(&[0xff, 0xfe]);
        let server = serve("/c/1", ResponseTemplate::new(200).set_body_bytes(body)).await;
        let text = fetch(
            HttpSource::builder(),
            format!("{}/c/1", server.uri()),
            PageKind::Chapter,
        )
        .await
        .unwrap();
        assert!(text.starts_with("第一章"));
        assert!(text.contains('\u{FFFD}'));
    }
}
