use std::future::Future;
use std::time::Duration;

use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid feed URL '{0}'")]
    InvalidUrl(String),
}

/// Somewhere calendar text can be fetched from.
pub trait FeedSource {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FeedError>> + Send;
}

/// Fetches feeds over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFeed {
    client: reqwest::Client,
}

impl HttpFeed {
    pub fn new() -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl FeedSource for HttpFeed {
    async fn fetch(&self, url: &str) -> Result<String, FeedError> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(FeedError::InvalidUrl(url.to_string()));
        }

        tracing::debug!(url, "fetching calendar feed");
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}

/// The URL actually requested for a feed.
///
/// `webcal://` is fetched as `https://`. With a proxy prefix the feed URL is
/// percent-encoded and appended to it, e.g. `https://proxy/?url=` +
/// `https%3A%2F%2F...`.
pub fn feed_request_url(url: &str, proxy: Option<&str>) -> String {
    let url = url.trim();
    let url = match url.strip_prefix("webcal://") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    };

    match proxy.map(str::trim).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{prefix}{}", urlencoding::encode(&url)),
        None => url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_url_is_used_verbatim() {
        assert_eq!(
            feed_request_url(" https://wilma.example/ical/abc ", None),
            "https://wilma.example/ical/abc"
        );
        assert_eq!(
            feed_request_url("https://wilma.example/ical/abc", Some("  ")),
            "https://wilma.example/ical/abc"
        );
    }

    #[test]
    fn proxy_receives_percent_encoded_url() {
        assert_eq!(
            feed_request_url("https://wilma.example/ical?id=1&k=2", Some("https://proxy.example/?url=")),
            "https://proxy.example/?url=https%3A%2F%2Fwilma.example%2Fical%3Fid%3D1%26k%3D2"
        );
    }

    #[test]
    fn webcal_is_fetched_over_https() {
        assert_eq!(
            feed_request_url("webcal://school.example/cal.ics", None),
            "https://school.example/cal.ics"
        );
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/broken.ics")
            .with_status(500)
            .create_async()
            .await;

        let feed = HttpFeed::new().unwrap();
        let err = feed
            .fetch(&format!("{}/broken.ics", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(err, FeedError::Status(500)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unsupported_scheme_is_rejected_without_a_request() {
        let feed = HttpFeed::new().unwrap();
        let err = feed.fetch("ftp://example.com/cal.ics").await.unwrap_err();
        assert!(matches!(err, FeedError::InvalidUrl(_)));
    }
}
