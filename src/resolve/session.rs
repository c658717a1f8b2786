//! Browser session used by resolution strategies.
//!
//! A run opens exactly one session before the first item and drops it after
//! the last one. Strategies borrow it mutably, so only one resolution can be
//! in flight at a time.

use crate::error::ResolveError;
use std::time::Duration;

/// A loaded page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Final URL after redirects.
    pub url: String,
    pub body: String,
}

/// Navigation capability shared by all strategies.
pub trait Session {
    fn navigate(&mut self, url: &str) -> Result<Page, ResolveError>;

    /// Where `url` ends up after redirects. The target may be a large binary,
    /// so implementations should not read its body.
    fn final_url(&mut self, url: &str) -> Result<String, ResolveError> {
        self.navigate(url).map(|page| page.url)
    }
}

/// Opens the session for a run. Teardown happens when the returned box drops.
pub trait SessionProvider {
    fn open(&self) -> Result<Box<dyn Session>, ResolveError>;
}

/// Plain HTTP session: fetches pages with a shared agent.
pub struct HttpSession {
    agent: ureq::Agent,
    user_agent: String,
}

impl HttpSession {
    pub fn new(timeout: Duration, user_agent: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .build();
        Self {
            agent,
            user_agent: user_agent.to_string(),
        }
    }
}

impl HttpSession {
    fn get(&self, url: &str) -> Result<ureq::Response, ResolveError> {
        self.agent
            .get(url)
            .set("User-Agent", &self.user_agent)
            .set("Accept-Language", "zh-Hant, en;q=0.8")
            .call()
            .map_err(|e| ResolveError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

impl Session for HttpSession {
    fn navigate(&mut self, url: &str) -> Result<Page, ResolveError> {
        tracing::debug!(%url, "navigating");
        let response = self.get(url)?;
        let final_url = response.get_url().to_string();
        let body = response
            .into_string()
            .map_err(|e| ResolveError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Page {
            url: final_url,
            body,
        })
    }

    fn final_url(&mut self, url: &str) -> Result<String, ResolveError> {
        tracing::debug!(%url, "following redirects");
        // Dropping the response closes the connection before the body is read.
        let response = self.get(url)?;
        Ok(response.get_url().to_string())
    }
}

/// Provides [`HttpSession`]s.
#[derive(Debug, Clone)]
pub struct HttpSessionProvider {
    timeout: Duration,
    user_agent: String,
}

impl HttpSessionProvider {
    pub fn new(timeout: Duration, user_agent: &str) -> Self {
        Self {
            timeout,
            user_agent: user_agent.to_string(),
        }
    }
}

impl SessionProvider for HttpSessionProvider {
    fn open(&self) -> Result<Box<dyn Session>, ResolveError> {
        Ok(Box::new(HttpSession::new(self.timeout, &self.user_agent)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_navigate_follows_redirect() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/v2/page", mock_server.uri())),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&mock_server)
            .await;

        let mut session = HttpSession::new(Duration::from_secs(5), "test-agent");
        let page = session
            .navigate(&format!("{}/latest", mock_server.uri()))
            .unwrap();

        assert_eq!(page.url, format!("{}/v2/page", mock_server.uri()));
        assert_eq!(page.body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_final_url_skips_large_binary_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/mirror/big.zip", mock_server.uri())),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mirror/big.zip"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(vec![0u8; 12 * 1024 * 1024], "application/zip"),
            )
            .mount(&mock_server)
            .await;

        let mut session = HttpSession::new(Duration::from_secs(5), "test-agent");
        let url = session
            .final_url(&format!("{}/latest", mock_server.uri()))
            .unwrap();

        assert_eq!(url, format!("{}/mirror/big.zip", mock_server.uri()));
    }

    #[tokio::test]
    async fn test_navigate_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let mut session = HttpSession::new(Duration::from_secs(5), "test-agent");
        let err = session.navigate(&mock_server.uri()).unwrap_err();
        assert!(matches!(err, ResolveError::Navigation { .. }));
    }
}
