//! A thin wrapper on the HTTP client shared by all backend calls.

use serde::ser::Serialize;

/// Shared HTTP client with a stable user-agent.
///
/// No explicit timeout and no retry middleware are configured: retry
/// behavior, where it exists, is owned by the threat-report queue, and a
/// transport failure must surface to the caller exactly once.
pub(crate) struct Request {
    client: reqwest::Client,
}

impl Request {
    pub(crate) fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub(crate) async fn get(
        &self,
        url: &str,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .get(url)
            .header("User-Agent", user_agent())
            .send()
            .await
    }

    pub(crate) async fn post<T>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<reqwest::Response, reqwest::Error>
    where
        T: Serialize + Send + Sync,
    {
        self.client
            .post(url)
            .header("User-Agent", user_agent())
            .json(body)
            .send()
            .await
    }
}

fn user_agent() -> String {
    format!("softpos-core/{}", env!("CARGO_PKG_VERSION"))
}

/// Joins a runtime base URL with an endpoint path, tolerating base URLs
/// entered with or without a trailing slash.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_normalizes_trailing_slash() {
        assert_eq!(
            endpoint("http://10.0.2.2:8080/", "api/v1/transactions/attest"),
            "http://10.0.2.2:8080/api/v1/transactions/attest"
        );
        assert_eq!(
            endpoint("http://10.0.2.2:8080", "/health"),
            "http://10.0.2.2:8080/health"
        );
    }
}
