use std::time::Duration;

use crmsync_domain::{CrmSyncError, DispatchError};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::{dispatch_error_from_http, InfraError};

/// Longest response body quoted in a failure message.
const MAX_BODY_SNIPPET: usize = 512;

/// HTTP client used by the provider adapters.
///
/// Failures come back as [`DispatchError`] so the retry policy can classify
/// them. There is no retry loop here: a failed call fails the attempt and
/// the queue schedules the next one.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, CrmSyncError> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute `builder` and decode a JSON body from a 2xx response.
    ///
    /// Non-success statuses become [`DispatchError::from_status`] carrying a
    /// snippet of the response body.
    pub async fn send_json<T>(&self, builder: RequestBuilder) -> Result<(StatusCode, T), DispatchError>
    where
        T: DeserializeOwned,
    {
        let request = builder.build().map_err(|err| dispatch_error_from_http(&err))?;
        let method = request.method().clone();
        let url = redact(request.url());
        debug!(%method, %url, "sending HTTP request");

        let response =
            self.client.execute(request).await.map_err(|err| dispatch_error_from_http(&err))?;
        let status = response.status();
        debug!(%method, %url, %status, "received HTTP response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::from_status(status.as_u16(), body_snippet(&body)));
        }

        let body = response.json::<T>().await.map_err(|err| dispatch_error_from_http(&err))?;
        Ok((status, body))
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: Some(concat!("crmsync/", env!("CARGO_PKG_VERSION")).to_string()),
            default_headers: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<HttpClient, CrmSyncError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| {
            let infra: InfraError = err.into();
            CrmSyncError::from(infra)
        })?;

        Ok(HttpClient { client })
    }
}

/// URL for logging, without query parameters (they may carry tokens).
fn redact(url: &reqwest::Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

fn body_snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(MAX_BODY_SNIPPET).collect()
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use crmsync_domain::FailureClass;
    use serde_json::Value;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client() -> HttpClient {
        HttpClient::builder().timeout(Duration::from_secs(5)).build().expect("http client")
    }

    #[tokio::test]
    async fn decodes_json_from_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/things"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "t-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client();
        let (status, body): (StatusCode, Value) = client
            .send_json(client.request(Method::POST, format!("{}/things", server.uri())))
            .await
            .expect("response");

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], "t-1");
    }

    #[tokio::test]
    async fn error_statuses_are_classified_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(422).set_body_string("field missing"))
            .mount(&server)
            .await;

        let client = client();
        let err = client
            .send_json::<Value>(client.request(Method::GET, server.uri()))
            .await
            .unwrap_err();

        assert_eq!(err, DispatchError::Rejected { status: 422, message: "field missing".into() });
        assert_eq!(err.failure_class(), FailureClass::Permanent);
    }

    #[tokio::test]
    async fn refused_connection_is_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client();
        let err = client
            .send_json::<Value>(client.request(Method::GET, format!("http://{addr}")))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Network(_)), "got {err:?}");
        assert_eq!(err.failure_class(), FailureClass::Transient);
    }

    #[test]
    fn redact_drops_query() {
        let url = reqwest::Url::parse("https://api.example.com/v1/deals?api_token=secret").unwrap();
        assert_eq!(redact(&url), "https://api.example.com/v1/deals");
    }
}
