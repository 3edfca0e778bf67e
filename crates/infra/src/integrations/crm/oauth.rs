//! OAuth refresh-token grant with an in-memory access token cache.
//!
//! Salesforce and Zoho both exchange a long-lived refresh token for a
//! short-lived access token. The cache refreshes under a lock so concurrent
//! dispatches to the same provider trigger at most one refresh.

use std::time::{Duration, Instant};

use crmsync_domain::{DispatchError, ProviderId};
use reqwest::Method;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::http::HttpClient;

/// Lifetime assumed when the token endpoint does not report one.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);
/// Refresh this long before the reported expiry.
const REFRESH_THRESHOLD: Duration = Duration::from_secs(60);

/// Where the grant parameters go on the token request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GrantEncoding {
    /// `application/x-www-form-urlencoded` body (Salesforce).
    Form,
    /// Query string on an empty POST (Zoho).
    Query,
}

#[derive(Debug, Clone)]
pub(crate) struct RefreshTokenGrant {
    pub provider: ProviderId,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub encoding: GrantEncoding,
}

/// A usable access token and the API host it was issued for, if reported.
#[derive(Debug, Clone)]
pub(crate) struct AccessToken {
    pub value: String,
    pub api_base: Option<String>,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + REFRESH_THRESHOLD < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    /// Salesforce
    instance_url: Option<String>,
    /// Zoho
    api_domain: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

pub(crate) struct TokenCache {
    grant: Option<RefreshTokenGrant>,
    current: Mutex<Option<AccessToken>>,
}

impl TokenCache {
    /// `None` means the provider has no credentials; every call fails with `Auth`.
    pub fn new(grant: Option<RefreshTokenGrant>) -> Self {
        Self { grant, current: Mutex::new(None) }
    }

    pub fn is_configured(&self) -> bool {
        self.grant.is_some()
    }

    /// Cached token, refreshed first if missing or about to expire.
    pub async fn access_token(
        &self,
        http: &HttpClient,
        provider: &ProviderId,
    ) -> Result<AccessToken, DispatchError> {
        let Some(grant) = &self.grant else {
            return Err(DispatchError::auth(provider, "credentials are not configured"));
        };

        let mut current = self.current.lock().await;
        if let Some(token) = current.as_ref().filter(|token| token.is_fresh()) {
            return Ok(token.clone());
        }

        let token = refresh(http, grant).await?;
        *current = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached token so the next call refreshes.
    pub async fn invalidate(&self) {
        if self.current.lock().await.take().is_some() {
            debug!("Access token invalidated");
        }
    }
}

async fn refresh(http: &HttpClient, grant: &RefreshTokenGrant) -> Result<AccessToken, DispatchError> {
    let params = [
        ("grant_type", "refresh_token"),
        ("client_id", grant.client_id.as_str()),
        ("client_secret", grant.client_secret.as_str()),
        ("refresh_token", grant.refresh_token.as_str()),
    ];
    let builder = http.request(Method::POST, grant.token_url.as_str());
    let builder = match grant.encoding {
        GrantEncoding::Form => builder.form(&params),
        GrantEncoding::Query => builder.query(&params),
    };

    let (_, response): (_, TokenResponse) =
        http.send_json(builder).await.map_err(|err| match err {
            // The grant itself was refused (revoked or wrong credentials).
            DispatchError::Rejected { status, message } => DispatchError::auth(
                &grant.provider,
                format!("token refresh rejected ({status}): {message}"),
            ),
            other => other,
        })?;

    if let Some(error) = response.error {
        let detail = response.error_description.unwrap_or_default();
        return Err(DispatchError::auth(
            &grant.provider,
            format!("token refresh failed: {error} {detail}").trim_end().to_string(),
        ));
    }

    let value = response
        .access_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| DispatchError::auth(&grant.provider, "token response had no access_token"))?;

    let lifetime = response.expires_in.map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs);
    info!(provider = %grant.provider, expires_in_secs = lifetime.as_secs(), "Access token refreshed");

    Ok(AccessToken {
        value,
        api_base: response.instance_url.or(response.api_domain),
        expires_at: Instant::now() + lifetime,
    })
}

#[cfg(test)]
mod tests {
    use crmsync_domain::FailureClass;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn grant(server: &MockServer, encoding: GrantEncoding) -> RefreshTokenGrant {
        RefreshTokenGrant {
            provider: ProviderId::new("salesforce"),
            token_url: format!("{}/token", server.uri()),
            client_id: "cid".into(),
            client_secret: "secret".into(),
            refresh_token: "refresh".into(),
            encoding,
        }
    }

    #[tokio::test]
    async fn caches_token_between_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at-1",
                "instance_url": "https://example.my.salesforce.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let http = HttpClient::new().unwrap();
        let cache = TokenCache::new(Some(grant(&server, GrantEncoding::Form)));
        let provider = ProviderId::new("salesforce");

        let first = cache.access_token(&http, &provider).await.unwrap();
        let second = cache.access_token(&http, &provider).await.unwrap();
        assert_eq!(first.value, "at-1");
        assert_eq!(second.api_base.as_deref(), Some("https://example.my.salesforce.com"));
    }

    #[tokio::test]
    async fn invalidate_forces_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(query_param("grant_type", "refresh_token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "access_token": "zoho-at", "expires_in": 3600 })),
            )
            .expect(2)
            .mount(&server)
            .await;

        let http = HttpClient::new().unwrap();
        let cache = TokenCache::new(Some(grant(&server, GrantEncoding::Query)));
        let provider = ProviderId::new("zoho");

        cache.access_token(&http, &provider).await.unwrap();
        cache.invalidate().await;
        cache.access_token(&http, &provider).await.unwrap();
    }

    #[tokio::test]
    async fn refused_grant_is_permanent_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
            .mount(&server)
            .await;

        let http = HttpClient::new().unwrap();
        let cache = TokenCache::new(Some(grant(&server, GrantEncoding::Form)));
        let err = cache.access_token(&http, &ProviderId::new("salesforce")).await.unwrap_err();

        assert!(matches!(err, DispatchError::Auth { .. }), "got {err:?}");
        assert_eq!(err.failure_class(), FailureClass::Permanent);
    }

    #[tokio::test]
    async fn error_in_ok_body_is_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "invalid_code" })))
            .mount(&server)
            .await;

        let http = HttpClient::new().unwrap();
        let cache = TokenCache::new(Some(grant(&server, GrantEncoding::Query)));
        let err = cache.access_token(&http, &ProviderId::new("zoho")).await.unwrap_err();
        assert!(err.to_string().contains("invalid_code"));
    }

    #[tokio::test]
    async fn token_endpoint_outage_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

        let http = HttpClient::new().unwrap();
        let cache = TokenCache::new(Some(grant(&server, GrantEncoding::Form)));
        let err = cache.access_token(&http, &ProviderId::new("salesforce")).await.unwrap_err();
        assert_eq!(err.failure_class(), FailureClass::Transient);
    }

    #[tokio::test]
    async fn missing_grant_fails_without_network() {
        let http = HttpClient::new().unwrap();
        let cache = TokenCache::new(None);
        assert!(!cache.is_configured());
        let err = cache.access_token(&http, &ProviderId::new("zoho")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Auth { .. }));
    }
}
