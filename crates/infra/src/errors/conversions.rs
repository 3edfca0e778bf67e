//! Conversions from external infrastructure errors into domain errors.

use crmsync_domain::{CrmSyncError, DispatchError};
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CrmSyncError);

impl From<InfraError> for CrmSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CrmSyncError> for InfraError {
    fn from(value: CrmSyncError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoCrmSyncError {
    fn into_crmsync(self) -> CrmSyncError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → CrmSyncError */
/* -------------------------------------------------------------------------- */

impl IntoCrmSyncError for HttpError {
    fn into_crmsync(self) -> CrmSyncError {
        if self.is_timeout() {
            return CrmSyncError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return CrmSyncError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => CrmSyncError::Auth(message),
                404 => CrmSyncError::NotFound(message),
                400..=499 if code != 429 => CrmSyncError::InvalidItem(message),
                _ => CrmSyncError::Network(message),
            };
        }

        CrmSyncError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_crmsync())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → DispatchError */
/* -------------------------------------------------------------------------- */

/// Classify a transport-level failure from a provider call.
///
/// Errors carrying an HTTP status go through [`DispatchError::from_status`];
/// everything else (timeouts, refused connections, broken bodies) is a
/// network failure.
pub fn dispatch_error_from_http(err: &HttpError) -> DispatchError {
    if let Some(status) = err.status() {
        return DispatchError::from_status(status.as_u16(), err.to_string());
    }
    if err.is_timeout() {
        return DispatchError::Network("HTTP request timed out".into());
    }
    if err.is_connect() {
        return DispatchError::Network(format!("HTTP connection failure: {err}"));
    }
    if err.is_decode() {
        return DispatchError::Unclassified(format!("unreadable provider response: {err}"));
    }
    DispatchError::Network(err.to_string())
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use crmsync_domain::FailureClass;
    use reqwest::{Client, StatusCode};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn status_error(status: StatusCode) -> HttpError {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(status)).mount(&server).await;

        let client = Client::builder().no_proxy().build().unwrap();
        client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err()
    }

    #[tokio::test]
    async fn http_status_401_maps_to_auth_error() {
        let mapped: CrmSyncError = InfraError::from(status_error(StatusCode::UNAUTHORIZED).await).into();
        match mapped {
            CrmSyncError::Auth(msg) => assert!(msg.contains("401")),
            other => panic!("expected auth error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn http_status_errors_classify_for_dispatch() {
        let too_many = dispatch_error_from_http(&status_error(StatusCode::TOO_MANY_REQUESTS).await);
        assert_eq!(too_many.failure_class(), FailureClass::Transient);

        let bad_request = dispatch_error_from_http(&status_error(StatusCode::BAD_REQUEST).await);
        assert_eq!(bad_request.failure_class(), FailureClass::Permanent);
    }

    #[tokio::test]
    async fn connection_refused_is_transient() {
        let client = Client::builder().no_proxy().build().unwrap();
        let err = client.get("http://127.0.0.1:1").send().await.unwrap_err();

        let mapped = dispatch_error_from_http(&err);
        assert_eq!(mapped.failure_class(), FailureClass::Transient);
        assert!(matches!(InfraError::from(err).0, CrmSyncError::Network(_)));
    }
}
