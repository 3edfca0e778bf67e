//! CRM provider adapters
//!
//! One [`ProviderAdapter`] per supported CRM. [`build_registry`] registers
//! all of them; providers without credentials are registered unconfigured
//! and fail authentication at dispatch time.

pub mod hubspot;
mod oauth;
pub mod pipedrive;
pub mod salesforce;
pub mod zoho;

use std::sync::Arc;

use crmsync_core::sync::ProviderRegistry;
use crmsync_domain::{DispatchError, ProviderDescriptor, ProviderId, ProvidersConfig, RecordKind};
use serde_json::{Map, Value};
use tracing::info;

pub use hubspot::HubSpotAdapter;
pub use pipedrive::PipedriveAdapter;
pub use salesforce::SalesforceAdapter;
pub use zoho::ZohoAdapter;

use crate::http::HttpClient;

/// Register every adapter, configured from `providers`.
pub fn build_registry(providers: &ProvidersConfig, http: &HttpClient) -> ProviderRegistry {
    let registry = ProviderRegistry::new()
        .with_adapter(Arc::new(SalesforceAdapter::new(
            &providers.salesforce.clone().unwrap_or_default(),
            http.clone(),
        )))
        .with_adapter(Arc::new(HubSpotAdapter::new(
            &providers.hubspot.clone().unwrap_or_default(),
            http.clone(),
        )))
        .with_adapter(Arc::new(ZohoAdapter::new(&providers.zoho.clone().unwrap_or_default(), http.clone())))
        .with_adapter(Arc::new(PipedriveAdapter::new(
            &providers.pipedrive.clone().unwrap_or_default(),
            http.clone(),
        )));

    let configured: Vec<String> = registry
        .supported_providers()
        .into_iter()
        .filter(|provider| provider.configured)
        .map(|provider| provider.id.to_string())
        .collect();
    info!(providers = registry.len(), configured = ?configured, "Provider registry built");
    registry
}

pub(crate) fn unsupported(descriptor: &ProviderDescriptor, kind: RecordKind) -> DispatchError {
    DispatchError::UnsupportedKind { provider: descriptor.id.clone(), kind }
}

/// 401/403 from a static-token provider: the token will not get better.
pub(crate) fn reject_as_auth(provider: &ProviderId, err: DispatchError) -> DispatchError {
    match err {
        DispatchError::Rejected { status: status @ (401 | 403), message } => {
            DispatchError::auth(provider, format!("credentials rejected ({status}): {message}"))
        }
        other => other,
    }
}

/// Insert `value` under `key` when present and not blank.
pub(crate) fn insert_opt(map: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use crmsync_domain::{FailureClass, HubSpotConfig};

    use super::*;

    #[test]
    fn registry_lists_all_providers_with_configuration() {
        let providers = ProvidersConfig {
            hubspot: Some(HubSpotConfig { access_token: Some("pat".into()), ..HubSpotConfig::default() }),
            ..ProvidersConfig::default()
        };
        let registry = build_registry(&providers, &HttpClient::new().unwrap());

        let listed = registry.supported_providers();
        let ids: Vec<_> = listed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["hubspot", "pipedrive", "salesforce", "zoho"]);
        assert!(registry.is_configured(&ProviderId::new("hubspot")));
        assert!(!registry.is_configured(&ProviderId::new("salesforce")));
        assert_eq!(listed[1].capabilities, vec![RecordKind::CallLog, RecordKind::Opportunity]);
    }

    #[test]
    fn static_token_rejections_become_auth() {
        let provider = ProviderId::new("pipedrive");
        let err = reject_as_auth(&provider, DispatchError::from_status(401, "unauthorized"));
        assert!(matches!(err, DispatchError::Auth { .. }));
        assert_eq!(err.failure_class(), FailureClass::Permanent);

        let untouched = reject_as_auth(&provider, DispatchError::from_status(503, "down"));
        assert_eq!(untouched.failure_class(), FailureClass::Transient);
    }

    #[test]
    fn insert_opt_skips_blank_values() {
        let mut map = Map::new();
        insert_opt(&mut map, "a", Some(" x "));
        insert_opt(&mut map, "b", Some("   "));
        insert_opt(&mut map, "c", None);
        assert_eq!(map.len(), 1);
        assert_eq!(map["a"], "x");
    }
}
