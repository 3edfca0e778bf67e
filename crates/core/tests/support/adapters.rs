//! Adapter stub that only answers descriptor/configuration questions.

use async_trait::async_trait;
use crmsync_core::sync::ports::{ProviderAdapter, ProviderRequest};
use crmsync_domain::{DispatchError, ProviderDescriptor, RecordKind, SyncPayload};
use serde_json::json;

pub struct StubAdapter {
    descriptor: ProviderDescriptor,
    configured: bool,
}

impl StubAdapter {
    pub fn new(id: &str, name: &str, configured: bool) -> Self {
        Self {
            descriptor: ProviderDescriptor::new(id, name, &RecordKind::ALL),
            configured,
        }
    }
}

#[async_trait]
impl ProviderAdapter for StubAdapter {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn authenticate(&self) -> Result<(), DispatchError> {
        Ok(())
    }

    fn map_payload(
        &self,
        kind: RecordKind,
        payload: &SyncPayload,
    ) -> Result<ProviderRequest, DispatchError> {
        Ok(ProviderRequest::new(kind.to_string(), json!({ "record": payload.as_value() })))
    }

    async fn send(&self, _request: ProviderRequest) -> Result<String, DispatchError> {
        Ok("stub-1".to_string())
    }
}
