//! HubSpot adapter
//!
//! Private-app bearer token against the CRM v3 objects API. Call logs become
//! `calls`, leads become `contacts` with the `lead` lifecycle stage and
//! opportunities become `deals`.

use async_trait::async_trait;
use crmsync_core::sync::{ProviderAdapter, ProviderRequest};
use crmsync_domain::{
    has_value, CallDirection, CallLogRecord, DispatchError, HubSpotConfig, LeadRecord,
    OpportunityRecord, ProviderDescriptor, RecordKind, SyncPayload,
};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{insert_opt, reject_as_auth, unsupported};
use crate::http::HttpClient;

pub const PROVIDER_ID: &str = "hubspot";

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: String,
}

pub struct HubSpotAdapter {
    descriptor: ProviderDescriptor,
    base_url: String,
    access_token: Option<String>,
    http: HttpClient,
}

impl HubSpotAdapter {
    pub fn new(config: &HubSpotConfig, http: HttpClient) -> Self {
        Self {
            descriptor: ProviderDescriptor::new(PROVIDER_ID, "HubSpot", &RecordKind::ALL),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone().filter(|token| has_value(Some(token))),
            http,
        }
    }

    fn token(&self) -> Result<&str, DispatchError> {
        self.access_token
            .as_deref()
            .ok_or_else(|| DispatchError::auth(&self.descriptor.id, "access token is not configured"))
    }

    fn map_call_log(record: &CallLogRecord) -> Value {
        let mut properties = Map::new();
        properties.insert("hs_timestamp".into(), json!(record.started_at.to_rfc3339()));
        properties.insert("hs_call_title".into(), json!(record.subject_line()));
        properties.insert(
            "hs_call_direction".into(),
            json!(match record.direction {
                CallDirection::Inbound => "INBOUND",
                CallDirection::Outbound => "OUTBOUND",
            }),
        );
        properties.insert(
            "hs_call_duration".into(),
            json!((u64::from(record.duration_secs) * 1000).to_string()),
        );
        properties.insert("hs_call_from_number".into(), json!(record.from_number));
        properties.insert("hs_call_to_number".into(), json!(record.to_number));
        properties.insert("hs_call_status".into(), json!("COMPLETED"));
        insert_opt(&mut properties, "hs_call_body", record.notes.as_deref());
        insert_opt(&mut properties, "hs_call_disposition", record.disposition.as_deref());
        insert_opt(&mut properties, "hs_call_recording_url", record.recording_url.as_deref());
        json!({ "properties": properties })
    }

    fn map_lead(record: &LeadRecord) -> Value {
        let mut properties = Map::new();
        properties.insert("lastname".into(), json!(record.last_name));
        properties.insert("lifecyclestage".into(), json!("lead"));
        insert_opt(&mut properties, "firstname", record.first_name.as_deref());
        insert_opt(&mut properties, "email", record.email.as_deref());
        insert_opt(&mut properties, "phone", record.phone.as_deref());
        insert_opt(&mut properties, "company", record.company.as_deref());
        insert_opt(&mut properties, "hs_lead_status", record.status.as_deref());
        json!({ "properties": properties })
    }

    fn map_opportunity(record: &OpportunityRecord) -> Value {
        let mut properties = Map::new();
        properties.insert("dealname".into(), json!(record.name));
        properties.insert("dealstage".into(), json!(record.stage));
        if let Some(amount) = record.amount {
            properties.insert("amount".into(), json!(amount.to_string()));
        }
        if let Some(close_date) = record.close_date {
            properties.insert("closedate".into(), json!(close_date.to_string()));
        }
        insert_opt(&mut properties, "deal_currency_code", record.currency.as_deref());
        json!({ "properties": properties })
    }
}

#[async_trait]
impl ProviderAdapter for HubSpotAdapter {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn is_configured(&self) -> bool {
        self.access_token.is_some()
    }

    async fn authenticate(&self) -> Result<(), DispatchError> {
        self.token().map(|_| ())
    }

    fn map_payload(
        &self,
        kind: RecordKind,
        payload: &SyncPayload,
    ) -> Result<ProviderRequest, DispatchError> {
        if !self.descriptor.supports(kind) {
            return Err(unsupported(&self.descriptor, kind));
        }
        let (object, body) = match kind {
            RecordKind::CallLog => ("calls", Self::map_call_log(&payload.decode()?)),
            RecordKind::Lead => ("contacts", Self::map_lead(&payload.decode()?)),
            RecordKind::Opportunity => ("deals", Self::map_opportunity(&payload.decode()?)),
        };
        Ok(ProviderRequest::new(object, body))
    }

    async fn send(&self, request: ProviderRequest) -> Result<String, DispatchError> {
        let token = self.token()?;
        let url = format!("{}/crm/v3/objects/{}", self.base_url, request.object);
        debug!(object = %request.object, idempotency_key = ?request.idempotency_key, "Creating HubSpot object");

        let builder = self.http.request(Method::POST, url).bearer_auth(token).json(&request.body);
        let (_, response): (_, CreateResponse) = self
            .http
            .send_json(builder)
            .await
            .map_err(|err| reject_as_auth(&self.descriptor.id, err))?;
        Ok(response.id)
    }
}
