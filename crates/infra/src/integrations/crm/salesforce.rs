//! Salesforce adapter
//!
//! Authenticates with the OAuth refresh-token grant and creates sObjects
//! through the REST API: call logs become `Task` records with the `Call`
//! subtype, leads become `Lead`, opportunities become `Opportunity`.

use async_trait::async_trait;
use crmsync_core::sync::{ProviderAdapter, ProviderRequest};
use crmsync_domain::{
    has_value, CallDirection, CallLogRecord, DispatchError, LeadRecord, OpportunityRecord,
    ProviderDescriptor, RecordKind, SalesforceConfig, SyncPayload,
};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::oauth::{GrantEncoding, RefreshTokenGrant, TokenCache};
use super::{insert_opt, unsupported};
use crate::http::HttpClient;

pub const PROVIDER_ID: &str = "salesforce";

/// Placeholder for the required `Company` field on leads without one.
const UNKNOWN_COMPANY: &str = "[not provided]";

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: Option<String>,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<Value>,
}

pub struct SalesforceAdapter {
    descriptor: ProviderDescriptor,
    api_version: String,
    http: HttpClient,
    tokens: TokenCache,
}

impl SalesforceAdapter {
    pub fn new(config: &SalesforceConfig, http: HttpClient) -> Self {
        let descriptor = ProviderDescriptor::new(PROVIDER_ID, "Salesforce", &RecordKind::ALL);
        let configured = has_value(config.client_id.as_ref())
            && has_value(config.client_secret.as_ref())
            && has_value(config.refresh_token.as_ref());

        let grant = configured.then(|| RefreshTokenGrant {
            provider: descriptor.id.clone(),
            token_url: format!("{}/services/oauth2/token", config.login_url.trim_end_matches('/')),
            client_id: config.client_id.clone().unwrap_or_default(),
            client_secret: config.client_secret.clone().unwrap_or_default(),
            refresh_token: config.refresh_token.clone().unwrap_or_default(),
            encoding: GrantEncoding::Form,
        });

        Self {
            descriptor,
            api_version: config.api_version.clone(),
            http,
            tokens: TokenCache::new(grant),
        }
    }

    fn map_call_log(record: &CallLogRecord) -> Value {
        let mut task = Map::new();
        task.insert("Subject".into(), json!(record.subject_line()));
        task.insert("TaskSubtype".into(), json!("Call"));
        task.insert("Status".into(), json!("Completed"));
        task.insert("ActivityDate".into(), json!(record.started_at.date_naive().to_string()));
        task.insert(
            "CallType".into(),
            json!(match record.direction {
                CallDirection::Inbound => "Inbound",
                CallDirection::Outbound => "Outbound",
            }),
        );
        task.insert("CallDurationInSeconds".into(), json!(record.duration_secs));
        task.insert("CallObject".into(), json!(record.call_id));
        insert_opt(&mut task, "CallDisposition", record.disposition.as_deref());
        insert_opt(&mut task, "Description", record.notes.as_deref());
        Value::Object(task)
    }

    fn map_lead(record: &LeadRecord) -> Value {
        let mut lead = Map::new();
        lead.insert("LastName".into(), json!(record.last_name));
        lead.insert(
            "Company".into(),
            json!(record.company.as_deref().filter(|c| !c.trim().is_empty()).unwrap_or(UNKNOWN_COMPANY)),
        );
        insert_opt(&mut lead, "FirstName", record.first_name.as_deref());
        insert_opt(&mut lead, "Email", record.email.as_deref());
        insert_opt(&mut lead, "Phone", record.phone.as_deref());
        insert_opt(&mut lead, "Status", record.status.as_deref());
        insert_opt(&mut lead, "LeadSource", record.source.as_deref());
        Value::Object(lead)
    }

    fn map_opportunity(record: &OpportunityRecord) -> Result<Value, DispatchError> {
        let close_date = record.close_date.ok_or_else(|| {
            DispatchError::InvalidPayload("closeDate is required for Salesforce opportunities".into())
        })?;

        let mut opportunity = Map::new();
        opportunity.insert("Name".into(), json!(record.name));
        opportunity.insert("StageName".into(), json!(record.stage));
        opportunity.insert("CloseDate".into(), json!(close_date.to_string()));
        if let Some(amount) = record.amount {
            opportunity.insert("Amount".into(), json!(amount));
        }
        if let Some(probability) = record.probability {
            opportunity.insert("Probability".into(), json!(probability));
        }
        Ok(Value::Object(opportunity))
    }
}

#[async_trait]
impl ProviderAdapter for SalesforceAdapter {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn is_configured(&self) -> bool {
        self.tokens.is_configured()
    }

    async fn authenticate(&self) -> Result<(), DispatchError> {
        self.tokens.access_token(&self.http, &self.descriptor.id).await.map(|_| ())
    }

    fn map_payload(
        &self,
        kind: RecordKind,
        payload: &SyncPayload,
    ) -> Result<ProviderRequest, DispatchError> {
        if !self.descriptor.supports(kind) {
            return Err(unsupported(&self.descriptor, kind));
        }
        match kind {
            RecordKind::CallLog => {
                Ok(ProviderRequest::new("Task", Self::map_call_log(&payload.decode()?)))
            }
            RecordKind::Lead => Ok(ProviderRequest::new("Lead", Self::map_lead(&payload.decode()?))),
            RecordKind::Opportunity => Ok(ProviderRequest::new(
                "Opportunity",
                Self::map_opportunity(&payload.decode()?)?,
            )),
        }
    }

    async fn send(&self, request: ProviderRequest) -> Result<String, DispatchError> {
        let token = self.tokens.access_token(&self.http, &self.descriptor.id).await?;
        let instance_url = token.api_base.as_deref().ok_or_else(|| {
            DispatchError::auth(&self.descriptor.id, "token response had no instance_url")
        })?;
        let url = format!(
            "{}/services/data/{}/sobjects/{}/",
            instance_url.trim_end_matches('/'),
            self.api_version,
            request.object
        );
        debug!(object = %request.object, idempotency_key = ?request.idempotency_key, "Creating Salesforce record");

        let builder = self.http.request(Method::POST, url).bearer_auth(&token.value).json(&request.body);
        let (_, response): (_, CreateResponse) = match self.http.send_json(builder).await {
            Ok(ok) => ok,
            Err(DispatchError::Rejected { status: 401, .. }) => {
                // Session expired or revoked; the next attempt refreshes.
                self.tokens.invalidate().await;
                return Err(DispatchError::Unclassified("Salesforce session rejected (401)".into()));
            }
            Err(err) => return Err(err),
        };

        match response.id {
            Some(id) if response.success => Ok(id),
            _ => Err(DispatchError::Rejected {
                status: 400,
                message: format!("Salesforce create failed: {}", Value::Array(response.errors)),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn adapter() -> SalesforceAdapter {
        SalesforceAdapter::new(&SalesforceConfig::default(), HttpClient::new().unwrap())
    }

    #[test]
    fn call_log_maps_to_call_task() {
        let payload = SyncPayload::new(json!({
            "callId": "c-1",
            "direction": "inbound",
            "fromNumber": "+15550001",
            "toNumber": "+15550002",
            "startedAt": "2024-05-01T10:00:00Z",
            "durationSecs": 61,
            "disposition": "Connected"
        }))
        .unwrap();

        let request = adapter().map_payload(RecordKind::CallLog, &payload).unwrap();
        assert_eq!(request.object, "Task");
        assert_eq!(request.body["TaskSubtype"], "Call");
        assert_eq!(request.body["CallType"], "Inbound");
        assert_eq!(request.body["ActivityDate"], "2024-05-01");
        assert_eq!(request.body["CallDurationInSeconds"], 61);
        assert_eq!(request.body["CallDisposition"], "Connected");
        assert!(request.body.get("Description").is_none());
    }

    #[test]
    fn lead_without_company_gets_placeholder() {
        let payload = SyncPayload::new(json!({ "leadId": "l-1", "lastName": "Hopper" })).unwrap();
        let request = adapter().map_payload(RecordKind::Lead, &payload).unwrap();
        assert_eq!(request.body["Company"], UNKNOWN_COMPANY);
        assert_eq!(request.body["LastName"], "Hopper");
    }

    #[test]
    fn opportunity_without_close_date_is_invalid() {
        let payload =
            SyncPayload::new(json!({ "opportunityId": "o-1", "name": "Renewal", "stage": "Prospecting" }))
                .unwrap();
        let err = adapter().map_payload(RecordKind::Opportunity, &payload).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidPayload(_)));
    }

    #[test]
    fn undecodable_payload_is_invalid() {
        let payload = SyncPayload::new(json!({ "unexpected": true })).unwrap();
        let err = adapter().map_payload(RecordKind::CallLog, &payload).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn unconfigured_adapter_fails_authentication() {
        let adapter = adapter();
        assert!(!adapter.is_configured());
        assert!(matches!(adapter.authenticate().await, Err(DispatchError::Auth { .. })));
    }
}
