//! Pipedrive adapter
//!
//! API-token authentication (query parameter). Call logs become activities
//! of type `call` and opportunities become deals. Pipedrive leads live in a
//! separate inbox API that is not mapped, so lead items fail as unsupported.

use async_trait::async_trait;
use crmsync_core::sync::{ProviderAdapter, ProviderRequest};
use crmsync_domain::{
    has_value, CallLogRecord, DispatchError, OpportunityRecord, PipedriveConfig,
    ProviderDescriptor, RecordKind, SyncPayload,
};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{insert_opt, reject_as_auth, unsupported};
use crate::http::HttpClient;

pub const PROVIDER_ID: &str = "pipedrive";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

pub struct PipedriveAdapter {
    descriptor: ProviderDescriptor,
    base_url: String,
    api_token: Option<String>,
    http: HttpClient,
}

impl PipedriveAdapter {
    pub fn new(config: &PipedriveConfig, http: HttpClient) -> Self {
        Self {
            descriptor: ProviderDescriptor::new(
                PROVIDER_ID,
                "Pipedrive",
                &[RecordKind::CallLog, RecordKind::Opportunity],
            ),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone().filter(|token| has_value(Some(token))),
            http,
        }
    }

    fn token(&self) -> Result<&str, DispatchError> {
        self.api_token
            .as_deref()
            .ok_or_else(|| DispatchError::auth(&self.descriptor.id, "API token is not configured"))
    }

    fn map_call_log(record: &CallLogRecord) -> Value {
        let mut activity = Map::new();
        activity.insert("subject".into(), json!(record.subject_line()));
        activity.insert("type".into(), json!("call"));
        activity.insert("done".into(), json!(1));
        activity.insert("due_date".into(), json!(record.started_at.format("%Y-%m-%d").to_string()));
        activity.insert("due_time".into(), json!(record.started_at.format("%H:%M").to_string()));
        activity.insert("duration".into(), json!(hours_minutes(record.duration_secs)));
        insert_opt(&mut activity, "note", record.notes.as_deref());
        Value::Object(activity)
    }

    fn map_opportunity(record: &OpportunityRecord) -> Value {
        let mut deal = Map::new();
        deal.insert("title".into(), json!(record.name));
        // Pipedrive stages are numeric ids; named stages are left to the pipeline default.
        if let Ok(stage_id) = record.stage.trim().parse::<u64>() {
            deal.insert("stage_id".into(), json!(stage_id));
        }
        if let Some(amount) = record.amount {
            deal.insert("value".into(), json!(amount));
        }
        insert_opt(&mut deal, "currency", record.currency.as_deref());
        if let Some(close_date) = record.close_date {
            deal.insert("expected_close_date".into(), json!(close_date.to_string()));
        }
        if let Some(probability) = record.probability {
            deal.insert("probability".into(), json!(probability));
        }
        Value::Object(deal)
    }
}

/// Activity durations are `HH:MM`, rounded up to the minute.
fn hours_minutes(secs: u32) -> String {
    let minutes = secs.div_ceil(60);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

#[async_trait]
impl ProviderAdapter for PipedriveAdapter {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn is_configured(&self) -> bool {
        self.api_token.is_some()
    }

    async fn authenticate(&self) -> Result<(), DispatchError> {
        self.token().map(|_| ())
    }

    fn map_payload(
        &self,
        kind: RecordKind,
        payload: &SyncPayload,
    ) -> Result<ProviderRequest, DispatchError> {
        match kind {
            RecordKind::CallLog => {
                Ok(ProviderRequest::new("activities", Self::map_call_log(&payload.decode()?)))
            }
            RecordKind::Opportunity => {
                Ok(ProviderRequest::new("deals", Self::map_opportunity(&payload.decode()?)))
            }
            RecordKind::Lead => Err(unsupported(&self.descriptor, kind)),
        }
    }

    async fn send(&self, request: ProviderRequest) -> Result<String, DispatchError> {
        let token = self.token()?;
        let url = format!("{}/{}", self.base_url, request.object);
        debug!(object = %request.object, idempotency_key = ?request.idempotency_key, "Creating Pipedrive record");

        let builder =
            self.http.request(Method::POST, url).query(&[("api_token", token)]).json(&request.body);
        let (_, response): (_, ApiResponse) = self
            .http
            .send_json(builder)
            .await
            .map_err(|err| reject_as_auth(&self.descriptor.id, err))?;

        if !response.success {
            return Err(DispatchError::Rejected {
                status: 400,
                message: response.error.unwrap_or_else(|| "Pipedrive reported failure".into()),
            });
        }

        response
            .data
            .as_ref()
            .and_then(|data| data.get("id"))
            .and_then(|id| id.as_u64().map(|n| n.to_string()).or_else(|| id.as_str().map(str::to_string)))
            .ok_or_else(|| DispatchError::Unclassified("Pipedrive success without record id".into()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn adapter() -> PipedriveAdapter {
        let config = PipedriveConfig { api_token: Some("tok".into()), ..PipedriveConfig::default() };
        PipedriveAdapter::new(&config, HttpClient::new().unwrap())
    }

    #[test]
    fn leads_are_unsupported() {
        let payload = SyncPayload::new(json!({ "leadId": "1", "lastName": "Knuth" })).unwrap();
        let err = adapter().map_payload(RecordKind::Lead, &payload).unwrap_err();
        assert!(matches!(err, DispatchError::UnsupportedKind { kind: RecordKind::Lead, .. }));
        assert!(!adapter().descriptor().supports(RecordKind::Lead));
    }

    #[test]
    fn call_log_becomes_done_call_activity() {
        let payload = SyncPayload::new(json!({
            "callId": "c",
            "direction": "outbound",
            "fromNumber": "+1",
            "toNumber": "+2",
            "startedAt": "2024-05-01T09:30:00Z",
            "durationSecs": 61
        }))
        .unwrap();

        let request = adapter().map_payload(RecordKind::CallLog, &payload).unwrap();
        assert_eq!(request.object, "activities");
        assert_eq!(request.body["type"], "call");
        assert_eq!(request.body["done"], 1);
        assert_eq!(request.body["due_time"], "09:30");
        assert_eq!(request.body["duration"], "00:02");
    }

    #[test]
    fn numeric_stage_becomes_stage_id() {
        let numeric =
            SyncPayload::new(json!({ "opportunityId": "o", "name": "Deal", "stage": "4" })).unwrap();
        let named =
            SyncPayload::new(json!({ "opportunityId": "o", "name": "Deal", "stage": "Won" })).unwrap();

        assert_eq!(adapter().map_payload(RecordKind::Opportunity, &numeric).unwrap().body["stage_id"], 4);
        assert!(adapter().map_payload(RecordKind::Opportunity, &named).unwrap().body.get("stage_id").is_none());
    }

    #[test]
    fn durations_round_up_to_minutes() {
        assert_eq!(hours_minutes(0), "00:00");
        assert_eq!(hours_minutes(59), "00:01");
        assert_eq!(hours_minutes(3660), "01:01");
    }
}
