//! Zoho CRM adapter
//!
//! OAuth refresh-token grant (parameters on the query string) and the v2
//! records API. Records are wrapped in a `{ "data": [...] }` envelope and
//! every record carries its own status code in the response.

use async_trait::async_trait;
use crmsync_core::sync::{ProviderAdapter, ProviderRequest};
use crmsync_domain::{
    has_value, CallDirection, CallLogRecord, DispatchError, LeadRecord, OpportunityRecord,
    ProviderDescriptor, RecordKind, SyncPayload, ZohoConfig,
};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::oauth::{GrantEncoding, RefreshTokenGrant, TokenCache};
use super::{insert_opt, unsupported};
use crate::http::HttpClient;

pub const PROVIDER_ID: &str = "zoho";

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    #[serde(default)]
    data: Vec<RecordResult>,
}

#[derive(Debug, Deserialize)]
struct RecordResult {
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Value,
}

pub struct ZohoAdapter {
    descriptor: ProviderDescriptor,
    api_base_url: String,
    http: HttpClient,
    tokens: TokenCache,
}

impl ZohoAdapter {
    pub fn new(config: &ZohoConfig, http: HttpClient) -> Self {
        let descriptor = ProviderDescriptor::new(PROVIDER_ID, "Zoho CRM", &RecordKind::ALL);
        let configured = has_value(config.client_id.as_ref())
            && has_value(config.client_secret.as_ref())
            && has_value(config.refresh_token.as_ref());

        let grant = configured.then(|| RefreshTokenGrant {
            provider: descriptor.id.clone(),
            token_url: format!("{}/oauth/v2/token", config.accounts_url.trim_end_matches('/')),
            client_id: config.client_id.clone().unwrap_or_default(),
            client_secret: config.client_secret.clone().unwrap_or_default(),
            refresh_token: config.refresh_token.clone().unwrap_or_default(),
            encoding: GrantEncoding::Query,
        });

        Self {
            descriptor,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            http,
            tokens: TokenCache::new(grant),
        }
    }

    fn map_call_log(record: &CallLogRecord) -> Value {
        let mut call = Map::new();
        call.insert("Subject".into(), json!(record.subject_line()));
        call.insert(
            "Call_Type".into(),
            json!(match record.direction {
                CallDirection::Inbound => "Inbound",
                CallDirection::Outbound => "Outbound",
            }),
        );
        call.insert(
            "Call_Start_Time".into(),
            json!(record.started_at.format("%Y-%m-%dT%H:%M:%S+00:00").to_string()),
        );
        call.insert("Call_Duration".into(), json!(call_duration(record.duration_secs)));
        insert_opt(&mut call, "Call_Result", record.disposition.as_deref());
        insert_opt(&mut call, "Description", record.notes.as_deref());
        Value::Object(call)
    }

    fn map_lead(record: &LeadRecord) -> Value {
        let mut lead = Map::new();
        lead.insert("Last_Name".into(), json!(record.last_name));
        insert_opt(&mut lead, "First_Name", record.first_name.as_deref());
        insert_opt(&mut lead, "Email", record.email.as_deref());
        insert_opt(&mut lead, "Phone", record.phone.as_deref());
        insert_opt(&mut lead, "Company", record.company.as_deref());
        insert_opt(&mut lead, "Lead_Status", record.status.as_deref());
        insert_opt(&mut lead, "Lead_Source", record.source.as_deref());
        Value::Object(lead)
    }

    fn map_opportunity(record: &OpportunityRecord) -> Value {
        let mut deal = Map::new();
        deal.insert("Deal_Name".into(), json!(record.name));
        deal.insert("Stage".into(), json!(record.stage));
        if let Some(amount) = record.amount {
            deal.insert("Amount".into(), json!(amount));
        }
        if let Some(close_date) = record.close_date {
            deal.insert("Closing_Date".into(), json!(close_date.to_string()));
        }
        if let Some(probability) = record.probability {
            deal.insert("Probability".into(), json!(probability));
        }
        Value::Object(deal)
    }
}

/// Zoho expects call durations as `mm:ss`.
fn call_duration(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[async_trait]
impl ProviderAdapter for ZohoAdapter {
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
        let (module, record) = match kind {
            RecordKind::CallLog => ("Calls", Self::map_call_log(&payload.decode()?)),
            RecordKind::Lead => ("Leads", Self::map_lead(&payload.decode()?)),
            RecordKind::Opportunity => ("Deals", Self::map_opportunity(&payload.decode()?)),
        };
        Ok(ProviderRequest::new(module, json!({ "data": [record] })))
    }

    async fn send(&self, request: ProviderRequest) -> Result<String, DispatchError> {
        let token = self.tokens.access_token(&self.http, &self.descriptor.id).await?;
        let api_base = token.api_base.as_deref().unwrap_or(&self.api_base_url);
        let url = format!("{}/crm/v2/{}", api_base.trim_end_matches('/'), request.object);
        debug!(module = %request.object, idempotency_key = ?request.idempotency_key, "Creating Zoho record");

        let builder = self
            .http
            .request(Method::POST, url)
            .header(reqwest::header::AUTHORIZATION, format!("Zoho-oauthtoken {}", token.value))
            .json(&request.body);

        let result = self.http.send_json::<RecordsResponse>(builder).await;
        let (_, response) = match result {
            Ok(ok) => ok,
            Err(DispatchError::Rejected { status: 401, .. }) => {
                self.tokens.invalidate().await;
                return Err(DispatchError::Unclassified("Zoho access token rejected (401)".into()));
            }
            Err(err) => return Err(err),
        };

        let record = response.data.into_iter().next().ok_or_else(|| {
            DispatchError::Unclassified("Zoho response contained no record result".into())
        })?;

        if record.code != "SUCCESS" {
            return Err(DispatchError::Rejected {
                status: 422,
                message: format!("{}: {}", record.code, record.message),
            });
        }

        record
            .details
            .get("id")
            .and_then(|id| id.as_str().map(str::to_string).or_else(|| id.as_u64().map(|n| n.to_string())))
            .ok_or_else(|| DispatchError::Unclassified("Zoho success without record id".into()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn adapter() -> ZohoAdapter {
        ZohoAdapter::new(&ZohoConfig::default(), HttpClient::new().unwrap())
    }

    #[test]
    fn durations_are_minutes_and_seconds() {
        assert_eq!(call_duration(0), "00:00");
        assert_eq!(call_duration(61), "01:01");
        assert_eq!(call_duration(3600), "60:00");
    }

    #[test]
    fn records_are_wrapped_in_data_envelope() {
        let payload = SyncPayload::new(json!({
            "opportunityId": "o-1",
            "name": "Expansion",
            "stage": "Negotiation/Review",
            "amount": 1200.5,
            "closeDate": "2024-09-30"
        }))
        .unwrap();

        let request = adapter().map_payload(RecordKind::Opportunity, &payload).unwrap();
        assert_eq!(request.object, "Deals");
        let deal = &request.body["data"][0];
        assert_eq!(deal["Deal_Name"], "Expansion");
        assert_eq!(deal["Closing_Date"], "2024-09-30");
        assert_eq!(deal["Amount"], 1200.5);
    }

    #[test]
    fn call_start_time_uses_zoho_format() {
        let payload = SyncPayload::new(json!({
            "callId": "c",
            "direction": "inbound",
            "fromNumber": "+1",
            "toNumber": "+2",
            "startedAt": "2024-05-01T10:00:05Z",
            "durationSecs": 125
        }))
        .unwrap();

        let request = adapter().map_payload(RecordKind::CallLog, &payload).unwrap();
        let call = &request.body["data"][0];
        assert_eq!(call["Call_Start_Time"], "2024-05-01T10:00:05+00:00");
        assert_eq!(call["Call_Duration"], "02:05");
        assert_eq!(call["Call_Type"], "Inbound");
    }
}
