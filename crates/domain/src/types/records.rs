//! Typed record shapes carried in sync payloads
//!
//! Payloads are stored as JSON snapshots; adapters decode them into these
//! shapes inside `map_payload`. Field names are camelCase on the wire.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a logged call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

crate::impl_domain_status_conversions!(CallDirection {
    Inbound => "inbound",
    Outbound => "outbound",
});

/// A completed phone call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallLogRecord {
    pub call_id: String,
    pub direction: CallDirection,
    pub from_number: String,
    pub to_number: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_secs: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
}

impl CallLogRecord {
    /// Subject line, falling back to a generated one.
    pub fn subject_line(&self) -> String {
        self.subject.clone().unwrap_or_else(|| match self.direction {
            CallDirection::Inbound => format!("Inbound call from {}", self.from_number),
            CallDirection::Outbound => format!("Outbound call to {}", self.to_number),
        })
    }

    /// Number on the far side of the call.
    pub fn counterpart_number(&self) -> &str {
        match self.direction {
            CallDirection::Inbound => &self.from_number,
            CallDirection::Outbound => &self.to_number,
        }
    }
}

/// A prospective customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRecord {
    pub lead_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl LeadRecord {
    pub fn full_name(&self) -> String {
        match &self.first_name {
            Some(first) if !first.trim().is_empty() => format!("{} {}", first.trim(), self.last_name),
            _ => self.last_name.clone(),
        }
    }
}

/// A sales opportunity / deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityRecord {
    pub opportunity_id: String,
    pub name: String,
    pub stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<u8>,
}
