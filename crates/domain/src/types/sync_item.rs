//! Sync item model and lifecycle transitions

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::provider::ProviderId;
use crate::constants::MAX_ERROR_LEN;
use crate::errors::{CrmSyncError, DispatchError, Result};
use crate::impl_domain_status_conversions;

/// Unique, time-ordered identifier of a queued item (UUID v7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncItemId(Uuid);

impl SyncItemId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SyncItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SyncItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SyncItemId {
    type Err = CrmSyncError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| CrmSyncError::InvalidItem(format!("invalid item id '{s}': {e}")))
    }
}

impl From<Uuid> for SyncItemId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Kind of local record being propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKind {
    CallLog,
    Lead,
    Opportunity,
}

impl RecordKind {
    pub const ALL: [Self; 3] = [Self::CallLog, Self::Lead, Self::Opportunity];
}

impl_domain_status_conversions!(RecordKind {
    CallLog => "call-log",
    Lead => "lead",
    Opportunity => "opportunity",
});

/// What the provider should do with the record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum SyncAction {
    #[default]
    CreateOrUpdate,
}

impl_domain_status_conversions!(SyncAction {
    CreateOrUpdate => "create-or-update",
});

/// Lifecycle status of a sync item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    Pending,
    InFlight,
    Completed,
    FailedRetryable,
    FailedTerminal,
}

impl_domain_status_conversions!(SyncStatus {
    Pending => "pending",
    InFlight => "in-flight",
    Completed => "completed",
    FailedRetryable => "failed-retryable",
    FailedTerminal => "failed-terminal",
});

impl SyncStatus {
    /// `completed` and `failed-terminal` never dispatch again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::FailedTerminal)
    }

    /// Statuses from which an item may be claimed.
    pub fn is_claimable(self) -> bool {
        matches!(self, Self::Pending | Self::FailedRetryable)
    }
}

/// Foreign reference used for status lookups, written `kind:value`
/// (e.g. `call:abc`, `lead:42`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CorrelationKey {
    kind: String,
    value: String,
}

impl CorrelationKey {
    pub fn new(kind: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let kind = kind.as_ref().trim().to_ascii_lowercase();
        let value = value.as_ref().trim().to_string();
        if kind.is_empty() || value.is_empty() {
            return Err(CrmSyncError::InvalidItem(
                "correlation key needs both a kind and a value".to_string(),
            ));
        }
        if kind.contains(char::is_whitespace) {
            return Err(CrmSyncError::InvalidItem(format!(
                "correlation key kind '{kind}' contains whitespace"
            )));
        }
        Ok(Self { kind, value })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

impl FromStr for CorrelationKey {
    type Err = CrmSyncError;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, value) = s.split_once(':').ok_or_else(|| {
            CrmSyncError::InvalidItem(format!("correlation key '{s}' must look like kind:value"))
        })?;
        Self::new(kind, value)
    }
}

impl TryFrom<String> for CorrelationKey {
    type Error = CrmSyncError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CorrelationKey> for String {
    fn from(value: CorrelationKey) -> Self {
        value.to_string()
    }
}

/// Record snapshot captured at enqueue time.
///
/// The payload owns its JSON tree, so later edits to the source record cannot
/// reach an item already in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncPayload(Value);

impl SyncPayload {
    /// Wrap a JSON value, requiring a non-empty object.
    pub fn new(value: Value) -> Result<Self> {
        match &value {
            Value::Object(map) if !map.is_empty() => Ok(Self(value)),
            Value::Object(_) => {
                Err(CrmSyncError::InvalidItem("payload must not be an empty object".to_string()))
            }
            other => Err(CrmSyncError::InvalidItem(format!(
                "payload must be a JSON object, got {}",
                json_type_name(other)
            ))),
        }
    }

    /// Snapshot any serializable record.
    pub fn from_record<T: Serialize>(record: &T) -> Result<Self> {
        let value = serde_json::to_value(record)
            .map_err(|e| CrmSyncError::InvalidItem(format!("payload not serializable: {e}")))?;
        Self::new(value)
    }

    /// Decode into a typed record shape.
    pub fn decode<T: DeserializeOwned>(&self) -> std::result::Result<T, DispatchError> {
        T::deserialize(&self.0).map_err(|e| DispatchError::InvalidPayload(e.to_string()))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Inbound enqueue request as handed over by a collaborator.
///
/// Every field is optional on the wire so that missing ones surface as
/// `InvalidItem` instead of a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    pub kind: Option<RecordKind>,
    #[serde(default)]
    pub action: SyncAction,
    pub provider: Option<String>,
    pub payload: Option<Value>,
    #[serde(default)]
    pub correlation_keys: Vec<String>,
}

impl EnqueueRequest {
    pub fn new(kind: RecordKind, provider: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: Some(kind),
            action: SyncAction::default(),
            provider: Some(provider.into()),
            payload: Some(payload),
            correlation_keys: Vec::new(),
        }
    }

    /// Build a request from a typed record.
    pub fn for_record<T: Serialize>(
        kind: RecordKind,
        provider: impl Into<String>,
        record: &T,
    ) -> Result<Self> {
        let payload = serde_json::to_value(record)
            .map_err(|e| CrmSyncError::InvalidItem(format!("payload not serializable: {e}")))?;
        Ok(Self::new(kind, provider, payload))
    }

    #[must_use]
    pub fn with_correlation_key(mut self, key: impl Into<String>) -> Self {
        self.correlation_keys.push(key.into());
        self
    }

    /// Check the request and produce an item template.
    pub fn validate(self) -> Result<ValidatedRequest> {
        let kind = self
            .kind
            .ok_or_else(|| CrmSyncError::InvalidItem("missing kind".to_string()))?;
        let provider = self
            .provider
            .map(ProviderId::new)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| CrmSyncError::InvalidItem("missing provider".to_string()))?;
        let payload = self
            .payload
            .ok_or_else(|| CrmSyncError::InvalidItem("missing payload".to_string()))
            .and_then(SyncPayload::new)?;
        let mut correlation_keys = Vec::with_capacity(self.correlation_keys.len());
        for raw in &self.correlation_keys {
            let key: CorrelationKey = raw.parse()?;
            if !correlation_keys.contains(&key) {
                correlation_keys.push(key);
            }
        }

        Ok(ValidatedRequest { kind, action: self.action, provider, payload, correlation_keys })
    }
}

/// Enqueue request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub kind: RecordKind,
    pub action: SyncAction,
    pub provider: ProviderId,
    pub payload: SyncPayload,
    pub correlation_keys: Vec<CorrelationKey>,
}

/// One unit of outbound work targeting a single provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncItem {
    pub id: SyncItemId,
    pub kind: RecordKind,
    pub action: SyncAction,
    pub provider: ProviderId,
    pub payload: SyncPayload,
    pub correlation_keys: Vec<CorrelationKey>,
    pub status: SyncStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub remote_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncItem {
    /// Create a fresh `pending` item from a validated request.
    pub fn new(request: ValidatedRequest, max_attempts: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: SyncItemId::new(),
            kind: request.kind,
            action: request.action,
            provider: request.provider,
            payload: request.payload,
            correlation_keys: request.correlation_keys,
            status: SyncStatus::Pending,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            next_attempt_at: now,
            last_error: None,
            remote_id: None,
            created_at: now,
            last_attempt_at: None,
            completed_at: None,
        }
    }

    /// Claimable status, under the attempt cap and due at `now`.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.status.is_claimable() && self.attempts < self.max_attempts && self.next_attempt_at <= now
    }

    pub fn has_correlation_key(&self, key: &CorrelationKey) -> bool {
        self.correlation_keys.contains(key)
    }

    /// Move to `in-flight`, counting the attempt.
    pub fn mark_in_flight(&mut self, now: DateTime<Utc>) {
        self.status = SyncStatus::InFlight;
        self.attempts = self.attempts.saturating_add(1).min(self.max_attempts);
        self.last_attempt_at = Some(now);
    }

    pub fn mark_completed(&mut self, remote_id: String, now: DateTime<Utc>) {
        self.status = SyncStatus::Completed;
        self.remote_id = Some(remote_id);
        self.completed_at = Some(now);
    }

    /// Record a failure that will be retried no earlier than `next_attempt_at`.
    pub fn mark_retryable(&mut self, error: &str, next_attempt_at: DateTime<Utc>) {
        self.status = SyncStatus::FailedRetryable;
        self.last_error = Some(truncate_error(error));
        self.next_attempt_at = next_attempt_at;
    }

    pub fn mark_terminal(&mut self, error: &str, now: DateTime<Utc>) {
        self.status = SyncStatus::FailedTerminal;
        self.last_error = Some(truncate_error(error));
        self.completed_at = Some(now);
    }

    /// Timestamp the retention window is measured from.
    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at.or(self.last_attempt_at)
    }

    pub fn view(&self) -> SyncItemView {
        SyncItemView::from(self)
    }
}

/// Cut an error message to at most `MAX_ERROR_LEN` characters.
pub fn truncate_error(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_LEN {
        return message.to_string();
    }
    message.chars().take(MAX_ERROR_LEN).collect()
}

/// Read-only projection of a sync item returned by status queries.
///
/// The payload snapshot is left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncItemView {
    pub id: SyncItemId,
    pub kind: RecordKind,
    pub action: SyncAction,
    pub provider: ProviderId,
    pub status: SyncStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub correlation_keys: Vec<CorrelationKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub next_attempt_at: DateTime<Utc>,
}

impl From<&SyncItem> for SyncItemView {
    fn from(item: &SyncItem) -> Self {
        Self {
            id: item.id,
            kind: item.kind,
            action: item.action,
            provider: item.provider.clone(),
            status: item.status,
            attempts: item.attempts,
            max_attempts: item.max_attempts,
            correlation_keys: item.correlation_keys.clone(),
            last_error: item.last_error.clone(),
            remote_id: item.remote_id.clone(),
            created_at: item.created_at,
            last_attempt_at: item.last_attempt_at,
            completed_at: item.completed_at,
            next_attempt_at: item.next_attempt_at,
        }
    }
}

/// Query filter; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFilter {
    pub correlation_key: Option<CorrelationKey>,
    pub provider: Option<ProviderId>,
    pub kind: Option<RecordKind>,
    pub status: Option<SyncStatus>,
}

impl SyncFilter {
    pub fn by_correlation_key(key: CorrelationKey) -> Self {
        Self { correlation_key: Some(key), ..Self::default() }
    }

    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<ProviderId>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: SyncStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, item: &SyncItem) -> bool {
        self.correlation_key.as_ref().map_or(true, |k| item.has_correlation_key(k))
            && self.provider.as_ref().map_or(true, |p| &item.provider == p)
            && self.kind.map_or(true, |k| item.kind == k)
            && self.status.map_or(true, |s| item.status == s)
    }
}

/// Per-status counts returned by `Summary`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateCounts {
    pub total: usize,
    pub pending: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub failed_retryable: usize,
    pub failed_terminal: usize,
}

impl AggregateCounts {
    pub fn record(&mut self, status: SyncStatus) {
        self.total += 1;
        match status {
            SyncStatus::Pending => self.pending += 1,
            SyncStatus::InFlight => self.in_flight += 1,
            SyncStatus::Completed => self.completed += 1,
            SyncStatus::FailedRetryable => self.failed_retryable += 1,
            SyncStatus::FailedTerminal => self.failed_terminal += 1,
        }
    }
}

impl<'a> FromIterator<&'a SyncItem> for AggregateCounts {
    fn from_iter<I: IntoIterator<Item = &'a SyncItem>>(iter: I) -> Self {
        let mut counts = Self::default();
        for item in iter {
            counts.record(item.status);
        }
        counts
    }
}
