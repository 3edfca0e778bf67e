//! Provider identity and capability descriptors

use std::fmt;

use serde::{Deserialize, Serialize};

use super::sync_item::RecordKind;

/// Identifier of a CRM provider (e.g. `salesforce`, `hubspot`).
///
/// Identifiers are normalised to trimmed lowercase so that configuration,
/// enqueue requests and the adapter registry agree on spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ProviderId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<ProviderId> for String {
    fn from(value: ProviderId) -> Self {
        value.0
    }
}

/// Static description of an adapter: who it talks to and what it can map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub name: String,
    pub capabilities: Vec<RecordKind>,
}

impl ProviderDescriptor {
    pub fn new(id: impl Into<ProviderId>, name: impl Into<String>, capabilities: &[RecordKind]) -> Self {
        Self { id: id.into(), name: name.into(), capabilities: capabilities.to_vec() }
    }

    pub fn supports(&self, kind: RecordKind) -> bool {
        self.capabilities.contains(&kind)
    }
}

/// Entry returned by `SupportedProviders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub id: ProviderId,
    pub name: String,
    pub configured: bool,
    pub capabilities: Vec<RecordKind>,
}
