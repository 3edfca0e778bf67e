//! Configuration structures
//!
//! Loaded by `crmsync_infra::config::loader` from the environment or from a
//! TOML/JSON file. Every section has defaults so a partial file is enough.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_DISPATCH_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_BACKOFF_SECS, DEFAULT_RECLAIM_INTERVAL_SECS, DEFAULT_RETENTION_SECS,
    DEFAULT_TICK_INTERVAL_SECS, DEFAULT_WORKER_POOL_SIZE,
};
use crate::errors::{CrmSyncError, Result};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub reclaim: ReclaimConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl Config {
    /// Reject values that would stall or spin the workers.
    pub fn validate(&self) -> Result<()> {
        if self.sync.tick_interval_secs == 0 {
            return Err(CrmSyncError::Config("sync.tick_interval_secs must be > 0".into()));
        }
        if self.sync.worker_pool_size == 0 {
            return Err(CrmSyncError::Config("sync.worker_pool_size must be > 0".into()));
        }
        if self.sync.batch_size == 0 {
            return Err(CrmSyncError::Config("sync.batch_size must be > 0".into()));
        }
        if self.sync.dispatch_timeout_secs == 0 {
            return Err(CrmSyncError::Config("sync.dispatch_timeout_secs must be > 0".into()));
        }
        if self.reclaim.interval_secs == 0 {
            return Err(CrmSyncError::Config("reclaim.interval_secs must be > 0".into()));
        }
        self.sync.retry.validate("sync.retry")?;
        for (name, retry) in self.providers.retry_overrides() {
            retry.validate(&format!("providers.{name}.retry"))?;
        }
        Ok(())
    }
}

/// Queue processor settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    pub tick_interval_secs: u64,
    pub batch_size: usize,
    pub worker_pool_size: usize,
    pub dispatch_timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            dispatch_timeout_secs: DEFAULT_DISPATCH_TIMEOUT_SECS,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry policy settings, used as the default and as per-provider overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Minimum delay before a failed item becomes eligible again.
    pub min_delay_secs: u64,
    /// Enables exponential backoff `base * 2^(attempts-1)` when set.
    pub backoff_base_secs: Option<u64>,
    pub max_backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_delay_secs: 0,
            backoff_base_secs: None,
            max_backoff_secs: DEFAULT_MAX_BACKOFF_SECS,
        }
    }
}

impl RetryConfig {
    fn validate(&self, section: &str) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(CrmSyncError::Config(format!("{section}.max_attempts must be > 0")));
        }
        Ok(())
    }
}

/// Reclaimer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReclaimConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub retention_secs: u64,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: DEFAULT_RECLAIM_INTERVAL_SECS,
            retention_secs: DEFAULT_RETENTION_SECS,
        }
    }
}

/// Per-provider sections; an absent section means the provider is not set up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub salesforce: Option<SalesforceConfig>,
    pub hubspot: Option<HubSpotConfig>,
    pub zoho: Option<ZohoConfig>,
    pub pipedrive: Option<PipedriveConfig>,
}

impl ProvidersConfig {
    /// Provider ids paired with their retry override, if any.
    pub fn retry_overrides(&self) -> Vec<(&'static str, &RetryConfig)> {
        let mut overrides = Vec::new();
        if let Some(retry) = self.salesforce.as_ref().and_then(|c| c.retry.as_ref()) {
            overrides.push(("salesforce", retry));
        }
        if let Some(retry) = self.hubspot.as_ref().and_then(|c| c.retry.as_ref()) {
            overrides.push(("hubspot", retry));
        }
        if let Some(retry) = self.zoho.as_ref().and_then(|c| c.retry.as_ref()) {
            overrides.push(("zoho", retry));
        }
        if let Some(retry) = self.pipedrive.as_ref().and_then(|c| c.retry.as_ref()) {
            overrides.push(("pipedrive", retry));
        }
        overrides
    }
}

/// Salesforce connected-app credentials (OAuth refresh-token grant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesforceConfig {
    pub login_url: String,
    pub api_version: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub retry: Option<RetryConfig>,
}

impl Default for SalesforceConfig {
    fn default() -> Self {
        Self {
            login_url: "https://login.salesforce.com".to_string(),
            api_version: "v59.0".to_string(),
            client_id: None,
            client_secret: None,
            refresh_token: None,
            retry: None,
        }
    }
}

/// HubSpot private-app token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubSpotConfig {
    pub base_url: String,
    pub access_token: Option<String>,
    pub retry: Option<RetryConfig>,
}

impl Default for HubSpotConfig {
    fn default() -> Self {
        Self { base_url: "https://api.hubapi.com".to_string(), access_token: None, retry: None }
    }
}

/// Zoho CRM self-client credentials (OAuth refresh-token grant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZohoConfig {
    pub accounts_url: String,
    pub api_base_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub retry: Option<RetryConfig>,
}

impl Default for ZohoConfig {
    fn default() -> Self {
        Self {
            accounts_url: "https://accounts.zoho.com".to_string(),
            api_base_url: "https://www.zohoapis.com".to_string(),
            client_id: None,
            client_secret: None,
            refresh_token: None,
            retry: None,
        }
    }
}

/// Pipedrive API token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipedriveConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub retry: Option<RetryConfig>,
}

impl Default for PipedriveConfig {
    fn default() -> Self {
        Self { base_url: "https://api.pipedrive.com/v1".to_string(), api_token: None, retry: None }
    }
}

/// True when the option holds a non-blank string.
pub fn has_value(value: Option<&String>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}
