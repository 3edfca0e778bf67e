//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. If `CRMSYNC_TICK_INTERVAL` is set, the sync and reclaim sections come
//!    from the environment
//! 2. Otherwise a config file is probed for; with no file, defaults apply
//! 3. Provider credentials are then filled in from the environment where
//!    the chosen source left them out
//! 4. The result is validated
//!
//! ## Environment Variables
//! - `CRMSYNC_TICK_INTERVAL`: Tick interval in seconds (required for env loading)
//! - `CRMSYNC_SYNC_ENABLED`: Whether the queue processor runs (true/false)
//! - `CRMSYNC_BATCH_SIZE`: Items examined per tick
//! - `CRMSYNC_WORKER_POOL_SIZE`: Maximum concurrent dispatches
//! - `CRMSYNC_DISPATCH_TIMEOUT`: Per-dispatch timeout in seconds
//! - `CRMSYNC_MAX_ATTEMPTS`: Default attempt cap
//! - `CRMSYNC_RETRY_MIN_DELAY`: Minimum delay before a retry, in seconds
//! - `CRMSYNC_RETRY_BACKOFF_BASE`: Enables exponential backoff with this base
//! - `CRMSYNC_RECLAIM_ENABLED`: Whether the reclaimer runs (true/false)
//! - `CRMSYNC_RECLAIM_INTERVAL`: Reclaim interval in seconds
//! - `CRMSYNC_RETENTION_SECS`: How long settled items are kept
//!
//! Provider credentials:
//! - `CRMSYNC_SALESFORCE_CLIENT_ID`, `CRMSYNC_SALESFORCE_CLIENT_SECRET`,
//!   `CRMSYNC_SALESFORCE_REFRESH_TOKEN`, `CRMSYNC_SALESFORCE_LOGIN_URL`
//! - `CRMSYNC_HUBSPOT_ACCESS_TOKEN`
//! - `CRMSYNC_ZOHO_CLIENT_ID`, `CRMSYNC_ZOHO_CLIENT_SECRET`,
//!   `CRMSYNC_ZOHO_REFRESH_TOKEN`, `CRMSYNC_ZOHO_ACCOUNTS_URL`
//! - `CRMSYNC_PIPEDRIVE_API_TOKEN`
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.toml`, `./config.json`, `./crmsync.toml`, `./crmsync.json`
//! 2. The same names one and two directories up
//! 3. The same names beside the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crmsync_domain::{
    has_value, Config, CrmSyncError, HubSpotConfig, PipedriveConfig, ProvidersConfig,
    ReclaimConfig, Result, RetryConfig, SalesforceConfig, SyncConfig, ZohoConfig,
};

const CONFIG_FILE_NAMES: [&str; 4] = ["config.toml", "config.json", "crmsync.toml", "crmsync.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `CrmSyncError::Config` if a present source is malformed or the
/// resulting configuration fails validation.
pub fn load() -> Result<Config> {
    let mut config = match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            match probe_config_paths() {
                Some(path) => load_from_file(Some(path))?,
                None => {
                    tracing::info!("No config file found, using defaults");
                    Config::default()
                }
            }
        }
    };

    apply_provider_env(&mut config.providers);
    config.validate()?;
    Ok(config)
}

/// Load the sync and reclaim sections from environment variables
///
/// Only `CRMSYNC_TICK_INTERVAL` is required; every other variable falls back
/// to its default. Provider sections are left to [`apply_provider_env`].
///
/// # Errors
/// Returns `CrmSyncError::Config` if `CRMSYNC_TICK_INTERVAL` is missing or
/// any variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let tick_interval_secs = env_var("CRMSYNC_TICK_INTERVAL").and_then(|s| parse("tick interval", &s))?;

    let defaults = SyncConfig::default();
    let retry_defaults = RetryConfig::default();
    let sync = SyncConfig {
        enabled: env_bool("CRMSYNC_SYNC_ENABLED", defaults.enabled),
        tick_interval_secs,
        batch_size: env_parse("CRMSYNC_BATCH_SIZE", "batch size", defaults.batch_size)?,
        worker_pool_size: env_parse(
            "CRMSYNC_WORKER_POOL_SIZE",
            "worker pool size",
            defaults.worker_pool_size,
        )?,
        dispatch_timeout_secs: env_parse(
            "CRMSYNC_DISPATCH_TIMEOUT",
            "dispatch timeout",
            defaults.dispatch_timeout_secs,
        )?,
        retry: RetryConfig {
            max_attempts: env_parse("CRMSYNC_MAX_ATTEMPTS", "max attempts", retry_defaults.max_attempts)?,
            min_delay_secs: env_parse(
                "CRMSYNC_RETRY_MIN_DELAY",
                "retry min delay",
                retry_defaults.min_delay_secs,
            )?,
            backoff_base_secs: env_opt("CRMSYNC_RETRY_BACKOFF_BASE")
                .map(|s| parse("retry backoff base", &s))
                .transpose()?,
            ..retry_defaults
        },
    };

    let reclaim_defaults = ReclaimConfig::default();
    let reclaim = ReclaimConfig {
        enabled: env_bool("CRMSYNC_RECLAIM_ENABLED", reclaim_defaults.enabled),
        interval_secs: env_parse(
            "CRMSYNC_RECLAIM_INTERVAL",
            "reclaim interval",
            reclaim_defaults.interval_secs,
        )?,
        retention_secs: env_parse(
            "CRMSYNC_RETENTION_SECS",
            "retention",
            reclaim_defaults.retention_secs,
        )?,
    };

    Ok(Config { sync, reclaim, providers: ProvidersConfig::default() })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `CrmSyncError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CrmSyncError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CrmSyncError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CrmSyncError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Fill provider credentials from the environment.
///
/// Values already present in `providers` win. A provider section is created
/// only when at least one of its variables is set.
pub fn apply_provider_env(providers: &mut ProvidersConfig) {
    let sf_client_id = env_opt("CRMSYNC_SALESFORCE_CLIENT_ID");
    let sf_client_secret = env_opt("CRMSYNC_SALESFORCE_CLIENT_SECRET");
    let sf_refresh_token = env_opt("CRMSYNC_SALESFORCE_REFRESH_TOKEN");
    let sf_login_url = env_opt("CRMSYNC_SALESFORCE_LOGIN_URL");
    if sf_client_id.is_some() || sf_client_secret.is_some() || sf_refresh_token.is_some() {
        let section = providers.salesforce.get_or_insert_with(SalesforceConfig::default);
        fill(&mut section.client_id, sf_client_id);
        fill(&mut section.client_secret, sf_client_secret);
        fill(&mut section.refresh_token, sf_refresh_token);
        if let Some(url) = sf_login_url {
            section.login_url = url;
        }
    }

    if let Some(token) = env_opt("CRMSYNC_HUBSPOT_ACCESS_TOKEN") {
        let section = providers.hubspot.get_or_insert_with(HubSpotConfig::default);
        fill(&mut section.access_token, Some(token));
    }

    let zoho_client_id = env_opt("CRMSYNC_ZOHO_CLIENT_ID");
    let zoho_client_secret = env_opt("CRMSYNC_ZOHO_CLIENT_SECRET");
    let zoho_refresh_token = env_opt("CRMSYNC_ZOHO_REFRESH_TOKEN");
    let zoho_accounts_url = env_opt("CRMSYNC_ZOHO_ACCOUNTS_URL");
    if zoho_client_id.is_some() || zoho_client_secret.is_some() || zoho_refresh_token.is_some() {
        let section = providers.zoho.get_or_insert_with(ZohoConfig::default);
        fill(&mut section.client_id, zoho_client_id);
        fill(&mut section.client_secret, zoho_client_secret);
        fill(&mut section.refresh_token, zoho_refresh_token);
        if let Some(url) = zoho_accounts_url {
            section.accounts_url = url;
        }
    }

    if let Some(token) = env_opt("CRMSYNC_PIPEDRIVE_API_TOKEN") {
        let section = providers.pipedrive.get_or_insert_with(PipedriveConfig::default);
        fill(&mut section.api_token, Some(token));
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if !has_value(slot.as_ref()) {
        if let Some(value) = value {
            *slot = Some(value);
        }
    }
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CrmSyncError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CrmSyncError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(CrmSyncError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.extend([exe_dir.to_path_buf(), exe_dir.join(".."), exe_dir.join("../..")]);
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| CrmSyncError::Config(format!("Missing required environment variable: {}", key)))
}

/// Optional, non-blank environment variable
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse<T>(what: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| CrmSyncError::Config(format!("Invalid {what}: {e}")))
}

fn env_parse<T>(key: &str, what: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key).map_or(Ok(default), |raw| parse(what, &raw))
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
