//! Configuration loading
//!
//! Loads the application configuration from environment variables and
//! files.

pub mod loader;

pub use loader::{apply_provider_env, load, load_from_env, load_from_file, probe_config_paths};
