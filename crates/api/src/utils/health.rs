//! Health reporting for AppContext components

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Score at or above which the application counts as healthy.
const HEALTHY_THRESHOLD: f64 = 0.8;

/// Overall health status of the daemon
///
/// # Example
/// ```
/// use crmsync_lib::utils::health::{ComponentHealth, HealthStatus};
///
/// let mut status = HealthStatus::new()
///     .add_component(ComponentHealth::healthy("queue"))
///     .add_component(ComponentHealth::unhealthy("providers", "none configured"));
/// status.calculate_score();
///
/// assert_eq!(status.score, 0.5);
/// assert!(!status.is_healthy);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub is_healthy: bool,

    /// Fraction of healthy components, 0.0 to 1.0
    pub score: f64,

    pub message: Option<String>,

    pub components: Vec<ComponentHealth>,

    /// Unix timestamp when the check ran
    pub timestamp: i64,
}

impl HealthStatus {
    /// Healthy, score 1.0, no components.
    pub fn new() -> Self {
        Self {
            is_healthy: true,
            score: 1.0,
            message: None,
            components: Vec::new(),
            timestamp: Utc::now().timestamp(),
        }
    }

    #[must_use]
    pub fn add_component(mut self, component: ComponentHealth) -> Self {
        self.components.push(component);
        self
    }

    /// Recompute `score` and `is_healthy` from the components.
    pub fn calculate_score(&mut self) {
        if self.components.is_empty() {
            return;
        }

        let healthy_count = self.components.iter().filter(|c| c.is_healthy).count();
        self.score = healthy_count as f64 / self.components.len() as f64;
        self.is_healthy = self.score >= HEALTHY_THRESHOLD;
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self { is_healthy: false, score: 0.0, message: Some(message.into()), ..Self::new() }
    }

    pub fn component(&self, name: &str) -> Option<&ComponentHealth> {
        self.components.iter().find(|c| c.name == name)
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Health status of an individual component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component identifier (e.g. "queue", "processor")
    pub name: String,
    pub is_healthy: bool,
    pub message: Option<String>,
}

impl ComponentHealth {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_healthy: true, message: None }
    }

    pub fn healthy_with(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), is_healthy: true, message: Some(message.into()) }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), is_healthy: false, message: Some(message.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_status_stays_healthy() {
        let mut status = HealthStatus::new();
        status.calculate_score();
        assert!(status.is_healthy);
        assert_eq!(status.score, 1.0);
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut status = HealthStatus::new();
        for name in ["a", "b", "c", "d"] {
            status = status.add_component(ComponentHealth::healthy(name));
        }
        status = status.add_component(ComponentHealth::unhealthy("e", "down"));
        status.calculate_score();

        assert!((status.score - 0.8).abs() < f64::EPSILON);
        assert!(status.is_healthy);
        assert_eq!(status.component("e").and_then(|c| c.message.as_deref()), Some("down"));
    }

    #[test]
    fn unhealthy_constructor_carries_message() {
        let status = HealthStatus::unhealthy("context not initialised");
        assert!(!status.is_healthy);
        assert_eq!(status.score, 0.0);
        assert_eq!(status.message.as_deref(), Some("context not initialised"));
    }
}
