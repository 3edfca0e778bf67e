//! Health check command

use crate::context::AppContext;
use crate::utils::health::HealthStatus;

/// Get daemon health status
///
/// # Example Response
/// ```json
/// {
///   "is_healthy": true,
///   "score": 1.0,
///   "message": null,
///   "components": [
///     { "name": "queue", "is_healthy": true, "message": "3 items, 1 pending" },
///     { "name": "processor", "is_healthy": true, "message": null },
///     { "name": "reclaimer", "is_healthy": true, "message": null },
///     { "name": "providers", "is_healthy": true, "message": "2 configured" }
///   ],
///   "timestamp": 1714557600
/// }
/// ```
pub async fn get_app_health(context: &AppContext) -> HealthStatus {
    context.health_check().await
}
