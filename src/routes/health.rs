// ABOUTME: Health check route handler for service monitoring
// ABOUTME: Reports liveness, version, storage backend, and whether the OAuth server is enabled
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use authz_core::constants::service::{SERVICE_NAME, SERVICE_VERSION};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::resources::ServerResources;

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create the health check route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        async fn health_handler(
            State(resources): State<Arc<ServerResources>>,
        ) -> Json<serde_json::Value> {
            Json(serde_json::json!({
                "status": "healthy",
                "service": SERVICE_NAME,
                "version": SERVICE_VERSION,
                "storage": resources.database.backend_info(),
                "oauth2_server": resources.oauth2_server.is_some(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }))
        }

        Router::new()
            .route("/health", get(health_handler))
            .with_state(resources)
    }
}
