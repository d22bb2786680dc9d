//! Response bodies for the API.

use serde::Serialize;

/// Webhook intake response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventResponse {
    pub status: String,
}

impl EventResponse {
    /// The event was stored
    pub fn stored() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }

    /// The webhook was understood but carries nothing to store
    pub fn ignored() -> Self {
        Self {
            status: "ignored".to_string(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}
