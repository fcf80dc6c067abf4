use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use hearsay_bot::BotRuntime;
use hearsay_core::config::AppConfig;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    runtime: Arc<BotRuntime>,
    places_configured: bool,
    weather_configured: bool,
}

impl HealthState {
    pub fn new(runtime: Arc<BotRuntime>, config: &AppConfig) -> Self {
        Self {
            runtime,
            places_configured: config.yelp.api_key.is_some(),
            weather_configured: config.weather.api_key.is_some(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub places: HealthCheck,
    pub weather: HealthCheck,
    pub active_sessions: usize,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Providers without an API key are reported as `offline`; the service stays ready.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "hearsay-server runtime initialized".to_string(),
        },
        places: provider_check("yelp", state.places_configured),
        weather: provider_check("openweathermap", state.weather_configured),
        active_sessions: state.runtime.active_sessions(),
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}

fn provider_check(provider: &str, configured: bool) -> HealthCheck {
    if configured {
        HealthCheck { status: "ready", detail: format!("{provider} api key configured") }
    } else {
        HealthCheck { status: "offline", detail: format!("{provider} api key not set") }
    }
}
