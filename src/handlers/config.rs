//! # Config Endpoints
//!
//! `GET /api/v1/config` returns the running configuration (API key redacted);
//! `PUT /api/v1/config` applies a partial JSON update after validation.
//! Resources built at startup (pool sizes, scratch dir) are not updatable
//! here — see `AppConfig::update_from_json`.

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn get_config(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let config = state.get_config();

    let mut value = serde_json::to_value(&config)?;
    if let Some(key) = value.pointer_mut("/recognizer/api_key") {
        if key.as_str().map_or(false, |k| !k.is_empty()) {
            *key = json!("***");
        }
    }

    Ok(HttpResponse::Ok().json(value))
}

pub async fn update_config(
    state: web::Data<AppState>,
    body: String,
) -> AppResult<HttpResponse> {
    let mut config = state.get_config();

    config
        .update_from_json(&body)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    state
        .update_config(config)
        .map_err(AppError::Validation)?;

    tracing::info!("Configuration updated at runtime");

    Ok(HttpResponse::Ok().json(json!({
        "status": "updated",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
