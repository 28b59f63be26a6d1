pub mod checkin;
pub mod dashboard;
pub mod program;
pub mod session;

use crate::db::ProgramStore;
use crate::state::SharedState;
use crate::time_utils;
use axum::{http::StatusCode, routing::get, Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.into(),
        }),
    )
}

pub fn internal_error(e: anyhow::Error) -> ApiError {
    tracing::error!("Storage error: {:#}", e);
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        "Something went wrong, please retry.",
    )
}

/// Today's calendar date in the user's profile timezone.
pub async fn user_today(state: &SharedState, user_id: Uuid) -> Result<NaiveDate, ApiError> {
    let tz = state
        .store
        .user_timezone(user_id)
        .await
        .map_err(internal_error)?
        .unwrap_or_else(|| time_utils::DEFAULT_TIMEZONE.to_string());
    Ok(time_utils::local_date(&tz, Utc::now()))
}

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/program", program::router(state.clone()))
        .nest("/checkin", checkin::router(state.clone()))
        .nest("/dashboard", dashboard::router(state))
}
