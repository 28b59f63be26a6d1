use crate::domain::risk::{RiskAssessment, WeeklyTrainingSnapshot};
use crate::services::dashboard::{build_dashboard, Dashboard};
use crate::state::SharedState;
use crate::web::session::UserSession;
use crate::web::{api_error, internal_error, user_today, ApiError};
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(overview))
        .route("/risk", get(risk))
        .with_state(state)
}

#[derive(Serialize)]
struct RiskResponse {
    risk: RiskAssessment,
    snapshot: WeeklyTrainingSnapshot,
}

async fn load(state: &SharedState, user_id: uuid::Uuid) -> Result<Dashboard, ApiError> {
    let today = user_today(state, user_id).await?;
    build_dashboard(&state.store, user_id, today, state.classifier.as_ref())
        .await
        .map_err(internal_error)?
        .ok_or_else(|| {
            api_error(StatusCode::NOT_FOUND, "no_active_program", "Aucun programme actif.")
        })
}

async fn overview(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Dashboard>, ApiError> {
    load(&state, user_id).await.map(Json)
}

async fn risk(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<RiskResponse>, ApiError> {
    let dashboard = load(&state, user_id).await?;
    if dashboard.risk.level != crate::domain::risk::RiskLevel::Low {
        tracing::info!(
            "Injury risk {} ({}) for {}",
            dashboard.risk.level.as_str(),
            dashboard.risk.score,
            user_id
        );
    }
    Ok(Json(RiskResponse {
        risk: dashboard.risk,
        snapshot: dashboard.snapshot,
    }))
}
