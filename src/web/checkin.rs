use crate::db::{CheckinStore, StoredCheckin};
use crate::services::checkin::{checkin_message, submit_checkin, CheckinError};
use crate::state::SharedState;
use crate::web::session::UserSession;
use crate::web::{api_error, internal_error, user_today, ApiError};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const DEFAULT_HISTORY: i64 = 14;
const MAX_HISTORY: i64 = 60;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", post(submit))
        .route("/today", get(today))
        .route("/history", get(history))
        .with_state(state)
}

#[derive(Deserialize)]
struct CheckinPayload {
    feeling: i16,
}

#[derive(Serialize)]
struct CheckinResponse {
    checkin: StoredCheckin,
    message: String,
}

impl From<StoredCheckin> for CheckinResponse {
    fn from(checkin: StoredCheckin) -> Self {
        let message = checkin_message(&checkin).to_string();
        Self { checkin, message }
    }
}

#[derive(Serialize)]
struct TodayResponse {
    date: NaiveDate,
    checked_in: bool,
    checkin: Option<CheckinResponse>,
}

#[derive(Deserialize)]
struct HistoryParams {
    limit: Option<i64>,
}

fn history_limit(requested: Option<i64>) -> i64 {
    requested.unwrap_or(DEFAULT_HISTORY).clamp(1, MAX_HISTORY)
}

async fn submit(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<CheckinPayload>,
) -> Result<(StatusCode, Json<CheckinResponse>), ApiError> {
    let today = user_today(&state, user_id).await?;

    match submit_checkin(&state.store, user_id, payload.feeling, today).await {
        Ok(checkin) => Ok((StatusCode::CREATED, Json(checkin.into()))),
        Err(CheckinError::InvalidFeeling(e)) => {
            tracing::warn!("Rejected check-in from {}: {}", user_id, e);
            Err(api_error(StatusCode::BAD_REQUEST, "invalid_feeling", e.to_string()))
        }
        Err(CheckinError::AlreadyCheckedIn(date)) => Err(api_error(
            StatusCode::CONFLICT,
            "already_checked_in",
            format!("Tu as déjà fait ton check-in du {date}."),
        )),
        Err(CheckinError::NoActiveProgram) => Err(api_error(
            StatusCode::NOT_FOUND,
            "no_active_program",
            "Aucun programme actif.",
        )),
        Err(CheckinError::Storage(e)) => Err(internal_error(e)),
    }
}

async fn today(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<TodayResponse>, ApiError> {
    let date = user_today(&state, user_id).await?;
    let checkin = state
        .store
        .checkin_for_date(user_id, date)
        .await
        .map_err(internal_error)?;

    Ok(Json(TodayResponse {
        date,
        checked_in: checkin.is_some(),
        checkin: checkin.map(CheckinResponse::from),
    }))
}

async fn history(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<StoredCheckin>>, ApiError> {
    let checkins = state
        .store
        .recent_checkins(user_id, history_limit(params.limit))
        .await
        .map_err(internal_error)?;
    Ok(Json(checkins))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_limit_clamped() {
        assert_eq!(history_limit(None), 14);
        assert_eq!(history_limit(Some(0)), 1);
        assert_eq!(history_limit(Some(-5)), 1);
        assert_eq!(history_limit(Some(30)), 30);
        assert_eq!(history_limit(Some(500)), 60);
    }
}
