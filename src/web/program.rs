use crate::db::{ActiveProgram, ProgramStore};
use crate::domain::profile::OnboardingProfile;
use crate::domain::program::{ProgramData, SessionTracking};
use crate::middleware::rate_limit_middleware;
use crate::services::program_generator::GenerationError;
use crate::state::SharedState;
use crate::time_utils;
use crate::web::session::UserSession;
use crate::web::{api_error, internal_error, ApiError};
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

const MAX_NOTES_LEN: usize = 1000;

pub fn router(state: SharedState) -> Router {
    let limited_generate = post(generate).layer(middleware::from_fn_with_state(
        state.generate_limiter.clone(),
        rate_limit_middleware,
    ));

    Router::new()
        .route("/", get(current))
        .route("/generate", limited_generate)
        .route("/tracking", post(track))
        .with_state(state)
}

#[derive(Serialize)]
struct ProgramResponse {
    program: ActiveProgram,
    tracking: Vec<SessionTracking>,
}

#[derive(Deserialize)]
struct TrackingPayload {
    week_number: u32,
    day: String,
    #[serde(default = "default_completed")]
    completed: bool,
    actual_distance_km: Option<f64>,
    rpe: Option<u8>,
    notes: Option<String>,
}

fn default_completed() -> bool {
    true
}

/// Checks a tracking payload against the program and normalizes the day name.
fn tracking_row(program: &ProgramData, payload: TrackingPayload) -> Result<SessionTracking, ApiError> {
    let Some(session) = program.find_session(payload.week_number, &payload.day) else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "unknown_session",
            format!("Pas de séance le {} en semaine {}.", payload.day, payload.week_number),
        ));
    };
    if session.is_rest {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "rest_day",
            "Les jours de repos ne sont pas suivis.",
        ));
    }
    if payload.rpe.is_some_and(|r| !(1..=10).contains(&r)) {
        return Err(api_error(StatusCode::BAD_REQUEST, "invalid_rpe", "RPE entre 1 et 10."));
    }
    if payload
        .actual_distance_km
        .is_some_and(|d| !d.is_finite() || d < 0.0)
    {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "invalid_distance",
            "Distance invalide.",
        ));
    }
    let notes = payload
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    if notes.as_ref().is_some_and(|n| n.len() > MAX_NOTES_LEN) {
        return Err(api_error(
            StatusCode::PAYLOAD_TOO_LARGE,
            "notes_too_long",
            "Notes trop longues.",
        ));
    }

    Ok(SessionTracking {
        week_number: payload.week_number,
        day: session.day.clone(),
        completed: payload.completed,
        actual_distance_km: payload.actual_distance_km,
        rpe: payload.rpe,
        notes,
    })
}

async fn generate(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Json(profile): Json<OnboardingProfile>,
) -> Result<(StatusCode, Json<ProgramResponse>), ApiError> {
    let today = time_utils::local_date(&profile.timezone, Utc::now());
    if let Err(e) = profile.validate(today) {
        tracing::warn!("Invalid onboarding profile for {}: {}", user_id, e);
        return Err(api_error(StatusCode::BAD_REQUEST, "invalid_profile", e.to_string()));
    }

    state
        .store
        .save_profile(&state.cipher, user_id, &profile)
        .await
        .map_err(internal_error)?;

    let data = state.generator.generate(&profile, today).await.map_err(|e| {
        tracing::error!("Program generation failed for {}: {}", user_id, e);
        match e {
            GenerationError::Disabled => api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "generation_disabled",
                "La génération de programme est indisponible.",
            ),
            _ => api_error(
                StatusCode::BAD_GATEWAY,
                "generation_failed",
                "Le programme n'a pas pu être généré, réessaie.",
            ),
        }
    })?;

    let program = state
        .store
        .activate_program(user_id, today, &data)
        .await
        .map_err(internal_error)?;
    tracing::info!(
        "Activated program {} ({} weeks) for {}",
        program.id,
        program.data.total_weeks(),
        user_id
    );

    Ok((
        StatusCode::CREATED,
        Json(ProgramResponse {
            program,
            tracking: Vec::new(),
        }),
    ))
}

async fn current(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<ProgramResponse>, ApiError> {
    let program = state
        .store
        .active_program(user_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| {
            api_error(StatusCode::NOT_FOUND, "no_active_program", "Aucun programme actif.")
        })?;
    let tracking = state
        .store
        .tracking(program.id)
        .await
        .map_err(internal_error)?;

    Ok(Json(ProgramResponse { program, tracking }))
}

async fn track(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<TrackingPayload>,
) -> Result<Json<SessionTracking>, ApiError> {
    let program = state
        .store
        .active_program(user_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| {
            api_error(StatusCode::NOT_FOUND, "no_active_program", "Aucun programme actif.")
        })?;

    let row = tracking_row(&program.data, payload)?;
    state
        .store
        .upsert_tracking(program.id, &row)
        .await
        .map_err(internal_error)?;

    Ok(Json(row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_program;

    fn payload(week_number: u32, day: &str) -> TrackingPayload {
        TrackingPayload {
            week_number,
            day: day.to_string(),
            completed: true,
            actual_distance_km: Some(8.4),
            rpe: Some(5),
            notes: Some("  jambes lourdes ".to_string()),
        }
    }

    #[test]
    fn test_tracking_row_normalizes_day() {
        let row = tracking_row(&sample_program(), payload(1, "monday")).unwrap();
        assert_eq!(row.day, "Lundi");
        assert_eq!(row.notes.as_deref(), Some("jambes lourdes"));
        assert_eq!(row.actual_distance_km, Some(8.4));
    }

    #[test]
    fn test_tracking_row_rejections() {
        let program = sample_program();

        let (status, Json(body)) = tracking_row(&program, payload(1, "Vendredi")).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "unknown_session");

        let (_, Json(body)) = tracking_row(&program, payload(1, "Mardi")).unwrap_err();
        assert_eq!(body.error, "rest_day");

        let mut bad_rpe = payload(1, "Lundi");
        bad_rpe.rpe = Some(0);
        let (_, Json(body)) = tracking_row(&program, bad_rpe).unwrap_err();
        assert_eq!(body.error, "invalid_rpe");

        let mut bad_distance = payload(2, "Lundi");
        bad_distance.actual_distance_km = Some(f64::NAN);
        let (_, Json(body)) = tracking_row(&program, bad_distance).unwrap_err();
        assert_eq!(body.error, "invalid_distance");
    }
}
