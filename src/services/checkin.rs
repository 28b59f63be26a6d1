use crate::db::{CheckinStore, InsertOutcome, NewCheckin, ProgramStore, StoredCheckin};
use crate::domain::checkin::{
    adjust_next_session, fatigue_streak, Feeling, InvalidFeeling, GOOD_MESSAGE,
};
use crate::domain::program::next_session;
use chrono::NaiveDate;
use uuid::Uuid;

/// Check-ins considered when computing the fatigue streak and the fatigue factor.
pub const HISTORY_WINDOW: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum CheckinError {
    #[error(transparent)]
    InvalidFeeling(#[from] InvalidFeeling),
    #[error("already checked in on {0}")]
    AlreadyCheckedIn(NaiveDate),
    #[error("no active program")]
    NoActiveProgram,
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// User-facing message of a stored check-in.
pub fn checkin_message(checkin: &StoredCheckin) -> &str {
    checkin
        .adjustment
        .as_ref()
        .map(|a| a.message.as_str())
        .unwrap_or(GOOD_MESSAGE)
}

pub async fn submit_checkin<S>(
    store: &S,
    user_id: Uuid,
    feeling_raw: i16,
    today: NaiveDate,
) -> Result<StoredCheckin, CheckinError>
where
    S: ProgramStore + CheckinStore + ?Sized,
{
    let feeling = Feeling::try_from(feeling_raw)?;

    if store.checkin_for_date(user_id, today).await?.is_some() {
        return Err(CheckinError::AlreadyCheckedIn(today));
    }

    let program = store
        .active_program(user_id)
        .await?
        .ok_or(CheckinError::NoActiveProgram)?;

    let recent = store
        .recent_feelings(user_id, program.id, HISTORY_WINDOW)
        .await?;
    let streak = fatigue_streak(&recent);

    let tracking = store.tracking(program.id).await?;
    let target = next_session(&program.data, &tracking, program.start_date, today);

    let outcome = adjust_next_session(feeling, streak, target.as_ref());
    tracing::info!(
        user_id = %user_id,
        feeling = feeling.value(),
        streak,
        reduction = outcome.adjustment.as_ref().map(|a| a.intensity_reduction).unwrap_or(0),
        "check-in evaluated"
    );

    let inserted = store
        .insert_checkin(NewCheckin {
            user_id,
            program_id: program.id,
            session_id: target.as_ref().map(|s| s.session_id()),
            feeling,
            adjustment: outcome.adjustment,
            checkin_date: today,
        })
        .await?;

    match inserted {
        InsertOutcome::Inserted(checkin) => Ok(checkin),
        InsertOutcome::Duplicate => {
            tracing::warn!(user_id = %user_id, "concurrent duplicate check-in rejected");
            Err(CheckinError::AlreadyCheckedIn(today))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::checkin::{AdjustmentCause, REST_LABEL};
    use crate::test_utils::{sample_program, MemoryStore};
    use chrono::Duration;

    // 2024-01-01 is a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn test_good_feeling_keeps_session() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.add_program(user, monday(), sample_program()).await;

        let checkin = submit_checkin(&store, user, 1, monday()).await.unwrap();
        assert_eq!(checkin.feeling, 1);
        assert!(checkin.adjustment.is_none());
        assert_eq!(checkin.session_id.as_deref(), Some("1-Lundi"));
        assert_eq!(checkin_message(&checkin), GOOD_MESSAGE);
    }

    #[tokio::test]
    async fn test_tired_slows_next_session_pace() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.add_program(user, monday(), sample_program()).await;

        let checkin = submit_checkin(&store, user, 2, monday()).await.unwrap();
        let adjustment = checkin.adjustment.unwrap();
        assert_eq!(adjustment.intensity_reduction, 10);
        assert_eq!(adjustment.cause, AdjustmentCause::Tired);
        assert_eq!(adjustment.adjusted_pace.as_deref(), Some("6:03/km"));
    }

    #[tokio::test]
    async fn test_second_checkin_same_day_rejected() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.add_program(user, monday(), sample_program()).await;

        submit_checkin(&store, user, 1, monday()).await.unwrap();
        let second = submit_checkin(&store, user, 3, monday()).await;
        assert!(matches!(second, Err(CheckinError::AlreadyCheckedIn(d)) if d == monday()));
        assert_eq!(store.checkin_count().await, 1);

        // Next day is fine
        assert!(submit_checkin(&store, user, 1, monday() + Duration::days(1))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_caught_by_insert_constraint() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.add_program(user, monday(), sample_program()).await;
        // Simulates a concurrent request slipping past the pre-check
        store.hide_existing_checkins(true).await;

        submit_checkin(&store, user, 1, monday()).await.unwrap();
        let second = submit_checkin(&store, user, 2, monday()).await;
        assert!(matches!(second, Err(CheckinError::AlreadyCheckedIn(_))));
        assert_eq!(store.checkin_count().await, 1);
    }

    #[tokio::test]
    async fn test_streak_forces_rest() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.add_program(user, monday(), sample_program()).await;

        submit_checkin(&store, user, 2, monday()).await.unwrap();
        submit_checkin(&store, user, 2, monday() + Duration::days(1))
            .await
            .unwrap();

        let third = submit_checkin(&store, user, 2, monday() + Duration::days(2))
            .await
            .unwrap();
        let adjustment = third.adjustment.unwrap();
        assert!(adjustment.is_forced_rest());
        assert_eq!(adjustment.cause, AdjustmentCause::AccumulatedFatigue);
        assert_eq!(adjustment.adjusted_type, REST_LABEL);
    }

    #[tokio::test]
    async fn test_good_day_resets_streak() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.add_program(user, monday(), sample_program()).await;

        submit_checkin(&store, user, 2, monday()).await.unwrap();
        submit_checkin(&store, user, 1, monday() + Duration::days(1))
            .await
            .unwrap();
        let third = submit_checkin(&store, user, 2, monday() + Duration::days(2))
            .await
            .unwrap();
        assert_eq!(third.adjustment.unwrap().intensity_reduction, 10);
    }

    #[tokio::test]
    async fn test_invalid_feeling_and_missing_program() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();

        assert!(matches!(
            submit_checkin(&store, user, 4, monday()).await,
            Err(CheckinError::InvalidFeeling(InvalidFeeling(4)))
        ));
        assert!(matches!(
            submit_checkin(&store, user, 1, monday()).await,
            Err(CheckinError::NoActiveProgram)
        ));
        assert_eq!(store.checkin_count().await, 0);
    }

    #[tokio::test]
    async fn test_without_target_session_uses_generic_label() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.add_program(user, monday(), sample_program()).await;

        // Well past the last program week
        let late = monday() + Duration::days(60);
        let checkin = submit_checkin(&store, user, 2, late).await.unwrap();
        assert!(checkin.session_id.is_none());
        assert_eq!(checkin.adjustment.unwrap().original_type, "Entraînement");
    }
}
