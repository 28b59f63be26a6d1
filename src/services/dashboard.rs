use crate::db::{CheckinStore, ProgramStore, StoredCheckin};
use crate::domain::checkin::SessionDescriptor;
use crate::domain::intensity::SessionClassifier;
use crate::domain::program::{current_week, next_session, weekly_snapshot};
use crate::domain::risk::{assess_injury_risk, RiskAssessment, WeeklyTrainingSnapshot};
use crate::services::checkin::HISTORY_WINDOW;
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct ProgramProgress {
    pub program_id: Uuid,
    pub title: String,
    pub start_date: NaiveDate,
    pub current_week: u32,
    pub total_weeks: u32,
    pub completed_sessions: usize,
    pub planned_sessions: usize,
    pub completion_pct: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub progress: ProgramProgress,
    pub next_session: Option<SessionDescriptor>,
    pub today_checkin: Option<StoredCheckin>,
    pub snapshot: WeeklyTrainingSnapshot,
    pub risk: RiskAssessment,
}

/// Dashboard for the user's active program, `None` when there is none.
pub async fn build_dashboard<S>(
    store: &S,
    user_id: Uuid,
    today: NaiveDate,
    classifier: &dyn SessionClassifier,
) -> Result<Option<Dashboard>>
where
    S: ProgramStore + CheckinStore + ?Sized,
{
    let Some(program) = store.active_program(user_id).await? else {
        return Ok(None);
    };

    let tracking = store.tracking(program.id).await?;
    let feelings = store
        .recent_feelings(user_id, program.id, HISTORY_WINDOW)
        .await?;
    let today_checkin = store.checkin_for_date(user_id, today).await?;

    let snapshot = weekly_snapshot(
        &program.data,
        &tracking,
        program.start_date,
        today,
        feelings.into_iter().map(|f| f.value()).collect(),
        classifier,
    );
    let risk = assess_injury_risk(&snapshot);

    let planned_sessions = program.data.planned_sessions();
    let completed_sessions = tracking
        .iter()
        .filter(|t| t.completed)
        .filter(|t| {
            program
                .data
                .find_session(t.week_number, &t.day)
                .is_some_and(|s| !s.is_rest)
        })
        .count();
    let completion_pct = if planned_sessions == 0 {
        0
    } else {
        ((completed_sessions * 100) / planned_sessions) as u32
    };

    Ok(Some(Dashboard {
        progress: ProgramProgress {
            program_id: program.id,
            title: program.title.clone(),
            start_date: program.start_date,
            current_week: current_week(program.start_date, today, program.data.total_weeks()),
            total_weeks: program.data.total_weeks(),
            completed_sessions,
            planned_sessions,
            completion_pct,
        },
        next_session: next_session(&program.data, &tracking, program.start_date, today),
        today_checkin,
        snapshot,
        risk,
    }))
}
