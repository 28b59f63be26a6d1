//! In-memory store and fixtures for orchestration tests.

use crate::db::{
    ActiveProgram, CheckinStore, InsertOutcome, NewCheckin, ProgramStore, StoredCheckin,
};
use crate::domain::checkin::Feeling;
use crate::domain::program::{PlannedSession, ProgramData, ProgramWeek, SessionTracking};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    programs: Vec<ActiveProgram>,
    tracking: HashMap<Uuid, Vec<SessionTracking>>,
    checkins: Vec<StoredCheckin>,
    hide_existing: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_program(
        &self,
        user_id: Uuid,
        start_date: NaiveDate,
        data: ProgramData,
    ) -> ActiveProgram {
        let program = ActiveProgram {
            id: Uuid::new_v4(),
            user_id,
            title: data.title.clone(),
            start_date,
            data,
            created_at: Utc::now(),
        };
        let mut inner = self.inner.write().await;
        inner.programs.retain(|p| p.user_id != user_id);
        inner.programs.push(program.clone());
        program
    }

    pub async fn add_tracking(&self, program_id: Uuid, row: SessionTracking) {
        let mut inner = self.inner.write().await;
        inner.tracking.entry(program_id).or_default().push(row);
    }

    /// Makes `checkin_for_date` miss, as if a concurrent request had not
    /// committed yet when the pre-check ran.
    pub async fn hide_existing_checkins(&self, hide: bool) {
        self.inner.write().await.hide_existing = hide;
    }

    pub async fn checkin_count(&self) -> usize {
        self.inner.read().await.checkins.len()
    }
}

#[async_trait]
impl ProgramStore for MemoryStore {
    async fn active_program(&self, user_id: Uuid) -> Result<Option<ActiveProgram>> {
        let inner = self.inner.read().await;
        Ok(inner.programs.iter().find(|p| p.user_id == user_id).cloned())
    }

    async fn tracking(&self, program_id: Uuid) -> Result<Vec<SessionTracking>> {
        let inner = self.inner.read().await;
        Ok(inner.tracking.get(&program_id).cloned().unwrap_or_default())
    }

    async fn user_timezone(&self, _user_id: Uuid) -> Result<Option<String>> {
        Ok(None)
    }
}

#[async_trait]
impl CheckinStore for MemoryStore {
    async fn checkin_for_date(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<StoredCheckin>> {
        let inner = self.inner.read().await;
        if inner.hide_existing {
            return Ok(None);
        }
        Ok(inner
            .checkins
            .iter()
            .find(|c| c.user_id == user_id && c.checkin_date == date)
            .cloned())
    }

    async fn recent_feelings(
        &self,
        user_id: Uuid,
        program_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Feeling>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<_> = inner
            .checkins
            .iter()
            .filter(|c| c.user_id == user_id && c.program_id == program_id)
            .collect();
        rows.sort_by(|a, b| b.checkin_date.cmp(&a.checkin_date));
        rows.into_iter()
            .take(limit.max(0) as usize)
            .map(|c| Feeling::try_from(c.feeling).map_err(|e| anyhow!(e)))
            .collect()
    }

    async fn recent_checkins(&self, user_id: Uuid, limit: i64) -> Result<Vec<StoredCheckin>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<_> = inner
            .checkins
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.checkin_date.cmp(&a.checkin_date));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn insert_checkin(&self, checkin: NewCheckin) -> Result<InsertOutcome> {
        let mut inner = self.inner.write().await;
        let taken = inner
            .checkins
            .iter()
            .any(|c| c.user_id == checkin.user_id && c.checkin_date == checkin.checkin_date);
        if taken {
            return Ok(InsertOutcome::Duplicate);
        }
        let stored = StoredCheckin {
            id: Uuid::new_v4(),
            user_id: checkin.user_id,
            program_id: checkin.program_id,
            session_id: checkin.session_id,
            feeling: checkin.feeling.value(),
            adjustment: checkin.adjustment,
            checkin_date: checkin.checkin_date,
            created_at: Utc::now(),
        };
        inner.checkins.push(stored.clone());
        Ok(InsertOutcome::Inserted(stored))
    }
}

pub fn session(day: &str, session_type: &str, distance_km: Option<f64>, rpe: Option<u8>) -> PlannedSession {
    PlannedSession {
        day: day.to_string(),
        session_type: session_type.to_string(),
        description: None,
        distance_km,
        duration_min: None,
        pace_target: Some("5:30".to_string()),
        rpe,
        is_rest: false,
    }
}

pub fn rest_day(day: &str) -> PlannedSession {
    PlannedSession {
        pace_target: None,
        is_rest: true,
        ..session(day, "Repos", None, None)
    }
}

/// Two-week plan; week 1 has one interval day, week 2 adds strength work.
pub fn sample_program() -> ProgramData {
    ProgramData {
        title: "Objectif 10K".to_string(),
        weeks: vec![
            ProgramWeek {
                week_number: 1,
                focus: Some("Reprise".to_string()),
                sessions: vec![
                    session("Lundi", "Footing", Some(8.0), Some(4)),
                    rest_day("Mardi"),
                    session("Mercredi", "Fractionné", Some(10.0), Some(8)),
                    session("Samedi", "Sortie longue", Some(14.0), Some(5)),
                ],
            },
            ProgramWeek {
                week_number: 2,
                focus: Some("Volume".to_string()),
                sessions: vec![
                    session("Lundi", "Footing", Some(9.0), Some(4)),
                    session("Mercredi", "Tempo", Some(11.0), Some(7)),
                    session("Jeudi", "Renforcement", None, Some(5)),
                    session("Samedi", "Sortie longue", Some(16.0), Some(5)),
                ],
            },
        ],
    }
}

pub fn completed(week_number: u32, day: &str, km: f64) -> SessionTracking {
    SessionTracking {
        week_number,
        day: day.to_string(),
        completed: true,
        actual_distance_km: Some(km),
        rpe: None,
        notes: None,
    }
}
