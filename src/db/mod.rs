use crate::crypto::NoteCipher;
use crate::domain::checkin::{AdjustmentDecision, Feeling};
use crate::domain::profile::OnboardingProfile;
use crate::domain::program::{ProgramData, SessionTracking};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveProgram {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub start_date: NaiveDate,
    pub data: ProgramData,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredCheckin {
    pub id: Uuid,
    pub user_id: Uuid,
    pub program_id: Uuid,
    pub session_id: Option<String>,
    pub feeling: i16,
    pub adjustment: Option<AdjustmentDecision>,
    pub checkin_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCheckin {
    pub user_id: Uuid,
    pub program_id: Uuid,
    pub session_id: Option<String>,
    pub feeling: Feeling,
    pub adjustment: Option<AdjustmentDecision>,
    pub checkin_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(StoredCheckin),
    /// (user_id, checkin_date) already taken, possibly by a concurrent request.
    Duplicate,
}

#[async_trait]
pub trait ProgramStore: Send + Sync {
    async fn active_program(&self, user_id: Uuid) -> Result<Option<ActiveProgram>>;
    async fn tracking(&self, program_id: Uuid) -> Result<Vec<SessionTracking>>;
    async fn user_timezone(&self, user_id: Uuid) -> Result<Option<String>>;
}

#[async_trait]
pub trait CheckinStore: Send + Sync {
    async fn checkin_for_date(&self, user_id: Uuid, date: NaiveDate)
        -> Result<Option<StoredCheckin>>;
    /// Feelings for (user, program), most recent first.
    async fn recent_feelings(&self, user_id: Uuid, program_id: Uuid, limit: i64)
        -> Result<Vec<Feeling>>;
    async fn recent_checkins(&self, user_id: Uuid, limit: i64) -> Result<Vec<StoredCheckin>>;
    async fn insert_checkin(&self, checkin: NewCheckin) -> Result<InsertOutcome>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

const CHECKIN_COLUMNS: &str =
    "id, user_id, program_id, session_id, feeling, adjustment, checkin_date, created_at";

fn checkin_from_row(row: &PgRow) -> Result<StoredCheckin> {
    let adjustment: Option<Json<AdjustmentDecision>> = row.try_get("adjustment")?;
    Ok(StoredCheckin {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        program_id: row.try_get("program_id")?,
        session_id: row.try_get("session_id")?,
        feeling: row.try_get("feeling")?,
        adjustment: adjustment.map(|Json(a)| a),
        checkin_date: row.try_get("checkin_date")?,
        created_at: row.try_get("created_at")?,
    })
}

fn tracking_from_row(row: &PgRow) -> Result<SessionTracking> {
    let week_number: i32 = row.try_get("week_number")?;
    let rpe: Option<i16> = row.try_get("rpe")?;
    Ok(SessionTracking {
        week_number: u32::try_from(week_number)
            .map_err(|_| anyhow!("negative week number {week_number}"))?,
        day: row.try_get("day")?,
        completed: row.try_get("completed")?,
        actual_distance_km: row.try_get("actual_distance_km")?,
        rpe: rpe.and_then(|r| u8::try_from(r).ok()),
        notes: row.try_get("notes")?,
    })
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn save_profile(
        &self,
        cipher: &NoteCipher,
        user_id: Uuid,
        profile: &OnboardingProfile,
    ) -> Result<()> {
        let enc_notes = cipher
            .seal_optional(profile.injury_notes.as_deref())
            .map_err(|e| anyhow!("failed to encrypt injury notes: {e}"))?;

        sqlx::query(
            r#"
            INSERT INTO profiles (
                user_id, level, goal, target_date, sessions_per_week, reference_time,
                enc_injury_notes, timezone, race_name, race_date, race_distance_km
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (user_id) DO UPDATE SET
                level = EXCLUDED.level,
                goal = EXCLUDED.goal,
                target_date = EXCLUDED.target_date,
                sessions_per_week = EXCLUDED.sessions_per_week,
                reference_time = EXCLUDED.reference_time,
                enc_injury_notes = EXCLUDED.enc_injury_notes,
                timezone = EXCLUDED.timezone,
                race_name = EXCLUDED.race_name,
                race_date = EXCLUDED.race_date,
                race_distance_km = EXCLUDED.race_distance_km,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(profile.level.as_str())
        .bind(profile.goal.trim())
        .bind(profile.target_date)
        .bind(i16::from(profile.sessions_per_week))
        .bind(profile.reference_time.as_deref())
        .bind(enc_notes)
        .bind(profile.timezone.trim())
        .bind(profile.race.as_ref().map(|r| r.name.clone()))
        .bind(profile.race.as_ref().map(|r| r.date))
        .bind(profile.race.as_ref().map(|r| r.distance_km))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stores a new program and makes it the user's only active one.
    pub async fn activate_program(
        &self,
        user_id: Uuid,
        start_date: NaiveDate,
        program: &ProgramData,
    ) -> Result<ActiveProgram> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE programs SET is_active = FALSE WHERE user_id = $1 AND is_active")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(
            r#"
            INSERT INTO programs (id, user_id, title, start_date, data, is_active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&program.title)
        .bind(start_date)
        .bind(Json(program))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ActiveProgram {
            id: row.try_get("id")?,
            user_id,
            title: program.title.clone(),
            start_date,
            data: program.clone(),
            created_at: row.try_get("created_at")?,
        })
    }

    pub async fn upsert_tracking(&self, program_id: Uuid, tracking: &SessionTracking) -> Result<()> {
        let week_number = i32::try_from(tracking.week_number)?;
        sqlx::query(
            r#"
            INSERT INTO session_tracking
                (program_id, week_number, day, completed, actual_distance_km, rpe, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (program_id, week_number, day) DO UPDATE SET
                completed = EXCLUDED.completed,
                actual_distance_km = EXCLUDED.actual_distance_km,
                rpe = EXCLUDED.rpe,
                notes = EXCLUDED.notes,
                updated_at = NOW()
            "#,
        )
        .bind(program_id)
        .bind(week_number)
        .bind(&tracking.day)
        .bind(tracking.completed)
        .bind(tracking.actual_distance_km)
        .bind(tracking.rpe.map(i16::from))
        .bind(tracking.notes.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ProgramStore for PgStore {
    async fn active_program(&self, user_id: Uuid) -> Result<Option<ActiveProgram>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, title, start_date, data, created_at
            FROM programs
            WHERE user_id = $1 AND is_active
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Json(data): Json<ProgramData> = row.try_get("data")?;
        Ok(Some(ActiveProgram {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            start_date: row.try_get("start_date")?,
            data,
            created_at: row.try_get("created_at")?,
        }))
    }

    async fn tracking(&self, program_id: Uuid) -> Result<Vec<SessionTracking>> {
        let rows = sqlx::query(
            r#"
            SELECT week_number, day, completed, actual_distance_km, rpe, notes
            FROM session_tracking
            WHERE program_id = $1
            ORDER BY week_number, day
            "#,
        )
        .bind(program_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(tracking_from_row).collect()
    }

    async fn user_timezone(&self, user_id: Uuid) -> Result<Option<String>> {
        let tz = sqlx::query_scalar::<_, String>("SELECT timezone FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tz)
    }
}

#[async_trait]
impl CheckinStore for PgStore {
    async fn checkin_for_date(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<StoredCheckin>> {
        let row = sqlx::query(&format!(
            "SELECT {CHECKIN_COLUMNS} FROM checkins WHERE user_id = $1 AND checkin_date = $2"
        ))
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(checkin_from_row).transpose()
    }

    async fn recent_feelings(
        &self,
        user_id: Uuid,
        program_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Feeling>> {
        let values = sqlx::query_scalar::<_, i16>(
            r#"
            SELECT feeling
            FROM checkins
            WHERE user_id = $1 AND program_id = $2
            ORDER BY checkin_date DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(program_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        values
            .into_iter()
            .map(|v| Feeling::try_from(v).map_err(|e| anyhow!("corrupt check-in row: {e}")))
            .collect()
    }

    async fn recent_checkins(&self, user_id: Uuid, limit: i64) -> Result<Vec<StoredCheckin>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHECKIN_COLUMNS} FROM checkins WHERE user_id = $1 \
             ORDER BY checkin_date DESC LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(checkin_from_row).collect()
    }

    async fn insert_checkin(&self, checkin: NewCheckin) -> Result<InsertOutcome> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO checkins
                (id, user_id, program_id, session_id, feeling, adjustment, checkin_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, checkin_date) DO NOTHING
            RETURNING {CHECKIN_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(checkin.user_id)
        .bind(checkin.program_id)
        .bind(checkin.session_id)
        .bind(checkin.feeling.value())
        .bind(checkin.adjustment.map(Json))
        .bind(checkin.checkin_date)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(InsertOutcome::Inserted(checkin_from_row(&row)?)),
            None => Ok(InsertOutcome::Duplicate),
        }
    }
}
