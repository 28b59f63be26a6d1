//! Training program shape, schema validation and the weekly views computed
//! from a program plus its tracking rows.

use crate::domain::checkin::SessionDescriptor;
use crate::domain::intensity::SessionClassifier;
use crate::domain::risk::WeeklyTrainingSnapshot;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const MAX_WEEKS: usize = 52;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramData {
    #[serde(default)]
    pub title: String,
    pub weeks: Vec<ProgramWeek>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramWeek {
    pub week_number: u32,
    #[serde(default)]
    pub focus: Option<String>,
    pub sessions: Vec<PlannedSession>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedSession {
    pub day: String,
    #[serde(alias = "type")]
    pub session_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub duration_min: Option<u32>,
    #[serde(default)]
    pub pace_target: Option<String>,
    #[serde(default)]
    pub rpe: Option<u8>,
    #[serde(default)]
    pub is_rest: bool,
}

/// Completion record for one planned session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTracking {
    pub week_number: u32,
    pub day: String,
    pub completed: bool,
    pub actual_distance_km: Option<f64>,
    pub rpe: Option<u8>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProgramValidationError {
    #[error("program has no weeks")]
    NoWeeks,
    #[error("program has {0} weeks, more than the supported maximum")]
    TooManyWeeks(usize),
    #[error("expected week {expected}, found week {found}")]
    WeekOutOfOrder { expected: u32, found: u32 },
    #[error("week {0} has no sessions")]
    EmptyWeek(u32),
    #[error("week {week}: unknown day '{day}'")]
    UnknownDay { week: u32, day: String },
    #[error("week {week}: day '{day}' appears twice")]
    DuplicateDay { week: u32, day: String },
    #[error("week {week}, {day}: session type is empty")]
    EmptySessionType { week: u32, day: String },
    #[error("week {week}, {day}: rpe {rpe} outside 1-10")]
    RpeOutOfRange { week: u32, day: String, rpe: u8 },
    #[error("week {week}, {day}: distance or duration is invalid")]
    InvalidMeasure { week: u32, day: String },
}

pub fn parse_day(raw: &str) -> Option<Weekday> {
    match raw.trim().to_lowercase().as_str() {
        "lundi" | "monday" | "mon" => Some(Weekday::Mon),
        "mardi" | "tuesday" | "tue" => Some(Weekday::Tue),
        "mercredi" | "wednesday" | "wed" => Some(Weekday::Wed),
        "jeudi" | "thursday" | "thu" => Some(Weekday::Thu),
        "vendredi" | "friday" | "fri" => Some(Weekday::Fri),
        "samedi" | "saturday" | "sat" => Some(Weekday::Sat),
        "dimanche" | "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

pub fn validate_program(program: &ProgramData) -> Result<(), ProgramValidationError> {
    if program.weeks.is_empty() {
        return Err(ProgramValidationError::NoWeeks);
    }
    if program.weeks.len() > MAX_WEEKS {
        return Err(ProgramValidationError::TooManyWeeks(program.weeks.len()));
    }

    for (idx, week) in program.weeks.iter().enumerate() {
        let expected = idx as u32 + 1;
        if week.week_number != expected {
            return Err(ProgramValidationError::WeekOutOfOrder {
                expected,
                found: week.week_number,
            });
        }
        if week.sessions.is_empty() {
            return Err(ProgramValidationError::EmptyWeek(week.week_number));
        }

        let mut seen = HashSet::new();
        for session in &week.sessions {
            let Some(weekday) = parse_day(&session.day) else {
                return Err(ProgramValidationError::UnknownDay {
                    week: week.week_number,
                    day: session.day.clone(),
                });
            };
            if !seen.insert(weekday) {
                return Err(ProgramValidationError::DuplicateDay {
                    week: week.week_number,
                    day: session.day.clone(),
                });
            }
            if session.session_type.trim().is_empty() {
                return Err(ProgramValidationError::EmptySessionType {
                    week: week.week_number,
                    day: session.day.clone(),
                });
            }
            if let Some(rpe) = session.rpe {
                if !(1..=10).contains(&rpe) {
                    return Err(ProgramValidationError::RpeOutOfRange {
                        week: week.week_number,
                        day: session.day.clone(),
                        rpe,
                    });
                }
            }
            let bad_distance = session
                .distance_km
                .is_some_and(|d| !d.is_finite() || d < 0.0);
            if bad_distance || session.duration_min.is_some_and(|m| m > 24 * 60) {
                return Err(ProgramValidationError::InvalidMeasure {
                    week: week.week_number,
                    day: session.day.clone(),
                });
            }
        }
    }

    Ok(())
}

/// 1-based program week containing `today`, clamped to the program length.
pub fn current_week(start_date: NaiveDate, today: NaiveDate, total_weeks: u32) -> u32 {
    let days = (today - start_date).num_days().max(0);
    let week = (days / 7) as u32 + 1;
    week.min(total_weeks.max(1))
}

/// Calendar date of `day` within program week `week_number`.
pub fn session_date(start_date: NaiveDate, week_number: u32, day: Weekday) -> NaiveDate {
    let week_start = start_date + Duration::days(7 * i64::from(week_number.saturating_sub(1)));
    let offset = (7 + day.num_days_from_monday() as i64
        - week_start.weekday().num_days_from_monday() as i64)
        % 7;
    week_start + Duration::days(offset)
}

fn tracking_for<'a>(
    tracking: &'a [SessionTracking],
    week_number: u32,
    day: Weekday,
) -> Option<&'a SessionTracking> {
    tracking
        .iter()
        .find(|t| t.week_number == week_number && parse_day(&t.day) == Some(day))
}

impl ProgramData {
    pub fn total_weeks(&self) -> u32 {
        self.weeks.len() as u32
    }

    pub fn week(&self, week_number: u32) -> Option<&ProgramWeek> {
        self.weeks.iter().find(|w| w.week_number == week_number)
    }

    pub fn find_session(&self, week_number: u32, day: &str) -> Option<&PlannedSession> {
        let weekday = parse_day(day)?;
        self.week(week_number)?
            .sessions
            .iter()
            .find(|s| parse_day(&s.day) == Some(weekday))
    }

    /// Number of non-rest sessions in the whole program.
    pub fn planned_sessions(&self) -> usize {
        self.weeks
            .iter()
            .flat_map(|w| w.sessions.iter())
            .filter(|s| !s.is_rest)
            .count()
    }
}

/// The next non-rest session, not yet completed, scheduled today or later.
pub fn next_session(
    program: &ProgramData,
    tracking: &[SessionTracking],
    start_date: NaiveDate,
    today: NaiveDate,
) -> Option<SessionDescriptor> {
    let from_week = current_week(start_date, today, program.total_weeks());

    program
        .weeks
        .iter()
        .filter(|w| w.week_number >= from_week)
        .flat_map(|week| {
            let mut dated: Vec<_> = week
                .sessions
                .iter()
                .filter_map(|s| {
                    let weekday = parse_day(&s.day)?;
                    Some((session_date(start_date, week.week_number, weekday), weekday, s))
                })
                .collect();
            dated.sort_by_key(|(date, _, _)| *date);
            dated
                .into_iter()
                .map(move |(date, weekday, s)| (week.week_number, date, weekday, s))
        })
        .find(|(week_number, date, weekday, s)| {
            *date >= today
                && !s.is_rest
                && !tracking_for(tracking, *week_number, *weekday).is_some_and(|t| t.completed)
        })
        .map(|(week_number, _, _, s)| SessionDescriptor {
            week_number,
            day: s.day.clone(),
            session_type: s.session_type.clone(),
            pace_target: s.pace_target.clone(),
        })
}

fn completed_volume(program: &ProgramData, tracking: &[SessionTracking], week_number: u32) -> f64 {
    tracking
        .iter()
        .filter(|t| t.week_number == week_number && t.completed)
        .map(|t| {
            t.actual_distance_km
                .or_else(|| {
                    program
                        .find_session(week_number, &t.day)
                        .and_then(|s| s.distance_km)
                })
                .unwrap_or(0.0)
        })
        .sum()
}

/// Aggregates the current program week into the risk scorer's input.
pub fn weekly_snapshot(
    program: &ProgramData,
    tracking: &[SessionTracking],
    start_date: NaiveDate,
    today: NaiveDate,
    recent_feelings: Vec<i16>,
    classifier: &dyn SessionClassifier,
) -> WeeklyTrainingSnapshot {
    let week_number = current_week(start_date, today, program.total_weeks());

    let current_week_volume = completed_volume(program, tracking, week_number);
    let last_week_volume = if week_number > 1 {
        completed_volume(program, tracking, week_number - 1)
    } else {
        0.0
    };

    let mut intense_sessions = 0;
    let mut total_sessions = 0;
    let mut has_strength_work = false;
    let mut training_days = HashSet::new();

    if let Some(week) = program.week(week_number) {
        for session in &week.sessions {
            if classifier.is_strength(&session.session_type) {
                has_strength_work = true;
            }
            if session.is_rest {
                continue;
            }
            let weekday = parse_day(&session.day);
            if let Some(weekday) = weekday {
                training_days.insert(weekday);
            }
            let rpe = weekday
                .and_then(|d| tracking_for(tracking, week_number, d))
                .and_then(|t| t.rpe)
                .or(session.rpe);

            total_sessions += 1;
            if classifier.is_intense(&session.session_type, rpe) {
                intense_sessions += 1;
            }
        }
    }

    WeeklyTrainingSnapshot {
        current_week_volume,
        last_week_volume,
        intense_sessions,
        total_sessions,
        rest_days_this_week: 7u32.saturating_sub(training_days.len() as u32),
        has_strength_work,
        recent_feelings,
    }
}
