use crate::time_utils;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunnerLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl RunnerLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerLevel::Beginner => "beginner",
            RunnerLevel::Intermediate => "intermediate",
            RunnerLevel::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RaceContext {
    pub name: String,
    pub date: NaiveDate,
    pub distance_km: f64,
}

/// Onboarding questionnaire answers, the input of program generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OnboardingProfile {
    pub level: RunnerLevel,
    pub goal: String,
    pub target_date: NaiveDate,
    pub sessions_per_week: u8,
    #[serde(default)]
    pub reference_time: Option<String>,
    #[serde(default)]
    pub injury_notes: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub race: Option<RaceContext>,
}

fn default_timezone() -> String {
    time_utils::DEFAULT_TIMEZONE.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("goal is required")]
    MissingGoal,
    #[error("sessions per week must be between 1 and 7")]
    SessionsPerWeek,
    #[error("target date must be in the future")]
    TargetDateInPast,
    #[error("unknown timezone '{0}'")]
    Timezone(String),
    #[error("race needs a positive distance and a date on or before the target date")]
    InvalidRace,
    #[error("injury notes are too long")]
    NotesTooLong,
}

impl OnboardingProfile {
    pub fn validate(&self, today: NaiveDate) -> Result<(), ProfileError> {
        if self.goal.trim().is_empty() {
            return Err(ProfileError::MissingGoal);
        }
        if !(1..=7).contains(&self.sessions_per_week) {
            return Err(ProfileError::SessionsPerWeek);
        }
        if self.target_date <= today {
            return Err(ProfileError::TargetDateInPast);
        }
        if time_utils::normalize_timezone(&self.timezone).is_none() {
            return Err(ProfileError::Timezone(self.timezone.clone()));
        }
        if let Some(race) = &self.race {
            if race.date > self.target_date || !(race.distance_km > 0.0) {
                return Err(ProfileError::InvalidRace);
            }
        }
        if self.injury_notes.as_ref().is_some_and(|n| n.len() > 2000) {
            return Err(ProfileError::NotesTooLong);
        }
        Ok(())
    }

    /// Whole weeks between `today` and the target date, at least one.
    pub fn weeks_until_target(&self, today: NaiveDate) -> u32 {
        let days = (self.target_date - today).num_days().max(1);
        ((days + 6) / 7) as u32
    }
}
