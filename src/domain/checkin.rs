//! Daily check-in adjustment engine.
//!
//! Pure decision rules: given today's feeling, the fatigue streak built from
//! previous check-ins and the next scheduled session, decide whether the
//! session runs unchanged, is lightened by 10% or is replaced by active rest.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const REST_LABEL: &str = "Repos actif";
pub const GENERIC_LABEL: &str = "Entraînement";
pub const HIGH_INTENSITY_LABEL: &str = "Fractionné";
pub const LOWER_INTENSITY_LABEL: &str = "Endurance fondamentale";
pub const REDUCED_QUALIFIER: &str = " (allégé)";
pub const PACE_UNIT: &str = "/km";

pub const GOOD_MESSAGE: &str = "Super ! Continue comme ça, ta séance est maintenue.";
pub const ACCUMULATED_FATIGUE_MESSAGE: &str =
    "Fatigue accumulée détectée : repos forcé par sécurité.";
pub const VERY_TIRED_MESSAGE: &str = "Repos recommandé aujourd'hui. Écoute ton corps.";
pub const GENERIC_REDUCTION_MESSAGE: &str = "Intensité -10 % sur ta prochaine séance.";

const FORCED_REST_STREAK: u32 = 2;
const PACE_SLOWDOWN: f64 = 1.10;

static PACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2}):([0-5]\d)").expect("valid pace regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum Feeling {
    Good = 1,
    Tired = 2,
    VeryTired = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("feeling must be 1, 2 or 3 (got {0})")]
pub struct InvalidFeeling(pub i16);

impl TryFrom<i16> for Feeling {
    type Error = InvalidFeeling;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Feeling::Good),
            2 => Ok(Feeling::Tired),
            3 => Ok(Feeling::VeryTired),
            other => Err(InvalidFeeling(other)),
        }
    }
}

impl From<Feeling> for i16 {
    fn from(value: Feeling) -> Self {
        value as i16
    }
}

impl Feeling {
    pub fn value(self) -> i16 {
        self as i16
    }

    pub fn is_fatigued(self) -> bool {
        self >= Feeling::Tired
    }
}

/// The session a check-in targets: the next scheduled, non-rest session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub week_number: u32,
    pub day: String,
    pub session_type: String,
    pub pace_target: Option<String>,
}

impl SessionDescriptor {
    pub fn session_id(&self) -> String {
        format!("{}-{}", self.week_number, self.day)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentCause {
    /// A single "very tired" report.
    SingleSevere,
    /// Two or more fatigued check-ins in a row before today.
    AccumulatedFatigue,
    /// Plain "tired" report, 10% reduction.
    Tired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentDecision {
    pub original_type: String,
    pub adjusted_type: String,
    pub intensity_reduction: u8,
    pub message: String,
    pub adjusted_pace: Option<String>,
    pub cause: AdjustmentCause,
}

impl AdjustmentDecision {
    pub fn is_forced_rest(&self) -> bool {
        self.intensity_reduction == 100
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinOutcome {
    pub adjustment: Option<AdjustmentDecision>,
    pub message: String,
}

/// Counts consecutive fatigued check-ins, most recent first, stopping at the
/// first good day. Today's submission must not be part of `recent`.
pub fn fatigue_streak(recent: &[Feeling]) -> u32 {
    recent.iter().take_while(|f| f.is_fatigued()).count() as u32
}

pub fn adjust_next_session(
    feeling: Feeling,
    fatigue_streak: u32,
    target: Option<&SessionDescriptor>,
) -> CheckinOutcome {
    if feeling == Feeling::Good {
        return CheckinOutcome {
            adjustment: None,
            message: GOOD_MESSAGE.to_string(),
        };
    }

    if feeling == Feeling::VeryTired || fatigue_streak >= FORCED_REST_STREAK {
        let (cause, message) = if fatigue_streak >= FORCED_REST_STREAK {
            (AdjustmentCause::AccumulatedFatigue, ACCUMULATED_FATIGUE_MESSAGE)
        } else {
            (AdjustmentCause::SingleSevere, VERY_TIRED_MESSAGE)
        };
        let original_type = target
            .map(|s| s.session_type.clone())
            .unwrap_or_else(|| GENERIC_LABEL.to_string());

        return CheckinOutcome {
            adjustment: Some(AdjustmentDecision {
                original_type,
                adjusted_type: REST_LABEL.to_string(),
                intensity_reduction: 100,
                message: message.to_string(),
                adjusted_pace: None,
                cause,
            }),
            message: message.to_string(),
        };
    }

    let Some(session) = target else {
        return CheckinOutcome {
            adjustment: Some(AdjustmentDecision {
                original_type: GENERIC_LABEL.to_string(),
                adjusted_type: format!("{GENERIC_LABEL}{REDUCED_QUALIFIER}"),
                intensity_reduction: 10,
                message: GENERIC_REDUCTION_MESSAGE.to_string(),
                adjusted_pace: None,
                cause: AdjustmentCause::Tired,
            }),
            message: GENERIC_REDUCTION_MESSAGE.to_string(),
        };
    };

    let adjusted_type = if session.session_type == HIGH_INTENSITY_LABEL {
        LOWER_INTENSITY_LABEL.to_string()
    } else {
        format!("{}{}", session.session_type, REDUCED_QUALIFIER)
    };

    let adjusted_pace = session.pace_target.as_deref().and_then(slow_pace);
    let message = match &adjusted_pace {
        Some(pace) => format!("Séance allégée de 10 % : nouvelle allure cible {pace}."),
        None => "Séance allégée de 10 % : ralentis l'allure et raccourcis le volume.".to_string(),
    };

    CheckinOutcome {
        adjustment: Some(AdjustmentDecision {
            original_type: session.session_type.clone(),
            adjusted_type,
            intensity_reduction: 10,
            message: message.clone(),
            adjusted_pace,
            cause: AdjustmentCause::Tired,
        }),
        message,
    }
}

/// Slows a `M:SS` per-kilometre pace by 10%, e.g. `"5:30"` -> `"6:03/km"`.
pub fn slow_pace(pace: &str) -> Option<String> {
    let caps = PACE_RE.captures(pace)?;
    let minutes: u32 = caps.get(1)?.as_str().parse().ok()?;
    let seconds: u32 = caps.get(2)?.as_str().parse().ok()?;
    let total = f64::from(minutes * 60 + seconds);
    let slowed = (total * PACE_SLOWDOWN).round() as u32;
    Some(format!("{}:{:02}{}", slowed / 60, slowed % 60, PACE_UNIT))
}
