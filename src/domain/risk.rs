//! Injury risk scoring from weekly training aggregates.
//!
//! Five bounded factors sum to a 0-100 score:
//! - volume spike (30)
//! - intensity ratio (20)
//! - fatigue (25)
//! - no strength work (15)
//! - insufficient rest (10)

use serde::{Deserialize, Serialize};

const MAX_RECOMMENDATIONS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyTrainingSnapshot {
    pub current_week_volume: f64,
    pub last_week_volume: f64,
    pub intense_sessions: u32,
    pub total_sessions: u32,
    pub rest_days_this_week: u32,
    pub has_strength_work: bool,
    /// Most recent check-in feelings (1-3), order irrelevant.
    pub recent_feelings: Vec<i16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=30 => RiskLevel::Low,
            31..=60 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub key: String,
    pub label: String,
    pub score: u32,
    pub max_score: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u32,
    pub level: RiskLevel,
    pub factors: Vec<RiskFactor>,
    pub recommendations: Vec<String>,
}

fn capped(value: f64, max: u32) -> u32 {
    (value.round().max(0.0) as u32).min(max)
}

fn factor(key: &str, label: &str, score: u32, max_score: u32, description: String) -> RiskFactor {
    RiskFactor {
        key: key.to_string(),
        label: label.to_string(),
        score,
        max_score,
        description,
    }
}

pub fn assess_injury_risk(snapshot: &WeeklyTrainingSnapshot) -> RiskAssessment {
    let mut factors = Vec::with_capacity(5);
    let mut recommendations = Vec::new();

    // Volume spike
    if snapshot.last_week_volume <= 0.0 {
        factors.push(factor(
            "volume_spike",
            "Augmentation du volume",
            0,
            30,
            "Pas de données sur la semaine précédente".to_string(),
        ));
    } else {
        let increase = (snapshot.current_week_volume - snapshot.last_week_volume)
            / snapshot.last_week_volume
            * 100.0;
        let score = if increase > 20.0 {
            capped(increase - 10.0, 30)
        } else {
            0
        };
        if increase > 15.0 {
            recommendations
                .push("Réduis ton volume de 10 % la semaine prochaine.".to_string());
        }
        factors.push(factor(
            "volume_spike",
            "Augmentation du volume",
            score,
            30,
            format!("{increase:+.0} % par rapport à la semaine précédente"),
        ));
    }

    // Intensity ratio
    if snapshot.total_sessions == 0 {
        factors.push(factor(
            "intensity_ratio",
            "Part de séances intenses",
            0,
            20,
            "Aucune séance cette semaine".to_string(),
        ));
    } else {
        let ratio = f64::from(snapshot.intense_sessions) / f64::from(snapshot.total_sessions);
        let score = if ratio > 0.2 {
            capped((ratio - 0.2) * 100.0, 20)
        } else {
            0
        };
        if ratio > 0.3 {
            recommendations.push(
                "Ajoute davantage de séances en endurance fondamentale.".to_string(),
            );
        }
        factors.push(factor(
            "intensity_ratio",
            "Part de séances intenses",
            score,
            20,
            format!(
                "{}/{} séances intenses ({:.0} %)",
                snapshot.intense_sessions,
                snapshot.total_sessions,
                ratio * 100.0
            ),
        ));
    }

    // Fatigue
    if snapshot.recent_feelings.is_empty() {
        factors.push(factor(
            "fatigue",
            "Niveau de fatigue",
            0,
            25,
            "Aucun check-in récent".to_string(),
        ));
    } else {
        let sum: i64 = snapshot.recent_feelings.iter().map(|&f| i64::from(f)).sum();
        let average = sum as f64 / snapshot.recent_feelings.len() as f64;
        let score = capped((average - 1.0) * 12.5, 25);
        if average > 1.5 {
            recommendations.push("Priorise la récupération cette semaine.".to_string());
        }
        factors.push(factor(
            "fatigue",
            "Niveau de fatigue",
            score,
            25,
            format!("Ressenti moyen {average:.1}/3"),
        ));
    }

    // Strength work
    let strength_score = if snapshot.has_strength_work { 0 } else { 15 };
    if !snapshot.has_strength_work {
        recommendations
            .push("Intègre du renforcement musculaire 2 fois par semaine.".to_string());
    }
    factors.push(factor(
        "strength_work",
        "Renforcement musculaire",
        strength_score,
        15,
        if snapshot.has_strength_work {
            "Renforcement présent".to_string()
        } else {
            "Aucun renforcement cette semaine".to_string()
        },
    ));

    // Rest days
    let rest_score = match snapshot.rest_days_this_week {
        0 => 10,
        1 => 5,
        _ => 0,
    };
    if snapshot.rest_days_this_week < 2 {
        recommendations
            .push("Prévois au moins 2 jours de repos par semaine.".to_string());
    }
    factors.push(factor(
        "rest_days",
        "Jours de repos",
        rest_score,
        10,
        format!("{} jour(s) de repos cette semaine", snapshot.rest_days_this_week),
    ));

    let score: u32 = factors.iter().map(|f| f.score).sum();
    recommendations.truncate(MAX_RECOMMENDATIONS);

    RiskAssessment {
        score,
        level: RiskLevel::from_score(score),
        factors,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(assessment: &RiskAssessment) -> Vec<u32> {
        assessment.factors.iter().map(|f| f.score).collect()
    }

    #[test]
    fn test_mixed_week_is_medium() {
        let snapshot = WeeklyTrainingSnapshot {
            current_week_volume: 50.0,
            last_week_volume: 40.0,
            intense_sessions: 1,
            total_sessions: 4,
            rest_days_this_week: 1,
            has_strength_work: false,
            recent_feelings: vec![2, 2, 1],
        };

        let assessment = assess_injury_risk(&snapshot);
        assert_eq!(scores(&assessment), vec![15, 5, 8, 15, 5]);
        assert_eq!(assessment.score, 48);
        assert_eq!(assessment.level, RiskLevel::Medium);

        // volume, fatigue, strength fire first; rest is dropped by truncation
        assert_eq!(assessment.recommendations.len(), 3);
        assert!(assessment.recommendations[0].contains("volume"));
        assert!(assessment.recommendations[1].contains("récupération"));
        assert!(assessment.recommendations[2].contains("renforcement"));
    }

    #[test]
    fn test_empty_week_is_low() {
        let snapshot = WeeklyTrainingSnapshot {
            rest_days_this_week: 3,
            has_strength_work: true,
            ..Default::default()
        };

        let assessment = assess_injury_risk(&snapshot);
        assert_eq!(assessment.score, 0);
        assert_eq!(assessment.level, RiskLevel::Low);
        assert!(assessment.recommendations.is_empty());
        assert_eq!(assessment.factors.len(), 5);
    }

    #[test]
    fn test_factor_caps() {
        let snapshot = WeeklyTrainingSnapshot {
            current_week_volume: 100.0,
            last_week_volume: 20.0,
            intense_sessions: 5,
            total_sessions: 5,
            rest_days_this_week: 0,
            has_strength_work: false,
            recent_feelings: vec![3, 3, 3, 3, 3, 3, 3],
        };

        let assessment = assess_injury_risk(&snapshot);
        assert_eq!(scores(&assessment), vec![30, 20, 25, 15, 10]);
        assert_eq!(assessment.score, 100);
        assert_eq!(assessment.level, RiskLevel::High);
    }

    #[test]
    fn test_volume_between_15_and_20_percent_recommends_without_scoring() {
        let snapshot = WeeklyTrainingSnapshot {
            current_week_volume: 118.0,
            last_week_volume: 100.0,
            rest_days_this_week: 2,
            has_strength_work: true,
            ..Default::default()
        };

        let assessment = assess_injury_risk(&snapshot);
        assert_eq!(assessment.factors[0].score, 0);
        assert_eq!(assessment.recommendations.len(), 1);
    }

    #[test]
    fn test_volume_drop_scores_zero() {
        let snapshot = WeeklyTrainingSnapshot {
            current_week_volume: 10.0,
            last_week_volume: 40.0,
            rest_days_this_week: 2,
            has_strength_work: true,
            ..Default::default()
        };
        assert_eq!(assess_injury_risk(&snapshot).score, 0);
    }

    #[test]
    fn test_level_boundaries() {
        assert_eq!(RiskLevel::from_score(30), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(31), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(60), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(61), RiskLevel::High);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let snapshot = WeeklyTrainingSnapshot {
            current_week_volume: 42.0,
            last_week_volume: 30.0,
            intense_sessions: 2,
            total_sessions: 5,
            rest_days_this_week: 1,
            has_strength_work: true,
            recent_feelings: vec![1, 2],
        };
        assert_eq!(assess_injury_risk(&snapshot), assess_injury_risk(&snapshot));
    }
}
