//! Session classification used by the weekly risk snapshot.
//!
//! Labels come from generated programs and are free text (mostly French), so
//! classification is keyword based and kept behind a trait.

pub trait SessionClassifier: Send + Sync {
    /// High-intensity session: keyword match on the label, or RPE at or above
    /// the threshold.
    fn is_intense(&self, session_type: &str, rpe: Option<u8>) -> bool;

    fn is_strength(&self, session_type: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    intense_keywords: Vec<String>,
    strength_keywords: Vec<String>,
    rpe_threshold: u8,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self {
            intense_keywords: ["fractionné", "interval", "tempo", "seuil"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            strength_keywords: ["renforcement", "musculation", "strength", "gainage", "ppg"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            rpe_threshold: 7,
        }
    }
}

impl KeywordClassifier {
    pub fn with_intense_keyword(mut self, keyword: &str) -> Self {
        self.intense_keywords.push(keyword.to_lowercase());
        self
    }

    pub fn with_strength_keyword(mut self, keyword: &str) -> Self {
        self.strength_keywords.push(keyword.to_lowercase());
        self
    }

    pub fn with_rpe_threshold(mut self, threshold: u8) -> Self {
        self.rpe_threshold = threshold;
        self
    }
}

fn matches_any(label: &str, keywords: &[String]) -> bool {
    let lowered = label.to_lowercase();
    keywords.iter().any(|k| lowered.contains(k.as_str()))
}

impl SessionClassifier for KeywordClassifier {
    fn is_intense(&self, session_type: &str, rpe: Option<u8>) -> bool {
        matches_any(session_type, &self.intense_keywords)
            || rpe.is_some_and(|r| r >= self.rpe_threshold)
    }

    fn is_strength(&self, session_type: &str) -> bool {
        matches_any(session_type, &self.strength_keywords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let c = KeywordClassifier::default();
        assert!(c.is_intense("FRACTIONNÉ 10x400m", None));
        assert!(c.is_intense("Intervals on track", None));
        assert!(c.is_intense("Sortie au Seuil", None));
        assert!(!c.is_intense("Footing", None));
    }

    #[test]
    fn test_rpe_threshold() {
        let c = KeywordClassifier::default();
        assert!(c.is_intense("Sortie longue", Some(7)));
        assert!(!c.is_intense("Sortie longue", Some(6)));

        let strict = KeywordClassifier::default().with_rpe_threshold(9);
        assert!(!strict.is_intense("Sortie longue", Some(8)));
    }

    #[test]
    fn test_extended_vocabulary() {
        let c = KeywordClassifier::default()
            .with_intense_keyword("VMA")
            .with_strength_keyword("Circuit training");
        assert!(c.is_intense("Séance VMA courte", None));
        assert!(c.is_strength("circuit training 20 min"));
        assert!(c.is_strength("Renforcement musculaire"));
        assert!(!c.is_strength("Footing"));
    }
}
