//! Recovers numeric scores from free-form model output.
//!
//! Models are asked to end with a fixed verdict line (`Score: N/100`), but in
//! practice they paraphrase. Patterns are tried in precedence order and the
//! first pattern that matches anywhere decides the score. Within a pattern the
//! last occurrence wins, since verdict lines close the response.

pub mod markdown;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use markdown::{clean_markdown, split_sections, Section};

// Signed so that a negative verdict clamps to 0 instead of losing its sign.
const NUMBER: &str = r"(-?\d{1,3}(?:\.\d+)?)";

static SCORE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        (
            "score_out_of_100",
            format!(r"(?i)\bscore\s*[:=]\s*\**\s*{NUMBER}\s*\**\s*/\s*100\b"),
        ),
        ("score_label", format!(r"(?i)\bscore\s*[:=]\s*\**\s*{NUMBER}")),
        ("out_of_100", format!(r"(?:^|[^\w.]){NUMBER}\s*/\s*100\b")),
        ("score_of", format!(r"(?i)\bscore\s+of\s+\**{NUMBER}")),
    ]
    .into_iter()
    .map(|(name, pattern)| {
        let regex = Regex::new(&pattern).expect("built-in score pattern must compile");
        (name, regex)
    })
    .collect()
});

/// How a reported score was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreSource {
    /// Recovered from the model text by the named pattern.
    Extracted { pattern: String },
    /// Nothing matched; the operation's fallback was used.
    Fallback,
}

/// A score recovered from model output, already clamped to `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractedScore {
    pub value: u8,
    pub pattern: &'static str,
}

impl ExtractedScore {
    pub fn source(&self) -> ScoreSource {
        ScoreSource::Extracted {
            pattern: self.pattern.to_string(),
        }
    }
}

/// Extract the overall score from `text`, if any pattern matches.
pub fn extract_score(text: &str) -> Option<ExtractedScore> {
    for &(name, ref regex) in SCORE_PATTERNS.iter() {
        if let Some(value) = last_capture(regex, text) {
            debug!(pattern = name, value, "extracted score");
            return Some(ExtractedScore {
                value,
                pattern: name,
            });
        }
    }
    None
}

/// Extract the overall score, substituting `fallback` when nothing matches.
pub fn score_or_fallback(text: &str, fallback: u8) -> (u8, ScoreSource) {
    match extract_score(text) {
        Some(score) => (score.value, score.source()),
        None => {
            debug!(fallback, "no score found in response; using fallback");
            (fallback.min(100), ScoreSource::Fallback)
        }
    }
}

/// Extract `Label: N`, `Label: N/100` or `Label Score: N` for a caller-chosen label.
pub fn extract_labelled_score(text: &str, label: &str) -> Option<u8> {
    let pattern = format!(
        r"(?i)\b{}(?:\s+score)?\s*\**\s*[:=]\s*\**\s*{NUMBER}",
        label_pattern(label)
    );
    Regex::new(&pattern)
        .ok()
        .and_then(|regex| last_capture(&regex, text))
}

/// Extract `Label: N%`.
pub fn extract_percentage(text: &str, label: &str) -> Option<u8> {
    let pattern = format!(
        r"(?i)\b{}\s*\**\s*[:=]\s*\**\s*{NUMBER}\s*%",
        label_pattern(label)
    );
    Regex::new(&pattern)
        .ok()
        .and_then(|regex| last_capture(&regex, text))
}

fn label_pattern(label: &str) -> String {
    label
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+")
}

fn last_capture(regex: &Regex, text: &str) -> Option<u8> {
    regex
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .last()
        .map(clamp_score)
}

/// Round and clamp an arbitrary number into the `0..=100` score range.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn extracts_canonical_verdict_line() {
        let text = "## Verdict\nA careful thinker.\nScore: 82/100";
        let score = extract_score(text).unwrap();
        assert_eq!(score.value, 82);
        assert_eq!(score.pattern, "score_out_of_100");
    }

    #[test]
    fn tolerates_bold_markers() {
        assert_eq!(extract_score("**Score: 77**/100").unwrap().value, 77);
        assert_eq!(extract_score("Intelligence Score: **91/100**").unwrap().value, 91);
    }

    #[test]
    fn out_of_100_pattern_outranks_loose_forms() {
        let text = "I would give this a score of 40. Final Score: 55/100";
        assert_eq!(extract_score(text).unwrap().value, 55);
    }

    #[test]
    fn falls_through_to_bare_fraction() {
        let score = extract_score("Overall this lands around 68 / 100.").unwrap();
        assert_eq!(score.value, 68);
        assert_eq!(score.pattern, "out_of_100");
    }

    #[test]
    fn falls_through_to_score_of() {
        let score = extract_score("I'd assign a score of 73 overall.").unwrap();
        assert_eq!(score.value, 73);
        assert_eq!(score.pattern, "score_of");
    }

    #[test]
    fn last_occurrence_within_pattern_wins() {
        let text = "Draft Score: 60/100\n...on reflection...\nScore: 70/100";
        assert_eq!(extract_score(text).unwrap().value, 70);
    }

    #[test]
    fn decimals_are_rounded() {
        assert_eq!(extract_score("Score: 72.6/100").unwrap().value, 73);
    }

    #[test]
    fn values_above_range_are_clamped() {
        assert_eq!(extract_score("Score: 140/100").unwrap().value, 100);
    }

    #[test]
    fn negative_values_clamp_to_zero() {
        let score = extract_score("Score: -20/100").unwrap();
        assert_eq!(score.value, 0);
        assert_eq!(score.pattern, "score_out_of_100");
        assert_eq!(extract_score("Overall: -5 / 100").unwrap().value, 0);
        assert_eq!(extract_labelled_score("Coherence: -3", "Coherence"), Some(0));
    }

    #[test]
    fn hyphenated_ranges_do_not_flip_sign() {
        assert_eq!(extract_score("somewhere in 60-70/100").unwrap().value, 70);
    }

    #[test]
    fn fallback_used_when_nothing_matches() {
        let (value, source) = score_or_fallback("No number here.", 75);
        assert_eq!(value, 75);
        assert_eq!(source, ScoreSource::Fallback);
    }

    #[test]
    fn labelled_scores_are_scoped_to_label() {
        let text = "Document A Score: 64/100\nDocument B Score: 88/100";
        assert_eq!(extract_labelled_score(text, "Document A"), Some(64));
        assert_eq!(extract_labelled_score(text, "Document B"), Some(88));
        assert_eq!(extract_labelled_score(text, "Document C"), None);
    }

    #[test]
    fn labelled_scores_accept_multi_word_labels() {
        let text = "**Conceptual  Depth**: 71/100 - layered argument";
        assert_eq!(extract_labelled_score(text, "Conceptual Depth"), Some(71));
    }

    #[test]
    fn labels_are_escaped() {
        assert_eq!(extract_labelled_score("a.b: 5", "a.b"), Some(5));
        assert_eq!(extract_labelled_score("axb: 5", "a.b"), None);
    }

    #[test]
    fn percentage_requires_percent_sign() {
        assert_eq!(extract_percentage("AI Probability: 85%", "AI Probability"), Some(85));
        assert_eq!(extract_percentage("AI Probability: 85", "AI Probability"), None);
    }

    proptest! {
        #[test]
        fn score_line_is_extracted_and_clamped(n in -999i32..1000) {
            let text = format!("Some prose.\nScore: {n}/100\n");
            let score = extract_score(&text).unwrap();
            prop_assert_eq!(i32::from(score.value), n.clamp(0, 100));
        }

        #[test]
        fn bare_fraction_is_clamped(n in -999i32..1000) {
            let text = format!("Roughly {n}/100 overall.");
            prop_assert_eq!(i32::from(extract_score(&text).unwrap().value), n.clamp(0, 100));
        }

        #[test]
        fn clamp_always_in_range(raw in proptest::num::f64::ANY) {
            prop_assert!(clamp_score(raw) <= 100);
        }
    }
}
