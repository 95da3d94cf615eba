use std::collections::BTreeSet;

use aho_corasick::AhoCorasick;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod phrase_file;

pub use phrase_file::{BuiltinPhrases, FilePhraseRepository, PhraseRepository};

/// Tunable post-hoc score adjustments.
///
/// These are blunt instruments; every adjustment they make is recorded on the
/// report as an [`OverrideReason`] so callers can see (and discount) it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Distinct red-flag phrases needed before the override fires.
    pub red_flag_threshold: usize,
    /// Score forced when the red-flag override fires.
    pub pseudo_intellectual_score: u8,
    pub floor: Option<u8>,
    pub ceiling: Option<u8>,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            red_flag_threshold: 3,
            pseudo_intellectual_score: 35,
            floor: None,
            ceiling: None,
        }
    }
}

impl HeuristicConfig {
    pub fn validate(&self) -> Result<(), HeuristicConfigError> {
        if self.red_flag_threshold == 0 {
            return Err(HeuristicConfigError::ZeroThreshold);
        }
        for (field, value) in [
            ("pseudo_intellectual_score", Some(self.pseudo_intellectual_score)),
            ("floor", self.floor),
            ("ceiling", self.ceiling),
        ] {
            if let Some(value) = value {
                if value > 100 {
                    return Err(HeuristicConfigError::OutOfRange { field, value });
                }
            }
        }
        if let (Some(floor), Some(ceiling)) = (self.floor, self.ceiling) {
            if floor > ceiling {
                return Err(HeuristicConfigError::InvertedBounds { floor, ceiling });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeuristicConfigError {
    #[error("red_flag_threshold must be > 0")]
    ZeroThreshold,
    #[error("`{field}` must be within 0..=100 (got {value})")]
    OutOfRange { field: &'static str, value: u8 },
    #[error("floor {floor} is above ceiling {ceiling}")]
    InvertedBounds { floor: u8, ceiling: u8 },
}

/// Why a score differs from what the model reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverrideReason {
    PseudoIntellectual { matched: Vec<String>, forced: u8 },
    Floor { floor: u8 },
    Ceiling { ceiling: u8 },
}

/// Extracted score alongside the score after heuristic overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreAdjustment {
    pub extracted: u8,
    pub score: u8,
    pub red_flags: Vec<String>,
    pub reasons: Vec<OverrideReason>,
}

impl ScoreAdjustment {
    pub fn is_adjusted(&self) -> bool {
        !self.reasons.is_empty()
    }
}

/// Matcher over the red-flag phrase list.
///
/// Phrases and text are both lowercased with Unicode case folding, and a hit
/// only counts when it is not embedded in a longer word, so `liminal` does not
/// fire on `subliminal` and inflections such as `epistemically` are ignored.
#[derive(Debug, Clone)]
pub struct RedFlagDetector {
    automaton: Option<AhoCorasick>,
    phrases: Vec<String>,
}

impl RedFlagDetector {
    pub fn new(phrases: Vec<String>) -> Result<Self> {
        let phrases: Vec<String> = phrases
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let automaton = if phrases.is_empty() {
            None
        } else {
            let needles: Vec<String> = phrases.iter().map(|p| p.to_lowercase()).collect();
            Some(
                AhoCorasick::builder()
                    .build(&needles)
                    .context("failed to build red-flag phrase automaton")?,
            )
        };
        Ok(Self { automaton, phrases })
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Distinct phrases present in `text`, in list order.
    pub fn matches(&self, text: &str) -> Vec<String> {
        let Some(automaton) = &self.automaton else {
            return Vec::new();
        };
        let haystack = text.to_lowercase();
        let hits: BTreeSet<usize> = automaton
            .find_overlapping_iter(haystack.as_str())
            .filter(|m| is_whole_word(&haystack, m.start(), m.end()))
            .map(|m| m.pattern().as_usize())
            .collect();
        hits.into_iter()
            .filter_map(|idx| self.phrases.get(idx).cloned())
            .collect()
    }

    /// Apply the red-flag override, then floor and ceiling, to `extracted`.
    pub fn adjust(&self, text: &str, extracted: u8, config: &HeuristicConfig) -> ScoreAdjustment {
        let red_flags = self.matches(text);
        let mut score = extracted;
        let mut reasons = Vec::new();

        if red_flags.len() >= config.red_flag_threshold {
            warn!(
                matched = red_flags.len(),
                extracted,
                forced = config.pseudo_intellectual_score,
                "red-flag phrase override applied"
            );
            score = config.pseudo_intellectual_score;
            reasons.push(OverrideReason::PseudoIntellectual {
                matched: red_flags.clone(),
                forced: score,
            });
        }
        if let Some(floor) = config.floor {
            if score < floor {
                score = floor;
                reasons.push(OverrideReason::Floor { floor });
            }
        }
        if let Some(ceiling) = config.ceiling {
            if score > ceiling {
                score = ceiling;
                reasons.push(OverrideReason::Ceiling { ceiling });
            }
        }
        debug!(extracted, score, red_flags = red_flags.len(), "score adjusted");

        ScoreAdjustment {
            extracted,
            score,
            red_flags,
            reasons,
        }
    }
}

fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}
