use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::heuristics::{HeuristicConfig, ScoreAdjustment};
use crate::llm::ProviderKind;
use crate::parser::{ScoreSource, Section};
use crate::prompts::DEFAULT_MAX_INPUT_CHARS;

pub mod service;

pub use service::ProfileService;

/// Knobs for the profiling pipeline. Loaded from the `[profile]` config table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOptions {
    /// Score reported when an analysis response carries no number.
    pub analysis_fallback: u8,
    /// Per-dimension score used when an originality dimension is missing.
    pub originality_fallback: u8,
    /// AI probability reported when a detection response carries no number.
    pub detection_fallback: u8,
    pub max_input_chars: usize,
    pub heuristics: HeuristicConfig,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            analysis_fallback: 75,
            originality_fallback: 50,
            detection_fallback: 50,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            heuristics: HeuristicConfig::default(),
        }
    }
}

/// Errors surfaced to callers of [`ProfileService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("input text is empty")]
    EmptyInput,
    #[error("rewrite instructions are empty")]
    EmptyInstructions,
    #[error("{provider} service unavailable: {message}")]
    Unavailable {
        provider: ProviderKind,
        message: String,
    },
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// Cognitive-profile result for a single text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub provider: ProviderKind,
    pub score: u8,
    pub score_source: ScoreSource,
    pub adjustment: ScoreAdjustment,
    pub summary: Option<String>,
    pub sections: Vec<Section>,
    pub cleaned: String,
    pub raw_response: String,
    pub input_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub name: String,
    pub score: u8,
    pub source: ScoreSource,
}

/// Originality meter: per-dimension scores averaged into one number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginalityReport {
    pub provider: ProviderKind,
    pub dimensions: Vec<DimensionScore>,
    /// Rounded mean of the dimension scores, after heuristic adjustment.
    pub overall: u8,
    pub adjustment: ScoreAdjustment,
    pub cleaned: String,
    pub raw_response: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonWinner {
    A,
    B,
    Tie,
}

impl ComparisonWinner {
    pub fn from_scores(a: u8, b: u8) -> Self {
        match a.cmp(&b) {
            std::cmp::Ordering::Greater => ComparisonWinner::A,
            std::cmp::Ordering::Less => ComparisonWinner::B,
            std::cmp::Ordering::Equal => ComparisonWinner::Tie,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentScore {
    pub label: String,
    pub score: u8,
    pub source: ScoreSource,
    pub adjustment: ScoreAdjustment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub provider: ProviderKind,
    pub document_a: DocumentScore,
    pub document_b: DocumentScore,
    pub winner: ComparisonWinner,
    pub cleaned: String,
    pub raw_response: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionVerdict {
    LikelyAi,
    Uncertain,
    LikelyHuman,
}

impl DetectionVerdict {
    pub fn from_probability(probability: u8) -> Self {
        match probability {
            70..=u8::MAX => DetectionVerdict::LikelyAi,
            0..=30 => DetectionVerdict::LikelyHuman,
            _ => DetectionVerdict::Uncertain,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    pub provider: ProviderKind,
    pub ai_probability: u8,
    pub source: ScoreSource,
    pub verdict: DetectionVerdict,
    pub cleaned: String,
    pub raw_response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteResult {
    pub provider: ProviderKind,
    pub instructions: String,
    pub text: String,
    pub original_chars: usize,
    pub rewritten_chars: usize,
    pub raw_response: String,
}
