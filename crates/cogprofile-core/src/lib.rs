pub mod heuristics;
pub mod llm;
pub mod parser;
pub mod profile;
pub mod prompts;
pub mod report;
pub mod web;

pub use heuristics::{
    BuiltinPhrases, FilePhraseRepository, HeuristicConfig, OverrideReason, PhraseRepository,
    RedFlagDetector, ScoreAdjustment,
};
pub use llm::{build_client, LlmClient, LlmOverrides, LlmSettings, NoopLlmClient, ProviderKind};
pub use parser::{extract_score, score_or_fallback, ScoreSource};
pub use profile::{
    AnalysisReport, ComparisonReport, ComparisonWinner, DetectionReport, DetectionVerdict,
    OriginalityReport, ProfileOptions, ProfileService, RewriteResult, ServiceError,
};
pub use report::{render_report, OutputFormat};
