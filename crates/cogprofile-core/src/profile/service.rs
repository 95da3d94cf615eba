use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::{
    AnalysisReport, ComparisonReport, ComparisonWinner, DetectionReport, DetectionVerdict,
    DimensionScore, DocumentScore, OriginalityReport, ProfileOptions, RewriteResult,
    ServiceError,
};
use crate::heuristics::{PhraseRepository, RedFlagDetector};
use crate::llm::LlmClient;
use crate::parser::{
    clean_markdown, extract_labelled_score, extract_percentage, score_or_fallback,
    split_sections, ScoreSource,
};
use crate::prompts::{self, Prompt, ORIGINALITY_DIMENSIONS};

const AI_PROBABILITY_LABEL: &str = "AI Probability";

/// Runs each operation end to end: prompt, provider call, extraction, overrides.
pub struct ProfileService<P: PhraseRepository + ?Sized> {
    client: Arc<dyn LlmClient>,
    phrases: Arc<P>,
    options: ProfileOptions,
}

impl<P: PhraseRepository + ?Sized> ProfileService<P> {
    pub fn new(client: Arc<dyn LlmClient>, phrases: Arc<P>) -> Self {
        Self::with_options(client, phrases, ProfileOptions::default())
    }

    pub fn with_options(client: Arc<dyn LlmClient>, phrases: Arc<P>, options: ProfileOptions) -> Self {
        Self {
            client,
            phrases,
            options,
        }
    }

    pub fn options(&self) -> &ProfileOptions {
        &self.options
    }

    #[instrument(name = "analyze", skip(self, text), fields(provider = %self.client.provider(), input_len = text.len()))]
    pub async fn analyze(&self, text: &str) -> Result<AnalysisReport, ServiceError> {
        let text = non_empty(text)?;
        let detector = self.detector().await?;
        let raw = self
            .call(prompts::analysis(text, self.options.max_input_chars))
            .await?;

        let (extracted, score_source) = score_or_fallback(&raw, self.options.analysis_fallback);
        let adjustment = detector.adjust(text, extracted, &self.options.heuristics);
        let sections = split_sections(&raw);
        let summary = sections
            .iter()
            .find(|s| {
                s.title
                    .as_deref()
                    .map_or(false, |t| t.to_ascii_lowercase().starts_with("summary"))
            })
            .or_else(|| sections.first())
            .map(|s| s.body.clone())
            .filter(|body| !body.is_empty());
        info!(score = adjustment.score, extracted, "analysis complete");

        Ok(AnalysisReport {
            provider: self.client.provider(),
            score: adjustment.score,
            score_source,
            adjustment,
            summary,
            sections,
            cleaned: clean_markdown(&raw),
            raw_response: raw,
            input_chars: text.chars().count(),
        })
    }

    #[instrument(name = "originality", skip(self, text), fields(provider = %self.client.provider(), input_len = text.len()))]
    pub async fn originality(&self, text: &str) -> Result<OriginalityReport, ServiceError> {
        let text = non_empty(text)?;
        let detector = self.detector().await?;
        let raw = self
            .call(prompts::originality(text, self.options.max_input_chars))
            .await?;

        let dimensions: Vec<DimensionScore> = ORIGINALITY_DIMENSIONS
            .iter()
            .map(|name| match extract_labelled_score(&raw, name) {
                Some(score) => DimensionScore {
                    name: name.to_string(),
                    score,
                    source: ScoreSource::Extracted {
                        pattern: "labelled".into(),
                    },
                },
                None => DimensionScore {
                    name: name.to_string(),
                    score: self.options.originality_fallback.min(100),
                    source: ScoreSource::Fallback,
                },
            })
            .collect();
        let mean = average(dimensions.iter().map(|d| d.score));
        let adjustment = detector.adjust(text, mean, &self.options.heuristics);
        info!(overall = adjustment.score, mean, "originality complete");

        Ok(OriginalityReport {
            provider: self.client.provider(),
            dimensions,
            overall: adjustment.score,
            adjustment,
            cleaned: clean_markdown(&raw),
            raw_response: raw,
        })
    }

    #[instrument(name = "compare", skip_all, fields(provider = %self.client.provider(), a_len = document_a.len(), b_len = document_b.len()))]
    pub async fn compare(
        &self,
        document_a: &str,
        document_b: &str,
    ) -> Result<ComparisonReport, ServiceError> {
        let document_a = non_empty(document_a)?;
        let document_b = non_empty(document_b)?;
        let detector = self.detector().await?;
        let raw = self
            .call(prompts::comparison(
                document_a,
                document_b,
                self.options.max_input_chars,
            ))
            .await?;

        let score_document = |label: &str, text: &str| {
            let (extracted, source) =
                match extract_labelled_score(&raw, &format!("Document {label}")) {
                    Some(score) => (
                        score,
                        ScoreSource::Extracted {
                            pattern: "labelled".into(),
                        },
                    ),
                    None => (self.options.analysis_fallback.min(100), ScoreSource::Fallback),
                };
            let adjustment = detector.adjust(text, extracted, &self.options.heuristics);
            DocumentScore {
                label: label.to_string(),
                score: adjustment.score,
                source,
                adjustment,
            }
        };
        let a = score_document("A", document_a);
        let b = score_document("B", document_b);
        let winner = ComparisonWinner::from_scores(a.score, b.score);
        info!(a = a.score, b = b.score, ?winner, "comparison complete");

        Ok(ComparisonReport {
            provider: self.client.provider(),
            document_a: a,
            document_b: b,
            winner,
            cleaned: clean_markdown(&raw),
            raw_response: raw,
        })
    }

    #[instrument(name = "detect_ai", skip(self, text), fields(provider = %self.client.provider(), input_len = text.len()))]
    pub async fn detect_ai(&self, text: &str) -> Result<DetectionReport, ServiceError> {
        let text = non_empty(text)?;
        let raw = self
            .call(prompts::ai_detection(text, self.options.max_input_chars))
            .await?;

        let (ai_probability, source) = if let Some(p) = extract_percentage(&raw, AI_PROBABILITY_LABEL) {
            (
                p,
                ScoreSource::Extracted {
                    pattern: "percentage".into(),
                },
            )
        } else if let Some(p) = extract_labelled_score(&raw, AI_PROBABILITY_LABEL) {
            (
                p,
                ScoreSource::Extracted {
                    pattern: "labelled".into(),
                },
            )
        } else {
            (self.options.detection_fallback.min(100), ScoreSource::Fallback)
        };
        let verdict = DetectionVerdict::from_probability(ai_probability);
        info!(ai_probability, ?verdict, "detection complete");

        Ok(DetectionReport {
            provider: self.client.provider(),
            ai_probability,
            source,
            verdict,
            cleaned: clean_markdown(&raw),
            raw_response: raw,
        })
    }

    #[instrument(name = "rewrite", skip(self, text, instructions), fields(provider = %self.client.provider(), input_len = text.len()))]
    pub async fn rewrite(
        &self,
        text: &str,
        instructions: &str,
    ) -> Result<RewriteResult, ServiceError> {
        let text = non_empty(text)?;
        let instructions = instructions.trim();
        if instructions.is_empty() {
            return Err(ServiceError::EmptyInstructions);
        }
        let raw = self
            .call(prompts::rewrite(
                text,
                instructions,
                self.options.max_input_chars,
            ))
            .await?;
        let rewritten = clean_markdown(&raw);

        Ok(RewriteResult {
            provider: self.client.provider(),
            instructions: instructions.to_string(),
            original_chars: text.chars().count(),
            rewritten_chars: rewritten.chars().count(),
            text: rewritten,
            raw_response: raw,
        })
    }

    async fn call(&self, prompt: Prompt) -> Result<String, ServiceError> {
        let provider = self.client.provider();
        self.client.complete(&prompt).await.map_err(|err| {
            warn!(%provider, kind = ?prompt.kind, error = %format!("{err:#}"), "provider call failed");
            ServiceError::Unavailable {
                provider,
                message: format!("{err:#}"),
            }
        })
    }

    async fn detector(&self) -> Result<RedFlagDetector, ServiceError> {
        self.options
            .heuristics
            .validate()
            .map_err(|err| ServiceError::Configuration(err.to_string()))?;
        let phrases = self
            .phrases
            .load_phrases()
            .await
            .map_err(|err| ServiceError::Configuration(format!("{err:#}")))?;
        RedFlagDetector::new(phrases).map_err(|err| ServiceError::Configuration(format!("{err:#}")))
    }
}

fn non_empty(text: &str) -> Result<&str, ServiceError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::EmptyInput);
    }
    Ok(trimmed)
}

fn average(scores: impl Iterator<Item = u8>) -> u8 {
    let (sum, count) = scores.fold((0u32, 0u32), |(sum, count), s| (sum + u32::from(s), count + 1));
    if count == 0 {
        return 0;
    }
    crate::parser::clamp_score(f64::from(sum) / f64::from(count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::BuiltinPhrases;
    use crate::llm::{NoopLlmClient, ProviderKind};
    use crate::parser::ScoreSource;
    use crate::prompts::PromptKind;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays a canned response and records the prompts it received.
    struct ScriptedClient {
        response: Result<String, String>,
        seen: Mutex<Vec<Prompt>>,
    }

    impl ScriptedClient {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Err(message.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        fn provider(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }

        async fn complete(&self, prompt: &Prompt) -> Result<String> {
            self.seen.lock().unwrap().push(prompt.clone());
            self.response.clone().map_err(|m| anyhow!(m))
        }
    }

    fn service(client: Arc<ScriptedClient>) -> ProfileService<BuiltinPhrases> {
        ProfileService::new(client, Arc::new(BuiltinPhrases))
    }

    #[tokio::test]
    async fn analyze_extracts_score_and_sections() {
        let client = ScriptedClient::replying(
            "## Summary\nA **sharp** argument.\n\n## Verdict\nScore: 84/100",
        );
        let report = service(client.clone())
            .analyze("  Plain, careful prose.  ")
            .await
            .unwrap();
        assert_eq!(report.score, 84);
        assert!(matches!(report.score_source, ScoreSource::Extracted { .. }));
        assert_eq!(report.summary.as_deref(), Some("A sharp argument."));
        assert_eq!(report.sections.len(), 2);
        assert_eq!(report.input_chars, "Plain, careful prose.".len());
        let seen = client.seen.lock().unwrap();
        assert_eq!(seen[0].kind, PromptKind::Analysis);
        assert!(seen[0].user.contains("Plain, careful prose."));
    }

    #[tokio::test]
    async fn analyze_falls_back_when_no_score() {
        let report = ProfileService::new(Arc::new(NoopLlmClient), Arc::new(BuiltinPhrases))
            .analyze("hello")
            .await
            .unwrap();
        assert_eq!(report.score, 75);
        assert_eq!(report.score_source, ScoreSource::Fallback);
        assert_eq!(report.provider, ProviderKind::Noop);
    }

    #[tokio::test]
    async fn analyze_applies_red_flag_override() {
        let client = ScriptedClient::replying("Score: 95/100");
        let report = service(client)
            .analyze("We must interrogate the hegemonic, epistemic paradigm shift.")
            .await
            .unwrap();
        assert_eq!(report.adjustment.extracted, 95);
        assert_eq!(report.score, 35);
        assert!(report.adjustment.is_adjusted());
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_calling_provider() {
        let client = ScriptedClient::replying("Score: 50/100");
        let err = service(client.clone()).analyze(" \n\t").await.unwrap_err();
        assert!(matches!(err, ServiceError::EmptyInput));
        assert!(client.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn provider_failure_becomes_unavailable() {
        let client = ScriptedClient::failing("connection reset");
        let err = service(client).detect_ai("some text").await.unwrap_err();
        match err {
            ServiceError::Unavailable { provider, message } => {
                assert_eq!(provider, ProviderKind::OpenAi);
                assert!(message.contains("connection reset"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn originality_averages_dimensions_with_fallback() {
        let client = ScriptedClient::replying(
            "Originality: 80/100 - fresh\nConceptual Depth: 70/100\nCoherence: 91/100",
        );
        let report = service(client).originality("text").await.unwrap();
        assert_eq!(report.dimensions.len(), 4);
        assert_eq!(report.dimensions[3].source, ScoreSource::Fallback);
        assert_eq!(report.dimensions[3].score, 50);
        // (80 + 70 + 91 + 50) / 4 = 72.75
        assert_eq!(report.overall, 73);
    }

    #[tokio::test]
    async fn compare_scores_each_document() {
        let client = ScriptedClient::replying(
            "A is tighter.\nDocument A Score: 82/100\nDocument B Score: 64/100",
        );
        let report = service(client)
            .compare("first document", "second document")
            .await
            .unwrap();
        assert_eq!(report.document_a.score, 82);
        assert_eq!(report.document_b.score, 64);
        assert_eq!(report.winner, ComparisonWinner::A);
    }

    #[tokio::test]
    async fn compare_overrides_only_the_inflated_document() {
        let client =
            ScriptedClient::replying("Document A Score: 90/100\nDocument B Score: 60/100");
        let report = service(client)
            .compare(
                "A liminal, dialectical, discursive meditation.",
                "A plain account of the budget.",
            )
            .await
            .unwrap();
        assert_eq!(report.document_a.score, 35);
        assert_eq!(report.document_b.score, 60);
        assert_eq!(report.winner, ComparisonWinner::B);
    }

    #[tokio::test]
    async fn detect_reads_percentage_then_label() {
        let report = service(ScriptedClient::replying("Signals: ...\nAI Probability: 82%"))
            .detect_ai("text")
            .await
            .unwrap();
        assert_eq!(report.ai_probability, 82);
        assert_eq!(report.verdict, DetectionVerdict::LikelyAi);

        let report = service(ScriptedClient::replying("AI Probability: 12"))
            .detect_ai("text")
            .await
            .unwrap();
        assert_eq!(report.ai_probability, 12);
        assert_eq!(report.verdict, DetectionVerdict::LikelyHuman);

        let report = service(ScriptedClient::replying("unclear"))
            .detect_ai("text")
            .await
            .unwrap();
        assert_eq!(report.source, ScoreSource::Fallback);
        assert_eq!(report.verdict, DetectionVerdict::Uncertain);
    }

    #[tokio::test]
    async fn rewrite_cleans_markdown_and_requires_instructions() {
        let client = ScriptedClient::replying("**Dear team,**\n\nThe launch moves to May.");
        let svc = service(client);
        let result = svc
            .rewrite("launch is may now", "make it a formal memo")
            .await
            .unwrap();
        assert_eq!(result.text, "Dear team,\n\nThe launch moves to May.");
        assert_eq!(result.instructions, "make it a formal memo");

        let err = svc.rewrite("text", "   ").await.unwrap_err();
        assert!(matches!(err, ServiceError::EmptyInstructions));
    }

    #[tokio::test]
    async fn invalid_heuristics_are_reported() {
        let mut options = ProfileOptions::default();
        options.heuristics.red_flag_threshold = 0;
        let svc = ProfileService::with_options(
            ScriptedClient::replying("Score: 1/100"),
            Arc::new(BuiltinPhrases),
            options,
        );
        let err = svc.analyze("text").await.unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));
    }

    #[test]
    fn average_rounds_half_up() {
        assert_eq!(average([1u8, 2].into_iter()), 2);
        assert_eq!(average(std::iter::empty()), 0);
    }
}
