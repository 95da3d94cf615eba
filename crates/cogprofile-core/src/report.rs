use std::fmt::Write;

use serde::Serialize;

use crate::heuristics::{OverrideReason, ScoreAdjustment};
use crate::parser::ScoreSource;
use crate::profile::{
    AnalysisReport, ComparisonReport, ComparisonWinner, DetectionReport, DetectionVerdict,
    OriginalityReport, RewriteResult,
};

/// Format styles supported in default reporter implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Reports that can be printed for a person as well as serialised.
pub trait HumanReadable: Serialize {
    fn write_human(&self, out: &mut String) -> std::fmt::Result;
}

/// Produce a report string using the desired format.
pub fn render_report<R: HumanReadable>(report: &R, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => {
            let mut out = String::new();
            report.write_human(&mut out)?;
            Ok(out)
        }
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

impl HumanReadable for AnalysisReport {
    fn write_human(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "Provider: {}", self.provider)?;
        writeln!(out, "Score: {}/100 ({})", self.score, describe_source(&self.score_source))?;
        write_adjustment(out, &self.adjustment)?;
        writeln!(out, "Input Length: {} chars", self.input_chars)?;
        if !self.cleaned.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", self.cleaned)?;
        }
        Ok(())
    }
}

impl HumanReadable for OriginalityReport {
    fn write_human(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "Provider: {}", self.provider)?;
        writeln!(out, "Originality Score: {}/100", self.overall)?;
        write_adjustment(out, &self.adjustment)?;
        writeln!(out)?;
        writeln!(out, "Dimensions:")?;
        for dim in &self.dimensions {
            writeln!(
                out,
                "  - {name:<18} {score:>3}/100 ({source})",
                name = dim.name,
                score = dim.score,
                source = describe_source(&dim.source)
            )?;
        }
        if !self.cleaned.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", self.cleaned)?;
        }
        Ok(())
    }
}

impl HumanReadable for ComparisonReport {
    fn write_human(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "Provider: {}", self.provider)?;
        for doc in [&self.document_a, &self.document_b] {
            writeln!(
                out,
                "Document {}: {}/100 ({})",
                doc.label,
                doc.score,
                describe_source(&doc.source)
            )?;
            write_adjustment(out, &doc.adjustment)?;
        }
        let winner = match self.winner {
            ComparisonWinner::A => "Document A",
            ComparisonWinner::B => "Document B",
            ComparisonWinner::Tie => "tie",
        };
        writeln!(out, "Winner: {winner}")?;
        if !self.cleaned.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", self.cleaned)?;
        }
        Ok(())
    }
}

impl HumanReadable for DetectionReport {
    fn write_human(&self, out: &mut String) -> std::fmt::Result {
        let verdict = match self.verdict {
            DetectionVerdict::LikelyAi => "likely AI-generated",
            DetectionVerdict::Uncertain => "uncertain",
            DetectionVerdict::LikelyHuman => "likely human-written",
        };
        writeln!(out, "Provider: {}", self.provider)?;
        writeln!(
            out,
            "AI Probability: {}% ({})",
            self.ai_probability,
            describe_source(&self.source)
        )?;
        writeln!(out, "Verdict: {verdict}")?;
        if !self.cleaned.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", self.cleaned)?;
        }
        Ok(())
    }
}

impl HumanReadable for RewriteResult {
    fn write_human(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "{}", self.text)?;
        writeln!(out)?;
        writeln!(
            out,
            "Rewritten by {} • {} -> {} chars",
            self.provider, self.original_chars, self.rewritten_chars
        )
    }
}

fn describe_source(source: &ScoreSource) -> String {
    match source {
        ScoreSource::Extracted { pattern } => format!("extracted: {pattern}"),
        ScoreSource::Fallback => "fallback: no score in response".to_string(),
    }
}

fn write_adjustment(out: &mut String, adjustment: &ScoreAdjustment) -> std::fmt::Result {
    if !adjustment.is_adjusted() {
        return Ok(());
    }
    writeln!(out, "  Model reported {}/100; adjusted:", adjustment.extracted)?;
    for reason in &adjustment.reasons {
        match reason {
            OverrideReason::PseudoIntellectual { matched, forced } => writeln!(
                out,
                "    - forced to {forced} by red-flag phrases: {}",
                matched.join(", ")
            )?,
            OverrideReason::Floor { floor } => writeln!(out, "    - raised to floor {floor}")?,
            OverrideReason::Ceiling { ceiling } => {
                writeln!(out, "    - lowered to ceiling {ceiling}")?
            }
        }
    }
    Ok(())
}
