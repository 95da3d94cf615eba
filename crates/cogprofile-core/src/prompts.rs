use serde::{Deserialize, Serialize};

/// Default character budget for user text embedded in a prompt.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 12_000;

/// Dimensions requested by the originality template, in report order.
pub const ORIGINALITY_DIMENSIONS: [&str; 4] = [
    "Originality",
    "Conceptual Depth",
    "Coherence",
    "Substantiveness",
];

/// Operation a prompt was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Analysis,
    Originality,
    Comparison,
    AiDetection,
    Rewrite,
}

/// Fully rendered chat prompt ready to hand to an [`LlmClient`](crate::llm::LlmClient).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prompt {
    pub kind: PromptKind,
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

const ANALYSIS_SYSTEM: &str = "You are an expert evaluator of writing. You assess the cognitive profile of an author from a sample of their prose: reasoning quality, conceptual control, and how much real insight the text carries as opposed to the appearance of it. Be direct.";

const ANALYSIS_INSTRUCTIONS: &str = "Assess the author of the passage below.\n\n## Summary\nOne paragraph on what the passage is doing.\n\n## Reasoning\nHow well claims are supported and connected.\n\n## Insight\nWhether the passage says something non-obvious, or only sounds like it does.\n\n## Verdict\nEnd with a single line in exactly this form:\nScore: N/100\nwhere N estimates the author's intelligence relative to the general population (50 = median).";

const ORIGINALITY_SYSTEM: &str = "You are an originality meter for prose. You rate each requested dimension on a 0-100 scale and justify each rating in one or two sentences.";

const COMPARISON_SYSTEM: &str = "You compare two documents for the intelligence and insight of their authors. Judge the content, not the style.";

const DETECTION_SYSTEM: &str = "You detect machine-generated text. You look for the statistical and stylistic fingerprints of language-model output and report a calibrated probability.";

const DETECTION_INSTRUCTIONS: &str = "Estimate how likely it is that the passage below was generated by an AI language model. List the signals you relied on, then end with a single line in exactly this form:\nAI Probability: N%";

const REWRITE_SYSTEM: &str = "You rewrite text according to the user's instructions. Return only the rewritten text, with no preamble and no commentary.";

/// Prompt for the cognitive-profile analysis.
pub fn analysis(text: &str, max_chars: usize) -> Prompt {
    Prompt {
        kind: PromptKind::Analysis,
        system: ANALYSIS_SYSTEM.to_string(),
        user: format!(
            "{ANALYSIS_INSTRUCTIONS}\n\nPassage:\n\"\"\"\n{}\n\"\"\"",
            truncate(text, max_chars)
        ),
        max_tokens: 1_500,
        temperature: 0.2,
    }
}

/// Prompt asking for one score per entry of [`ORIGINALITY_DIMENSIONS`].
pub fn originality(text: &str, max_chars: usize) -> Prompt {
    let lines = ORIGINALITY_DIMENSIONS
        .iter()
        .map(|dim| format!("{dim}: N/100"))
        .collect::<Vec<_>>()
        .join("\n");
    Prompt {
        kind: PromptKind::Originality,
        system: ORIGINALITY_SYSTEM.to_string(),
        user: format!(
            "Rate the passage below. For each dimension write a line in exactly this form, followed by your justification:\n{lines}\n\nPassage:\n\"\"\"\n{}\n\"\"\"",
            truncate(text, max_chars)
        ),
        max_tokens: 1_200,
        temperature: 0.2,
    }
}

/// Prompt comparing two documents. The budget is split evenly between them.
pub fn comparison(document_a: &str, document_b: &str, max_chars: usize) -> Prompt {
    let per_doc = (max_chars / 2).max(1);
    Prompt {
        kind: PromptKind::Comparison,
        system: COMPARISON_SYSTEM.to_string(),
        user: format!(
            "Compare the two documents below. Discuss the strengths of each, then end with exactly these two lines:\nDocument A Score: N/100\nDocument B Score: N/100\n\nDocument A:\n\"\"\"\n{}\n\"\"\"\n\nDocument B:\n\"\"\"\n{}\n\"\"\"",
            truncate(document_a, per_doc),
            truncate(document_b, per_doc)
        ),
        max_tokens: 1_500,
        temperature: 0.2,
    }
}

/// Prompt for AI-generated-text detection.
pub fn ai_detection(text: &str, max_chars: usize) -> Prompt {
    Prompt {
        kind: PromptKind::AiDetection,
        system: DETECTION_SYSTEM.to_string(),
        user: format!(
            "{DETECTION_INSTRUCTIONS}\n\nPassage:\n\"\"\"\n{}\n\"\"\"",
            truncate(text, max_chars)
        ),
        max_tokens: 600,
        temperature: 0.0,
    }
}

/// Prompt for instruction-guided rewriting.
pub fn rewrite(text: &str, instructions: &str, max_chars: usize) -> Prompt {
    Prompt {
        kind: PromptKind::Rewrite,
        system: REWRITE_SYSTEM.to_string(),
        user: format!(
            "Instructions:\n{}\n\nText to rewrite:\n\"\"\"\n{}\n\"\"\"",
            instructions.trim(),
            truncate(text, max_chars)
        ),
        max_tokens: 4_000,
        temperature: 0.7,
    }
}

/// Truncate on a char boundary, appending an ellipsis when anything was cut.
pub fn truncate(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    input.chars().take(max_chars).collect::<String>() + "…"
}
