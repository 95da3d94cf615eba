use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").unwrap());
static ITALIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^*\w])\*([^*\s][^*\n]*?)\*").unwrap());
// `_` is a word character, so `_\b` closes only where no word continues; snake_case survives.
static UNDERSCORE_ITALIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^_\w])_([^_\s][^_\n]*?)_\b").unwrap());
static HEADING_MARK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]+").unwrap());
static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^([ \t]*)[*+][ \t]+").unwrap());
static TRAILING_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)[ \t]+$").unwrap());
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static HEADING_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*#{1,6}\s+(.+?)\s*#*\s*$").unwrap());
static BOLD_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\*\*([^*]+?)\*\*\s*:?\s*$").unwrap());

/// A titled block of a model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: Option<String>,
    pub body: String,
}

/// Strip the markdown decoration models like to add, leaving readable plain text.
pub fn clean_markdown(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text = BULLET.replace_all(&text, "${1}- ");
    let text = BOLD.replace_all(&text, "${1}${2}");
    let text = ITALIC.replace_all(&text, "${1}${2}");
    let text = UNDERSCORE_ITALIC.replace_all(&text, "${1}${2}");
    let text = HEADING_MARK.replace_all(&text, "");
    let text = TRAILING_WS.replace_all(&text, "");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Split a response on markdown headings (or lines that are entirely bold).
/// Text before the first heading becomes an untitled section; empty sections are dropped.
pub fn split_sections(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut title: Option<String> = None;
    let mut body: Vec<&str> = Vec::new();

    for line in text.lines() {
        let heading = HEADING_LINE
            .captures(line)
            .or_else(|| BOLD_LINE.captures(line))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string());
        match heading {
            Some(next) => {
                push_section(&mut sections, title.take(), &body);
                body.clear();
                title = Some(next);
            }
            None => body.push(line),
        }
    }
    push_section(&mut sections, title, &body);
    sections
}

fn push_section(sections: &mut Vec<Section>, title: Option<String>, lines: &[&str]) {
    let body = clean_markdown(&lines.join("\n"));
    if title.is_none() && body.is_empty() {
        return;
    }
    sections.push(Section { title, body });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_emphasis_and_headings() {
        let raw = "## Summary\nThis is **very** _plain_ and *clear*.\n";
        assert_eq!(clean_markdown(raw), "Summary\nThis is very plain and clear.");
    }

    #[test]
    fn keeps_snake_case_identifiers() {
        assert_eq!(
            clean_markdown("Call load_phrase_file, then _retry_ once."),
            "Call load_phrase_file, then retry once."
        );
        assert_eq!(clean_markdown("_one_ _two_"), "one two");
    }

    #[test]
    fn normalises_bullets() {
        let raw = "* one\n+ two\n  * nested";
        assert_eq!(clean_markdown(raw), "- one\n- two\n  - nested");
    }

    #[test]
    fn keeps_arithmetic_asterisks() {
        assert_eq!(clean_markdown("2 * 3 = 6"), "2 * 3 = 6");
    }

    #[test]
    fn collapses_blank_runs() {
        assert_eq!(clean_markdown("a\n\n\n\n b  \n"), "a\n\n b");
    }

    #[test]
    fn splits_on_headings_and_bold_lines() {
        let raw = "Intro line.\n## Reasoning\nSolid.\n**Verdict:**\nScore: 70/100";
        let sections = split_sections(raw);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].title, None);
        assert_eq!(sections[0].body, "Intro line.");
        assert_eq!(sections[1].title.as_deref(), Some("Reasoning"));
        assert_eq!(sections[1].body, "Solid.");
        assert_eq!(sections[2].title.as_deref(), Some("Verdict:"));
        assert_eq!(sections[2].body, "Score: 70/100");
    }

    #[test]
    fn empty_preamble_is_dropped() {
        let sections = split_sections("\n# Only\nbody");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title.as_deref(), Some("Only"));
    }
}
