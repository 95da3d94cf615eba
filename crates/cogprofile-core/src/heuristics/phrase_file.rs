use std::{collections::HashSet, fs, path::PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;

const DEFAULT_PHRASES: [&str; 8] = [
    "paradigm shift",
    "dialectical",
    "epistemic",
    "hegemonic",
    "problematize",
    "interrogate",
    "liminal",
    "discursive",
];

/// Source of red-flag phrases, so the list can ship built in or come from disk.
#[async_trait]
pub trait PhraseRepository: Send + Sync {
    async fn load_phrases(&self) -> Result<Vec<String>>;
}

/// The eight phrases used when no phrase file is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinPhrases;

impl BuiltinPhrases {
    pub fn phrases() -> Vec<String> {
        DEFAULT_PHRASES.iter().map(|p| p.to_string()).collect()
    }
}

#[async_trait]
impl PhraseRepository for BuiltinPhrases {
    async fn load_phrases(&self) -> Result<Vec<String>> {
        Ok(Self::phrases())
    }
}

/// Loads phrases from a text file: one phrase per line, `#` starts a comment line.
pub struct FilePhraseRepository {
    path: PathBuf,
    cache: OnceCell<Vec<String>>,
}

impl FilePhraseRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: OnceCell::new(),
        }
    }

    fn read(&self) -> Result<Vec<String>> {
        let content = fs::read_to_string(&self.path).with_context(|| {
            format!("failed to read phrase file at {}", self.path.display())
        })?;
        let mut seen = HashSet::new();
        let mut phrases = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if !seen.insert(trimmed.to_lowercase()) {
                return Err(anyhow!(
                    "duplicate phrase `{trimmed}` at {}:{}",
                    self.path.display(),
                    idx + 1
                ));
            }
            phrases.push(trimmed.to_string());
        }
        if phrases.is_empty() {
            return Err(anyhow!(
                "phrase file {} contains no phrases",
                self.path.display()
            ));
        }
        Ok(phrases)
    }
}

#[async_trait]
impl PhraseRepository for FilePhraseRepository {
    async fn load_phrases(&self) -> Result<Vec<String>> {
        let phrases = self.cache.get_or_try_init(|| self.read())?;
        Ok(phrases.clone())
    }
}
