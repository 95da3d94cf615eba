use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cogprofile_core::{
    web::{DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_PAGE_CHARS},
    LlmOverrides, ProfileOptions,
};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Settings loaded from an optional config file, overlaid by `COGPROFILE__*` variables.
///
/// ```toml
/// phrases_file = "red_flags.txt"
///
/// [llm]
/// provider = "anthropic"
/// model = "claude-3-5-sonnet-latest"
///
/// [profile]
/// analysis_fallback = 75
///
/// [profile.heuristics]
/// red_flag_threshold = 3
/// floor = 20
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmOverrides,
    pub profile: ProfileOptions,
    pub phrases_file: Option<PathBuf>,
    pub web: WebConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub timeout_secs: u64,
    pub max_page_chars: usize,
    pub max_body_bytes: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            max_page_chars: DEFAULT_MAX_PAGE_CHARS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix("COGPROFILE")
                .prefix_separator("__")
                .separator("__"),
        );
        let config = builder.build().with_context(|| match path {
            Some(path) => format!("failed to load config from {}", path.display()),
            None => "failed to load config from environment".to_string(),
        })?;
        let app: AppConfig = config
            .try_deserialize()
            .context("config does not match the expected layout")?;
        app.profile
            .heuristics
            .validate()
            .context("invalid [profile.heuristics] settings")?;
        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::write;

    #[test]
    fn loads_nested_tables_from_toml() {
        let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write(
            file.path(),
            "phrases_file = \"flags.txt\"\n\
             [llm]\nprovider = \"noop\"\nmodel = \"m\"\n\
             [profile]\nanalysis_fallback = 60\n\
             [profile.heuristics]\nfloor = 10\nceiling = 90\n",
        )
        .unwrap();
        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.llm.provider.as_deref(), Some("noop"));
        assert_eq!(config.llm.model.as_deref(), Some("m"));
        assert_eq!(config.profile.analysis_fallback, 60);
        assert_eq!(config.profile.originality_fallback, 50);
        assert_eq!(config.profile.heuristics.floor, Some(10));
        assert_eq!(config.profile.heuristics.red_flag_threshold, 3);
        assert_eq!(config.phrases_file, Some(PathBuf::from("flags.txt")));
        assert_eq!(config.web.timeout_secs, 20);
        assert_eq!(config.web.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn rejects_inverted_bounds() {
        let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write(
            file.path(),
            "[profile.heuristics]\nfloor = 90\nceiling = 10\n",
        )
        .unwrap();
        let err = AppConfig::load(Some(file.path())).unwrap_err();
        assert!(format!("{err:#}").contains("floor 90 is above ceiling 10"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/no/such/cogprofile.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to load config"));
    }
}
