mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cogprofile_core::{
    build_client,
    report::HumanReadable,
    render_report,
    web::{GoogleSearchClient, WebClient},
    BuiltinPhrases, FilePhraseRepository, LlmClient, LlmOverrides, LlmSettings, OutputFormat,
    PhraseRepository, ProfileService, ProviderKind,
};
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(
    name = "cogprofile",
    author,
    version,
    about = "Cognitive profiling, comparison, AI-text detection and rewriting via hosted LLMs"
)]
struct Cli {
    /// Config file (TOML, YAML or JSON) layered under COGPROFILE__* variables
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// LLM provider: openai, anthropic, perplexity, deepseek or noop
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model identifier passed to the provider
    #[arg(long, global = true)]
    model: Option<String>,

    /// Red-flag phrase file (one phrase per line)
    #[arg(long = "phrases", value_name = "FILE", global = true)]
    phrases_file: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Human, global = true)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Human,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Human => OutputFormat::Human,
            Format::Json => OutputFormat::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Estimate the author's intelligence score from a text
    Analyze {
        /// Read input from a file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
        /// Print the unmodified provider response
        #[arg(long)]
        raw: bool,
    },
    /// Rate originality across several dimensions and average them
    Originality {
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        raw: bool,
    },
    /// Compare two documents
    Compare {
        #[arg(long, value_name = "FILE")]
        left: PathBuf,
        #[arg(long, value_name = "FILE")]
        right: PathBuf,
        #[arg(long)]
        raw: bool,
    },
    /// Estimate the probability that a text was AI-generated
    Detect {
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        raw: bool,
    },
    /// Rewrite a text following instructions
    Rewrite {
        #[arg(long, short)]
        instructions: String,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        raw: bool,
    },
    /// Fetch a web page as plain text
    Fetch {
        url: String,
        /// Run the cognitive-profile analysis on the fetched text
        #[arg(long)]
        analyze: bool,
    },
    /// Search Google (Custom Search API) and optionally prefetch result pages
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        num: u8,
        #[arg(long)]
        prefetch: bool,
    },
    /// List providers and whether their API keys are configured
    Providers,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    run(cli, config).await
}

async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let format = OutputFormat::from(cli.format);
    match &cli.command {
        Commands::Analyze { file, raw } => {
            let text = read_input(file.as_deref()).await?;
            let report = build_service(&cli, &config)?.analyze(&text).await?;
            emit(&report, &report.raw_response, *raw, format)
        }
        Commands::Originality { file, raw } => {
            let text = read_input(file.as_deref()).await?;
            let report = build_service(&cli, &config)?.originality(&text).await?;
            emit(&report, &report.raw_response, *raw, format)
        }
        Commands::Compare { left, right, raw } => {
            let a = read_input(Some(left.as_path())).await?;
            let b = read_input(Some(right.as_path())).await?;
            let report = build_service(&cli, &config)?.compare(&a, &b).await?;
            emit(&report, &report.raw_response, *raw, format)
        }
        Commands::Detect { file, raw } => {
            let text = read_input(file.as_deref()).await?;
            let report = build_service(&cli, &config)?.detect_ai(&text).await?;
            emit(&report, &report.raw_response, *raw, format)
        }
        Commands::Rewrite {
            instructions,
            file,
            raw,
        } => {
            let text = read_input(file.as_deref()).await?;
            let result = build_service(&cli, &config)?
                .rewrite(&text, instructions)
                .await?;
            emit(&result, &result.raw_response, *raw, format)
        }
        Commands::Fetch { url, analyze } => {
            let web = web_client(&config)?;
            let page = web.fetch_url_content(url).await?;
            if *analyze {
                let report = build_service(&cli, &config)?.analyze(&page.text).await?;
                return emit(&report, &report.raw_response, false, format);
            }
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&page)?),
                OutputFormat::Human => {
                    if let Some(title) = &page.title {
                        println!("# {title}\n");
                    }
                    println!("{}", page.text);
                }
            }
            Ok(())
        }
        Commands::Search {
            query,
            num,
            prefetch,
        } => {
            let results = GoogleSearchClient::from_env()?.search(query, *num).await?;
            if *prefetch {
                let web = web_client(&config)?;
                let fetched = web.prefetch_contents(results).await;
                return print_json_or(format, &fetched, || {
                    for item in &fetched {
                        let status = match (&item.page, &item.error) {
                            (Some(page), _) => format!("{} chars", page.text.chars().count()),
                            (None, Some(err)) => format!("failed: {err}"),
                            (None, None) => "not fetched".to_string(),
                        };
                        println!("- {} <{}> [{status}]", item.result.title, item.result.url);
                    }
                });
            }
            print_json_or(format, &results, || {
                for result in &results {
                    println!("- {} <{}>", result.title, result.url);
                    if let Some(snippet) = &result.snippet {
                        println!("  {snippet}");
                    }
                }
            })
        }
        Commands::Providers => list_providers(&cli, &config, format),
    }
}

fn build_service(cli: &Cli, config: &AppConfig) -> Result<ProfileService<dyn PhraseRepository>> {
    let settings = LlmSettings::resolve(&llm_overrides(cli, config))?;
    debug!(provider = %settings.provider, model = ?settings.model, "resolved LLM settings");
    let client: Arc<dyn LlmClient> = Arc::from(build_client(&settings)?);
    let phrases: Arc<dyn PhraseRepository> =
        match cli.phrases_file.as_ref().or(config.phrases_file.as_ref()) {
            Some(path) => Arc::new(FilePhraseRepository::new(path)),
            None => Arc::new(BuiltinPhrases),
        };
    Ok(ProfileService::with_options(
        client,
        phrases,
        config.profile.clone(),
    ))
}

fn web_client(config: &AppConfig) -> Result<WebClient> {
    Ok(WebClient::new(config.web.timeout_secs, config.web.max_page_chars)?
        .with_max_body_bytes(config.web.max_body_bytes))
}

fn llm_overrides(cli: &Cli, config: &AppConfig) -> LlmOverrides {
    LlmOverrides {
        provider: cli.provider.clone(),
        model: cli.model.clone(),
        ..LlmOverrides::default()
    }
    .or(config.llm.clone())
}

async fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn emit<R: HumanReadable>(report: &R, raw_response: &str, raw: bool, format: OutputFormat) -> Result<()> {
    if raw {
        println!("{raw_response}");
    } else {
        print!("{}", render_report(report, format)?);
        if format == OutputFormat::Json {
            println!();
        }
    }
    Ok(())
}

fn print_json_or<T: Serialize + ?Sized>(
    format: OutputFormat,
    value: &T,
    human: impl FnOnce(),
) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Human => human(),
    }
    Ok(())
}

#[derive(Serialize)]
struct ProviderStatus {
    provider: ProviderKind,
    key_env: Option<&'static str>,
    key_configured: bool,
    selected: bool,
}

fn list_providers(cli: &Cli, config: &AppConfig, format: OutputFormat) -> Result<()> {
    let selected = llm_overrides(cli, config)
        .provider
        .or_else(|| std::env::var("COGPROFILE_PROVIDER").ok())
        .unwrap_or_else(|| "openai".to_string())
        .parse::<ProviderKind>()?;
    let statuses: Vec<_> = ProviderKind::ALL
        .into_iter()
        .map(|provider| ProviderStatus {
            provider,
            key_env: provider.api_key_env(),
            key_configured: provider.api_key_env().map_or(true, |var| {
                std::env::var(var).map_or(false, |v| !v.trim().is_empty())
            }),
            selected: provider == selected,
        })
        .collect();
    print_json_or(format, &statuses, || {
        for status in &statuses {
            let marker = if status.selected { "*" } else { " " };
            let key = match (status.key_env, status.key_configured) {
                (None, _) => "no key required".to_string(),
                (Some(var), true) => format!("{var} set"),
                (Some(var), false) => format!("{var} missing"),
            };
            println!("{marker} {:<11} {key}", status.provider.as_str());
        }
    })
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
