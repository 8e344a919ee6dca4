use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use quorum_core::{
    run_comparison, AgentRegistry, Comparison, ProviderSettings, RegistrySettings,
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "quorum",
    about = "Fan one prompt out to three LLM backends and let a judge rank the answers",
    version
)]
struct Cli {
    /// The prompt to compare across providers.
    prompt: Option<String>,

    #[arg(
        long,
        help = "Read the prompt from a file, or from stdin when the path is '-'"
    )]
    prompt_file: Option<PathBuf>,

    #[arg(
        long,
        env = "OPENAI_MODEL",
        default_value = "gpt-4",
        help = "Model for the ChatGPT answerer and the judge"
    )]
    openai_model: String,

    #[arg(
        long,
        env = "CLAUDE_MODEL_NAME",
        default_value = "claude-3-opus-20240229",
        help = "Model for the Claude answerer"
    )]
    claude_model: String,

    #[arg(
        long,
        env = "GEMINI_MODEL_NAME",
        default_value = "gemini-pro",
        help = "Model for the Gemini answerer"
    )]
    gemini_model: String,

    #[arg(
        long,
        env = "QUORUM_API_BASE",
        default_value = "https://api.openai.com/v1",
        help = "Base URL for the OpenAI chat completions API"
    )]
    api_base: String,

    #[arg(
        long,
        env = "QUORUM_ANTHROPIC_API_BASE",
        default_value = "https://api.anthropic.com/v1",
        help = "Base URL for the Anthropic Messages API"
    )]
    anthropic_api_base: String,

    #[arg(
        long,
        env = "QUORUM_GOOGLE_API_BASE",
        default_value = "https://generativelanguage.googleapis.com/v1beta",
        help = "Base URL for the Google Gemini API"
    )]
    google_api_base: String,

    #[arg(
        long,
        env = "QUORUM_REQUEST_TIMEOUT_MS",
        default_value_t = 120_000,
        help = "Request timeout applied to every provider unless overridden"
    )]
    request_timeout_ms: u64,

    #[arg(long, env = "QUORUM_OPENAI_TIMEOUT_MS")]
    openai_timeout_ms: Option<u64>,

    #[arg(long, env = "QUORUM_ANTHROPIC_TIMEOUT_MS")]
    anthropic_timeout_ms: Option<u64>,

    #[arg(long, env = "QUORUM_GOOGLE_TIMEOUT_MS")]
    google_timeout_ms: Option<u64>,

    #[arg(long, help = "OpenAI API key (falls back to OPENAI_API_KEY)")]
    openai_api_key: Option<String>,

    #[arg(
        long,
        help = "Anthropic API key (falls back to ANTHROPIC_API_KEY, then CLAUDE_API_KEY)"
    )]
    anthropic_api_key: Option<String>,

    #[arg(
        long,
        help = "Google API key (falls back to GEMINI_API_KEY, then GOOGLE_API_KEY)"
    )]
    google_api_key: Option<String>,

    #[arg(long, help = "Print the agent registry as JSON and exit")]
    print_agents: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let registry = AgentRegistry::new(&registry_settings(&cli));

    if cli.print_agents {
        println!("{}", serde_json::to_string_pretty(&registry.summary())?);
        return Ok(());
    }

    let Some(prompt) = resolve_prompt_input(&cli)? else {
        bail!("no prompt provided; pass one as an argument or via --prompt-file");
    };

    let comparison = run_comparison(&registry, &prompt)
        .await
        .context("prompt comparison failed")?;

    print!("{}", render_comparison(&comparison));
    Ok(())
}

fn registry_settings(cli: &Cli) -> RegistrySettings {
    RegistrySettings {
        openai: ProviderSettings {
            api_base: cli.api_base.clone(),
            api_key: resolve_api_key(vec![
                cli.openai_api_key.clone(),
                std::env::var("OPENAI_API_KEY").ok(),
            ]),
            model: cli.openai_model.clone(),
            request_timeout_ms: provider_timeout(cli.openai_timeout_ms, cli.request_timeout_ms),
        },
        anthropic: ProviderSettings {
            api_base: cli.anthropic_api_base.clone(),
            api_key: resolve_api_key(vec![
                cli.anthropic_api_key.clone(),
                std::env::var("ANTHROPIC_API_KEY").ok(),
                std::env::var("CLAUDE_API_KEY").ok(),
            ]),
            model: cli.claude_model.clone(),
            request_timeout_ms: provider_timeout(cli.anthropic_timeout_ms, cli.request_timeout_ms),
        },
        google: ProviderSettings {
            api_base: cli.google_api_base.clone(),
            api_key: resolve_api_key(vec![
                cli.google_api_key.clone(),
                std::env::var("GEMINI_API_KEY").ok(),
                std::env::var("GOOGLE_API_KEY").ok(),
            ]),
            model: cli.gemini_model.clone(),
            request_timeout_ms: provider_timeout(cli.google_timeout_ms, cli.request_timeout_ms),
        },
    }
}

fn resolve_api_key(candidates: Vec<Option<String>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}

fn provider_timeout(override_ms: Option<u64>, global_ms: u64) -> u64 {
    override_ms.unwrap_or(global_ms).max(1)
}

fn resolve_prompt_input(cli: &Cli) -> Result<Option<String>> {
    if let Some(prompt) = &cli.prompt {
        return Ok(Some(ensure_non_empty_text(
            prompt.clone(),
            "prompt argument".to_string(),
        )?));
    }

    let Some(path) = cli.prompt_file.as_ref() else {
        return Ok(None);
    };

    if path == std::path::Path::new("-") {
        let mut prompt = String::new();
        std::io::stdin()
            .read_to_string(&mut prompt)
            .context("failed to read prompt from stdin")?;
        return Ok(Some(ensure_non_empty_text(
            prompt,
            "stdin prompt".to_string(),
        )?));
    }

    let prompt = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read prompt file {}", path.display()))?;

    Ok(Some(ensure_non_empty_text(
        prompt,
        format!("prompt file {}", path.display()),
    )?))
}

fn ensure_non_empty_text(text: String, source: String) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        bail!("{source} is empty");
    }
    Ok(trimmed.to_string())
}

fn render_comparison(comparison: &Comparison) -> String {
    let mut out = String::from("Responses by LLM\n");
    for (role, text) in comparison.responses.iter() {
        out.push_str(&format!("\n### {role}\n{text}\n"));
    }
    out.push_str(&format!("\nComparison Summary\n\n{}\n", comparison.summary));
    out
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
