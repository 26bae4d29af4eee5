use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u32(value: &str) -> Result<u32, String> {
    let parsed = value
        .parse::<u32>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_temperature(value: &str) -> Result<f32, String> {
    let parsed = value
        .parse::<f32>()
        .map_err(|error| format!("failed to parse float: {error}"))?;
    if !parsed.is_finite() || !(0.0..=2.0).contains(&parsed) {
        return Err("value must be a finite number in range 0.0..=2.0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliCredentialStoreEncryptionMode {
    None,
    Keyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliSecretKind {
    GithubToken,
    CompletionApiKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliSecretTarget {
    GithubToken,
    CompletionApiKey,
    All,
}

#[derive(Debug, Parser)]
#[command(
    name = "triage-helper",
    about = "Suggests clarifying questions for GitHub issues using a chat completion model",
    version
)]
pub struct Cli {
    #[arg(
        long = "github-api-base",
        env = "TRIAGE_GITHUB_API_BASE",
        default_value = "https://api.github.com",
        help = "Base URL for GitHub REST API requests"
    )]
    pub github_api_base: String,

    #[arg(
        long = "completion-api-base",
        env = "TRIAGE_COMPLETION_API_BASE",
        default_value = "https://api.openai.com/v1",
        help = "Base URL of the OpenAI-compatible chat completions API"
    )]
    pub completion_api_base: String,

    #[arg(
        long,
        env = "TRIAGE_MODEL",
        default_value = "gpt-4o-mini",
        help = "Chat completion model name"
    )]
    pub model: String,

    #[arg(
        long = "request-timeout-ms",
        env = "TRIAGE_REQUEST_TIMEOUT_MS",
        default_value_t = 5_000,
        value_parser = parse_positive_u64,
        help = "Deadline for each GitHub request in milliseconds"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "completion-timeout-ms",
        env = "TRIAGE_COMPLETION_TIMEOUT_MS",
        default_value_t = 60_000,
        value_parser = parse_positive_u64,
        help = "Timeout for the chat completion request in milliseconds"
    )]
    pub completion_timeout_ms: u64,

    #[arg(
        long,
        env = "TRIAGE_TEMPERATURE",
        default_value_t = 0.2,
        value_parser = parse_temperature,
        help = "Sampling temperature sent with every completion request"
    )]
    pub temperature: f32,

    #[arg(
        long = "max-tokens",
        env = "TRIAGE_MAX_TOKENS",
        default_value_t = 500,
        value_parser = parse_positive_u32,
        help = "Maximum completion tokens"
    )]
    pub max_tokens: u32,

    #[arg(
        long = "credential-store",
        env = "TRIAGE_CREDENTIAL_STORE",
        default_value = ".triage/credentials.json",
        help = "Credential store file path"
    )]
    pub credential_store: PathBuf,

    #[arg(
        long = "credential-store-encryption",
        env = "TRIAGE_CREDENTIAL_STORE_ENCRYPTION",
        value_enum,
        default_value_t = CliCredentialStoreEncryptionMode::Keyed,
        help = "Credential store encryption mode: none or keyed"
    )]
    pub credential_store_encryption: CliCredentialStoreEncryptionMode,

    #[arg(
        long = "credential-store-key",
        env = "TRIAGE_CREDENTIAL_STORE_KEY",
        hide_env_values = true,
        help = "Optional passphrase for keyed credential store encryption"
    )]
    pub credential_store_key: Option<String>,

    #[arg(
        long = "github-token",
        env = "TRIAGE_GITHUB_TOKEN",
        hide_env_values = true,
        help = "GitHub API token; stored for later runs when provided"
    )]
    pub github_token: Option<String>,

    #[arg(
        long = "completion-api-key",
        env = "TRIAGE_COMPLETION_API_KEY",
        hide_env_values = true,
        help = "Completion API key; stored for later runs when provided"
    )]
    pub completion_api_key: Option<String>,

    #[arg(
        long = "no-prompt",
        env = "TRIAGE_NO_PROMPT",
        default_value_t = false,
        help = "Fail instead of prompting when a secret is missing"
    )]
    pub no_prompt: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the pipeline once for an issue page location and print the result.
    Run {
        #[arg(help = "Issue page URL or path, e.g. https://github.com/owner/repo/issues/7")]
        location: String,
    },
    /// Read page observations from stdin, one `<href> [anchor-missing]` per line.
    Watch,
    /// Inspect, set, or reset stored credentials.
    Credentials {
        #[command(subcommand)]
        action: CredentialsCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum CredentialsCommand {
    /// Show which secrets are stored, redacted.
    Status,
    /// Store a secret read from stdin.
    Set {
        #[arg(value_enum)]
        kind: CliSecretKind,
    },
    /// Remove stored secrets so the next run asks again.
    Reset {
        #[arg(value_enum)]
        target: CliSecretTarget,
    },
}
