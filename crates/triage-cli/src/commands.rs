use std::collections::BTreeMap;
use std::io::{BufRead, IsTerminal, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use triage_core::{extract_issue_context, PageLocation};
use triage_credentials::{
    resolve_credentials, CredentialAdmin, CredentialStore, CredentialStoreEncryptionMode,
    Credentials, FileCredentialStore, SecretKind,
};
use triage_runtime::{
    CompletionConfig, PageEventSource, PageObservation, PageSignal, RenderSink, RunOutcome,
    SessionSettings, TriageSession, WatcherDecision,
};

use crate::cli_args::{
    Cli, CliCommand, CliCredentialStoreEncryptionMode, CliSecretKind, CliSecretTarget,
    CredentialsCommand,
};
use crate::terminal_sink::TerminalRenderSink;

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    match &cli.command {
        CliCommand::Run { location } => execute_run(&cli, location).await,
        CliCommand::Watch => execute_watch(&cli).await,
        CliCommand::Credentials { action } => {
            let store = credential_store(&cli);
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            execute_credentials_command(&store, action, &mut read_stdin_line, &mut out)
        }
    }
}

pub(crate) fn session_settings(cli: &Cli) -> SessionSettings {
    SessionSettings {
        github_api_base: cli.github_api_base.clone(),
        request_timeout_ms: cli.request_timeout_ms,
        completion_api_base: cli.completion_api_base.clone(),
        completion_timeout_ms: cli.completion_timeout_ms,
        completion: CompletionConfig {
            model: cli.model.clone(),
            temperature: cli.temperature,
            max_tokens: cli.max_tokens,
        },
    }
}

pub(crate) fn credential_store(cli: &Cli) -> FileCredentialStore {
    let encryption = match cli.credential_store_encryption {
        CliCredentialStoreEncryptionMode::None => CredentialStoreEncryptionMode::None,
        CliCredentialStoreEncryptionMode::Keyed => CredentialStoreEncryptionMode::Keyed,
    };
    FileCredentialStore::new(
        cli.credential_store.clone(),
        encryption,
        cli.credential_store_key.clone(),
    )
}

pub(crate) fn credential_overrides(cli: &Cli) -> BTreeMap<SecretKind, String> {
    [
        (SecretKind::GithubToken, cli.github_token.as_ref()),
        (SecretKind::CompletionApiKey, cli.completion_api_key.as_ref()),
    ]
    .into_iter()
    .filter_map(|(kind, value)| value.map(|value| (kind, value.clone())))
    .collect()
}

fn read_stdin_line() -> Result<Option<String>> {
    let mut line = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    if read == 0 {
        return Ok(None);
    }
    let trimmed = line.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

fn prompt_for_secret(kind: SecretKind) -> Result<Option<String>> {
    eprint!("Enter your {}: ", kind.label());
    std::io::stderr()
        .flush()
        .context("failed to flush stderr")?;
    read_stdin_line()
}

/// Resolves both secrets once. Prompts on the terminal only when allowed.
fn load_credentials(cli: &Cli, allow_prompt: bool) -> Result<Arc<Credentials>> {
    let store = credential_store(cli);
    let interactive = allow_prompt && !cli.no_prompt && std::io::stdin().is_terminal();
    let credentials = resolve_credentials(&store, &credential_overrides(cli), |kind| {
        if interactive {
            prompt_for_secret(kind)
        } else {
            Ok(None)
        }
    })
    .with_context(|| {
        format!(
            "credentials unavailable; pass them as flags, environment variables, or run `triage-helper credentials set` (store: {})",
            store.path().display()
        )
    })?;
    tracing::debug!(credential_store = %store.path().display(), "credentials resolved");
    Ok(Arc::new(credentials))
}

async fn execute_run(cli: &Cli, location: &str) -> Result<()> {
    let location = PageLocation::new(location);
    if extract_issue_context(&location).is_none() {
        bail!("'{}' is not an issue page location", location.href());
    }

    let credentials = load_credentials(cli, true)?;
    let sink: Arc<dyn RenderSink> = Arc::new(TerminalRenderSink::new(std::io::stdout()));
    let mut session = TriageSession::connect(credentials, &session_settings(cli), sink)?;
    match session.run_once(location).await {
        RunOutcome::Rendered { .. } => Ok(()),
        RunOutcome::Aborted(failure) => Err(anyhow!(failure)),
        RunOutcome::Superseded => bail!("triage run was superseded before it completed"),
    }
}

fn starts_issue_session(signal: &PageSignal) -> bool {
    matches!(
        signal,
        PageSignal::NavigationChanged(location) if extract_issue_context(location).is_some()
    )
}

async fn execute_watch(cli: &Cli) -> Result<()> {
    let sink = Arc::new(TerminalRenderSink::new(std::io::stdout()));
    let settings = session_settings(cli);
    let mut events = PageEventSource::new();
    let mut credentials: Option<Arc<Credentials>> = None;
    let mut session: Option<TriageSession> = None;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read page observation")?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted; stopping watch");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let Some(observation) = PageObservation::parse_line(&line) else {
            continue;
        };
        if !observation.anchor_present {
            // The host redraw took the target with it.
            sink.remove_target();
        }
        let Some(signal) = events.observe(&observation) else {
            continue;
        };

        if session.is_none() {
            if !starts_issue_session(&signal) {
                tracing::debug!(href = %observation.href, "not an issue page; waiting");
                continue;
            }
            let resolved = match &credentials {
                Some(resolved) => Arc::clone(resolved),
                None => {
                    let resolved = load_credentials(cli, false)?;
                    credentials = Some(Arc::clone(&resolved));
                    resolved
                }
            };
            session = Some(TriageSession::connect(
                resolved,
                &settings,
                sink.clone(),
            )?);
        }

        let decision = session
            .as_mut()
            .map(|active| active.handle_signal(signal));
        if decision == Some(WatcherDecision::Teardown) {
            session = None;
        }
    }

    if let Some(mut active) = session {
        active.settle().await;
    }
    Ok(())
}

fn secret_kinds_for(target: CliSecretTarget) -> Vec<SecretKind> {
    match target {
        CliSecretTarget::GithubToken => vec![SecretKind::GithubToken],
        CliSecretTarget::CompletionApiKey => vec![SecretKind::CompletionApiKey],
        CliSecretTarget::All => SecretKind::ALL.to_vec(),
    }
}

fn secret_kind(kind: CliSecretKind) -> SecretKind {
    match kind {
        CliSecretKind::GithubToken => SecretKind::GithubToken,
        CliSecretKind::CompletionApiKey => SecretKind::CompletionApiKey,
    }
}

pub(crate) fn execute_credentials_command<S, R, W>(
    store: &S,
    action: &CredentialsCommand,
    read_secret: &mut R,
    out: &mut W,
) -> Result<()>
where
    S: CredentialStore + ?Sized,
    R: FnMut() -> Result<Option<String>>,
    W: Write,
{
    let admin = CredentialAdmin::new(store);
    match action {
        CredentialsCommand::Status => {
            for status in admin.status()? {
                match status.preview {
                    Some(preview) => writeln!(out, "{}: stored ({preview})", status.kind)?,
                    None => writeln!(out, "{}: missing", status.kind)?,
                }
            }
        }
        CredentialsCommand::Set { kind } => {
            let kind = secret_kind(*kind);
            let secret = read_secret()?
                .ok_or_else(|| anyhow!("no value provided for {}", kind.label()))?;
            store.write_secret(kind, &secret)?;
            writeln!(out, "{kind}: stored")?;
        }
        CredentialsCommand::Reset { target } => {
            for kind in secret_kinds_for(*target) {
                if admin.reset(kind)? {
                    writeln!(out, "{kind}: removed")?;
                } else {
                    writeln!(out, "{kind}: was not stored")?;
                }
            }
        }
    }
    Ok(())
}
