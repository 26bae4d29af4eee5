use std::sync::Arc;

use tokio::task::JoinHandle;
use triage_ai::{OpenAiClient, OpenAiConfig, DEFAULT_OPENAI_API_BASE};
use triage_core::{CancellationToken, Failure, PageLocation};
use triage_credentials::Credentials;
use triage_github::{
    GithubApiClient, GithubClientConfig, DEFAULT_GITHUB_API_BASE, DEFAULT_REQUEST_TIMEOUT_MS,
};

use crate::completion_client::{CompletionClient, CompletionConfig};
use crate::orchestrator::{PipelineOrchestrator, RunOutcome, RunToken};
use crate::page_watcher::{PageSignal, PageWatcher, RunStatus, WatcherDecision};
use crate::render_sink::{RenderSink, RenderState};

pub const DEFAULT_COMPLETION_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq)]
/// Endpoint and timing settings for a session.
pub struct SessionSettings {
    pub github_api_base: String,
    pub request_timeout_ms: u64,
    pub completion_api_base: String,
    pub completion_timeout_ms: u64,
    pub completion: CompletionConfig,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            github_api_base: DEFAULT_GITHUB_API_BASE.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            completion_api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            completion_timeout_ms: DEFAULT_COMPLETION_TIMEOUT_MS,
            completion: CompletionConfig::default(),
        }
    }
}

struct ActiveRun {
    token: RunToken,
    cancel: CancellationToken,
    handle: JoinHandle<RunOutcome>,
}

/// Everything one page visit needs: credentials, watcher state, the
/// orchestrator, and at most one in-flight run.
pub struct TriageSession {
    credentials: Option<Arc<Credentials>>,
    watcher: PageWatcher,
    orchestrator: Arc<PipelineOrchestrator>,
    active_run: Option<ActiveRun>,
}

impl TriageSession {
    /// Builds the GitHub and completion clients from resolved credentials.
    pub fn connect(
        credentials: Arc<Credentials>,
        settings: &SessionSettings,
        sink: Arc<dyn RenderSink>,
    ) -> Result<Self, Failure> {
        let github = GithubApiClient::new(GithubClientConfig {
            api_base: settings.github_api_base.clone(),
            token: credentials.github_token.expose().to_string(),
            request_timeout_ms: settings.request_timeout_ms,
        })?;
        let llm = OpenAiClient::new(OpenAiConfig {
            api_base: settings.completion_api_base.clone(),
            api_key: credentials.completion_api_key.expose().to_string(),
            request_timeout_ms: settings.completion_timeout_ms,
        })
        .map_err(|error| Failure::network(format!("failed to build completion client: {error}")))?;

        let orchestrator = PipelineOrchestrator::new(
            Arc::new(github),
            CompletionClient::new(Arc::new(llm), settings.completion.clone()),
            sink,
        );
        let mut session = Self::with_orchestrator(Arc::new(orchestrator));
        session.credentials = Some(credentials);
        Ok(session)
    }

    pub fn with_orchestrator(orchestrator: Arc<PipelineOrchestrator>) -> Self {
        Self {
            credentials: None,
            watcher: PageWatcher::new(),
            orchestrator,
            active_run: None,
        }
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_deref()
    }

    pub fn orchestrator(&self) -> &Arc<PipelineOrchestrator> {
        &self.orchestrator
    }

    pub fn run_status(&self) -> RunStatus {
        RunStatus {
            in_flight: self
                .active_run
                .as_ref()
                .is_some_and(|run| !run.handle.is_finished()),
            has_committed_state: self.orchestrator.committed_state().is_some(),
        }
    }

    /// Applies one page signal and returns the decision that was taken.
    pub fn handle_signal(&mut self, signal: PageSignal) -> WatcherDecision {
        let decision = self.watcher.on_signal(&signal, self.run_status());
        match &decision {
            WatcherDecision::Ignore(reason) => {
                tracing::debug!(reason = reason.as_str(), "page signal ignored");
            }
            WatcherDecision::Teardown => self.teardown(),
            WatcherDecision::StartRun { location, context } => {
                tracing::info!(issue = %context, "issue page detected");
                self.start_run(location.clone());
            }
            WatcherDecision::RecreateTarget {
                location,
                start_run: true,
            } => {
                self.start_run(location.clone());
            }
            WatcherDecision::RecreateTarget {
                start_run: false, ..
            } => match self.orchestrator.restore_target() {
                Ok(state) => tracing::debug!(
                    showing_loading = matches!(state, RenderState::Loading),
                    "render target recreated"
                ),
                Err(failure) => {
                    tracing::debug!(error = %failure, "render target could not be recreated");
                }
            },
        }
        decision
    }

    /// Cancels any in-flight run, shows `Loading`, and spawns a fresh run.
    pub fn start_run(&mut self, location: PageLocation) -> RunToken {
        self.cancel_active_run();
        let token = self.orchestrator.begin_run();
        let sink = self.orchestrator.sink();
        if let Err(failure) = sink
            .create_target()
            .and_then(|()| sink.render(&RenderState::Loading))
        {
            tracing::debug!(run_token = %token, error = %failure, "loading state not shown");
        }

        let cancel = CancellationToken::new();
        let handle = {
            let orchestrator = Arc::clone(&self.orchestrator);
            let cancel = cancel.clone();
            tokio::spawn(async move { orchestrator.execute(token, &location, &cancel).await })
        };
        self.active_run = Some(ActiveRun {
            token,
            cancel,
            handle,
        });
        token
    }

    /// Waits for the in-flight run, if any, and returns how it ended.
    pub async fn settle(&mut self) -> Option<RunOutcome> {
        let run = self.active_run.take()?;
        match run.handle.await {
            Ok(outcome) => Some(outcome),
            Err(error) => {
                tracing::warn!(run_token = %run.token, error = %error, "triage run task failed");
                None
            }
        }
    }

    /// Runs the pipeline once for `location` and waits for the outcome.
    pub async fn run_once(&mut self, location: PageLocation) -> RunOutcome {
        self.start_run(location);
        self.settle().await.unwrap_or(RunOutcome::Superseded)
    }

    /// Cancels work, forgets committed output, and removes the target.
    pub fn teardown(&mut self) {
        self.cancel_active_run();
        self.orchestrator.reset();
        self.orchestrator.sink().remove_target();
        tracing::info!("triage session torn down");
    }

    fn cancel_active_run(&mut self) {
        if let Some(run) = self.active_run.take() {
            run.cancel.cancel();
            tracing::debug!(run_token = %run.token, "cancelled in-flight run");
        }
    }
}

impl Drop for TriageSession {
    fn drop(&mut self) {
        if let Some(run) = self.active_run.take() {
            run.cancel.cancel();
        }
    }
}
