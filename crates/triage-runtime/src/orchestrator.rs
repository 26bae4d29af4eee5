use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use triage_core::{extract_issue_context, CancellationToken, Failure, IssueContext, PageLocation};
use triage_github::IssueDataSource;

use crate::completion_client::CompletionClient;
use crate::render_sink::{RenderSink, RenderState, Suggestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Identifies one run. Only the most recently minted token may commit output.
pub struct RunToken(u64);

impl RunToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Lifecycle of a single run.
pub enum RunState {
    Idle,
    Extracting,
    Aggregating,
    Requesting,
    Rendering,
    Done,
    Aborted,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Extracting => "extracting",
            RunState::Aggregating => "aggregating",
            RunState::Requesting => "requesting",
            RunState::Rendering => "rendering",
            RunState::Done => "done",
            RunState::Aborted => "aborted",
        }
    }

    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            RunState::Extracting
                | RunState::Aggregating
                | RunState::Requesting
                | RunState::Rendering
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// How a run ended.
pub enum RunOutcome {
    Rendered {
        context: IssueContext,
        suggestion: Suggestion,
    },
    Aborted(Failure),
    /// A newer run was started before this one could commit.
    Superseded,
}

#[derive(Debug)]
struct RunRecord {
    token: RunToken,
    state: RunState,
    committed: Option<RenderState>,
}

/// Sequences extraction, aggregation, completion, and rendering for one run
/// at a time.
///
/// Starting a run mints a fresh [`RunToken`]; every commit checks that its
/// token is still the latest while holding the record lock, so output from a
/// superseded run can never reach the sink.
pub struct PipelineOrchestrator {
    data_source: Arc<dyn IssueDataSource>,
    completion: CompletionClient,
    sink: Arc<dyn RenderSink>,
    record: Mutex<RunRecord>,
}

impl PipelineOrchestrator {
    pub fn new(
        data_source: Arc<dyn IssueDataSource>,
        completion: CompletionClient,
        sink: Arc<dyn RenderSink>,
    ) -> Self {
        Self {
            data_source,
            completion,
            sink,
            record: Mutex::new(RunRecord {
                token: RunToken(0),
                state: RunState::Idle,
                committed: None,
            }),
        }
    }

    fn lock_record(&self) -> MutexGuard<'_, RunRecord> {
        self.record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn sink(&self) -> &Arc<dyn RenderSink> {
        &self.sink
    }

    /// Mints a new token. Every earlier token becomes stale immediately.
    pub fn begin_run(&self) -> RunToken {
        let mut record = self.lock_record();
        let token = RunToken(record.token.0 + 1);
        *record = RunRecord {
            token,
            state: RunState::Idle,
            committed: None,
        };
        token
    }

    pub fn latest_token(&self) -> RunToken {
        self.lock_record().token
    }

    pub fn is_current(&self, token: RunToken) -> bool {
        self.lock_record().token == token
    }

    /// State of the latest run.
    pub fn state(&self) -> RunState {
        self.lock_record().state
    }

    /// Output committed by the latest run, if it got that far.
    pub fn committed_state(&self) -> Option<RenderState> {
        self.lock_record().committed.clone()
    }

    /// Forgets the latest run entirely, as if no run had started.
    pub fn reset(&self) {
        let mut record = self.lock_record();
        let token = RunToken(record.token.0 + 1);
        *record = RunRecord {
            token,
            state: RunState::Idle,
            committed: None,
        };
    }

    /// Recreates the render target and shows the latest committed output, or
    /// `Loading` when nothing has been committed yet. Holds the record lock so
    /// a concurrent commit cannot be overwritten.
    pub fn restore_target(&self) -> Result<RenderState, Failure> {
        let record = self.lock_record();
        let state = record.committed.clone().unwrap_or(RenderState::Loading);
        self.sink.create_target()?;
        self.sink.render(&state)?;
        Ok(state)
    }

    fn transition(&self, token: RunToken, state: RunState) -> bool {
        let mut record = self.lock_record();
        if record.token != token {
            return false;
        }
        record.state = state;
        tracing::debug!(run_token = %token, state = state.as_str(), "run state changed");
        true
    }

    fn superseded(&self, token: RunToken) -> RunOutcome {
        tracing::debug!(
            run_token = %token,
            latest = %self.latest_token(),
            "dropping result of superseded run"
        );
        RunOutcome::Superseded
    }

    /// Drives one run to completion. The run is abandoned as soon as `cancel`
    /// fires or a newer token is minted.
    pub async fn execute(
        &self,
        token: RunToken,
        location: &PageLocation,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        if !self.transition(token, RunState::Extracting) {
            return self.superseded(token);
        }
        let Some(context) = extract_issue_context(location) else {
            return self.abort(token, None, Failure::not_an_issue_page(location.href()));
        };

        if !self.transition(token, RunState::Aggregating) {
            return self.superseded(token);
        }
        tracing::debug!(run_token = %token, issue = %context, "aggregating issue data");
        let aggregate = match self.data_source.aggregate(&context, cancel).await {
            Ok(aggregate) => aggregate,
            Err(failure) => return self.abort(token, Some(&context), failure),
        };

        if cancel.is_cancelled() || !self.transition(token, RunState::Requesting) {
            return self.superseded(token);
        }
        let suggestion = match self.completion.suggest(&aggregate, cancel).await {
            Ok(suggestion) => suggestion,
            Err(failure) => return self.abort(token, Some(&context), failure),
        };

        if cancel.is_cancelled() || !self.transition(token, RunState::Rendering) {
            return self.superseded(token);
        }
        self.commit_suggestion(token, context, suggestion)
    }

    fn commit_suggestion(
        &self,
        token: RunToken,
        context: IssueContext,
        suggestion: Suggestion,
    ) -> RunOutcome {
        let mut record = self.lock_record();
        if record.token != token {
            drop(record);
            return self.superseded(token);
        }
        let state = RenderState::Suggestion(suggestion.clone());
        // Cached even when the target is gone so a recreated target can show it.
        record.committed = Some(state.clone());
        match self.sink.render(&state) {
            Ok(()) => {
                record.state = RunState::Done;
                tracing::info!(
                    run_token = %token,
                    issue = %context,
                    chars = suggestion.text.chars().count(),
                    "rendered triage suggestion"
                );
                RunOutcome::Rendered {
                    context,
                    suggestion,
                }
            }
            Err(failure) => {
                record.state = RunState::Aborted;
                tracing::debug!(
                    run_token = %token,
                    issue = %context,
                    error = %failure,
                    "render target missing at commit"
                );
                RunOutcome::Aborted(failure)
            }
        }
    }

    fn abort(
        &self,
        token: RunToken,
        context: Option<&IssueContext>,
        failure: Failure,
    ) -> RunOutcome {
        let mut record = self.lock_record();
        if record.token != token {
            drop(record);
            return self.superseded(token);
        }
        record.state = RunState::Aborted;
        let issue = context.map(ToString::to_string).unwrap_or_default();
        if failure.kind.is_silent() {
            tracing::debug!(run_token = %token, issue = %issue, error = %failure, "run aborted");
            return RunOutcome::Aborted(failure);
        }

        tracing::warn!(
            run_token = %token,
            issue = %issue,
            kind = failure.kind.as_str(),
            error = %failure.detail,
            "triage run failed"
        );
        let state = RenderState::Failed(failure.user_message());
        record.committed = Some(state.clone());
        if self.sink.has_target() {
            if let Err(render_error) = self.sink.render(&state) {
                tracing::debug!(
                    run_token = %token,
                    error = %render_error,
                    "failed to render failure state"
                );
            }
        }
        RunOutcome::Aborted(failure)
    }
}
