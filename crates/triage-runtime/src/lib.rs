//! Pipeline runtime for the issue triage helper.
//!
//! Wires issue data aggregation and completion requests into a single
//! run-at-a-time orchestrator, and drives it from page signals through a
//! [`TriageSession`].

mod completion_client;
mod orchestrator;
mod page_events;
mod page_watcher;
mod render_sink;
mod session;

pub use completion_client::{
    CompletionClient, CompletionConfig, DEFAULT_COMPLETION_MAX_TOKENS, DEFAULT_COMPLETION_MODEL,
    DEFAULT_COMPLETION_TEMPERATURE, NO_RESPONSE_PLACEHOLDER, TRIAGE_SYSTEM_PROMPT,
};
pub use orchestrator::{PipelineOrchestrator, RunOutcome, RunState, RunToken};
pub use page_events::{PageEventSource, PageObservation, ANCHOR_MISSING_MARKER};
pub use page_watcher::{IgnoreReason, PageSignal, PageWatcher, RunStatus, WatcherDecision};
pub use render_sink::{MemoryRenderSink, RenderSink, RenderState, Suggestion, LOADING_TEXT};
pub use session::{SessionSettings, TriageSession, DEFAULT_COMPLETION_TIMEOUT_MS};
