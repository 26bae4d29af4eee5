use std::sync::Mutex;

use triage_core::Failure;

/// Text shown in the render target while a run is in flight.
pub const LOADING_TEXT: &str = "Loading AI suggestions...";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Completion text produced for one issue.
pub struct Suggestion {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// What the render target displays.
pub enum RenderState {
    Loading,
    Suggestion(Suggestion),
    Failed(String),
}

impl RenderState {
    /// Plain-text body for sinks that do not style states differently.
    pub fn display_text(&self) -> &str {
        match self {
            RenderState::Loading => LOADING_TEXT,
            RenderState::Suggestion(suggestion) => &suggestion.text,
            RenderState::Failed(message) => message,
        }
    }
}

/// The single output surface a session writes into.
///
/// Implementations own at most one target at a time. Creating a target
/// replaces any previous one.
pub trait RenderSink: Send + Sync {
    fn has_target(&self) -> bool;

    /// Fails with `RenderTargetMissing` when the page has nowhere to anchor
    /// the target.
    fn create_target(&self) -> Result<(), Failure>;

    /// Fails with `RenderTargetMissing` when no target exists.
    fn render(&self, state: &RenderState) -> Result<(), Failure>;

    fn remove_target(&self);
}

#[derive(Debug, Default)]
struct MemorySinkState {
    anchor_available: bool,
    target: Option<Option<RenderState>>,
    targets_created: usize,
    history: Vec<RenderState>,
}

#[derive(Debug)]
/// In-memory sink used by tests and headless drivers.
pub struct MemoryRenderSink {
    state: Mutex<MemorySinkState>,
}

impl Default for MemoryRenderSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRenderSink {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemorySinkState {
                anchor_available: true,
                ..MemorySinkState::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemorySinkState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_anchor_available(&self, available: bool) {
        self.lock().anchor_available = available;
    }

    /// Simulates the host page redrawing and discarding the target.
    pub fn drop_target(&self) {
        self.lock().target = None;
    }

    /// Current contents of the target, or `None` when no target exists or it
    /// is still blank.
    pub fn current(&self) -> Option<RenderState> {
        self.lock().target.clone().flatten()
    }

    pub fn history(&self) -> Vec<RenderState> {
        self.lock().history.clone()
    }

    pub fn targets_created(&self) -> usize {
        self.lock().targets_created
    }
}

impl RenderSink for MemoryRenderSink {
    fn has_target(&self) -> bool {
        self.lock().target.is_some()
    }

    fn create_target(&self) -> Result<(), Failure> {
        let mut state = self.lock();
        if !state.anchor_available {
            return Err(Failure::render_target_missing(
                "no anchor available for the render target",
            ));
        }
        state.target = Some(None);
        state.targets_created += 1;
        Ok(())
    }

    fn render(&self, render_state: &RenderState) -> Result<(), Failure> {
        let mut state = self.lock();
        if state.target.is_none() {
            return Err(Failure::render_target_missing(
                "render target was removed before the result arrived",
            ));
        }
        state.target = Some(Some(render_state.clone()));
        state.history.push(render_state.clone());
        Ok(())
    }

    fn remove_target(&self) {
        self.lock().target = None;
    }
}

#[cfg(test)]
mod tests {
    use triage_core::FailureKind;

    use super::{MemoryRenderSink, RenderSink, RenderState, Suggestion, LOADING_TEXT};

    #[test]
    fn unit_render_requires_existing_target() {
        let sink = MemoryRenderSink::new();
        let failure = sink
            .render(&RenderState::Loading)
            .expect_err("no target yet");
        assert_eq!(failure.kind, FailureKind::RenderTargetMissing);

        sink.create_target().expect("create");
        sink.render(&RenderState::Loading).expect("render");
        assert_eq!(sink.current(), Some(RenderState::Loading));
    }

    #[test]
    fn unit_create_target_fails_without_anchor() {
        let sink = MemoryRenderSink::new();
        sink.set_anchor_available(false);
        assert!(sink.create_target().is_err());
        assert!(!sink.has_target());
        assert_eq!(sink.targets_created(), 0);
    }

    #[test]
    fn unit_create_target_replaces_previous_contents() {
        let sink = MemoryRenderSink::new();
        sink.create_target().expect("create");
        sink.render(&RenderState::Failed("boom".to_string()))
            .expect("render");
        sink.create_target().expect("recreate");
        assert!(sink.has_target());
        assert_eq!(sink.current(), None);
        assert_eq!(sink.targets_created(), 2);
    }

    #[test]
    fn unit_display_text_per_state() {
        assert_eq!(RenderState::Loading.display_text(), LOADING_TEXT);
        let state = RenderState::Suggestion(Suggestion {
            text: "Ask for logs".to_string(),
        });
        assert_eq!(state.display_text(), "Ask for logs");
    }
}
