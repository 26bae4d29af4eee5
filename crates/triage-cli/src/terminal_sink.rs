use std::io::Write;
use std::sync::Mutex;

use triage_core::Failure;
use triage_runtime::{RenderSink, RenderState};

struct TerminalTarget<W> {
    writer: W,
    attached: bool,
}

/// Writes each rendered state to a terminal stream as a labelled block.
pub(crate) struct TerminalRenderSink<W: Write + Send> {
    target: Mutex<TerminalTarget<W>>,
}

impl<W: Write + Send> TerminalRenderSink<W> {
    pub(crate) fn new(writer: W) -> Self {
        Self {
            target: Mutex::new(TerminalTarget {
                writer,
                attached: false,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TerminalTarget<W>> {
        self.target
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    pub(crate) fn into_writer(self) -> W {
        self.target
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .writer
    }
}

fn state_label(state: &RenderState) -> &'static str {
    match state {
        RenderState::Loading => "loading",
        RenderState::Suggestion(_) => "suggestion",
        RenderState::Failed(_) => "failed",
    }
}

impl<W: Write + Send> RenderSink for TerminalRenderSink<W> {
    fn has_target(&self) -> bool {
        self.lock().attached
    }

    fn create_target(&self) -> Result<(), Failure> {
        self.lock().attached = true;
        Ok(())
    }

    fn render(&self, state: &RenderState) -> Result<(), Failure> {
        let mut target = self.lock();
        if !target.attached {
            return Err(Failure::render_target_missing(
                "terminal target is detached",
            ));
        }
        let block = format!("[{}]\n{}\n", state_label(state), state.display_text());
        target
            .writer
            .write_all(block.as_bytes())
            .and_then(|()| target.writer.flush())
            .map_err(|error| {
                Failure::render_target_missing(format!("failed to write to terminal: {error}"))
            })
    }

    fn remove_target(&self) {
        self.lock().attached = false;
    }
}
