use triage_core::PageLocation;

use crate::page_watcher::PageSignal;

/// Marker accepted after the href in a line-oriented observation.
pub const ANCHOR_MISSING_MARKER: &str = "anchor-missing";

#[derive(Debug, Clone, PartialEq, Eq)]
/// One snapshot of the host page: where it is and whether the render
/// target's anchor is present.
pub struct PageObservation {
    pub href: String,
    pub anchor_present: bool,
}

impl PageObservation {
    pub fn new(href: impl Into<String>, anchor_present: bool) -> Self {
        Self {
            href: href.into(),
            anchor_present,
        }
    }

    /// Parses `<href>` or `<href> anchor-missing`. Blank lines and lines
    /// starting with `#` yield `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }
        let mut parts = trimmed.split_whitespace();
        let href = parts.next()?;
        let anchor_present = !parts.any(|part| part.eq_ignore_ascii_case(ANCHOR_MISSING_MARKER));
        Some(Self::new(href, anchor_present))
    }
}

#[derive(Debug, Default)]
/// Converts raw page observations into watcher signals.
///
/// A changed href is reported as navigation. An unchanged href with the
/// anchor gone is reported as `AnchorMissing`. Everything else is noise.
pub struct PageEventSource {
    last_href: Option<String>,
}

impl PageEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, observation: &PageObservation) -> Option<PageSignal> {
        let href = observation.href.trim();
        if self.last_href.as_deref() != Some(href) {
            self.last_href = Some(href.to_string());
            return Some(PageSignal::NavigationChanged(PageLocation::new(href)));
        }
        if !observation.anchor_present {
            return Some(PageSignal::AnchorMissing);
        }
        None
    }
}
