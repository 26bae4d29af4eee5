use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates the failure categories a pipeline run can end with.
pub enum FailureKind {
    NotAnIssuePage,
    Network,
    HttpStatus,
    Parse,
    Timeout,
    RenderTargetMissing,
    /// A superseded run observed its cancellation token. Never surfaced.
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAnIssuePage => "not_an_issue_page",
            Self::Network => "network",
            Self::HttpStatus => "http_status",
            Self::Parse => "parse",
            Self::Timeout => "timeout",
            Self::RenderTargetMissing => "render_target_missing",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns true for outcomes that are expected and must not produce
    /// user-visible error text.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            Self::NotAnIssuePage | Self::RenderTargetMissing | Self::Cancelled
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
/// A categorized pipeline failure with human-readable detail.
pub struct Failure {
    pub kind: FailureKind,
    pub detail: String,
}

impl Failure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn network(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, detail)
    }

    pub fn http_status(status: u16, url: &str, body: &str) -> Self {
        let excerpt = truncate_for_error(body, 400);
        let detail = if excerpt.is_empty() {
            format!("status {status} for {url}")
        } else {
            format!("status {status} for {url}: {excerpt}")
        };
        Self::new(FailureKind::HttpStatus, detail)
    }

    pub fn parse(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Parse, detail)
    }

    pub fn timeout(deadline_ms: u64, url: &str) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("request timed out after {deadline_ms}ms for {url}"),
        )
    }

    pub fn cancelled(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Cancelled, detail)
    }

    pub fn not_an_issue_page(location: &str) -> Self {
        Self::new(
            FailureKind::NotAnIssuePage,
            format!("location '{location}' does not name an issue"),
        )
    }

    pub fn render_target_missing(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::RenderTargetMissing, detail)
    }

    /// Short message suitable for display inside the render target.
    pub fn user_message(&self) -> String {
        let headline = match self.kind {
            FailureKind::Network => "Could not reach the server",
            FailureKind::HttpStatus => "The server rejected the request",
            FailureKind::Parse => "The server returned an unreadable response",
            FailureKind::Timeout => "The request timed out",
            FailureKind::NotAnIssuePage
            | FailureKind::RenderTargetMissing
            | FailureKind::Cancelled => "Triage suggestions are unavailable",
        };
        format!("{headline} ({})", self.detail)
    }
}

/// Truncates `text` to at most `max_chars` characters, appending an ellipsis marker.
pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut truncated = trimmed.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::{truncate_for_error, Failure, FailureKind};

    #[test]
    fn unit_http_status_detail_includes_status_and_url() {
        let failure = Failure::http_status(404, "https://api.example/repos/o/r/readme", "");
        assert_eq!(failure.kind, FailureKind::HttpStatus);
        assert!(failure.detail.contains("404"));
        assert!(failure.detail.contains("https://api.example/repos/o/r/readme"));
    }

    #[test]
    fn unit_timeout_detail_includes_deadline() {
        let failure = Failure::timeout(5_000, "https://api.example/x");
        assert!(failure.detail.contains("5000ms"));
        assert_eq!(failure.to_string(), format!("timeout: {}", failure.detail));
    }

    #[test]
    fn unit_silent_kinds_are_limited_to_expected_outcomes() {
        assert!(FailureKind::NotAnIssuePage.is_silent());
        assert!(FailureKind::RenderTargetMissing.is_silent());
        assert!(FailureKind::Cancelled.is_silent());
        assert!(!FailureKind::Network.is_silent());
        assert!(!FailureKind::Timeout.is_silent());
    }

    #[test]
    fn regression_truncate_for_error_respects_char_boundaries() {
        let text = "ééééé";
        assert_eq!(truncate_for_error(text, 3), "ééé...");
        assert_eq!(truncate_for_error("  short  ", 10), "short");
    }
}
