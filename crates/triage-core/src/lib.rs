//! Foundational primitives shared across the issue triage crates.
//!
//! Provides the issue-context extractor, the pipeline failure taxonomy,
//! cooperative cancellation, and the private atomic file write used by
//! credential persistence.

pub mod cancellation;
pub mod failure;
pub mod issue_context;
pub mod private_file;

pub use cancellation::CancellationToken;
pub use failure::{truncate_for_error, Failure, FailureKind};
pub use issue_context::{
    extract_issue_context, is_duplicate_issue_load, IssueContext, PageLocation,
    NOTIFICATION_REFERRER_QUERY_KEY,
};
pub use private_file::write_private_text_atomic;
