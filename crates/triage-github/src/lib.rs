//! GitHub REST access for the triage pipeline.
//!
//! Provides the bounded-time resource fetcher and the all-or-nothing
//! aggregator that combines an issue, its comments, and the repository readme.

pub mod data_aggregator;
pub mod github_api_client;
pub mod github_types;

pub use data_aggregator::{decode_readme_content, Aggregate, AggregateComment, IssueDataSource};
pub use github_api_client::{
    GithubApiClient, GithubClientConfig, DEFAULT_GITHUB_API_BASE, DEFAULT_REQUEST_TIMEOUT_MS,
};
pub use github_types::{GithubIssue, GithubIssueComment, GithubReadme, GithubUser};
