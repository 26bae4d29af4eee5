use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::Serialize;
use triage_core::{CancellationToken, Failure, IssueContext};

use crate::{GithubApiClient, GithubIssue, GithubIssueComment, GithubReadme};

const POST_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateComment {
    pub author: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Readme, issue, and comments for one issue, built only when all three
/// fetches succeeded.
pub struct Aggregate {
    pub context: IssueContext,
    pub readme_text: String,
    pub issue_author: String,
    pub issue_title: String,
    pub issue_body: String,
    pub comments: Vec<AggregateComment>,
}

impl Aggregate {
    pub fn from_parts(
        context: IssueContext,
        readme: GithubReadme,
        issue: GithubIssue,
        comments: Vec<GithubIssueComment>,
    ) -> Result<Self, Failure> {
        let readme_text = decode_readme_content(&readme)?;
        Ok(Self {
            context,
            readme_text,
            issue_author: issue.user.login,
            issue_title: issue.title,
            issue_body: issue.body.unwrap_or_default(),
            comments: comments
                .into_iter()
                .map(|comment| AggregateComment {
                    author: comment.user.login,
                    body: comment.body.unwrap_or_default(),
                })
                .collect(),
        })
    }

    /// Renders the deterministic text block embedded in the completion prompt.
    pub fn render_prompt_text(&self) -> String {
        let readme = if self.readme_text.trim().is_empty() {
            "(no readme)"
        } else {
            self.readme_text.trim()
        };
        let mut posts = vec![format!(
            "@{} (OP):\nTitle: {}\n\n{}",
            self.issue_author,
            self.issue_title,
            self.issue_body.trim()
        )];
        posts.extend(
            self.comments
                .iter()
                .map(|comment| format!("@{}:\n{}", comment.author, comment.body.trim())),
        );

        format!(
            "Repository: {}/{}\nIssue: #{}\n\n=== README ===\n{}\n=== END README ===\n\n=== ISSUE THREAD ===\n{}\n=== END ISSUE THREAD ===",
            self.context.owner,
            self.context.repo,
            self.context.issue_number,
            readme,
            posts.join(POST_SEPARATOR)
        )
    }
}

/// Decodes the readme payload to text. Absent or empty content is an empty
/// readme, not a failure.
pub fn decode_readme_content(readme: &GithubReadme) -> Result<String, Failure> {
    let Some(content) = readme.content.as_deref() else {
        return Ok(String::new());
    };
    let is_base64 = readme
        .encoding
        .as_deref()
        .map(|encoding| encoding.eq_ignore_ascii_case("base64"))
        .unwrap_or(true);
    if !is_base64 {
        return Ok(content.to_string());
    }

    // The API wraps base64 payloads at 60 columns.
    let compact = content
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect::<String>();
    if compact.is_empty() {
        return Ok(String::new());
    }
    let bytes = BASE64_STANDARD
        .decode(compact.as_bytes())
        .map_err(|error| Failure::parse(format!("readme content is not valid base64: {error}")))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[async_trait]
/// Produces the aggregate for an issue; the seam the orchestrator depends on.
pub trait IssueDataSource: Send + Sync {
    async fn aggregate(
        &self,
        context: &IssueContext,
        cancel: &CancellationToken,
    ) -> Result<Aggregate, Failure>;
}

#[async_trait]
impl IssueDataSource for GithubApiClient {
    /// Fetches readme, issue, and comments concurrently. The first failure
    /// fails the whole step and the remaining requests are dropped.
    async fn aggregate(
        &self,
        context: &IssueContext,
        cancel: &CancellationToken,
    ) -> Result<Aggregate, Failure> {
        let readme_url = self.readme_url(context);
        let issue_url = self.issue_url(context);
        let comments_url = self.comments_url(context);

        let (readme, issue, comments) = tokio::try_join!(
            self.fetch_optional_json::<GithubReadme>("fetch readme", &readme_url, cancel),
            self.fetch_json::<GithubIssue>("fetch issue", &issue_url, cancel),
            self.fetch_json::<Vec<GithubIssueComment>>(
                "list issue comments",
                &comments_url,
                cancel
            ),
        )?;
        // A repository without a readme answers 404; that is empty readme text.
        let readme = readme.unwrap_or_default();

        tracing::debug!(
            issue = %context,
            comments = comments.len(),
            "github issue data aggregated"
        );
        Aggregate::from_parts(context.clone(), readme, issue, comments)
    }
}
