use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use triage_core::{CancellationToken, Failure, FailureKind, IssueContext};

pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

const GITHUB_API_VERSION: &str = "2022-11-28";
const GITHUB_USER_AGENT: &str = "github-issue-triage-helper";
const COMMENTS_PER_PAGE: u32 = 100;

#[derive(Debug, Clone)]
/// Connection settings for the repository data API.
pub struct GithubClientConfig {
    pub api_base: String,
    pub token: String,
    pub request_timeout_ms: u64,
}

impl GithubClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_GITHUB_API_BASE.to_string(),
            token: token.into(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

#[derive(Clone)]
/// Read-only GitHub REST client with a per-request deadline.
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    request_timeout_ms: u64,
}

impl GithubApiClient {
    pub fn new(config: GithubClientConfig) -> Result<Self, Failure> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(GITHUB_USER_AGENT));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        let token = config.token.trim();
        if !token.is_empty() {
            let auth_header = format!("Bearer {token}");
            let mut value = HeaderValue::from_str(&auth_header).map_err(|error| {
                Failure::parse(format!("invalid github authorization header: {error}"))
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|error| {
                Failure::network(format!("failed to create github api client: {error}"))
            })?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            request_timeout_ms: config.request_timeout_ms.max(1),
        })
    }

    pub fn request_timeout_ms(&self) -> u64 {
        self.request_timeout_ms
    }

    pub fn readme_url(&self, context: &IssueContext) -> String {
        format!(
            "{}/repos/{}/{}/readme",
            self.api_base, context.owner, context.repo
        )
    }

    pub fn issue_url(&self, context: &IssueContext) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}",
            self.api_base, context.owner, context.repo, context.issue_number
        )
    }

    pub fn comments_url(&self, context: &IssueContext) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}/comments?per_page={COMMENTS_PER_PAGE}",
            self.api_base, context.owner, context.repo, context.issue_number
        )
    }

    /// Performs one GET raced against the client deadline and `cancel`.
    ///
    /// Losing the race drops the in-flight request, so a late response is
    /// never observed.
    pub async fn fetch_json<T>(
        &self,
        operation: &str,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<T, Failure>
    where
        T: DeserializeOwned,
    {
        self.fetch(operation, url, cancel, false)
            .await?
            .ok_or_else(|| Failure::http_status(StatusCode::NOT_FOUND.as_u16(), url, ""))
    }

    /// Like [`Self::fetch_json`], but a 404 yields `Ok(None)` instead of a
    /// failure. Every other non-success status still fails.
    pub async fn fetch_optional_json<T>(
        &self,
        operation: &str,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, Failure>
    where
        T: DeserializeOwned,
    {
        self.fetch(operation, url, cancel, true).await
    }

    async fn fetch<T>(
        &self,
        operation: &str,
        url: &str,
        cancel: &CancellationToken,
        missing_ok: bool,
    ) -> Result<Option<T>, Failure>
    where
        T: DeserializeOwned,
    {
        tracing::debug!(operation, url, "github request started");
        let deadline = Duration::from_millis(self.request_timeout_ms);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Failure::cancelled(format!(
                "github {operation} abandoned for {url}"
            ))),
            raced = tokio::time::timeout(
                deadline,
                self.request_json::<T>(operation, url, missing_ok),
            ) => {
                match raced {
                    Ok(result) => result,
                    Err(_) => Err(Failure::timeout(self.request_timeout_ms, url)),
                }
            }
        };
        if let Err(failure) = &outcome {
            tracing::debug!(operation, url, kind = %failure.kind, "github request failed");
        }
        outcome
    }

    async fn request_json<T>(
        &self,
        operation: &str,
        url: &str,
        missing_ok: bool,
    ) -> Result<Option<T>, Failure>
    where
        T: DeserializeOwned,
    {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|error| transport_failure(operation, url, &error))?;

        let status = response.status();
        if missing_ok && status == StatusCode::NOT_FOUND {
            tracing::debug!(operation, url, "github resource not found");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Failure::http_status(status.as_u16(), url, &body));
        }

        let raw = response
            .text()
            .await
            .map_err(|error| transport_failure(operation, url, &error))?;
        serde_json::from_str::<T>(&raw).map(Some).map_err(|error| {
            Failure::parse(format!(
                "failed to decode github {operation} from {url}: {error}"
            ))
        })
    }
}

fn transport_failure(operation: &str, url: &str, error: &reqwest::Error) -> Failure {
    let kind = if error.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Network
    };
    Failure::new(
        kind,
        format!("github api {operation} request failed for {url}: {error}"),
    )
}
