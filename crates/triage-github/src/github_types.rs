use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Author of an issue or comment; only the login is kept.
pub struct GithubUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Subset of `GET /repos/{owner}/{repo}/issues/{number}` used for triage.
pub struct GithubIssue {
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub user: GithubUser,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// One entry of `GET /repos/{owner}/{repo}/issues/{number}/comments`.
pub struct GithubIssueComment {
    #[serde(default)]
    pub body: Option<String>,
    pub user: GithubUser,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
/// Subset of `GET /repos/{owner}/{repo}/readme`.
pub struct GithubReadme {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}
