use std::fmt;

use serde::Serialize;

/// Query key the host appends when an issue is opened from a notification.
pub const NOTIFICATION_REFERRER_QUERY_KEY: &str = "notification_referrer_id";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
/// Identifies one issue: the unit of work for a pipeline run.
pub struct IssueContext {
    pub owner: String,
    pub repo: String,
    pub issue_number: u64,
}

impl fmt::Display for IssueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.issue_number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// A raw page location: either an absolute URL or a path with optional query.
pub struct PageLocation {
    href: String,
}

impl PageLocation {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into().trim().to_string(),
        }
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    /// Path component without scheme, authority, query, or fragment.
    pub fn path(&self) -> &str {
        let without_authority = match self.href.split_once("://") {
            Some((_, rest)) => match rest.find('/') {
                Some(index) => &rest[index..],
                None => "/",
            },
            None => self.href.as_str(),
        };
        let end = without_authority
            .find(['?', '#'])
            .unwrap_or(without_authority.len());
        &without_authority[..end]
    }

    /// Raw query string without the leading `?`, excluding any fragment.
    pub fn query(&self) -> Option<&str> {
        let (_, after) = self.href.split_once('?')?;
        let end = after.find('#').unwrap_or(after.len());
        Some(&after[..end])
    }

    pub fn query_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.query()
            .into_iter()
            .flat_map(|query| query.split('&'))
            .filter(|pair| !pair.is_empty())
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
    }

    pub fn has_query_key(&self, key: &str) -> bool {
        self.query_pairs().any(|(name, _)| name == key)
    }
}

impl fmt::Display for PageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href)
    }
}

impl From<&str> for PageLocation {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Extracts the issue identifier from `/<owner>/<repo>/issues/<number>`.
///
/// Returns `None` for any location that does not name an issue (list pages,
/// pull requests, repository roots). Trailing path segments after the number
/// are allowed, as are query strings and fragments.
pub fn extract_issue_context(location: &PageLocation) -> Option<IssueContext> {
    let path = location.path();
    let rest = path.strip_prefix('/')?;
    let mut segments = rest.split('/');
    let owner = segments.next().filter(|segment| !segment.is_empty())?;
    let repo = segments.next().filter(|segment| !segment.is_empty())?;
    if segments.next()? != "issues" {
        return None;
    }
    let number = segments.next()?;
    if number.is_empty() || !number.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let issue_number = number.parse::<u64>().ok()?;
    Some(IssueContext {
        owner: owner.to_string(),
        repo: repo.to_string(),
        issue_number,
    })
}

/// True when the host loaded an issue through a notification link.
///
/// The host performs such loads twice; the referrer variant is ignored so the
/// canonical load is the only one that triggers a run.
pub fn is_duplicate_issue_load(location: &PageLocation) -> bool {
    extract_issue_context(location).is_some()
        && location.has_query_key(NOTIFICATION_REFERRER_QUERY_KEY)
}
