//! Snapshot model: links, topics, issues, and the identifiers that key them.
//!
//! This module defines the read-only baseline the editor works against. A
//! [`Snapshot`] is what the remote queries return (one issue with its ordered
//! topics, plus the pool of links not yet assigned to any topic). Everything
//! the curator does locally is layered on top of it by the other modules and
//! never written back into it; only a refetch replaces it.
//!
//! [`LinkPatch`] is the sparse-update type for pending field edits. Its merge
//! is field-level: a later patch only overrides the fields it carries.

#[cfg(test)]
#[path = "issue_test.rs"]
mod issue_test;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consts::{TEMP_ID_PREFIX, UNASSIGNED};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a link. Either server-assigned or a local temporary id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(String);

impl LinkId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Allocate a fresh client-side id for an optimistically created link.
    #[must_use]
    pub fn temporary() -> Self {
        Self(format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4()))
    }

    /// Whether this id was generated locally and has no server counterpart yet.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_ID_PREFIX)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LinkId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Identifier of a topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(String);

impl TopicId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TopicId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Identifier of a newsletter issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(String);

impl IssueId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A container of links: the unassigned pool or one topic.
///
/// On the wire this is the topic id, or the reserved string `"unassigned"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BucketId {
    Unassigned,
    Topic(TopicId),
}

impl BucketId {
    /// The topic this bucket stands for, if it is not the unassigned pool.
    #[must_use]
    pub fn topic(&self) -> Option<&TopicId> {
        match self {
            Self::Unassigned => None,
            Self::Topic(id) => Some(id),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unassigned => UNASSIGNED,
            Self::Topic(id) => id.as_str(),
        }
    }
}

impl From<String> for BucketId {
    fn from(raw: String) -> Self {
        if raw == UNASSIGNED { Self::Unassigned } else { Self::Topic(TopicId(raw)) }
    }
}

impl From<BucketId> for String {
    fn from(bucket: BucketId) -> Self {
        match bucket {
            BucketId::Unassigned => UNASSIGNED.to_string(),
            BucketId::Topic(id) => id.0,
        }
    }
}

impl From<TopicId> for BucketId {
    fn from(id: TopicId) -> Self {
        Self::Topic(id)
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// LINKS
// =============================================================================

/// A curated link as last reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    #[serde(default)]
    pub title: String,
    /// Free-form description shown under the title.
    #[serde(default)]
    pub text: String,
    pub url: String,
}

impl Link {
    /// A link known only by its URL, as produced by an optimistic creation.
    #[must_use]
    pub fn from_url(id: LinkId, url: impl Into<String>) -> Self {
        Self { id, title: String::new(), text: String::new(), url: url.into() }
    }
}

/// Sparse edit to a link's text fields. Only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl LinkPatch {
    #[must_use]
    pub fn title(value: impl Into<String>) -> Self {
        Self { title: Some(value.into()), ..Default::default() }
    }

    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self { text: Some(value.into()), ..Default::default() }
    }

    #[must_use]
    pub fn url(value: impl Into<String>) -> Self {
        Self { url: Some(value.into()), ..Default::default() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.text.is_none() && self.url.is_none()
    }

    /// Merge `newer` over `self`, keeping fields `newer` does not mention.
    pub fn merge(&mut self, newer: &LinkPatch) {
        if let Some(title) = &newer.title {
            self.title = Some(title.clone());
        }
        if let Some(text) = &newer.text {
            self.text = Some(text.clone());
        }
        if let Some(url) = &newer.url {
            self.url = Some(url.clone());
        }
    }

    /// Overlay this patch on a base link.
    #[must_use]
    pub fn apply_to(&self, base: &Link) -> Link {
        Link {
            id: base.id.clone(),
            title: self.title.clone().unwrap_or_else(|| base.title.clone()),
            text: self.text.clone().unwrap_or_else(|| base.text.clone()),
            url: self.url.clone().unwrap_or_else(|| base.url.clone()),
        }
    }
}

// =============================================================================
// TOPICS / ISSUES
// =============================================================================

/// A topic section of an issue with its links in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub title: String,
    pub position: i64,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// A newsletter issue as returned by the `issue(id)` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub title: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub topics: Vec<Topic>,
}

/// An unconsumed reader suggestion that can be dragged into the issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Everything the editor needs from the server: one issue plus the unassigned pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub issue: Issue,
    #[serde(default)]
    pub unassigned: Vec<Link>,
}

impl Snapshot {
    /// Topics ordered by position. Ties keep server order.
    #[must_use]
    pub fn topics_by_position(&self) -> Vec<&Topic> {
        let mut topics: Vec<&Topic> = self.issue.topics.iter().collect();
        topics.sort_by_key(|t| t.position);
        topics
    }

    /// Look up a link anywhere in the snapshot.
    #[must_use]
    pub fn link(&self, id: &LinkId) -> Option<&Link> {
        self.unassigned
            .iter()
            .chain(self.issue.topics.iter().flat_map(|t| t.links.iter()))
            .find(|l| &l.id == id)
    }

    /// The bucket the server currently places a link in.
    #[must_use]
    pub fn bucket_of(&self, id: &LinkId) -> Option<BucketId> {
        if self.unassigned.iter().any(|l| &l.id == id) {
            return Some(BucketId::Unassigned);
        }
        self.issue
            .topics
            .iter()
            .find(|t| t.links.iter().any(|l| &l.id == id))
            .map(|t| BucketId::Topic(t.id.clone()))
    }

    /// Whether the issue has a topic with this id.
    #[must_use]
    pub fn has_topic(&self, id: &TopicId) -> bool {
        self.issue.topics.iter().any(|t| &t.id == id)
    }

    /// Every link id present in the snapshot.
    #[must_use]
    pub fn link_ids(&self) -> HashSet<LinkId> {
        self.unassigned
            .iter()
            .chain(self.issue.topics.iter().flat_map(|t| t.links.iter()))
            .map(|l| l.id.clone())
            .collect()
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Client-side rejection of manually entered input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("url is empty")]
    EmptyUrl,
    #[error("malformed url: {0}")]
    MalformedUrl(String),
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
}

/// Validate a manually entered link URL. Returns the trimmed input.
///
/// # Errors
///
/// Returns a [`ValidationError`] when the input is blank, does not parse as an
/// absolute URL, or uses a scheme other than http(s).
pub fn validate_url(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }
    let parsed = reqwest::Url::parse(trimmed).map_err(|e| ValidationError::MalformedUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(ValidationError::UnsupportedScheme(other.to_string())),
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ValidationError::MalformedUrl(format!("{trimmed}: missing host")));
    }
    Ok(trimmed.to_string())
}
