//! Data source: the remote operations the editor depends on.
//!
//! DESIGN
//! ======
//! The editor never speaks a wire protocol itself. It talks to a
//! [`DataSource`] (the GraphQL client in production, an in-memory mock in
//! tests) and reads through a [`QueryCache`] so a refetch after a save or a
//! creation only touches the queries it invalidated.
//!
//! Mutations return just the identifier they acted on. Anything else the
//! server knows arrives with the next read.

#[cfg(test)]
#[path = "source_test.rs"]
mod source_test;

#[cfg(test)]
#[path = "source_mock_test.rs"]
pub(crate) mod mock;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::issue::{Issue, IssueId, Link, LinkId, Snapshot, TopicId};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-success HTTP status.
    #[error("server responded with status {status}")]
    Response { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The server reported GraphQL errors.
    #[error("{}", .0.join("; "))]
    GraphQl(Vec<String>),

    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend does not expose this operation.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    #[error("config error: {0}")]
    Config(String),
}

impl SourceError {
    /// Whether re-sending the same request could plausibly succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Response { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

// =============================================================================
// TRAIT
// =============================================================================

/// Remote operations used by the editor. All are independent network calls.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// `createLink(url) -> {id}`. The server places the link in the unassigned pool.
    async fn create_link(&self, url: &str) -> Result<LinkId, SourceError>;

    /// `updateLink(id, title, text, url)`. Always a full record.
    async fn update_link(&self, id: &LinkId, title: &str, text: &str, url: &str) -> Result<LinkId, SourceError>;

    async fn delete_link(&self, id: &LinkId) -> Result<LinkId, SourceError>;

    /// `addLinksToTopic(linkId, topicId) -> {topic}`.
    async fn add_link_to_topic(&self, link: &LinkId, topic: &TopicId) -> Result<TopicId, SourceError>;

    /// Whether [`DataSource::remove_link_from_topic`] is available.
    fn supports_unassign(&self) -> bool {
        false
    }

    async fn remove_link_from_topic(&self, link: &LinkId, topic: &TopicId) -> Result<TopicId, SourceError> {
        debug!(link_id = %link, topic_id = %topic, "remove from topic requested on a source without it");
        Err(SourceError::Unsupported("removeLinkFromTopic"))
    }

    async fn create_topic(&self, title: &str, issue_comment: Option<&str>, issue: &IssueId) -> Result<TopicId, SourceError>;

    /// `updateTopic(id, position?)`.
    async fn update_topic(&self, id: &TopicId, position: Option<i64>) -> Result<TopicId, SourceError>;

    /// Detach a topic from an issue that is being deleted.
    async fn update_topic_when_issue_deleted(&self, id: &TopicId) -> Result<TopicId, SourceError>;

    async fn issue(&self, id: &IssueId) -> Result<Issue, SourceError>;

    async fn unassigned_links(&self) -> Result<Vec<Link>, SourceError>;

    async fn all_links(&self) -> Result<Vec<Link>, SourceError>;
}

// =============================================================================
// QUERY CACHE
// =============================================================================

/// Cacheable read queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Issue(IssueId),
    UnassignedLinks,
    AllLinks,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Issue(Issue),
    Links(Vec<Link>),
}

/// Read-through cache over a [`DataSource`]. Entries live until invalidated.
pub struct QueryCache {
    source: Arc<dyn DataSource>,
    entries: HashMap<QueryKey, QueryValue>,
}

impl QueryCache {
    #[must_use]
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source, entries: HashMap::new() }
    }

    #[must_use]
    pub fn source(&self) -> Arc<dyn DataSource> {
        Arc::clone(&self.source)
    }

    #[must_use]
    pub fn is_cached(&self, key: &QueryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Cached value for `key`, fetching it on a miss.
    pub async fn read(&mut self, key: &QueryKey) -> Result<QueryValue, SourceError> {
        if let Some(value) = self.entries.get(key) {
            return Ok(value.clone());
        }
        debug!(?key, "query cache miss");
        let value = match key {
            QueryKey::Issue(id) => QueryValue::Issue(self.source.issue(id).await?),
            QueryKey::UnassignedLinks => QueryValue::Links(self.source.unassigned_links().await?),
            QueryKey::AllLinks => QueryValue::Links(self.source.all_links().await?),
        };
        self.entries.insert(key.clone(), value.clone());
        Ok(value)
    }

    pub async fn issue(&mut self, id: &IssueId) -> Result<Issue, SourceError> {
        match self.read(&QueryKey::Issue(id.clone())).await? {
            QueryValue::Issue(issue) => Ok(issue),
            QueryValue::Links(_) => Err(SourceError::Parse(format!("cached value for issue {id} is not an issue"))),
        }
    }

    pub async fn links(&mut self, key: &QueryKey) -> Result<Vec<Link>, SourceError> {
        match self.read(key).await? {
            QueryValue::Links(links) => Ok(links),
            QueryValue::Issue(_) => Err(SourceError::Parse(format!("cached value for {key:?} is not a link list"))),
        }
    }

    /// The issue plus the unassigned pool, as one snapshot.
    pub async fn snapshot(&mut self, id: &IssueId) -> Result<Snapshot, SourceError> {
        let issue = self.issue(id).await?;
        let unassigned = self.links(&QueryKey::UnassignedLinks).await?;
        Ok(Snapshot { issue, unassigned })
    }

    pub fn invalidate(&mut self, keys: &[QueryKey]) {
        for key in keys {
            if self.entries.remove(key).is_some() {
                debug!(?key, "query invalidated");
            }
        }
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }
}
