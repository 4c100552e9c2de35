//! GraphQL client implementing [`DataSource`].
//!
//! Thin HTTP wrapper: every operation posts one document with its variables
//! and decodes a single root field. Pure parsing lives in [`parse_response`]
//! so it can be tested without a server.

#[cfg(test)]
#[path = "graphql_test.rs"]
mod graphql_test;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::GraphQlConfig;
use crate::issue::{Issue, IssueId, Link, LinkId, Topic, TopicId};
use crate::source::{DataSource, SourceError};

// =============================================================================
// DOCUMENTS
// =============================================================================

const CREATE_LINK: &str = "mutation CreateLink($url: String!) { createLink(url: $url) { id } }";
const UPDATE_LINK: &str = "mutation UpdateLink($id: ID!, $title: String!, $text: String!, $url: String!) { \
                           updateLink(id: $id, title: $title, text: $text, url: $url) { id } }";
const DELETE_LINK: &str = "mutation DeleteLink($id: ID!) { deleteLink(id: $id) { id } }";
const ADD_LINK_TO_TOPIC: &str = "mutation AddLinksToTopic($linkId: ID!, $topicId: ID!) { \
                                 addLinksToTopic(linkId: $linkId, topicId: $topicId) { id } }";
const REMOVE_LINK_FROM_TOPIC: &str = "mutation RemoveLinkFromTopic($linkId: ID!, $topicId: ID!) { \
                                      removeLinkFromTopic(linkId: $linkId, topicId: $topicId) { id } }";
const CREATE_TOPIC: &str = "mutation CreateTopic($title: String!, $issueComment: String, $issueId: ID!) { \
                            createTopic(title: $title, issueComment: $issueComment, issueId: $issueId) { id } }";
const UPDATE_TOPIC: &str = "mutation UpdateTopic($id: ID!, $position: Int) { updateTopic(id: $id, position: $position) { id } }";
const DETACH_TOPIC: &str = "mutation UpdateTopicWhenIssueDeleted($id: ID!) { updateTopicWhenIssueDeleted(id: $id) { id } }";
const ISSUE: &str = "query Issue($id: ID!) { issue(id: $id) { id title comment \
                     topics { id title position links { id title text url } } } }";
const UNASSIGNED_LINKS: &str = "query UnassignedLinks { unassignedLinks { id title text url } }";
const ALL_LINKS: &str = "query AllLinks { allLinks { id title text url } }";

// =============================================================================
// CLIENT
// =============================================================================

pub struct GraphQlClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    supports_unassign: bool,
}

impl GraphQlClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &GraphQlConfig) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| SourceError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            token: config.token.clone(),
            supports_unassign: config.supports_unassign,
        })
    }

    async fn execute<T: DeserializeOwned>(&self, document: &str, variables: Value, field: &str) -> Result<T, SourceError> {
        debug!(field, "graphql request");
        let mut request = self.http.post(&self.endpoint).json(&json!({ "query": document, "variables": variables }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| SourceError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| SourceError::Request(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(SourceError::Response { status, body: text });
        }

        parse_response(&text, field)
    }

    async fn mutate_id(&self, document: &str, variables: Value, field: &str) -> Result<String, SourceError> {
        let node: IdNode = self.execute(document, variables, field).await?;
        Ok(node.id)
    }
}

#[async_trait]
impl DataSource for GraphQlClient {
    async fn create_link(&self, url: &str) -> Result<LinkId, SourceError> {
        self.mutate_id(CREATE_LINK, json!({ "url": url }), "createLink").await.map(LinkId::new)
    }

    async fn update_link(&self, id: &LinkId, title: &str, text: &str, url: &str) -> Result<LinkId, SourceError> {
        let variables = json!({ "id": id, "title": title, "text": text, "url": url });
        self.mutate_id(UPDATE_LINK, variables, "updateLink").await.map(LinkId::new)
    }

    async fn delete_link(&self, id: &LinkId) -> Result<LinkId, SourceError> {
        self.mutate_id(DELETE_LINK, json!({ "id": id }), "deleteLink").await.map(LinkId::new)
    }

    async fn add_link_to_topic(&self, link: &LinkId, topic: &TopicId) -> Result<TopicId, SourceError> {
        let variables = json!({ "linkId": link, "topicId": topic });
        self.mutate_id(ADD_LINK_TO_TOPIC, variables, "addLinksToTopic").await.map(TopicId::new)
    }

    fn supports_unassign(&self) -> bool {
        self.supports_unassign
    }

    async fn remove_link_from_topic(&self, link: &LinkId, topic: &TopicId) -> Result<TopicId, SourceError> {
        if !self.supports_unassign {
            return Err(SourceError::Unsupported("removeLinkFromTopic"));
        }
        let variables = json!({ "linkId": link, "topicId": topic });
        self.mutate_id(REMOVE_LINK_FROM_TOPIC, variables, "removeLinkFromTopic").await.map(TopicId::new)
    }

    async fn create_topic(&self, title: &str, issue_comment: Option<&str>, issue: &IssueId) -> Result<TopicId, SourceError> {
        let variables = json!({ "title": title, "issueComment": issue_comment, "issueId": issue });
        self.mutate_id(CREATE_TOPIC, variables, "createTopic").await.map(TopicId::new)
    }

    async fn update_topic(&self, id: &TopicId, position: Option<i64>) -> Result<TopicId, SourceError> {
        let variables = json!({ "id": id, "position": position });
        self.mutate_id(UPDATE_TOPIC, variables, "updateTopic").await.map(TopicId::new)
    }

    async fn update_topic_when_issue_deleted(&self, id: &TopicId) -> Result<TopicId, SourceError> {
        self.mutate_id(DETACH_TOPIC, json!({ "id": id }), "updateTopicWhenIssueDeleted").await.map(TopicId::new)
    }

    async fn issue(&self, id: &IssueId) -> Result<Issue, SourceError> {
        let wire: WireIssue = self.execute(ISSUE, json!({ "id": id }), "issue").await?;
        Ok(wire.into())
    }

    async fn unassigned_links(&self) -> Result<Vec<Link>, SourceError> {
        let wire: Vec<WireLink> = self.execute(UNASSIGNED_LINKS, json!({}), "unassignedLinks").await?;
        Ok(wire.into_iter().map(Link::from).collect())
    }

    async fn all_links(&self) -> Result<Vec<Link>, SourceError> {
        let wire: Vec<WireLink> = self.execute(ALL_LINKS, json!({}), "allLinks").await?;
        Ok(wire.into_iter().map(Link::from).collect())
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
struct Envelope {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

/// GraphQL `ID`s may arrive as strings or numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(i64),
}

impl From<WireId> for String {
    fn from(id: WireId) -> Self {
        match id {
            WireId::Text(text) => text,
            WireId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdNode {
    #[serde(deserialize_with = "wire_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireLink {
    #[serde(deserialize_with = "wire_id")]
    id: String,
    title: Option<String>,
    text: Option<String>,
    url: Option<String>,
}

impl From<WireLink> for Link {
    fn from(wire: WireLink) -> Self {
        Self {
            id: LinkId::new(wire.id),
            title: wire.title.unwrap_or_default(),
            text: wire.text.unwrap_or_default(),
            url: wire.url.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireTopic {
    #[serde(deserialize_with = "wire_id")]
    id: String,
    title: Option<String>,
    position: Option<i64>,
    #[serde(default)]
    links: Option<Vec<WireLink>>,
}

#[derive(Debug, Deserialize)]
struct WireIssue {
    #[serde(deserialize_with = "wire_id")]
    id: String,
    title: Option<String>,
    comment: Option<String>,
    #[serde(default)]
    topics: Option<Vec<WireTopic>>,
}

impl From<WireIssue> for Issue {
    fn from(wire: WireIssue) -> Self {
        Self {
            id: IssueId::new(wire.id),
            title: wire.title.unwrap_or_default(),
            comment: wire.comment,
            topics: wire
                .topics
                .unwrap_or_default()
                .into_iter()
                .map(|t| Topic {
                    id: TopicId::new(t.id),
                    title: t.title.unwrap_or_default(),
                    position: t.position.unwrap_or_default(),
                    links: t.links.unwrap_or_default().into_iter().map(Link::from).collect(),
                })
                .collect(),
        }
    }
}

fn wire_id<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    WireId::deserialize(deserializer).map(String::from)
}

// =============================================================================
// PARSING
// =============================================================================

/// Decode the root `field` of a GraphQL response body.
fn parse_response<T: DeserializeOwned>(body: &str, field: &str) -> Result<T, SourceError> {
    let envelope: Envelope = serde_json::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))?;
    if !envelope.errors.is_empty() {
        return Err(SourceError::GraphQl(envelope.errors.into_iter().map(|e| e.message).collect()));
    }
    let value = envelope
        .data
        .and_then(|mut data| data.get_mut(field).map(Value::take))
        .filter(|value| !value.is_null())
        .ok_or_else(|| SourceError::NotFound(field.to_owned()))?;
    serde_json::from_value(value).map_err(|e| SourceError::Parse(format!("{field}: {e}")))
}
