use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use toolrelay_core::Error;
use toolrelay_mcp::{parse_arguments, ToolOutput, ToolRegistry};

use crate::config::IssueTrackerConfig;

/// Client for the issue tracker search API.
#[derive(Debug, Clone)]
pub struct IssueTracker {
    http: reqwest::Client,
    config: IssueTrackerConfig,
}

/// Flattened view of one issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueSummary {
    pub key: String,
    #[serde(rename = "type")]
    pub issue_type: String,
    pub status: String,
    pub summary: String,
    pub assignee: String,
    pub story_points: Option<f64>,
    pub fix_versions: Vec<String>,
    pub parent: Option<String>,
    pub subtasks: usize,
    pub created: String,
    pub updated: Option<String>,
}

/// Result of a JQL search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueSearch {
    pub start_at: u64,
    pub max_results: u64,
    pub total: u64,
    pub issues: Vec<IssueSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSearch {
    #[serde(default)]
    start_at: u64,
    #[serde(default)]
    max_results: u64,
    #[serde(default)]
    total: u64,
    #[serde(default)]
    issues: Vec<RawIssue>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    key: String,
    fields: RawFields,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFields {
    #[serde(default)]
    summary: Option<String>,
    status: Named,
    issuetype: Named,
    #[serde(default)]
    assignee: Option<Assignee>,
    #[serde(default)]
    fix_versions: Option<Vec<Named>>,
    #[serde(default)]
    parent: Option<Parent>,
    #[serde(default)]
    subtasks: Option<Vec<Value>>,
    #[serde(default, rename = "customfield_10016")]
    story_points: Option<f64>,
    created: String,
    #[serde(default)]
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Assignee {
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct Parent {
    key: String,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    jql: String,
}

impl IssueTracker {
    pub fn new(http: reqwest::Client, config: IssueTrackerConfig) -> Self {
        Self { http, config }
    }

    /// Run a JQL search.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] on transport failure, a non-success status,
    /// or a response body that is not a search result.
    pub async fn search(&self, jql: &str) -> Result<IssueSearch, Error> {
        let url = format!("{}/search", self.config.base_url);
        tracing::debug!(%url, jql, "issue search");

        let mut request = self.http.get(&url).query(&[("jql", jql)]);
        if let (Some(user), Some(token)) = (&self.config.username, &self.config.api_token) {
            request = request.basic_auth(user, Some(token));
        }

        let raw: RawSearch = request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Upstream(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;

        Ok(summarize(raw))
    }
}

fn summarize(raw: RawSearch) -> IssueSearch {
    IssueSearch {
        start_at: raw.start_at,
        max_results: raw.max_results,
        total: raw.total,
        issues: raw
            .issues
            .into_iter()
            .map(|issue| {
                let f = issue.fields;
                IssueSummary {
                    key: issue.key,
                    issue_type: f.issuetype.name,
                    status: f.status.name,
                    summary: f.summary.unwrap_or_default(),
                    assignee: f.assignee.map(|a| a.display_name).unwrap_or_default(),
                    story_points: f.story_points,
                    fix_versions: f
                        .fix_versions
                        .unwrap_or_default()
                        .into_iter()
                        .map(|v| v.name)
                        .collect(),
                    parent: f.parent.map(|p| p.key),
                    subtasks: f.subtasks.map_or(0, |s| s.len()),
                    created: f.created,
                    updated: f.updated,
                }
            })
            .collect(),
    }
}

pub(super) fn register(tools: &mut ToolRegistry, tracker: &Arc<IssueTracker>) {
    let t = Arc::clone(tracker);
    tools.register(
        "fetch_jira_issues",
        "Fetches Jira issues matching the provided JQL query.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "jql": { "type": "string", "description": "The JQL query to filter issues." }
            },
            "required": ["jql"]
        }),
        move |arguments: Value| {
            let tracker = Arc::clone(&t);
            async move {
                let args: SearchArgs = parse_arguments(arguments)?;
                ToolOutput::json(&tracker.search(&args.jql).await?)
            }
        },
    );
}
