//! Built-in tools registered at server startup.

mod arithmetic;
mod clock;
mod issues;
mod products;

use std::sync::Arc;

use toolrelay_mcp::ToolRegistry;

use crate::config::ServerConfig;

pub use issues::{IssueSearch, IssueSummary, IssueTracker};
pub use products::ProductCatalog;

/// Build the registry of every tool this server exposes.
///
/// Upstream-backed tools are only registered when their API is configured.
pub fn builtin_registry(config: &ServerConfig, http: &reqwest::Client) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    arithmetic::register(&mut tools);
    clock::register(&mut tools);

    match &config.product_api_url {
        Some(url) => {
            let catalog = Arc::new(ProductCatalog::new(http.clone(), url.clone()));
            products::register(&mut tools, &catalog);
        }
        None => tracing::warn!("PRODUCT_API_URL not set, product tools disabled"),
    }

    match &config.issue_tracker {
        Some(issue_config) => {
            if issue_config.api_token.is_none() {
                tracing::warn!("JIRA_API_TOKEN not set, issue search runs unauthenticated");
            }
            let tracker = Arc::new(IssueTracker::new(http.clone(), issue_config.clone()));
            issues::register(&mut tools, &tracker);
        }
        None => tracing::warn!("JIRA_API_URL not set, issue search disabled"),
    }

    tools
}
