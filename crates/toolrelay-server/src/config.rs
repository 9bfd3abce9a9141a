/// Error raised while reading server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Credentials and location of the issue tracker API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueTrackerConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub api_token: Option<String>,
}

/// Server configuration, read once from the environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub product_api_url: Option<String>,
    pub issue_tracker: Option<IssueTrackerConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            product_api_url: None,
            issue_tracker: None,
        }
    }
}

impl ServerConfig {
    /// Read configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the port is not a valid `u16`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the port is not a valid `u16`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = non_empty("TOOLRELAY_HOST").unwrap_or(defaults.host);
        let port = match ["TOOLRELAY_PORT", "PORT"]
            .into_iter()
            .find_map(|key| non_empty(key).map(|raw| (key, raw)))
        {
            Some((key, raw)) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value: raw })?,
            None => defaults.port,
        };

        let product_api_url = non_empty("PRODUCT_API_URL").map(trim_base_url);
        let issue_tracker = non_empty("JIRA_API_URL").map(|url| IssueTrackerConfig {
            base_url: trim_base_url(url),
            username: non_empty("JIRA_USERNAME"),
            api_token: non_empty("JIRA_API_TOKEN"),
        });

        Ok(Self {
            host,
            port,
            product_api_url,
            issue_tracker,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn trim_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn reads_port_fallback() {
        let config = ServerConfig::from_lookup(lookup(&[("PORT", "9100")])).unwrap();
        assert_eq!(config.port, 9100);

        let config =
            ServerConfig::from_lookup(lookup(&[("PORT", "9100"), ("TOOLRELAY_PORT", "9200")]))
                .unwrap();
        assert_eq!(config.port, 9200);
    }

    #[test]
    fn rejects_bad_port() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "not-a-port")])).unwrap_err();
        assert!(err.to_string().contains("not-a-port"));
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));

        let err = ServerConfig::from_lookup(lookup(&[("TOOLRELAY_PORT", "70000"), ("PORT", "80")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TOOLRELAY_PORT", .. }));
    }

    #[test]
    fn upstream_urls_are_normalized() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PRODUCT_API_URL", "https://dummyjson.com/"),
            ("JIRA_API_URL", "https://example.atlassian.net/rest/api/2/"),
            ("JIRA_USERNAME", "bot@example.com"),
        ]))
        .unwrap();

        assert_eq!(config.product_api_url.as_deref(), Some("https://dummyjson.com"));
        let jira = config.issue_tracker.unwrap();
        assert_eq!(jira.base_url, "https://example.atlassian.net/rest/api/2");
        assert_eq!(jira.username.as_deref(), Some("bot@example.com"));
        assert!(jira.api_token.is_none());
    }
}
