/// Default help center serving the public support articles
pub const DEFAULT_HELP_CENTER_URL: &str = "https://support.jetbrains.com";
/// Default GitHub REST endpoint
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Process-wide configuration, built once at startup and handed to each client by value
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub youtrack: YouTrackConfig,
    pub help_center: HelpCenterConfig,
    pub github: GitHubConfig,
}

/// Connection settings for the YouTrack knowledge base
#[derive(Debug, Clone)]
pub struct YouTrackConfig {
    pub base_url: String,
    pub token: String,
    /// Project short name every search is scoped to, if any
    pub default_project: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HelpCenterConfig {
    pub base_url: String,
}

impl Default for HelpCenterConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_HELP_CENTER_URL.to_string(),
        }
    }
}

/// GitHub settings. Without a token every GitHub tool reports itself as disabled.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub token: Option<String>,
    pub default_org: Option<String>,
    pub api_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            default_org: None,
            api_url: DEFAULT_GITHUB_API_URL.to_string(),
        }
    }
}

/// Treat blank strings coming from flags or the environment as unset
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_unset() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("   ".to_string())), None);
        assert_eq!(non_empty(Some(" ghp_x ".to_string())), Some("ghp_x".to_string()));
    }
}
