use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use octocrab::Octocrab;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::config::GitHubConfig;
use crate::error::{SourceError, SourceResult};
use crate::source::TextSource;

pub const NOT_CONFIGURED: &str =
    "GitHub search is not configured. Set GITHUB_TOKEN to enable code and repository search.";
pub const NO_CODE_MATCHES: &str = "No matching code found on GitHub.";
pub const NO_REPO_MATCHES: &str = "No matching GitHub repositories found.";

/// Matched fragments are cut to this many characters
pub const FRAGMENT_LIMIT: usize = 300;
pub const CODE_SEARCH_LIMIT: usize = 10;
pub const REPO_SEARCH_LIMIT: usize = 5;

const TEXT_MATCH_MEDIA_TYPE: &str = "application/vnd.github.text-match+json";

/// A file hit from code search
#[derive(Debug, Clone)]
pub struct CodeMatch {
    pub repository: String,
    pub path: String,
    pub url: String,
    pub fragments: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RepoMatch {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub api_url: String,
    pub url: String,
}

/// A decoded file. Size is the upstream byte size, not the decoded length.
#[derive(Debug, Clone)]
pub struct RepoFile {
    pub path: String,
    pub content: String,
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

#[derive(Debug, Clone)]
pub struct RepoEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    /// Only set for files
    pub size: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SearchParams<'a> {
    q: &'a str,
    per_page: usize,
}

#[derive(Debug, Deserialize)]
struct SearchPage<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct CodeItem {
    path: String,
    html_url: String,
    repository: RepositoryRef,
    #[serde(default)]
    text_matches: Vec<TextMatch>,
}

#[derive(Debug, Deserialize)]
struct RepositoryRef {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct TextMatch {
    #[serde(default)]
    fragment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepoItem {
    name: String,
    full_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    language: Option<String>,
    url: String,
    html_url: String,
}

/// GitHub connector. Every operation is disabled when no token was configured.
#[derive(Clone)]
pub struct GitHubConnector {
    client: Option<Arc<Octocrab>>,
    default_org: Option<String>,
}

impl GitHubConnector {
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let Some(token) = config.token.filter(|t| !t.trim().is_empty()) else {
            tracing::info!("No GitHub token configured, GitHub tools are disabled");
            return Ok(Self {
                client: None,
                default_org: config.default_org,
            });
        };

        tracing::info!("Using personal access token for GitHub API at {}", config.api_url);
        let client = Octocrab::builder()
            .base_uri(config.api_url.as_str())?
            .personal_token(token.as_str())
            .build()?;

        Ok(Self {
            client: Some(Arc::new(client)),
            default_org: config.default_org,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self) -> SourceResult<&Octocrab> {
        self.client
            .as_deref()
            .ok_or(SourceError::NotConfigured("GitHub"))
    }

    /// Append an `org:` qualifier from the argument or the configured default
    fn scoped_query(&self, query: &str, org: Option<&str>) -> String {
        match org.or(self.default_org.as_deref()).map(str::trim) {
            Some(org) if !org.is_empty() => format!("{query} org:{org}"),
            _ => query.to_string(),
        }
    }

    /// Split `owner/name`, falling back to the default org for a bare name
    fn split_repo<'a>(&'a self, repo: &'a str) -> SourceResult<(&'a str, &'a str)> {
        let repo = repo.trim().trim_matches('/');
        match repo.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Ok((owner, name)),
            None if !repo.is_empty() => self
                .default_org
                .as_deref()
                .map(|org| (org, repo))
                .ok_or_else(|| {
                    SourceError::InvalidInput(format!("repository `{repo}` must be given as owner/name"))
                }),
            _ => Err(SourceError::InvalidInput(format!(
                "repository `{repo}` must be given as owner/name"
            ))),
        }
    }

    pub async fn try_search_code(
        &self,
        query: &str,
        org: Option<&str>,
        limit: usize,
    ) -> SourceResult<Vec<CodeMatch>> {
        let client = self.client()?;
        let q = self.scoped_query(query, org);
        tracing::debug!("GitHub code search: {}", q);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(TEXT_MATCH_MEDIA_TYPE));

        let page: SearchPage<CodeItem> = client
            .get_with_headers(
                "/search/code",
                Some(&SearchParams { q: &q, per_page: limit }),
                Some(headers),
            )
            .await?;

        Ok(page
            .items
            .into_iter()
            .take(limit)
            .map(|item| CodeMatch {
                repository: item.repository.full_name,
                path: item.path,
                url: item.html_url,
                fragments: item
                    .text_matches
                    .into_iter()
                    .filter_map(|m| m.fragment)
                    .map(|f| f.chars().take(FRAGMENT_LIMIT).collect())
                    .collect(),
            })
            .collect())
    }

    pub async fn search_code(&self, query: &str, org: Option<&str>, limit: usize) -> Vec<CodeMatch> {
        match self.try_search_code(query, org, limit).await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!("GitHub code search failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Repository search, in GitHub's best-match order
    pub async fn try_search_repos(
        &self,
        query: &str,
        org: Option<&str>,
        limit: usize,
    ) -> SourceResult<Vec<RepoMatch>> {
        let client = self.client()?;
        let q = self.scoped_query(query, org);
        tracing::debug!("GitHub repository search: {}", q);

        let page: SearchPage<RepoItem> = client
            .get("/search/repositories", Some(&SearchParams { q: &q, per_page: limit }))
            .await?;

        Ok(page
            .items
            .into_iter()
            .take(limit)
            .map(|item| RepoMatch {
                name: item.name,
                full_name: item.full_name,
                description: item.description.filter(|d| !d.trim().is_empty()),
                language: item.language,
                api_url: item.url,
                url: item.html_url,
            })
            .collect())
    }

    pub async fn search_repos(&self, query: &str, org: Option<&str>, limit: usize) -> Vec<RepoMatch> {
        match self.try_search_repos(query, org, limit).await {
            Ok(repos) => repos,
            Err(e) => {
                tracing::warn!("GitHub repository search failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Fetch and decode a single file.
    ///
    /// Files whose body is not inlined as base64 (GitHub does this above
    /// 1 MB) fail with [`SourceError::TooLarge`] rather than reading as empty.
    pub async fn try_get_file(&self, repo: &str, path: &str, r#ref: Option<&str>) -> SourceResult<RepoFile> {
        let client = self.client()?;
        let (owner, name) = self.split_repo(repo)?;

        let handler = client.repos(owner, name);
        let mut request = handler.get_content().path(path);
        if let Some(r) = r#ref.filter(|r| !r.is_empty()) {
            request = request.r#ref(r);
        }
        let content = request.send().await?;

        let Some(file) = content.items.into_iter().find(|item| item.r#type == "file") else {
            return Err(SourceError::NotFound(format!("{owner}/{name}/{path}")));
        };
        let size = u64::try_from(file.size).unwrap_or_default();
        let encoded = match (file.encoding.as_deref(), file.content.as_deref()) {
            (Some("base64"), Some(encoded)) => encoded,
            _ => return Err(SourceError::TooLarge { path: file.path, size }),
        };

        let decoded = STANDARD
            .decode(encoded.replace('\n', ""))
            .map_err(|e| SourceError::Content {
                path: file.path.clone(),
                reason: format!("invalid base64: {e}"),
            })?;
        let text = String::from_utf8_lossy(&decoded).into_owned();

        Ok(RepoFile {
            path: file.path,
            content: text,
            size,
            url: file.html_url.unwrap_or_default(),
        })
    }

    /// `None` when the file does not exist or cannot be read
    pub async fn get_file(&self, repo: &str, path: &str, r#ref: Option<&str>) -> Option<RepoFile> {
        match self.try_get_file(repo, path, r#ref).await {
            Ok(file) => Some(file),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                tracing::warn!("Failed to fetch {} from {}: {}", path, repo, e);
                None
            }
        }
    }

    pub async fn try_list_contents(
        &self,
        repo: &str,
        path: &str,
        r#ref: Option<&str>,
    ) -> SourceResult<Vec<RepoEntry>> {
        let client = self.client()?;
        let (owner, name) = self.split_repo(repo)?;

        let handler = client.repos(owner, name);
        let mut request = handler.get_content().path(path.trim_matches('/'));
        if let Some(r) = r#ref.filter(|r| !r.is_empty()) {
            request = request.r#ref(r);
        }
        let content = request.send().await?;

        Ok(content
            .items
            .into_iter()
            .map(|item| {
                let kind = if item.r#type == "dir" {
                    EntryKind::Dir
                } else {
                    EntryKind::File
                };
                RepoEntry {
                    size: (kind == EntryKind::File).then(|| u64::try_from(item.size).unwrap_or_default()),
                    name: item.name,
                    path: item.path,
                    kind,
                }
            })
            .collect())
    }

    pub async fn list_contents(&self, repo: &str, path: &str, r#ref: Option<&str>) -> Vec<RepoEntry> {
        match self.try_list_contents(repo, path, r#ref).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to list {} in {}: {}", path, repo, e);
                Vec::new()
            }
        }
    }

    /// Run code and repository search side by side and render both sections.
    ///
    /// Each section has its own "nothing found" line.
    pub async fn search_and_fetch(&self, query: &str, org: Option<&str>) -> String {
        if !self.is_configured() {
            return NOT_CONFIGURED.to_string();
        }

        let (code, repos) = tokio::join!(
            self.search_code(query, org, CODE_SEARCH_LIMIT),
            self.search_repos(query, org, REPO_SEARCH_LIMIT),
        );

        let mut out = String::from("### Relevant Repositories\n\n");
        out.push_str(&format_repos(&repos));
        out.push_str("\n\n### Code Matches\n\n");
        out.push_str(&format_code_matches(&code));
        out
    }
}

#[async_trait]
impl TextSource for GitHubConnector {
    fn name(&self) -> &str {
        "github"
    }

    fn is_configured(&self) -> bool {
        GitHubConnector::is_configured(self)
    }

    async fn gather(&self, query: &str, _limit: usize) -> String {
        self.search_and_fetch(query, None).await
    }
}

pub fn format_repos(repos: &[RepoMatch]) -> String {
    if repos.is_empty() {
        return NO_REPO_MATCHES.to_string();
    }
    repos
        .iter()
        .map(|repo| {
            let mut line = format!("- **{}**", repo.full_name);
            if let Some(language) = &repo.language {
                line.push_str(&format!(" ({language})"));
            }
            if let Some(description) = &repo.description {
                line.push_str(&format!(": {description}"));
            }
            line.push_str(&format!("\n  {}", repo.url));
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_code_matches(matches: &[CodeMatch]) -> String {
    if matches.is_empty() {
        return NO_CODE_MATCHES.to_string();
    }
    matches
        .iter()
        .map(|m| {
            let mut block = format!("#### {} `{}`\n{}", m.repository, m.path, m.url);
            for fragment in &m.fragments {
                block.push_str(&format!("\n```\n{}\n```", fragment.trim_end()));
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn format_entries(repo: &str, path: &str, entries: &[RepoEntry]) -> String {
    let location = if path.trim_matches('/').is_empty() {
        repo.to_string()
    } else {
        format!("{repo}/{}", path.trim_matches('/'))
    };
    if entries.is_empty() {
        return format!("No contents found at {location}.");
    }

    let mut sorted: Vec<&RepoEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| (e.kind != EntryKind::Dir, e.name.to_lowercase()));

    let mut out = format!("Contents of {location}:\n");
    for entry in sorted {
        match (entry.kind, entry.size) {
            (EntryKind::Dir, _) => out.push_str(&format!("\n- {}/", entry.name)),
            (EntryKind::File, Some(size)) => out.push_str(&format!("\n- {} ({size} bytes)", entry.name)),
            (EntryKind::File, None) => out.push_str(&format!("\n- {}", entry.name)),
        }
    }
    out
}
