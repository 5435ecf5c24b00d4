//! YouTrack knowledge base client.
//!
//! Endpoints used:
//!   * GET /api/articles?query=&fields=&$top=
//!   * GET /api/articles/{id}?fields=

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use crate::config::YouTrackConfig;
use crate::error::{SourceError, SourceResult};
use crate::http::{get_json, trim_base_url};
use crate::source::TextSource;

/// Separator between rendered articles
pub const ARTICLE_SEPARATOR: &str = "\n\n---\n\n";
pub const NO_ARTICLES_FOUND: &str = "No YouTrack knowledge base articles found for this query.";

const SEARCH_FIELDS: &str = "id,idReadable,summary,created,updated,project(id,name,shortName)";
const ARTICLE_FIELDS: &str = "id,idReadable,summary,content,created,updated,\
project(id,name,shortName),parentArticle(id,idReadable,summary),\
childArticles(id,idReadable,summary)";

/// Readable (`RV2-A-12`) or internal (`167-12`) article id; one path segment
static ARTICLE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w[\w.-]*$").expect("article id pattern is valid"));

/// A knowledge base article. `content` is only populated by a full fetch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub id_readable: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    /// Milliseconds since the epoch
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub updated: Option<i64>,
    #[serde(default)]
    pub project: Option<Project>,
    #[serde(default)]
    pub parent_article: Option<ArticleRef>,
    #[serde(default)]
    pub child_articles: Vec<ArticleRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
}

/// Parent or child pointer embedded in a full article
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub id_readable: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl ArticleRef {
    fn label(&self) -> String {
        let id = self
            .id_readable
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("?");
        match self.summary.as_deref() {
            Some(summary) => format!("{id}: {summary}"),
            None => id.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct YouTrackClient {
    http: Client,
    /// Base URL ending in exactly one `/api`
    api_url: String,
    /// Base URL without the API suffix, used for article links
    web_url: String,
    token: String,
    default_project: Option<String>,
}

impl YouTrackClient {
    pub fn new(http: Client, config: YouTrackConfig) -> Self {
        let api_url = api_base_url(&config.base_url);
        let web_url = api_url.strip_suffix("/api").unwrap_or(&api_url).to_string();
        tracing::debug!("Creating YouTrackClient with api_url={}", api_url);
        Self {
            http,
            api_url,
            web_url,
            token: config.token,
            default_project: config.default_project,
        }
    }

    pub fn article_url(&self, id_readable: &str) -> String {
        format!("{}/articles/{}", self.web_url, id_readable)
    }

    /// Search articles, returning hits without their bodies
    pub async fn try_search(&self, query: &str, limit: usize) -> SourceResult<Vec<Article>> {
        let url = format!("{}/articles", self.api_url);
        let query = match &self.default_project {
            Some(project) => format!("project: {project} {query}"),
            None => query.to_string(),
        };
        let top = limit.to_string();
        let params = [
            ("query", query.as_str()),
            ("fields", SEARCH_FIELDS),
            ("$top", top.as_str()),
        ];

        get_json(&self.http, &url, &params, Some(self.token.as_str())).await
    }

    /// Like [`Self::try_search`], but failures are logged and yield no articles
    pub async fn search(&self, query: &str, limit: usize) -> Vec<Article> {
        match self.try_search(query, limit).await {
            Ok(articles) => articles,
            Err(e) => {
                tracing::warn!("YouTrack article search failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Fetch a single article with body, parent and children
    pub async fn try_get_article(&self, id: &str) -> SourceResult<Article> {
        let id = id.trim();
        if !ARTICLE_ID.is_match(id) {
            return Err(SourceError::InvalidInput(format!("malformed article id `{id}`")));
        }
        let url = format!("{}/articles/{}", self.api_url, id);
        get_json(&self.http, &url, &[("fields", ARTICLE_FIELDS)], Some(self.token.as_str())).await
    }

    pub async fn get_article(&self, id: &str) -> Option<Article> {
        match self.try_get_article(id).await {
            Ok(article) => Some(article),
            Err(e) if e.is_not_found() => {
                tracing::debug!("YouTrack article {} not found", id);
                None
            }
            Err(e) => {
                tracing::warn!("Failed to fetch YouTrack article {}: {}", id, e);
                None
            }
        }
    }

    /// Search, then fetch every hit in full one after another and render them.
    ///
    /// A hit whose full fetch fails is rendered from its search record.
    pub async fn search_and_fetch(&self, query: &str, limit: usize) -> String {
        let hits = self.search(query, limit).await;
        if hits.is_empty() {
            return NO_ARTICLES_FOUND.to_string();
        }

        let mut blocks = Vec::with_capacity(hits.len());
        for hit in hits {
            let article = match self.get_article(&hit.id_readable).await {
                Some(full) => full,
                None => hit,
            };
            blocks.push(self.format_article(&article));
        }

        blocks.join(ARTICLE_SEPARATOR)
    }

    /// Render an article as a markdown block
    pub fn format_article(&self, article: &Article) -> String {
        let title = article.summary.as_deref().unwrap_or("(untitled)");
        let mut out = format!("## {title}\n\n");
        out.push_str(&format!("**ID:** {}\n", article.id_readable));
        out.push_str(&format!("**URL:** {}\n", self.article_url(&article.id_readable)));

        if let Some(project) = &article.project {
            let name = project.name.as_deref().unwrap_or(&project.id);
            match project.short_name.as_deref() {
                Some(short) => out.push_str(&format!("**Project:** {name} ({short})\n")),
                None => out.push_str(&format!("**Project:** {name}\n")),
            }
        }
        if let Some(parent) = &article.parent_article {
            out.push_str(&format!("**Parent:** {}\n", parent.label()));
        }
        if let Some(created) = article.created.and_then(format_timestamp) {
            out.push_str(&format!("**Created:** {created}\n"));
        }
        if let Some(updated) = article.updated.and_then(format_timestamp) {
            out.push_str(&format!("**Updated:** {updated}\n"));
        }
        if !article.child_articles.is_empty() {
            out.push_str("**Child articles:**\n");
            for child in &article.child_articles {
                out.push_str(&format!("- {}\n", child.label()));
            }
        }

        if let Some(content) = article.content.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            out.push('\n');
            out.push_str(content);
        }

        out.trim_end().to_string()
    }
}

#[async_trait]
impl TextSource for YouTrackClient {
    fn name(&self) -> &str {
        "youtrack"
    }

    async fn gather(&self, query: &str, limit: usize) -> String {
        self.search_and_fetch(query, limit).await
    }
}

/// Strip trailing slashes and append `/api` exactly once
pub fn api_base_url(base_url: &str) -> String {
    let trimmed = trim_base_url(base_url);
    if trimmed.ends_with("/api") {
        trimmed
    } else {
        format!("{trimmed}/api")
    }
}

fn format_timestamp(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.format("%Y-%m-%d").to_string())
}
