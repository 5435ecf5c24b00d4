//! Public help center client (Zendesk Help Center API, no auth).
//!
//! Endpoints used:
//!   * GET /api/v2/help_center/articles/search.json?query=&per_page=
//!   * GET /api/v2/help_center/articles/{id}.json

pub mod html;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use crate::config::HelpCenterConfig;
use crate::error::{SourceError, SourceResult};
use crate::http::{get_json, trim_base_url};
use crate::source::TextSource;
use crate::youtrack::ARTICLE_SEPARATOR;

pub use html::{html_to_text, strip_tags};

pub const NO_ARTICLES_FOUND: &str = "No help center articles found for this query.";

static ARTICLE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/articles/(\d+)").expect("article id pattern is valid"));

/// A help center article as the client hands it out
#[derive(Debug, Clone)]
pub struct SupportArticle {
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
    /// Raw HTML body, when the endpoint supplied one
    pub body: Option<String>,
    pub labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawArticle>,
}

#[derive(Debug, Deserialize)]
struct ArticleResponse {
    article: RawArticle,
}

#[derive(Debug, Deserialize)]
struct RawArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    label_names: Vec<String>,
}

impl From<RawArticle> for SupportArticle {
    fn from(raw: RawArticle) -> Self {
        Self {
            title: raw.title.unwrap_or_else(|| "(untitled)".to_string()),
            url: raw.html_url.unwrap_or_default(),
            snippet: raw.snippet.filter(|s| !s.trim().is_empty()),
            body: raw.body,
            labels: raw.label_names,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HelpCenterClient {
    http: Client,
    api_url: String,
}

impl HelpCenterClient {
    pub fn new(http: Client, config: HelpCenterConfig) -> Self {
        let api_url = format!("{}/api/v2/help_center", trim_base_url(&config.base_url));
        tracing::debug!("Creating HelpCenterClient with api_url={}", api_url);
        Self { http, api_url }
    }

    pub async fn try_search(&self, query: &str, limit: usize) -> SourceResult<Vec<SupportArticle>> {
        let url = format!("{}/articles/search.json", self.api_url);
        let per_page = limit.to_string();
        let params = [("query", query), ("per_page", per_page.as_str())];

        let response: SearchResponse = get_json(&self.http, &url, &params, None).await?;
        Ok(response
            .results
            .into_iter()
            .take(limit)
            .map(SupportArticle::from)
            .collect())
    }

    /// Search articles; failures are logged and yield no results
    pub async fn search(&self, query: &str, limit: usize) -> Vec<SupportArticle> {
        match self.try_search(query, limit).await {
            Ok(articles) => articles,
            Err(e) => {
                tracing::warn!("Help center search failed: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn try_get_article(&self, url: &str) -> SourceResult<SupportArticle> {
        let id = extract_article_id(url)
            .ok_or_else(|| SourceError::InvalidInput(format!("no article id in {url}")))?;
        let api = format!("{}/articles/{}.json", self.api_url, id);
        let response: ArticleResponse = get_json(&self.http, &api, &[] as &[(&str, &str)], None).await?;
        Ok(response.article.into())
    }

    /// Fetch one article by its public URL and render it.
    ///
    /// Every outcome, including a URL without an article id, is a readable sentence.
    pub async fn get_article(&self, url: &str) -> String {
        if extract_article_id(url).is_none() {
            return format!(
                "Could not extract an article ID from URL: {url}. \
                 Expected a help center article URL containing /articles/<id>."
            );
        }

        match self.try_get_article(url).await {
            Ok(article) => format_article(&article),
            Err(e) if e.is_not_found() => format!("Help center article not found: {url}"),
            Err(e) => {
                tracing::warn!("Failed to fetch help center article {}: {}", url, e);
                format!("Failed to fetch help center article {url}.")
            }
        }
    }

    /// Search and render every hit from the search payload itself.
    ///
    /// The search endpoint already carries article bodies, so no per-article fetch happens.
    pub async fn search_and_fetch(&self, query: &str, limit: usize) -> String {
        let articles = self.search(query, limit).await;
        if articles.is_empty() {
            return NO_ARTICLES_FOUND.to_string();
        }

        articles
            .iter()
            .map(format_article)
            .collect::<Vec<_>>()
            .join(ARTICLE_SEPARATOR)
    }
}

#[async_trait]
impl TextSource for HelpCenterClient {
    fn name(&self) -> &str {
        "help_center"
    }

    async fn gather(&self, query: &str, limit: usize) -> String {
        self.search_and_fetch(query, limit).await
    }
}

/// Numeric id from a `/articles/<digits>` URL
pub fn extract_article_id(url: &str) -> Option<u64> {
    ARTICLE_ID
        .captures(url)
        .and_then(|cap| cap[1].parse().ok())
}

pub fn format_article(article: &SupportArticle) -> String {
    let mut out = format!("## {}\n\n**Source:** {}\n", article.title, article.url);
    if !article.labels.is_empty() {
        out.push_str(&format!("**Labels:** {}\n", article.labels.join(", ")));
    }

    let body = match article.body.as_deref() {
        Some(html) => match html_to_text(html) {
            text if text.is_empty() => strip_tags(html),
            text => text,
        },
        None => article.snippet.as_deref().map(strip_tags).unwrap_or_default(),
    };
    if !body.is_empty() {
        out.push('\n');
        out.push_str(&body);
    }

    out.trim_end().to_string()
}
