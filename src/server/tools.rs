use std::sync::Arc;

use rmcp::{Error as McpError, ServerHandler, model::*, schemars, tool};
use serde::Deserialize;

use crate::aggregator::{Aggregator, DEFAULT_KB_RESULTS, DEFAULT_SUPPORT_RESULTS, Question};
use crate::error::SourceError;
use crate::github::{self, GitHubConnector};
use crate::http::resolve_limit;
use crate::support::HelpCenterClient;
use crate::youtrack::YouTrackClient;

/// Files larger than this many characters are cut before being returned
pub const MAX_FILE_CHARS: usize = 50_000;

const KB_SEARCH_LIMIT: usize = 10;
const HELP_CENTER_SEARCH_LIMIT: usize = 5;

const INSTRUCTIONS: &str = "This server answers product questions from three sources: the internal \
YouTrack knowledge base, the public help center and (when a GitHub token is configured) GitHub code. \
Start with 'ask_product_question', which searches every source at once and returns one document \
with a section per source, ordered knowledge base, help center, code. Use 'search_youtrack_kb', \
'get_youtrack_article', 'search_help_center' and 'get_help_center_article' to dig into a single \
source, and 'search_github_code', 'search_github_repos', 'get_github_file' and \
'list_github_directory' to inspect source code.";

#[derive(Clone)]
pub struct ProductDocs {
    youtrack: Arc<YouTrackClient>,
    help_center: Arc<HelpCenterClient>,
    github: Arc<GitHubConnector>,
    aggregator: Aggregator,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AskProductQuestionRequest {
    #[schemars(description = "the product question, in natural language")]
    pub question: String,

    #[schemars(description = "maximum number of knowledge base articles to include (default 5)")]
    #[serde(default)]
    pub max_kb_results: Option<i64>,

    #[schemars(description = "maximum number of help center articles to include (default 3)")]
    #[serde(default)]
    pub max_support_results: Option<i64>,

    #[schemars(description = "whether to search GitHub code too (defaults to true when GitHub is configured)")]
    #[serde(default)]
    pub include_github: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchRequest {
    #[schemars(description = "the search query")]
    pub query: String,

    #[schemars(description = "the maximum number of results to return")]
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetYouTrackArticleRequest {
    #[schemars(description = "readable article id such as RV2-A-123, or the internal id")]
    pub article_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetHelpCenterArticleRequest {
    #[schemars(description = "the public URL of the help center article")]
    pub url: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GitHubSearchRequest {
    #[schemars(description = "the search query, GitHub search qualifiers allowed")]
    pub query: String,

    #[schemars(description = "organization to restrict the search to (defaults to the configured org)")]
    #[serde(default)]
    pub org: Option<String>,

    #[schemars(description = "the maximum number of results to return")]
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GitHubPathRequest {
    #[schemars(description = "repository as owner/name, or a bare name in the configured org")]
    pub repo: String,

    #[schemars(description = "path inside the repository")]
    #[serde(default)]
    pub path: String,

    #[schemars(description = "branch, tag or commit (defaults to the default branch)")]
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
}

fn text_result(body: impl Into<String>) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(body.into())]))
}

/// Cut `content` to `max_chars` characters, noting the original size
pub fn truncate_file(content: &str, size: u64, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!(
            "{}\n\n... [truncated: file is {size} bytes]",
            &content[..cut]
        ),
        None => content.to_string(),
    }
}

#[tool(tool_box)]
impl ProductDocs {
    pub fn new(youtrack: YouTrackClient, help_center: HelpCenterClient, github: GitHubConnector) -> Self {
        let youtrack = Arc::new(youtrack);
        let help_center = Arc::new(help_center);
        let github = Arc::new(github);
        let aggregator = Aggregator::new(youtrack.clone(), help_center.clone(), github.clone());
        Self {
            youtrack,
            help_center,
            github,
            aggregator,
        }
    }

    #[tool(description = "Answer a product question by searching the YouTrack knowledge base, the \
public help center and (optionally) GitHub code at once. Returns all findings in one document.")]
    async fn ask_product_question(
        &self,
        #[tool(aggr)] request: AskProductQuestionRequest,
    ) -> Result<CallToolResult, McpError> {
        let question = Question {
            text: request.question,
            kb_results: resolve_limit(request.max_kb_results, DEFAULT_KB_RESULTS),
            support_results: resolve_limit(request.max_support_results, DEFAULT_SUPPORT_RESULTS),
            include_code: request.include_github,
        };
        text_result(self.aggregator.ask(&question).await)
    }

    #[tool(description = "Search the internal YouTrack knowledge base and return full articles")]
    async fn search_youtrack_kb(
        &self,
        #[tool(aggr)] SearchRequest { query, limit }: SearchRequest,
    ) -> Result<CallToolResult, McpError> {
        let limit = resolve_limit(limit, KB_SEARCH_LIMIT);
        text_result(self.youtrack.search_and_fetch(&query, limit).await)
    }

    #[tool(description = "Get a single YouTrack knowledge base article by id")]
    async fn get_youtrack_article(
        &self,
        #[tool(aggr)] GetYouTrackArticleRequest { article_id }: GetYouTrackArticleRequest,
    ) -> Result<CallToolResult, McpError> {
        match self.youtrack.get_article(&article_id).await {
            Some(article) => text_result(self.youtrack.format_article(&article)),
            None => text_result(format!(
                "Article {article_id} was not found in the YouTrack knowledge base."
            )),
        }
    }

    #[tool(description = "Search the public help center and return matching articles")]
    async fn search_help_center(
        &self,
        #[tool(aggr)] SearchRequest { query, limit }: SearchRequest,
    ) -> Result<CallToolResult, McpError> {
        let limit = resolve_limit(limit, HELP_CENTER_SEARCH_LIMIT);
        text_result(self.help_center.search_and_fetch(&query, limit).await)
    }

    #[tool(description = "Get a help center article by its URL")]
    async fn get_help_center_article(
        &self,
        #[tool(aggr)] GetHelpCenterArticleRequest { url }: GetHelpCenterArticleRequest,
    ) -> Result<CallToolResult, McpError> {
        text_result(self.help_center.get_article(&url).await)
    }

    #[tool(description = "Search code on GitHub, optionally within an organization")]
    async fn search_github_code(
        &self,
        #[tool(aggr)] GitHubSearchRequest { query, org, limit }: GitHubSearchRequest,
    ) -> Result<CallToolResult, McpError> {
        if !self.github.is_configured() {
            return text_result(github::NOT_CONFIGURED);
        }
        let limit = resolve_limit(limit, github::CODE_SEARCH_LIMIT);
        let matches = self.github.search_code(&query, org.as_deref(), limit).await;
        text_result(github::format_code_matches(&matches))
    }

    #[tool(description = "Search GitHub repositories, optionally within an organization")]
    async fn search_github_repos(
        &self,
        #[tool(aggr)] GitHubSearchRequest { query, org, limit }: GitHubSearchRequest,
    ) -> Result<CallToolResult, McpError> {
        if !self.github.is_configured() {
            return text_result(github::NOT_CONFIGURED);
        }
        let limit = resolve_limit(limit, github::REPO_SEARCH_LIMIT);
        let repos = self.github.search_repos(&query, org.as_deref(), limit).await;
        text_result(github::format_repos(&repos))
    }

    #[tool(description = "Get the contents of a file from a GitHub repository")]
    async fn get_github_file(
        &self,
        #[tool(aggr)] GitHubPathRequest { repo, path, git_ref }: GitHubPathRequest,
    ) -> Result<CallToolResult, McpError> {
        if !self.github.is_configured() {
            return text_result(github::NOT_CONFIGURED);
        }
        match self.github.try_get_file(&repo, &path, git_ref.as_deref()).await {
            Ok(file) => {
                let body = truncate_file(&file.content, file.size, MAX_FILE_CHARS);
                text_result(format!("## {}/{}\n{}\n\n```\n{}\n```", repo, file.path, file.url, body))
            }
            Err(SourceError::TooLarge { path, size }) => text_result(format!(
                "File {path} in {repo} is {size} bytes, too large to fetch through the GitHub contents API."
            )),
            Err(e) => {
                if !e.is_not_found() {
                    tracing::warn!("Failed to fetch {} from {}: {}", path, repo, e);
                }
                text_result(format!("File {path} was not found in {repo}."))
            }
        }
    }

    #[tool(description = "List the files and directories at a path in a GitHub repository")]
    async fn list_github_directory(
        &self,
        #[tool(aggr)] GitHubPathRequest { repo, path, git_ref }: GitHubPathRequest,
    ) -> Result<CallToolResult, McpError> {
        if !self.github.is_configured() {
            return text_result(github::NOT_CONFIGURED);
        }
        let entries = self.github.list_contents(&repo, &path, git_ref.as_deref()).await;
        text_result(github::format_entries(&repo, &path, &entries))
    }
}

#[tool(tool_box)]
impl ServerHandler for ProductDocs {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde_json::{Value, json};

    use super::*;
    use crate::config::{GitHubConfig, HelpCenterConfig, YouTrackConfig};
    use crate::http::MAX_LIMIT;

    /// Query strings received by each fake endpoint, latest last
    type Seen = Arc<Mutex<Vec<(&'static str, HashMap<String, String>)>>>;

    fn record(seen: &Seen, endpoint: &'static str, params: HashMap<String, String>) {
        seen.lock().unwrap().push((endpoint, params));
    }

    async fn kb_search(State(seen): State<Seen>, Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        record(&seen, "kb", params);
        Json(json!([]))
    }

    async fn kb_article(Path(_id): Path<String>) -> StatusCode {
        StatusCode::NOT_FOUND
    }

    async fn help_center_search(
        State(seen): State<Seen>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        record(&seen, "help_center", params);
        Json(json!({ "results": [] }))
    }

    async fn code_search(State(seen): State<Seen>, Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        record(&seen, "code", params);
        Json(json!({ "total_count": 0, "items": [] }))
    }

    async fn repo_search(State(seen): State<Seen>, Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        record(&seen, "repos", params);
        Json(json!({ "total_count": 0, "items": [] }))
    }

    fn file_item(path: &str, size: u64, encoding: &str, content: &str) -> Value {
        let api = format!("https://api.github.test/repos/acme/widgets/contents/{path}");
        json!({
            "name": path,
            "path": path,
            "sha": "3d21ec53a331a6f037a91c368710b99387d012c1",
            "size": size,
            "url": api,
            "html_url": format!("https://github.test/acme/widgets/blob/main/{path}"),
            "git_url": null,
            "download_url": null,
            "type": "file",
            "encoding": encoding,
            "content": content,
            "_links": { "self": api, "git": null, "html": null }
        })
    }

    async fn contents(
        Path((_owner, _repo, path)): Path<(String, String, String)>,
    ) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
        match path.as_str() {
            "big.txt" => {
                let body = "a".repeat(60_000);
                Ok(Json(file_item("big.txt", 60_000, "base64", &STANDARD.encode(&body))))
            }
            "huge.bin" => Ok(Json(file_item("huge.bin", 2_000_000, "none", ""))),
            _ => Err((
                StatusCode::NOT_FOUND,
                Json(json!({ "message": "Not Found", "documentation_url": "https://docs.github.com/rest" })),
            )),
        }
    }

    async fn docs() -> (ProductDocs, Seen) {
        let seen = Seen::default();
        let router = Router::new()
            .route("/api/articles", get(kb_search))
            .route("/api/articles/{id}", get(kb_article))
            .route("/api/v2/help_center/articles/search.json", get(help_center_search))
            .route("/search/code", get(code_search))
            .route("/search/repositories", get(repo_search))
            .route("/repos/{owner}/{repo}/contents/{*path}", get(contents))
            .with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let http = reqwest::Client::new();
        let docs = ProductDocs::new(
            YouTrackClient::new(
                http.clone(),
                YouTrackConfig {
                    base_url: base.clone(),
                    token: "perm:secret".to_string(),
                    default_project: None,
                },
            ),
            HelpCenterClient::new(http, HelpCenterConfig { base_url: base.clone() }),
            GitHubConnector::new(GitHubConfig {
                token: Some("ghp_test".to_string()),
                default_org: None,
                api_url: base,
            })
            .unwrap(),
        );
        (docs, seen)
    }

    fn last_param(seen: &Seen, endpoint: &str, key: &str) -> Option<String> {
        seen.lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(name, _)| *name == endpoint)
            .and_then(|(_, params)| params.get(key).cloned())
    }

    fn text_of(result: CallToolResult) -> String {
        result.content[0].as_text().unwrap().text.clone()
    }

    fn search(limit: Option<i64>) -> SearchRequest {
        SearchRequest {
            query: "sso".to_string(),
            limit,
        }
    }

    fn code_search_request(limit: Option<i64>) -> GitHubSearchRequest {
        GitHubSearchRequest {
            query: "retry".to_string(),
            org: None,
            limit,
        }
    }

    fn file(path: &str) -> GitHubPathRequest {
        GitHubPathRequest {
            repo: "acme/widgets".to_string(),
            path: path.to_string(),
            git_ref: None,
        }
    }

    #[test]
    fn long_files_are_truncated_with_marker() {
        let out = truncate_file("abcdef", 6, 4);
        assert_eq!(out, "abcd\n\n... [truncated: file is 6 bytes]");
        assert_eq!(truncate_file("abc", 3, 4), "abc");
    }

    #[tokio::test]
    async fn search_tools_fall_back_to_their_own_defaults() {
        let (docs, seen) = docs().await;

        for limit in [None, Some(0), Some(-4)] {
            docs.search_youtrack_kb(search(limit)).await.unwrap();
            assert_eq!(last_param(&seen, "kb", "$top").as_deref(), Some("10"));

            docs.search_help_center(search(limit)).await.unwrap();
            assert_eq!(last_param(&seen, "help_center", "per_page").as_deref(), Some("5"));

            docs.search_github_code(code_search_request(limit)).await.unwrap();
            assert_eq!(last_param(&seen, "code", "per_page").as_deref(), Some("10"));

            docs.search_github_repos(code_search_request(limit)).await.unwrap();
            assert_eq!(last_param(&seen, "repos", "per_page").as_deref(), Some("5"));
        }
    }

    #[tokio::test]
    async fn explicit_limits_pass_through_up_to_the_cap() {
        let (docs, seen) = docs().await;

        docs.search_youtrack_kb(search(Some(3))).await.unwrap();
        assert_eq!(last_param(&seen, "kb", "$top").as_deref(), Some("3"));

        docs.search_help_center(search(Some(1000))).await.unwrap();
        assert_eq!(
            last_param(&seen, "help_center", "per_page"),
            Some(MAX_LIMIT.to_string())
        );
    }

    #[tokio::test]
    async fn ask_product_question_uses_aggregator_defaults() {
        let (docs, seen) = docs().await;

        let out = docs
            .ask_product_question(AskProductQuestionRequest {
                question: "how do I set up SSO?".to_string(),
                max_kb_results: Some(0),
                max_support_results: None,
                include_github: Some(false),
            })
            .await
            .unwrap();

        assert_eq!(last_param(&seen, "kb", "$top").as_deref(), Some("5"));
        assert_eq!(last_param(&seen, "help_center", "per_page").as_deref(), Some("3"));
        assert!(last_param(&seen, "code", "per_page").is_none());
        assert!(text_of(out).starts_with("## YouTrack Knowledge Base"));
    }

    #[tokio::test]
    async fn missing_article_is_reported_in_a_sentence() {
        let (docs, _seen) = docs().await;

        let out = docs
            .get_youtrack_article(GetYouTrackArticleRequest {
                article_id: "RV2-A-404".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(
            text_of(out),
            "Article RV2-A-404 was not found in the YouTrack knowledge base."
        );
    }

    #[tokio::test]
    async fn github_file_is_truncated_with_marker() {
        let (docs, _seen) = docs().await;

        let out = text_of(docs.get_github_file(file("big.txt")).await.unwrap());

        let header = "## acme/widgets/big.txt\nhttps://github.test/acme/widgets/blob/main/big.txt\n\n```\n";
        let marker = "\n\n... [truncated: file is 60000 bytes]\n```";
        let body = out
            .strip_prefix(header)
            .and_then(|rest| rest.strip_suffix(marker))
            .unwrap();
        assert_eq!(body.len(), MAX_FILE_CHARS);
        assert!(body.chars().all(|c| c == 'a'));
    }

    #[tokio::test]
    async fn github_file_too_large_is_explained() {
        let (docs, _seen) = docs().await;

        let out = text_of(docs.get_github_file(file("huge.bin")).await.unwrap());

        assert_eq!(
            out,
            "File huge.bin in acme/widgets is 2000000 bytes, too large to fetch through the GitHub contents API."
        );
    }

    #[tokio::test]
    async fn missing_github_file_is_reported_in_a_sentence() {
        let (docs, _seen) = docs().await;

        let out = text_of(docs.get_github_file(file("nope.rs")).await.unwrap());

        assert_eq!(out, "File nope.rs was not found in acme/widgets.");
    }
}
