use anyhow::Result;
use clap::Parser;
use rmcp::{ServiceExt, transport::stdio};
use product_docs_mcp::config::{
    AppConfig, DEFAULT_GITHUB_API_URL, DEFAULT_HELP_CENTER_URL, GitHubConfig, HelpCenterConfig,
    YouTrackConfig, non_empty,
};
use product_docs_mcp::github::GitHubConnector;
use product_docs_mcp::server::ProductDocs;
use product_docs_mcp::support::HelpCenterClient;
use product_docs_mcp::youtrack::YouTrackClient;

#[cfg(feature = "trace")]
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
struct Cli {
    /// Base URL of the YouTrack instance hosting the knowledge base
    #[clap(long, env = "YOUTRACK_URL")]
    youtrack_url: String,
    /// YouTrack permanent token
    #[clap(long, env = "YOUTRACK_TOKEN", hide_env_values = true)]
    youtrack_token: String,
    /// Project short name to scope knowledge base searches to (optional)
    #[clap(long, env = "YOUTRACK_PROJECT")]
    youtrack_project: Option<String>,
    /// Base URL of the public help center
    #[clap(long, env = "HELP_CENTER_URL", default_value = DEFAULT_HELP_CENTER_URL)]
    help_center_url: String,
    /// A github personal access token; GitHub tools are disabled without it (optional)
    #[clap(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,
    /// Organization GitHub searches are scoped to by default (optional)
    #[clap(long, env = "GITHUB_ORG")]
    github_org: Option<String>,
    /// GitHub REST API endpoint
    #[clap(long, env = "GITHUB_API_URL", default_value = DEFAULT_GITHUB_API_URL)]
    github_api_url: String,
    /// Write logs to this file instead of stderr (optional)
    #[clap(long, env = "PRODUCT_DOCS_LOG")]
    log_file: Option<std::path::PathBuf>,
}

impl Cli {
    fn into_config(self) -> AppConfig {
        AppConfig {
            youtrack: YouTrackConfig {
                base_url: self.youtrack_url,
                token: self.youtrack_token,
                default_project: non_empty(self.youtrack_project),
            },
            help_center: HelpCenterConfig {
                base_url: self.help_center_url,
            },
            github: GitHubConfig {
                token: non_empty(self.github_token),
                default_org: non_empty(self.github_org),
                api_url: self.github_api_url,
            },
        }
    }
}

/// You can inspect the server using the Model Context Protocol Inspector.
/// npx @modelcontextprotocol/inspector cargo run -- --youtrack-url <url> --youtrack-token <token>

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // stdout carries the MCP transport, so logs go to a file or stderr
    #[cfg(feature = "trace")]
    {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        match &args.log_file {
            Some(path) => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::fs::File::create(path)?)
                .with_ansi(false)
                .init(),
            None => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .init(),
        }
    }

    tracing::info!("Starting MCP server");

    let config = args.into_config();
    if config.youtrack.token.trim().is_empty() {
        anyhow::bail!("YouTrack token cannot be empty");
    }

    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let youtrack = YouTrackClient::new(http.clone(), config.youtrack);
    let help_center = HelpCenterClient::new(http, config.help_center);
    let github = GitHubConnector::new(config.github)?;
    tracing::info!("GitHub tools enabled: {}", github.is_configured());

    let service = ProductDocs::new(youtrack, help_center, github)
        .serve(stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("serving error: {:?}", e);
        })?;

    service.waiting().await?;
    Ok(())
}
