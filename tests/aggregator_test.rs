mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use product_docs_mcp::aggregator::{Aggregator, Question};
use product_docs_mcp::config::{GitHubConfig, HelpCenterConfig, YouTrackConfig};
use product_docs_mcp::github::{GitHubConnector, NOT_CONFIGURED};
use product_docs_mcp::source::TextSource;
use product_docs_mcp::support::{self, HelpCenterClient};
use product_docs_mcp::youtrack::{self, YouTrackClient};

struct FakeSource {
    name: &'static str,
    reply: &'static str,
    delay: Duration,
    configured: bool,
    calls: AtomicUsize,
    last_limit: AtomicUsize,
}

impl FakeSource {
    fn new(name: &'static str, reply: &'static str) -> Self {
        Self {
            name,
            reply,
            delay: Duration::ZERO,
            configured: true,
            calls: AtomicUsize::new(0),
            last_limit: AtomicUsize::new(0),
        }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextSource for FakeSource {
    fn name(&self) -> &str {
        self.name
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn gather(&self, _query: &str, limit: usize) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_limit.store(limit, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.reply.to_string()
    }
}

fn aggregator(kb: &Arc<FakeSource>, support: &Arc<FakeSource>, code: &Arc<FakeSource>) -> Aggregator {
    Aggregator::new(kb.clone(), support.clone(), code.clone())
}

#[tokio::test]
async fn test_sections_follow_source_order() {
    // the slowest source finishes last but is still rendered first
    let kb = Arc::new(FakeSource::new("kb", "kb answer").delayed(Duration::from_millis(60)));
    let support = Arc::new(FakeSource::new("support", "support answer").delayed(Duration::from_millis(30)));
    let code = Arc::new(FakeSource::new("code", "code answer"));

    let out = aggregator(&kb, &support, &code).ask(&Question::new("how do I log in?")).await;

    assert_eq!(
        out,
        "## YouTrack Knowledge Base\n\nkb answer\n\n---\n\n\
         ## Help Center\n\nsupport answer\n\n---\n\n\
         ## GitHub Code\n\ncode answer"
    );
    assert_eq!(code.calls(), 1);
}

#[tokio::test]
async fn test_limits_reach_each_source() {
    let kb = Arc::new(FakeSource::new("kb", "kb"));
    let support = Arc::new(FakeSource::new("support", "support"));
    let code = Arc::new(FakeSource::new("code", "code"));

    aggregator(&kb, &support, &code).ask(&Question::new("q")).await;
    assert_eq!(kb.last_limit.load(Ordering::SeqCst), 5);
    assert_eq!(support.last_limit.load(Ordering::SeqCst), 3);

    let question = Question {
        kb_results: 2,
        support_results: 7,
        ..Question::new("q")
    };
    aggregator(&kb, &support, &code).ask(&question).await;
    assert_eq!(kb.last_limit.load(Ordering::SeqCst), 2);
    assert_eq!(support.last_limit.load(Ordering::SeqCst), 7);
}

#[tokio::test]
async fn test_unconfigured_code_section_explains_itself() {
    let kb = Arc::new(FakeSource::new("kb", "kb answer"));
    let support = Arc::new(FakeSource::new("support", "support answer"));
    let code = Arc::new(FakeSource::new("code", "code answer").unconfigured());

    let out = aggregator(&kb, &support, &code).ask(&Question::new("q")).await;

    let sections: Vec<&str> = out.split("\n\n---\n\n").collect();
    assert_eq!(sections.len(), 3);
    assert_eq!(sections[0], "## YouTrack Knowledge Base\n\nkb answer");
    assert_eq!(sections[1], "## Help Center\n\nsupport answer");
    assert_eq!(sections[2], format!("## GitHub Code\n\n{NOT_CONFIGURED}"));
    assert_eq!(code.calls(), 0);
}

#[tokio::test]
async fn test_requested_but_unconfigured_code_is_not_called() {
    let kb = Arc::new(FakeSource::new("kb", "kb"));
    let support = Arc::new(FakeSource::new("support", "support"));
    let code = Arc::new(FakeSource::new("code", "code").unconfigured());

    let question = Question {
        include_code: Some(true),
        ..Question::new("q")
    };
    let out = aggregator(&kb, &support, &code).ask(&question).await;

    assert!(out.ends_with(NOT_CONFIGURED));
    assert_eq!(code.calls(), 0);
}

#[tokio::test]
async fn test_excluded_code_section_is_dropped() {
    let kb = Arc::new(FakeSource::new("kb", "kb"));
    let support = Arc::new(FakeSource::new("support", "support"));
    let code = Arc::new(FakeSource::new("code", "code"));

    let question = Question {
        include_code: Some(false),
        ..Question::new("q")
    };
    let out = aggregator(&kb, &support, &code).ask(&question).await;

    assert_eq!(out, "## YouTrack Knowledge Base\n\nkb\n\n---\n\n## Help Center\n\nsupport");
    assert_eq!(code.calls(), 0);
}

#[tokio::test]
async fn test_sources_are_queried_concurrently() {
    let delay = Duration::from_millis(300);
    let kb = Arc::new(FakeSource::new("kb", "kb").delayed(delay));
    let support = Arc::new(FakeSource::new("support", "support").delayed(delay));
    let code = Arc::new(FakeSource::new("code", "code").delayed(delay));

    let started = Instant::now();
    aggregator(&kb, &support, &code).ask(&Question::new("q")).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= delay);
    assert!(elapsed < delay * 2, "sources ran back to back: {elapsed:?}");
}

#[tokio::test]
async fn test_unreachable_upstreams_still_produce_an_answer() {
    let http = reqwest::Client::new();
    let youtrack = Arc::new(YouTrackClient::new(
        http.clone(),
        YouTrackConfig {
            base_url: common::dead_url().await,
            token: "perm:secret".to_string(),
            default_project: None,
        },
    ));
    let help_center = Arc::new(HelpCenterClient::new(
        http,
        HelpCenterConfig {
            base_url: common::dead_url().await,
        },
    ));
    let github = Arc::new(GitHubConnector::new(GitHubConfig::default()).unwrap());

    let out = Aggregator::new(youtrack, help_center, github)
        .ask(&Question::new("anything"))
        .await;

    assert!(out.contains(youtrack::NO_ARTICLES_FOUND));
    assert!(out.contains(support::NO_ARTICLES_FOUND));
    assert!(out.ends_with(NOT_CONFIGURED));
}
