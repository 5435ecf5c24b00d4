//! Fan a product question out to every knowledge source and merge the answers.
//!
//! The knowledge base and help center are always queried; GitHub joins when
//! it is configured (or explicitly requested). All started lookups run
//! concurrently on the calling task and the merge waits for every one of
//! them. Sections are always emitted in the same order: knowledge base,
//! help center, code.

use std::sync::Arc;

use crate::github;
use crate::source::TextSource;

pub const DEFAULT_KB_RESULTS: usize = 5;
pub const DEFAULT_SUPPORT_RESULTS: usize = 3;

const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// Parameters of a single question
#[derive(Debug, Clone)]
pub struct Question {
    pub text: String,
    pub kb_results: usize,
    pub support_results: usize,
    /// `None` means "include code results if GitHub is configured"
    pub include_code: Option<bool>,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kb_results: DEFAULT_KB_RESULTS,
            support_results: DEFAULT_SUPPORT_RESULTS,
            include_code: None,
        }
    }
}

#[derive(Clone)]
pub struct Aggregator {
    knowledge_base: Arc<dyn TextSource>,
    help_center: Arc<dyn TextSource>,
    code: Arc<dyn TextSource>,
}

impl Aggregator {
    pub fn new(
        knowledge_base: Arc<dyn TextSource>,
        help_center: Arc<dyn TextSource>,
        code: Arc<dyn TextSource>,
    ) -> Self {
        Self {
            knowledge_base,
            help_center,
            code,
        }
    }

    /// Answer material for `question`, one markdown document with a section per source
    pub async fn ask(&self, question: &Question) -> String {
        let code_configured = self.code.is_configured();
        // An omitted flag still renders the code section; only `false` drops it.
        let render_code = question.include_code.unwrap_or(true);
        let query_code = question.include_code.unwrap_or(code_configured) && code_configured;

        tracing::info!(
            "Answering question across sources (kb={}, support={}, code={})",
            question.kb_results,
            question.support_results,
            query_code
        );

        let (kb, support, code) = tokio::join!(
            self.knowledge_base.gather(&question.text, question.kb_results),
            self.help_center.gather(&question.text, question.support_results),
            async {
                if query_code {
                    Some(self.code.gather(&question.text, github::CODE_SEARCH_LIMIT).await)
                } else {
                    None
                }
            },
        );

        let mut sections = vec![
            format!("## YouTrack Knowledge Base\n\n{kb}"),
            format!("## Help Center\n\n{support}"),
        ];
        if render_code {
            let code = code.unwrap_or_else(|| {
                tracing::debug!("{} skipped: not configured", self.code.name());
                github::NOT_CONFIGURED.to_string()
            });
            sections.push(format!("## GitHub Code\n\n{code}"));
        }

        sections.join(SECTION_SEPARATOR)
    }
}
