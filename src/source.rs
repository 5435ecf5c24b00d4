use async_trait::async_trait;

/// An upstream the question aggregator can fan out to.
///
/// `gather` must never fail: implementations absorb their own errors and
/// return a readable sentence instead, so merging results is infallible.
#[async_trait]
pub trait TextSource: Send + Sync {
    /// Human readable name, used in log lines
    fn name(&self) -> &str;

    /// Whether the source has the credentials it needs to run
    fn is_configured(&self) -> bool {
        true
    }

    /// Search for `query` and render up to `limit` hits as markdown
    async fn gather(&self, query: &str, limit: usize) -> String;
}
