use async_trait::async_trait;

use crate::error::Result;

/// Outcome of a single semantic comparison.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub score: f64,
    pub reasoning: String,
}

/// External, possibly rate-limited scorer estimating semantic
/// similarity between two task descriptions.
///
/// The library invokes `compare_batch` at most once per retrieval to
/// bound external call volume. Retry and backoff are the implementor's
/// concern; the library absorbs failures and never retries.
#[async_trait]
pub trait SemanticComparator: Send + Sync {
    async fn compare(&self, a: &str, b: &str) -> Result<Comparison>;

    /// Score `query` against every candidate in one call. Must return
    /// exactly `candidates.len()` scores; the library treats any
    /// mismatch as that call's failure.
    async fn compare_batch(&self, query: &str, candidates: &[String]) -> Result<Vec<f64>>;
}
