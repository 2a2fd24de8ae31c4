use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::fingerprint::{self, Fingerprint};
use crate::pattern::PatternStore;

/// A previously completed task relevant to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMatch {
    pub task_hash: String,
    pub description: String,
    pub last_agent: String,
    pub success_count: u32,
    pub similarity: f64,
    pub last_used: DateTime<Utc>,
}

/// Search the execution-history store.
///
/// Candidates are bucketed by normalized-hash prefix, then re-scored
/// against the query's full keyword set; only sufficiently relevant
/// matches survive. Store failures are this source's recorded error.
pub(super) async fn search_history(
    store: &Arc<dyn PatternStore>,
    fp: &Fingerprint,
    config: &SearchConfig,
) -> Result<Vec<HistoryMatch>, String> {
    let prefix = fp.normalized_prefix(config.hash_prefix_len);
    let candidates = store
        .similar_patterns(prefix, config.candidate_limit)
        .await
        .map_err(|e| format!("execution-history search failed: {}", e))?;

    let mut matches: Vec<HistoryMatch> = candidates
        .into_iter()
        .filter_map(|pattern| {
            let similarity =
                fingerprint::jaccard_similarity(&fp.keywords, &pattern.keywords());
            if similarity < config.history_relevance_threshold {
                return None;
            }
            Some(HistoryMatch {
                task_hash: pattern.task_hash,
                description: pattern.description,
                last_agent: pattern.last_agent,
                success_count: pattern.success_count,
                similarity,
                last_used: pattern.last_used,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{MemoryPatternStore, NewPattern, META_KEYWORDS, META_NORMALIZED_HASH};
    use std::collections::HashMap;

    async fn seed(store: &MemoryPatternStore, hash: &str, normalized: &str, keywords: &str) {
        let mut metadata = HashMap::new();
        metadata.insert(META_NORMALIZED_HASH.to_string(), normalized.to_string());
        metadata.insert(META_KEYWORDS.to_string(), keywords.to_string());
        store
            .add_pattern(NewPattern {
                task_hash: hash.to_string(),
                description: "seeded".to_string(),
                last_agent: "agent-a".to_string(),
                metadata,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_history_rescore_filters_weak_matches() {
        let store = MemoryPatternStore::new();
        let fp = fingerprint::fingerprint("implement cache invalidation service", &[]);
        let prefix = fp.normalized_prefix(8);

        // Same bucket, strong keyword overlap.
        seed(&store, "h1", &fp.normalized_hash, "cache implement invalidation").await;
        // Same bucket, almost no overlap.
        seed(&store, "h2", &format!("{}ffff", prefix), "unrelated words entirely").await;

        let store: Arc<dyn PatternStore> = Arc::new(store);
        let matches = search_history(&store, &fp, &SearchConfig::default())
            .await
            .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].task_hash, "h1");
        assert!(matches[0].similarity >= 0.30);
    }

    #[tokio::test]
    async fn test_history_sorts_by_similarity() {
        let store = MemoryPatternStore::new();
        let fp = fingerprint::fingerprint("implement cache invalidation service", &[]);

        seed(&store, "weak", &fp.normalized_hash, "cache service").await;
        seed(
            &store,
            "strong",
            &fp.normalized_hash,
            "cache implement invalidation service",
        )
        .await;

        let store: Arc<dyn PatternStore> = Arc::new(store);
        let matches = search_history(&store, &fp, &SearchConfig::default())
            .await
            .unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].task_hash, "strong");
    }
}
