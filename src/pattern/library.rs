use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::comparator::SemanticComparator;
use super::store::{NewPattern, PatternStore, StoredPattern, META_KEYWORDS, META_NORMALIZED_HASH};
use crate::config::{DetectionConfig, DetectionMode};
use crate::error::{DejavuError, Result};
use crate::fingerprint::{self, Fingerprint};
use crate::util::truncate_str;

/// What the duplicate verdict asks the orchestrator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    #[default]
    Proceed,
    Review,
    Skip,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proceed => "proceed",
            Self::Review => "review",
            Self::Skip => "skip",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient duplicate verdict for one check. Never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuplicateResult {
    pub is_duplicate: bool,
    pub similarity_score: f64,
    /// Task hashes of the stored patterns this task duplicates.
    pub duplicate_of: Vec<String>,
    pub recommendation: Recommendation,
    pub should_skip: bool,
    /// Populated only when `should_skip` is true.
    pub skip_reason: Option<String>,
    pub confidence: f64,
}

/// A stored pattern together with its similarity to the query task.
#[derive(Debug, Clone)]
pub struct SimilarPattern {
    pub pattern: StoredPattern,
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecommendation {
    pub agent: String,
    pub confidence: f64,
    pub matching_patterns: usize,
    pub total_successes: u32,
}

/// Read/write owner of the pattern store, answering duplicate and
/// similarity queries against previously successful task executions.
///
/// Both collaborators are optional: without a store every method is a
/// graceful no-op returning its zero value, and without a comparator
/// similarity falls back to the local keyword estimate.
pub struct PatternLibrary {
    store: Option<Arc<dyn PatternStore>>,
    comparator: Option<Arc<dyn SemanticComparator>>,
    config: DetectionConfig,
}

impl PatternLibrary {
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            store: None,
            comparator: None,
            config,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn PatternStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_comparator(mut self, comparator: Arc<dyn SemanticComparator>) -> Self {
        self.comparator = Some(comparator);
        self
    }

    /// Persist a successful task execution.
    ///
    /// Fails only on an empty description or a genuine persistence
    /// error; an unconfigured store is a no-op success.
    pub async fn store(&self, description: &str, files: &[String], agent: &str) -> Result<()> {
        if description.trim().is_empty() {
            return Err(DejavuError::InvalidInput("task description is empty".into()));
        }
        let Some(store) = &self.store else {
            debug!("Pattern store not configured; skipping store");
            return Ok(());
        };

        let fp = fingerprint::fingerprint(description, files);
        let mut metadata = HashMap::new();
        metadata.insert(META_NORMALIZED_HASH.to_string(), fp.normalized_hash.clone());
        metadata.insert(META_KEYWORDS.to_string(), fp.keywords.join(" "));

        debug!(
            task_hash = %truncate_str(&fp.full_hash, 8),
            agent,
            "Storing task pattern"
        );

        store
            .add_pattern(NewPattern {
                task_hash: fp.full_hash,
                description: description.to_string(),
                last_agent: agent.to_string(),
                metadata,
            })
            .await
    }

    /// Record another success for a task, creating the pattern if it
    /// does not exist yet. The store layer owns the increment.
    pub async fn increment_success(
        &self,
        description: &str,
        files: &[String],
        agent: &str,
    ) -> Result<()> {
        if description.trim().is_empty() {
            return Err(DejavuError::InvalidInput("task description is empty".into()));
        }
        let Some(store) = &self.store else {
            return Ok(());
        };

        let fp = fingerprint::fingerprint(description, files);
        match store.get_pattern(&fp.full_hash).await? {
            Some(existing) => debug!(
                task_hash = %truncate_str(&fp.full_hash, 8),
                success_count = existing.success_count + 1,
                "Incrementing pattern success"
            ),
            None => debug!(
                task_hash = %truncate_str(&fp.full_hash, 8),
                "No existing pattern; creating on first success"
            ),
        }

        self.store(description, files, agent).await
    }

    /// Direct lookup by the task's full hash. Store errors propagate.
    pub async fn exact_match(
        &self,
        description: &str,
        files: &[String],
    ) -> Result<Option<StoredPattern>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let fp = fingerprint::fingerprint(description, files);
        store.get_pattern(&fp.full_hash).await
    }

    /// Similar stored patterns, without their scores.
    pub async fn retrieve(
        &self,
        description: &str,
        files: &[String],
        limit: usize,
    ) -> Result<Vec<StoredPattern>> {
        let similar = self
            .retrieve_with_similarity(description, files, limit)
            .await?;
        Ok(similar.into_iter().map(|s| s.pattern).collect())
    }

    /// Similar stored patterns with scores, best first.
    ///
    /// Candidates come from the normalized-hash prefix bucket unioned
    /// with the store's top patterns. When a comparator is configured
    /// the whole candidate set is scored in one batched call; without
    /// one, the local keyword estimate applies. A `limit` of 0 means
    /// the configured `max_patterns_per_task`.
    pub async fn retrieve_with_similarity(
        &self,
        description: &str,
        files: &[String],
        limit: usize,
    ) -> Result<Vec<SimilarPattern>> {
        let Some(store) = &self.store else {
            return Ok(Vec::new());
        };
        let limit = if limit == 0 {
            self.config.max_patterns_per_task
        } else {
            limit
        };

        let fp = fingerprint::fingerprint(description, files);
        let prefix = fp.normalized_prefix(self.config.search.hash_prefix_len);
        let candidate_limit = self.config.search.candidate_limit;

        let mut candidates = store.similar_patterns(prefix, candidate_limit).await?;
        let mut seen: HashSet<String> =
            candidates.iter().map(|p| p.task_hash.clone()).collect();
        for pattern in store.top_patterns(candidate_limit).await? {
            if seen.insert(pattern.task_hash.clone()) {
                candidates.push(pattern);
            }
        }

        let scores = self.score_candidates(description, &fp, &candidates).await;

        let mut scored: Vec<SimilarPattern> = candidates
            .into_iter()
            .zip(scores)
            .filter(|(_, score)| *score >= self.config.similarity_threshold)
            .map(|(pattern, similarity)| SimilarPattern {
                pattern,
                similarity,
            })
            .collect();
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }

    /// One score per candidate, in candidate order.
    async fn score_candidates(
        &self,
        description: &str,
        fp: &Fingerprint,
        candidates: &[StoredPattern],
    ) -> Vec<f64> {
        if candidates.is_empty() {
            return Vec::new();
        }

        if let Some(comparator) = &self.comparator {
            let texts: Vec<String> = candidates.iter().map(|p| p.description.clone()).collect();
            match comparator.compare_batch(description, &texts).await {
                Ok(scores) if scores.len() == candidates.len() => return scores,
                Ok(scores) => warn!(
                    expected = candidates.len(),
                    got = scores.len(),
                    "Comparator returned wrong score count; using zero scores"
                ),
                Err(e) => {
                    warn!(error = %e, "Semantic comparison failed; using zero scores")
                }
            }
            return vec![0.0; candidates.len()];
        }

        // Local estimate when no comparator is configured.
        candidates
            .iter()
            .map(|p| {
                if p.task_hash == fp.full_hash
                    || p.normalized_hash() == Some(fp.normalized_hash.as_str())
                {
                    1.0
                } else {
                    fingerprint::jaccard_similarity(&fp.keywords, &p.keywords())
                }
            })
            .collect()
    }

    /// Duplicate verdict for a task against the stored patterns.
    ///
    /// Detection never fails the caller's task execution: store and
    /// comparator failures degrade to a proceed verdict.
    pub async fn check_duplicates(&self, description: &str, files: &[String]) -> DuplicateResult {
        let Some(store) = &self.store else {
            return DuplicateResult::default();
        };

        let fp = fingerprint::fingerprint(description, files);

        // Exact same task stored before.
        match store.get_pattern(&fp.full_hash).await {
            Ok(Some(existing)) => {
                return self.verdict(1.0, vec![existing.task_hash], 1.0);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Duplicate check store lookup failed");
                return DuplicateResult::default();
            }
        }

        // Normalized-identical: same task despite surface differences.
        let prefix = fp.normalized_prefix(self.config.search.hash_prefix_len);
        match store
            .similar_patterns(prefix, self.config.search.candidate_limit)
            .await
        {
            Ok(bucket) => {
                if let Some(hit) = bucket
                    .iter()
                    .find(|p| p.normalized_hash() == Some(fp.normalized_hash.as_str()))
                {
                    return self.verdict(1.0, vec![hit.task_hash.clone()], 1.0);
                }
            }
            Err(e) => warn!(error = %e, "Duplicate check prefix lookup failed"),
        }

        let similar = match self.retrieve_with_similarity(description, files, 0).await {
            Ok(similar) => similar,
            Err(e) => {
                warn!(error = %e, "Duplicate check retrieval failed");
                Vec::new()
            }
        };

        let best = similar.first().map(|s| s.similarity).unwrap_or(0.0);
        let duplicate_of: Vec<String> = similar
            .iter()
            .filter(|s| s.similarity >= self.config.duplicate_threshold)
            .map(|s| s.pattern.task_hash.clone())
            .collect();

        self.verdict(best, duplicate_of, best)
    }

    fn verdict(
        &self,
        similarity: f64,
        duplicate_of: Vec<String>,
        confidence: f64,
    ) -> DuplicateResult {
        let is_duplicate = similarity >= self.config.duplicate_threshold;
        let (recommendation, should_skip) = match (self.config.mode, is_duplicate) {
            (DetectionMode::Block, true) => (Recommendation::Skip, true),
            (DetectionMode::Warn, true) => (Recommendation::Review, false),
            _ => (Recommendation::Proceed, false),
        };

        let skip_reason = if should_skip {
            duplicate_of
                .first()
                .map(|hash| format!("duplicate of task {}", truncate_str(hash, 8)))
        } else {
            None
        };

        DuplicateResult {
            is_duplicate,
            similarity_score: similarity,
            duplicate_of,
            recommendation,
            should_skip,
            skip_reason,
            confidence,
        }
    }

    /// Suggest the agent with the strongest track record on similar
    /// tasks. `None` when no store is configured, nothing similar is
    /// stored, or no similar pattern names an agent.
    pub async fn recommend_agent(
        &self,
        description: &str,
        files: &[String],
    ) -> Option<AgentRecommendation> {
        self.store.as_ref()?;

        let similar = match self.retrieve_with_similarity(description, files, 0).await {
            Ok(similar) => similar,
            Err(e) => {
                warn!(error = %e, "Agent recommendation retrieval failed");
                return None;
            }
        };
        if similar.is_empty() {
            return None;
        }

        // successes, matches, similarity sum per agent
        let mut by_agent: HashMap<&str, (u32, usize, f64)> = HashMap::new();
        for s in &similar {
            if s.pattern.last_agent.is_empty() {
                continue;
            }
            let entry = by_agent.entry(s.pattern.last_agent.as_str()).or_default();
            entry.0 += s.pattern.success_count;
            entry.1 += 1;
            entry.2 += s.similarity;
        }

        let (agent, (total_successes, matching_patterns, similarity_sum)) =
            by_agent.into_iter().max_by_key(|(_, (successes, ..))| *successes)?;

        let avg_similarity = similarity_sum / matching_patterns as f64;
        let confidence =
            (matching_patterns as f64 / 5.0).min(1.0) * 0.4 + avg_similarity * 0.6;

        debug!(
            agent,
            matching_patterns,
            total_successes,
            confidence,
            "Recommending agent from pattern history"
        );

        Some(AgentRecommendation {
            agent: agent.to_string(),
            confidence,
            matching_patterns,
            total_successes,
        })
    }
}
