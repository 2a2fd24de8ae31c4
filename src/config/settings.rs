use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{DejavuError, Result};

/// How a confirmed duplicate affects the recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    /// Duplicates are recommended for skipping.
    Block,
    /// Duplicates are flagged for review but never skipped.
    #[default]
    Warn,
    /// Detection is advisory only; everything proceeds.
    Suggest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub mode: DetectionMode,
    /// Minimum score for a stored pattern to count as similar at all.
    pub similarity_threshold: f64,
    /// Minimum score at which a candidate is treated as the same task.
    pub duplicate_threshold: f64,
    /// Cap on similar patterns returned per retrieval.
    pub max_patterns_per_task: usize,
    /// Run the prior-art search and build the advisory report.
    pub enable_stop: bool,
    /// Run the pattern-library duplicate check.
    pub enable_duplicate_detection: bool,
    pub search: SearchConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            mode: DetectionMode::default(),
            similarity_threshold: 0.7,
            duplicate_threshold: 0.85,
            max_patterns_per_task: 5,
            enable_stop: true,
            enable_duplicate_detection: true,
            search: SearchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Independent deadline for each of the four evidence sources.
    pub source_timeout_secs: u64,
    /// Minimum keyword Jaccard score for an execution-history candidate
    /// to stay in the result set.
    pub history_relevance_threshold: f64,
    /// Length of the normalized-hash prefix used for store lookups.
    pub hash_prefix_len: usize,
    pub max_commits: usize,
    pub max_issues: usize,
    pub max_doc_matches: usize,
    /// Candidates fetched per store lookup before re-scoring.
    pub candidate_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            source_timeout_secs: 5,
            history_relevance_threshold: 0.30,
            hash_prefix_len: 8,
            max_commits: 10,
            max_issues: 5,
            max_doc_matches: 10,
            candidate_limit: 20,
        }
    }
}

impl SearchConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }
}

impl DetectionConfig {
    pub async fn load(config_path: &Path) -> Result<Self> {
        let config = if config_path.exists() {
            let content = fs::read_to_string(config_path).await?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, config_path: &Path) -> Result<()> {
        self.validate()?;
        let content =
            toml::to_string_pretty(self).map_err(|e| DejavuError::Config(e.to_string()))?;
        fs::write(config_path, content).await?;
        Ok(())
    }

    /// Validate configuration values for consistency and safety.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            errors.push("similarity_threshold must be between 0.0 and 1.0");
        }
        if !(0.0..=1.0).contains(&self.duplicate_threshold) {
            errors.push("duplicate_threshold must be between 0.0 and 1.0");
        }
        if self.max_patterns_per_task == 0 {
            errors.push("max_patterns_per_task must be greater than 0");
        }

        if self.search.source_timeout_secs == 0 {
            errors.push("search.source_timeout_secs must be greater than 0");
        }
        if !(0.0..=1.0).contains(&self.search.history_relevance_threshold) {
            errors.push("search.history_relevance_threshold must be between 0.0 and 1.0");
        }
        // SHA-256 hex is 64 chars; the prefix must be a proper, useful slice of it.
        if !(4..=64).contains(&self.search.hash_prefix_len) {
            errors.push("search.hash_prefix_len must be between 4 and 64");
        }
        if self.search.max_commits == 0 {
            errors.push("search.max_commits must be greater than 0");
        }
        if self.search.max_issues == 0 {
            errors.push("search.max_issues must be greater than 0");
        }
        if self.search.max_doc_matches == 0 {
            errors.push("search.max_doc_matches must be greater than 0");
        }
        if self.search.candidate_limit == 0 {
            errors.push("search.candidate_limit must be greater than 0");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DejavuError::Config(errors.join("; ")))
        }
    }
}
