use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::report::StopReport;
use crate::config::{DetectionConfig, DetectionMode};
use crate::pattern::{DuplicateResult, PatternLibrary, Recommendation};
use crate::search::PriorArtSearcher;
use crate::util::truncate_with_ellipsis;

/// Final verdict handed to the orchestrator. Only the duplicate check
/// in block mode can set `should_block`; the advisory report never
/// blocks by itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckResult {
    pub should_block: bool,
    pub block_reason: Option<String>,
    pub suggestions: Vec<String>,
}

/// Everything one pre-dispatch check produced.
#[derive(Debug, Clone, Default)]
pub struct TaskCheck {
    /// Advisory prior-art report. Empty (not absent) when STOP is
    /// disabled, so callers never need a presence check.
    pub report: StopReport,
    /// Duplicate verdict. Empty (proceed) when detection is disabled.
    pub duplicate: DuplicateResult,
    pub result: CheckResult,
}

/// Pre-dispatch gate for one task: runs the prior-art search and the
/// duplicate check, then merges both into a single recommendation.
pub struct TaskChecker {
    searcher: PriorArtSearcher,
    library: PatternLibrary,
    config: DetectionConfig,
}

impl TaskChecker {
    pub fn new(searcher: PriorArtSearcher, library: PatternLibrary, config: DetectionConfig) -> Self {
        Self {
            searcher,
            library,
            config,
        }
    }

    /// Check a task before dispatch.
    ///
    /// Infallible by construction: every evidence source and the
    /// duplicate check degrade on failure instead of erroring, so a
    /// broken environment yields an empty check, never a lost task.
    pub async fn check_task(&self, description: &str, files: &[String]) -> TaskCheck {
        let report = if self.config.enable_stop {
            let results = self.searcher.search(description, files).await;
            StopReport::from_results(description, files, results)
        } else {
            debug!("STOP report disabled by configuration");
            StopReport::default()
        };

        let duplicate = if self.config.enable_duplicate_detection {
            self.library.check_duplicates(description, files).await
        } else {
            debug!("Duplicate detection disabled by configuration");
            DuplicateResult::default()
        };

        let result = self.decide(description, files, &report, &duplicate).await;

        if result.should_block {
            info!(
                task = %truncate_with_ellipsis(description, 60),
                similarity = duplicate.similarity_score,
                "Task blocked as duplicate work"
            );
        }

        TaskCheck {
            report,
            duplicate,
            result,
        }
    }

    async fn decide(
        &self,
        description: &str,
        files: &[String],
        report: &StopReport,
        duplicate: &DuplicateResult,
    ) -> CheckResult {
        let should_block = self.config.mode == DetectionMode::Block
            && duplicate.similarity_score >= self.config.duplicate_threshold;

        let block_reason = if should_block {
            Some(duplicate.skip_reason.clone().unwrap_or_else(|| {
                format!(
                    "duplicate work detected (similarity {:.2})",
                    duplicate.similarity_score
                )
            }))
        } else {
            None
        };

        let mut suggestions = Vec::new();

        if duplicate.recommendation == Recommendation::Review {
            suggestions.push(format!(
                "similar work was already completed (similarity {:.2}); review it before proceeding",
                duplicate.similarity_score
            ));
        }

        if let Some(rec) = self.library.recommend_agent(description, files).await {
            suggestions.push(format!(
                "agent {} handled {} similar tasks ({} successes); prefer it for dispatch",
                rec.agent, rec.matching_patterns, rec.total_successes
            ));
        }

        if let Some(commit) = report.results.git_matches.first() {
            suggestions.push(format!(
                "commit {} (\"{}\") looks related; check for overlap",
                commit.hash,
                truncate_with_ellipsis(&commit.subject, 60)
            ));
        }

        CheckResult {
            should_block,
            block_reason,
            suggestions,
        }
    }
}
