use serde::{Deserialize, Serialize};

use crate::search::SearchResults;
use crate::util::truncate_with_ellipsis;

/// Rough effort estimate derived from the task surface and the volume
/// of related prior work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    #[default]
    Low,
    Moderate,
    High,
}

/// Advisory report folded from the prior-art search, used to enrich
/// the executing agent's prompt. Best-effort summary only: it never
/// gates execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopReport {
    pub summary: String,
    pub complexity: Complexity,
    pub risk_factors: Vec<String>,
    pub verification_steps: Vec<String>,
    pub confidence: f64,
    pub results: SearchResults,
}

impl StopReport {
    pub(crate) fn from_results(
        description: &str,
        files: &[String],
        results: SearchResults,
    ) -> Self {
        let complexity = estimate_complexity(files.len(), results.total_matches());
        let risk_factors = collect_risks(&results);
        let verification_steps = collect_verification_steps(&results);
        let confidence = results.confidence();
        let summary = build_summary(description, &results);

        Self {
            summary,
            complexity,
            risk_factors,
            verification_steps,
            confidence,
            results,
        }
    }
}

fn estimate_complexity(file_count: usize, evidence_count: usize) -> Complexity {
    if file_count >= 5 || evidence_count >= 10 {
        Complexity::High
    } else if file_count >= 2 || evidence_count >= 3 {
        Complexity::Moderate
    } else {
        Complexity::Low
    }
}

fn build_summary(description: &str, results: &SearchResults) -> String {
    let task = truncate_with_ellipsis(description, 80);
    if results.is_empty() {
        return format!("no prior art found for \"{}\"", task);
    }
    format!(
        "found {} pieces of prior art for \"{}\" ({} commits, {} issues, {} doc references, {} similar tasks)",
        results.total_matches(),
        task,
        results.git_matches.len(),
        results.issue_matches.len(),
        results.doc_matches.len(),
        results.history_matches.len(),
    )
}

fn collect_risks(results: &SearchResults) -> Vec<String> {
    let mut risks = Vec::new();

    if !results.git_matches.is_empty() {
        risks.push(format!(
            "{} prior commits touch similar work; changes may overlap",
            results.git_matches.len()
        ));
    }
    if let Some(best) = results.history_matches.first() {
        risks.push(format!(
            "a previously completed task is {:.0}% similar; effort may be redundant",
            best.similarity * 100.0
        ));
    }
    if let Some(open) = results
        .issue_matches
        .iter()
        .find(|i| i.state.eq_ignore_ascii_case("open"))
    {
        risks.push(format!(
            "issue #{} (\"{}\") may already track this work",
            open.number,
            truncate_with_ellipsis(&open.title, 60)
        ));
    }
    if !results.errors.is_empty() {
        risks.push(format!(
            "{} evidence sources were unavailable; prior-art coverage is partial",
            results.errors.len()
        ));
    }

    risks
}

fn collect_verification_steps(results: &SearchResults) -> Vec<String> {
    let mut steps = Vec::new();

    for commit in results.git_matches.iter().take(3) {
        steps.push(format!(
            "compare against commit {} (\"{}\")",
            commit.hash,
            truncate_with_ellipsis(&commit.subject, 60)
        ));
    }
    for doc in results.doc_matches.iter().take(2) {
        steps.push(format!("review {}:{}", doc.file, doc.line));
    }
    if let Some(best) = results.history_matches.first() {
        let step = if best.last_agent.is_empty() {
            format!("diff the approach against prior task {}", best.task_hash)
        } else {
            format!(
                "diff the approach against prior task {} last handled by {}",
                best.task_hash, best.last_agent
            )
        };
        steps.push(step);
    }

    steps
}
