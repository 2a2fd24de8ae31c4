use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::exec::CommandRunner;

/// An open or closed tracker issue matching the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueMatch {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub url: String,
}

/// Search the issue tracker through the `gh` CLI.
///
/// Tracker availability is an optional enhancement: a missing binary,
/// auth problem, network failure, or unparseable response all degrade
/// to an empty result with nothing recorded.
pub(super) async fn search_issues(
    runner: &Arc<dyn CommandRunner>,
    keywords: &[String],
    max_issues: usize,
) -> Vec<IssueMatch> {
    let available = runner
        .run("gh", &["--version"])
        .await
        .map(|output| output.status.success())
        .unwrap_or(false);
    if !available {
        debug!("gh CLI not available; skipping issue search");
        return Vec::new();
    }

    let query = keywords.join(" ");
    let limit = max_issues.to_string();
    let args = [
        "issue",
        "list",
        "--search",
        query.as_str(),
        "--limit",
        limit.as_str(),
        "--json",
        "number,title,state,url",
    ];

    let output = match runner.run("gh", &args).await {
        Ok(output) => output,
        Err(e) => {
            debug!(error = %e, "Issue search failed to run; skipping");
            return Vec::new();
        }
    };
    if !output.status.success() {
        debug!("Issue search exited non-zero; skipping");
        return Vec::new();
    }

    match serde_json::from_slice::<Vec<IssueMatch>>(&output.stdout) {
        Ok(matches) => matches,
        Err(e) => {
            debug!(error = %e, "Issue search output was not valid JSON; skipping");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_match_parses_gh_json() {
        let json = r#"[
            {"number": 42, "title": "Auth service duplicates sessions", "state": "OPEN",
             "url": "https://github.com/acme/app/issues/42"},
            {"number": 7, "title": "Login flow rework", "state": "CLOSED",
             "url": "https://github.com/acme/app/issues/7"}
        ]"#;

        let matches: Vec<IssueMatch> = serde_json::from_str(json).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].number, 42);
        assert_eq!(matches[0].state, "OPEN");
        assert_eq!(matches[1].title, "Login flow rework");
    }
}
