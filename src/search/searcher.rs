use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::debug;

use super::docs::{self, DocMatch};
use super::git::{self, CommitMatch};
use super::history::{self, HistoryMatch};
use super::issues::{self, IssueMatch};
use crate::config::SearchConfig;
use crate::exec::CommandRunner;
use crate::fingerprint;
use crate::pattern::PatternStore;

/// Keywords used to build the external query strings.
const QUERY_KEYWORD_COUNT: usize = 3;

/// Total evidence count at which search confidence saturates.
const CONFIDENCE_SATURATION: f64 = 15.0;

pub(super) const NO_KEYWORDS_ERROR: &str =
    "no significant keywords in task description; prior-art search skipped";

/// Aggregated evidence from one prior-art search. Transient: built per
/// call, never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    pub git_matches: Vec<CommitMatch>,
    pub issue_matches: Vec<IssueMatch>,
    pub doc_matches: Vec<DocMatch>,
    pub history_matches: Vec<HistoryMatch>,
    /// Unexpected per-source failures. A populated entry never means
    /// the overall search failed; the other sources still ran.
    pub errors: Vec<String>,
    pub search_duration: Duration,
}

impl SearchResults {
    /// How much evidence the search produced, saturating at 1.0.
    /// Issue matches are supplementary and do not count.
    pub fn confidence(&self) -> f64 {
        let evidence =
            self.git_matches.len() + self.doc_matches.len() + self.history_matches.len();
        (evidence as f64 / CONFIDENCE_SATURATION).min(1.0)
    }

    pub fn total_matches(&self) -> usize {
        self.git_matches.len()
            + self.issue_matches.len()
            + self.doc_matches.len()
            + self.history_matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_matches() == 0
    }
}

/// One evidence source's contribution, sent back through its join
/// handle and merged by the coordinator.
enum SourceOutcome {
    Git(Vec<CommitMatch>),
    Issues(Vec<IssueMatch>),
    Docs(Vec<DocMatch>),
    History(Vec<HistoryMatch>),
    Failed(String),
}

/// Concurrent prior-art search over four independent evidence sources:
/// commit history, the issue tracker, documentation text, and the
/// execution-history store.
///
/// Each source runs under its own deadline; a slow, hung, or broken
/// source is bounded and never aborts the others.
pub struct PriorArtSearcher {
    runner: Arc<dyn CommandRunner>,
    store: Option<Arc<dyn PatternStore>>,
    working_dir: PathBuf,
    config: SearchConfig,
}

impl PriorArtSearcher {
    pub fn new(runner: Arc<dyn CommandRunner>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            store: None,
            working_dir: working_dir.into(),
            config: SearchConfig::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn PatternStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    /// Run all four searches concurrently and aggregate their results.
    ///
    /// The call returns when every source has finished or hit its
    /// deadline; total wall time is bounded by the per-source timeout,
    /// not the sum. Dropping the returned future cancels the search.
    pub async fn search(&self, description: &str, files: &[String]) -> SearchResults {
        let started = Instant::now();

        let fp = fingerprint::fingerprint(description, files);
        if fp.keywords.is_empty() {
            debug!("No significant keywords; skipping prior-art search");
            return SearchResults {
                errors: vec![NO_KEYWORDS_ERROR.to_string()],
                search_duration: started.elapsed(),
                ..Default::default()
            };
        }

        let query_keywords = fingerprint::priority_keywords(&fp.keywords, QUERY_KEYWORD_COUNT);
        let deadline = self.config.source_timeout();

        let git_task = {
            let runner = Arc::clone(&self.runner);
            let keywords = query_keywords.clone();
            let max_commits = self.config.max_commits;
            tokio::spawn(async move {
                match timeout(deadline, git::search_commits(&runner, &keywords, max_commits))
                    .await
                {
                    Ok(Ok(matches)) => SourceOutcome::Git(matches),
                    Ok(Err(e)) => SourceOutcome::Failed(e),
                    Err(_) => SourceOutcome::Failed(format!(
                        "commit search timed out after {}s",
                        deadline.as_secs()
                    )),
                }
            })
        };

        let issue_task = {
            let runner = Arc::clone(&self.runner);
            let keywords = query_keywords.clone();
            let max_issues = self.config.max_issues;
            tokio::spawn(async move {
                // Tracker availability is optional; even a timeout
                // degrades silently.
                match timeout(deadline, issues::search_issues(&runner, &keywords, max_issues))
                    .await
                {
                    Ok(matches) => SourceOutcome::Issues(matches),
                    Err(_) => {
                        debug!("Issue search timed out; skipping");
                        SourceOutcome::Issues(Vec::new())
                    }
                }
            })
        };

        let docs_task = {
            let runner = Arc::clone(&self.runner);
            let working_dir = self.working_dir.clone();
            let keywords = query_keywords.clone();
            let max_matches = self.config.max_doc_matches;
            tokio::spawn(async move {
                match timeout(
                    deadline,
                    docs::search_docs(&runner, &working_dir, &keywords, max_matches),
                )
                .await
                {
                    Ok(Ok(matches)) => SourceOutcome::Docs(matches),
                    Ok(Err(e)) => SourceOutcome::Failed(e),
                    Err(_) => SourceOutcome::Failed(format!(
                        "documentation search timed out after {}s",
                        deadline.as_secs()
                    )),
                }
            })
        };

        let history_task = {
            let store = self.store.clone();
            let fp = fp.clone();
            let config = self.config.clone();
            tokio::spawn(async move {
                let Some(store) = store else {
                    return SourceOutcome::History(Vec::new());
                };
                match timeout(deadline, history::search_history(&store, &fp, &config)).await {
                    Ok(Ok(matches)) => SourceOutcome::History(matches),
                    Ok(Err(e)) => SourceOutcome::Failed(e),
                    Err(_) => SourceOutcome::Failed(format!(
                        "execution-history search timed out after {}s",
                        deadline.as_secs()
                    )),
                }
            })
        };

        let outcomes = join_all([git_task, issue_task, docs_task, history_task]).await;

        let mut results = SearchResults::default();
        for outcome in outcomes {
            match outcome {
                Ok(SourceOutcome::Git(matches)) => results.git_matches = matches,
                Ok(SourceOutcome::Issues(matches)) => results.issue_matches = matches,
                Ok(SourceOutcome::Docs(matches)) => results.doc_matches = matches,
                Ok(SourceOutcome::History(matches)) => results.history_matches = matches,
                Ok(SourceOutcome::Failed(error)) => results.errors.push(error),
                Err(e) => results.errors.push(format!("search source panicked: {}", e)),
            }
        }
        results.search_duration = started.elapsed();

        debug!(
            git = results.git_matches.len(),
            issues = results.issue_matches.len(),
            docs = results.doc_matches.len(),
            history = results.history_matches.len(),
            errors = results.errors.len(),
            duration_ms = results.search_duration.as_millis() as u64,
            "Prior-art search completed"
        );

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DejavuError, Result};
    use async_trait::async_trait;
    use std::os::unix::process::ExitStatusExt;
    use std::process::{ExitStatus, Output};

    fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    /// Canned subprocess responses per program name.
    #[derive(Default)]
    struct StubRunner {
        git: Option<(i32, String, String)>,
        gh: Option<(i32, String, String)>,
        grep: Option<(i32, String, String)>,
        git_delay: Option<Duration>,
    }

    #[async_trait]
    impl CommandRunner for StubRunner {
        async fn run(&self, program: &str, _args: &[&str]) -> Result<Output> {
            let canned = match program {
                "git" => {
                    if let Some(delay) = self.git_delay {
                        tokio::time::sleep(delay).await;
                    }
                    self.git.as_ref()
                }
                "gh" => self.gh.as_ref(),
                "grep" => self.grep.as_ref(),
                _ => None,
            };
            match canned {
                Some((code, stdout, stderr)) => Ok(output(*code, stdout, stderr)),
                None => Err(DejavuError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} not found", program),
                ))),
            }
        }
    }

    const GIT_LOG: &str =
        "4f2a91c8d77e01ab23cd45ef67890badc0ffee00|Add auth service|Alice|2025-11-02\n\nauth.go\n";

    /// Searcher over a fresh working directory (no docs/, no repo).
    fn searcher(runner: StubRunner) -> (PriorArtSearcher, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let searcher = PriorArtSearcher::new(Arc::new(runner), dir.path());
        (searcher, dir)
    }

    #[tokio::test]
    async fn test_empty_description_short_circuits() {
        let (searcher, _dir) = searcher(StubRunner::default());
        let results = searcher.search("", &[]).await;
        assert_eq!(results.errors, vec![NO_KEYWORDS_ERROR.to_string()]);
        assert!(results.git_matches.is_empty());
        assert!(results.issue_matches.is_empty());
        assert!(results.doc_matches.is_empty());
        assert!(results.history_matches.is_empty());
    }

    #[tokio::test]
    async fn test_search_aggregates_available_sources() {
        let runner = StubRunner {
            git: Some((0, GIT_LOG.to_string(), String::new())),
            ..Default::default()
        };
        // gh missing, docs dir absent, no store: all silent.
        let (searcher, _dir) = searcher(runner);
        let results = searcher
            .search("Create user authentication service", &[])
            .await;

        assert_eq!(results.git_matches.len(), 1);
        assert_eq!(results.git_matches[0].hash, "4f2a91c");
        assert!(results.issue_matches.is_empty());
        assert!(results.doc_matches.is_empty());
        assert!(results.history_matches.is_empty());
        assert!(results.errors.is_empty());
    }

    #[tokio::test]
    async fn test_one_failed_source_never_aborts_the_others() {
        let runner = StubRunner {
            git: Some((128, String::new(), "fatal: bad revision".to_string())),
            ..Default::default()
        };
        let (searcher, _dir) = searcher(runner);
        let results = searcher
            .search("Create user authentication service", &[])
            .await;

        assert_eq!(results.errors.len(), 1);
        assert!(results.errors[0].contains("commit search failed"));
        // The other three sources still completed (silently empty).
        assert!(results.issue_matches.is_empty());
        assert!(results.history_matches.is_empty());
    }

    #[tokio::test]
    async fn test_not_a_repository_is_silent() {
        let runner = StubRunner {
            git: Some((128, String::new(), "fatal: not a git repository".to_string())),
            ..Default::default()
        };
        let (searcher, _dir) = searcher(runner);
        let results = searcher
            .search("Create user authentication service", &[])
            .await;
        assert!(results.errors.is_empty());
        assert!(results.git_matches.is_empty());
    }

    #[tokio::test]
    async fn test_slow_source_hits_its_deadline() {
        let runner = StubRunner {
            git: Some((0, GIT_LOG.to_string(), String::new())),
            git_delay: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        let config = SearchConfig {
            source_timeout_secs: 1,
            ..Default::default()
        };
        let dir = tempfile::TempDir::new().unwrap();
        let searcher = PriorArtSearcher::new(Arc::new(runner), dir.path()).with_config(config);

        let started = Instant::now();
        let results = searcher
            .search("Create user authentication service", &[])
            .await;

        assert!(results.errors.iter().any(|e| e.contains("timed out")));
        assert!(results.git_matches.is_empty());
        // Bounded by the per-source deadline, not the stub's sleep.
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_issue_tracker_probe_gates_search() {
        let runner = StubRunner {
            gh: Some((
                0,
                r#"[{"number":9,"title":"Auth rework","state":"OPEN","url":"u"}]"#.to_string(),
                String::new(),
            )),
            ..Default::default()
        };
        let (searcher, _dir) = searcher(runner);
        let results = searcher
            .search("Create user authentication service", &[])
            .await;

        // Probe and list both answered by the stub.
        assert_eq!(results.issue_matches.len(), 1);
        assert_eq!(results.issue_matches[0].number, 9);
        // git was unavailable: recorded, since commit history is a
        // first-class source.
        assert!(results.errors.iter().any(|e| e.contains("commit search")));
    }

    #[tokio::test]
    async fn test_docs_search_runs_when_directory_exists() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();

        let runner = StubRunner {
            grep: Some((
                0,
                "docs/auth.md:3:the authentication service design\n".to_string(),
                String::new(),
            )),
            ..Default::default()
        };
        let searcher = PriorArtSearcher::new(Arc::new(runner), dir.path());
        let results = searcher
            .search("Create user authentication service", &[])
            .await;

        assert_eq!(results.doc_matches.len(), 1);
        assert_eq!(results.doc_matches[0].file, "docs/auth.md");
        assert_eq!(results.doc_matches[0].line, 3);
    }

    #[test]
    fn test_confidence_saturates() {
        let mut results = SearchResults::default();
        assert_eq!(results.confidence(), 0.0);

        results.git_matches = vec![
            CommitMatch {
                hash: "abc1234".into(),
                subject: "s".into(),
                author: "a".into(),
                date: "d".into(),
                files: Vec::new(),
            };
            20
        ];
        assert_eq!(results.confidence(), 1.0);
    }

    #[test]
    fn test_confidence_ignores_issue_matches() {
        let mut results = SearchResults::default();
        results.issue_matches = vec![
            IssueMatch {
                number: 1,
                title: "t".into(),
                state: "OPEN".into(),
                url: "u".into(),
            };
            10
        ];
        assert_eq!(results.confidence(), 0.0);
        assert_eq!(results.total_matches(), 10);
    }
}
