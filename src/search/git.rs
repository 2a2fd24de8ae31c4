use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::exec::CommandRunner;
use crate::util::truncate_str;

const SHORT_HASH_LEN: usize = 7;

/// A commit whose subject matched the query keywords.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitMatch {
    /// Short (7-char) commit hash.
    pub hash: String,
    pub subject: String,
    pub author: String,
    pub date: String,
    /// Files touched by the commit, as reported by `--name-only`.
    pub files: Vec<String>,
}

/// Search commit history across all branches for subjects matching any
/// query keyword. A working directory that is not a repository yields
/// empty: absent history is not an error. Other failures are.
pub(super) async fn search_commits(
    runner: &Arc<dyn CommandRunner>,
    keywords: &[String],
    max_commits: usize,
) -> Result<Vec<CommitMatch>, String> {
    // Basic-regex OR over the keywords, case-insensitive.
    let grep = format!("--grep={}", keywords.join("\\|"));
    let limit = max_commits.to_string();
    let args = [
        "log",
        "--all",
        "--name-only",
        grep.as_str(),
        "--format=%H|%s|%an|%ai",
        "-n",
        limit.as_str(),
        "--regexp-ignore-case",
    ];

    let output = runner
        .run("git", &args)
        .await
        .map_err(|e| format!("commit search failed to run: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.to_lowercase().contains("not a git repository") {
            debug!("Not a git repository; skipping commit search");
            return Ok(Vec::new());
        }
        return Err(format!(
            "commit search failed: {}",
            truncate_str(stderr.trim(), 200)
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_log(&stdout, max_commits))
}

/// Parse `git log --name-only --format=%H|%s|%an|%ai` output. Commit
/// lines carry three pipe separators; the plain lines that follow each
/// one are the commit's touched files.
fn parse_log(stdout: &str, max_commits: usize) -> Vec<CommitMatch> {
    let mut matches: Vec<CommitMatch> = Vec::new();

    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(commit) = parse_commit_line(line) {
            if matches.len() == max_commits {
                break;
            }
            matches.push(commit);
        } else if let Some(current) = matches.last_mut() {
            current.files.push(line.to_string());
        }
    }

    matches
}

fn parse_commit_line(line: &str) -> Option<CommitMatch> {
    let mut parts = line.splitn(4, '|');
    let hash = parts.next()?;
    let subject = parts.next()?;
    let author = parts.next()?;
    let date = parts.next()?;

    if hash.len() < SHORT_HASH_LEN || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    Some(CommitMatch {
        hash: hash[..SHORT_HASH_LEN].to_string(),
        subject: subject.to_string(),
        author: author.to_string(),
        date: date.to_string(),
        files: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LOG: &str = "\
4f2a91c8d77e01ab23cd45ef67890badc0ffee00|Add user auth service|Alice|2025-11-02 10:15:00 +0900

auth/service.go
auth/service_test.go

9b8c7d6e5f4a3b2c1d0e9f8a7b6c5d4e3f2a1b0c|Fix login token expiry|Bob|2025-10-28 17:40:00 +0900

auth/token.go
";

    #[test]
    fn test_parse_log_commits_and_files() {
        let matches = parse_log(SAMPLE_LOG, 10);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].hash, "4f2a91c");
        assert_eq!(matches[0].subject, "Add user auth service");
        assert_eq!(matches[0].author, "Alice");
        assert_eq!(
            matches[0].files,
            vec!["auth/service.go", "auth/service_test.go"]
        );
        assert_eq!(matches[1].hash, "9b8c7d6");
        assert_eq!(matches[1].files, vec!["auth/token.go"]);
    }

    #[test]
    fn test_parse_log_respects_cap() {
        let matches = parse_log(SAMPLE_LOG, 1);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].hash, "4f2a91c");
    }

    #[test]
    fn test_parse_log_ignores_stray_file_lines() {
        let matches = parse_log("orphan.go\nnot|a|commit\n", 10);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_parse_commit_line_extra_pipes_fold_into_date() {
        // Only the first three separators split; later pipes survive.
        let commit =
            parse_commit_line("4f2a91c8d77e01ab23cd45ef67890badc0ffee00|a|b|c|d 2025").unwrap();
        assert_eq!(commit.subject, "a");
        assert_eq!(commit.date, "c|d 2025");
    }
}
