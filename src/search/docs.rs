use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::exec::CommandRunner;
use crate::util::truncate_str;

/// A documentation line matching a query keyword.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocMatch {
    pub file: String,
    pub line: u32,
    pub text: String,
}

/// Case-insensitive text search over `docs/`, restricted to markdown,
/// plain-text, and reStructuredText files. A missing directory or zero
/// matches is not an error; a broken grep run is.
pub(super) async fn search_docs(
    runner: &Arc<dyn CommandRunner>,
    working_dir: &Path,
    keywords: &[String],
    max_matches: usize,
) -> Result<Vec<DocMatch>, String> {
    if !working_dir.join("docs").is_dir() {
        debug!("No docs directory; skipping documentation search");
        return Ok(Vec::new());
    }

    let pattern = keywords.join("|");
    let args = [
        "-r",
        "-i",
        "-n",
        "-E",
        pattern.as_str(),
        "--include=*.md",
        "--include=*.txt",
        "--include=*.rst",
        "docs",
    ];

    let output = runner
        .run("grep", &args)
        .await
        .map_err(|e| format!("documentation search failed to run: {}", e))?;

    match output.status.code() {
        Some(0) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            Ok(parse_grep(&stdout, max_matches))
        }
        // grep exits 1 when nothing matched.
        Some(1) => Ok(Vec::new()),
        _ => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!(
                "documentation search failed: {}",
                truncate_str(stderr.trim(), 200)
            ))
        }
    }
}

/// Parse `path:line:text` output lines, capped at `max_matches`.
fn parse_grep(stdout: &str, max_matches: usize) -> Vec<DocMatch> {
    stdout
        .lines()
        .filter_map(parse_line)
        .take(max_matches)
        .collect()
}

fn parse_line(line: &str) -> Option<DocMatch> {
    let mut parts = line.splitn(3, ':');
    let file = parts.next()?;
    let line_no: u32 = parts.next()?.parse().ok()?;
    let text = parts.next()?;
    Some(DocMatch {
        file: file.to_string(),
        line: line_no,
        text: text.trim().to_string(),
    })
}
