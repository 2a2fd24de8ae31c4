//! Concurrent prior-art search.
//!
//! Four independent evidence sources answer "has equivalent work
//! already been done?":
//! - **Commit history**: `git log --grep` across all branches
//! - **Issue tracker**: `gh issue list` when the CLI is available
//! - **Documentation**: text search over `docs/`
//! - **Execution history**: the pattern store of completed tasks
//!
//! Each source runs under its own deadline; any source may be missing
//! or broken without failing the overall search.

mod docs;
mod git;
mod history;
mod issues;
mod searcher;

pub use docs::DocMatch;
pub use git::CommitMatch;
pub use history::HistoryMatch;
pub use issues::IssueMatch;
pub use searcher::{PriorArtSearcher, SearchResults};
