//! dejavu: prior-art and duplicate-work detection.
//!
//! Before an agent is dispatched, the detector answers: has equivalent
//! work already been done, and should this task be skipped, flagged,
//! or allowed to proceed? Evidence comes from four independent sources
//! (commit history, the issue tracker, documentation, and the store of
//! previously completed tasks), each of which may be missing or broken
//! without failing the check.

pub mod check;
pub mod config;
pub mod error;
pub mod exec;
pub mod fingerprint;
pub mod pattern;
pub mod search;
pub mod util;

pub use check::{CheckResult, Complexity, StopReport, TaskCheck, TaskChecker};
pub use config::{DetectionConfig, DetectionMode, SearchConfig};
pub use error::{DejavuError, Result};
pub use exec::{CommandRunner, SystemRunner};
pub use fingerprint::{
    compare_tasks, extract_keywords, fingerprint, jaccard_similarity, normalize, Fingerprint,
};
pub use pattern::{
    AgentRecommendation, DuplicateResult, MemoryPatternStore, NewPattern, PatternLibrary,
    PatternStore, Recommendation, SemanticComparator, SimilarPattern, SqlitePatternStore,
    StoredPattern,
};
pub use search::{CommitMatch, DocMatch, HistoryMatch, IssueMatch, PriorArtSearcher, SearchResults};
