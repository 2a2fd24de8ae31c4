//! Pattern library: storage and retrieval of successful task
//! executions.
//!
//! Provides the duplicate/similarity verdicts and agent
//! recommendations:
//! - `PatternLibrary`: read/write owner of the store, duplicate checks
//! - `PatternStore`: persistence port with memory and sqlite backends
//! - `SemanticComparator`: optional external similarity scorer

mod comparator;
mod library;
mod store;

pub use comparator::{Comparison, SemanticComparator};
pub use library::{
    AgentRecommendation, DuplicateResult, PatternLibrary, Recommendation, SimilarPattern,
};
pub use store::{
    MemoryPatternStore, NewPattern, PatternStore, SqlitePatternStore, StoredPattern,
    META_KEYWORDS, META_NORMALIZED_HASH,
};
