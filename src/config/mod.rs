//! Detection configuration.
//!
//! Process-wide settings for the detector: decision mode, similarity
//! thresholds, and per-source search limits. Loaded once, read-only
//! thereafter.

mod settings;

pub use settings::{DetectionConfig, DetectionMode, SearchConfig};
