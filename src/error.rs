use thiserror::Error;

#[derive(Error, Debug)]
pub enum DejavuError {
    #[error("Invalid task input: {0}")]
    InvalidInput(String),

    #[error("Pattern store error: {0}")]
    Store(String),

    #[error("Semantic comparator error: {0}")]
    Comparator(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, DejavuError>;

/// Shorthand for store-layer failures wrapping a source error.
pub fn store_err_with(context: &str, err: impl std::fmt::Display) -> DejavuError {
    DejavuError::Store(format!("{}: {}", context, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DejavuError::InvalidInput("task description is empty".into());
        assert_eq!(
            err.to_string(),
            "Invalid task input: task description is empty"
        );
    }

    #[test]
    fn test_store_err_with_includes_context() {
        let err = store_err_with("upsert failed", "disk full");
        assert_eq!(
            err.to_string(),
            "Pattern store error: upsert failed: disk full"
        );
    }
}
