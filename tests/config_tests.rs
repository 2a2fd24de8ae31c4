use dejavu::config::{DetectionConfig, DetectionMode};

#[test]
fn test_default_config() {
    let config = DetectionConfig::default();

    assert_eq!(config.mode, DetectionMode::Warn);
    assert!((config.similarity_threshold - 0.7).abs() < f64::EPSILON);
    assert!((config.duplicate_threshold - 0.85).abs() < f64::EPSILON);
    assert_eq!(config.max_patterns_per_task, 5);
    assert!(config.enable_stop);
    assert!(config.enable_duplicate_detection);

    assert_eq!(config.search.source_timeout_secs, 5);
    assert!((config.search.history_relevance_threshold - 0.30).abs() < f64::EPSILON);
    assert_eq!(config.search.hash_prefix_len, 8);
    assert_eq!(config.search.max_commits, 10);
    assert_eq!(config.search.max_issues, 5);
    assert_eq!(config.search.max_doc_matches, 10);
}

#[test]
fn test_partial_toml_fills_defaults() {
    let config: DetectionConfig = toml::from_str(
        r#"
        mode = "block"
        duplicate_threshold = 0.9

        [search]
        source_timeout_secs = 10
        "#,
    )
    .unwrap();

    assert_eq!(config.mode, DetectionMode::Block);
    assert!((config.duplicate_threshold - 0.9).abs() < f64::EPSILON);
    assert_eq!(config.search.source_timeout_secs, 10);
    // Untouched fields keep their defaults.
    assert!((config.similarity_threshold - 0.7).abs() < f64::EPSILON);
    assert_eq!(config.search.hash_prefix_len, 8);
}

#[test]
fn test_validation_rejects_bad_values() {
    let config = DetectionConfig {
        duplicate_threshold: 2.0,
        ..Default::default()
    };
    assert!(config.validate().is_err());

    let mut config = DetectionConfig::default();
    config.search.source_timeout_secs = 0;
    assert!(config.validate().is_err());

    let mut config = DetectionConfig::default();
    config.search.hash_prefix_len = 100;
    assert!(config.validate().is_err());
}

#[tokio::test]
async fn test_load_rejects_invalid_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    tokio::fs::write(&path, "max_patterns_per_task = 0\n")
        .await
        .unwrap();

    assert!(DetectionConfig::load(&path).await.is_err());
}
