use docseek::Settings;
use std::env;
use std::fs;
use tempfile::TempDir;

// Env vars are process-wide, so every override is checked in one test.
#[test]
fn test_env_overrides_layer_over_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("settings.toml");
    fs::write(
        &config_path,
        r#"
collection = "from-file"

[indexing]
batch_size = 8

[answer]
max_context_chars = 100
"#,
    )
    .unwrap();

    unsafe {
        env::set_var("DOCSEEK_INDEXING__BATCH_SIZE", "32");
        env::set_var("DOCSEEK_ANSWER__MAX_CONTEXT_CHARS", "2500");
        env::set_var("DOCSEEK_SEMANTIC_SEARCH__THRESHOLD", "0.25");
        env::set_var("EMBEDDING_MODEL", "hashing");
    }

    let settings = Settings::load_from(&config_path).unwrap();

    unsafe {
        env::remove_var("DOCSEEK_INDEXING__BATCH_SIZE");
        env::remove_var("DOCSEEK_ANSWER__MAX_CONTEXT_CHARS");
        env::remove_var("DOCSEEK_SEMANTIC_SEARCH__THRESHOLD");
        env::remove_var("EMBEDDING_MODEL");
    }

    // File value survives where no variable is set
    assert_eq!(settings.collection, "from-file");
    // Double underscore separates nesting, single underscore stays in the field name
    assert_eq!(settings.indexing.batch_size, 32);
    assert_eq!(settings.answer.max_context_chars, 2500);
    assert!((settings.semantic_search.threshold - 0.25).abs() < f32::EPSILON);
    // Bare variable from earlier deployments
    assert_eq!(settings.semantic_search.model, "hashing");
}

#[test]
fn test_missing_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let settings = Settings::load_from(temp_dir.path().join("absent.toml")).unwrap();

    assert_eq!(settings.collection, "documents");
    assert_eq!(settings.loader.excel_max_rows, 1000);
    assert_eq!(
        settings.collection_path(),
        settings.index_path.join("documents")
    );
}

#[test]
fn test_saved_settings_round_trip_through_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("nested/settings.toml");

    let mut settings = Settings::default();
    settings.server.max_results = 7;
    settings.loader.pdf_max_chars = 500;
    settings.save(&config_path).unwrap();

    let loaded = Settings::load_from(&config_path).unwrap();
    assert_eq!(loaded.server.max_results, 7);
    assert_eq!(loaded.loader.pdf_max_chars, 500);
}
