use beacontail::config::{generate::generate_starter_config, load_config, ConfigError};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_generated_config_is_valid() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(&config_path, generate_starter_config()).unwrap();

    let config = load_config(&config_path).expect("Generated config should be valid");

    assert_eq!(config.pipeline.name, "clickstream");
    assert_eq!(
        config.pipeline.log_path,
        Path::new("/var/log/nginx/piwik_access.log")
    );
    assert_eq!(
        config.pipeline.staging_path(),
        Path::new("/var/lib/beacontail/clickstream.tsv")
    );
    assert_eq!(config.clickhouse.url, "http://localhost:8123");
    assert_eq!(config.clickhouse.database, "analytics");
    assert_eq!(config.sites.default, "unknown");
    assert_eq!(config.finalize.tables, vec!["analytics.clickstream"]);
}

#[test]
fn test_missing_file_error_names_the_path() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("absent.yml");

    match load_config(&config_path) {
        Err(ConfigError::Io(e)) => assert!(e.to_string().contains("absent.yml")),
        other => panic!("expected io error, got {:?}", other),
    }
}

#[test]
fn test_yaml_error_names_the_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("broken.yml");
    fs::write(&config_path, "pipeline: [unclosed\n").unwrap();

    let err = load_config(&config_path).unwrap_err();
    assert!(err.to_string().contains("broken.yml"), "{}", err);
}

#[test]
fn test_staging_path_override_and_tilde() {
    let Some(home) = dirs::home_dir() else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    let yaml = generate_starter_config()
        .replace(
            "# staging_path: /var/lib/beacontail/clickstream.tsv",
            "staging_path: ~/stage/clicks.tsv",
        )
        .replace("state_dir: /var/lib/beacontail", "state_dir: ~/beacontail");
    fs::write(&config_path, yaml).unwrap();

    let config = load_config(&config_path).unwrap();
    assert_eq!(config.pipeline.staging_path(), home.join("stage/clicks.tsv"));
    assert_eq!(config.pipeline.lock_path(), home.join("beacontail/clickstream.lock"));
}
