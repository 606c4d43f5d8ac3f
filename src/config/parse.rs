use super::types::*;
use crate::config::{env_var_pattern, expand_env_vars, expand_tilde};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Parse, expand and validate a config document
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string)?;
    expand_paths(&mut config);
    validate_config(&config)?;
    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let mut unexpanded_vars: Vec<String> = env_var_pattern()
        .captures_iter(yaml_string)
        .map(|cap| cap[1].to_string())
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with the actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             Set them or replace the references in the config file",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

/// Expands tilde (~) in all path fields of the config
fn expand_paths(config: &mut Config) {
    let pipeline = &mut config.pipeline;
    pipeline.log_path = expand_tilde(&pipeline.log_path);
    pipeline.state_dir = expand_tilde(&pipeline.state_dir);
    if let Some(staging) = pipeline.staging_path.as_mut() {
        *staging = expand_tilde(staging);
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_pipeline(&config.pipeline, &mut errors);
    validate_clickhouse(&config.clickhouse, &mut errors);

    for (host, site) in &config.sites.hosts {
        if host.trim().is_empty() {
            errors.push("sites.hosts: host name cannot be empty".to_string());
        }
        if site.trim().is_empty() {
            errors.push(format!("sites.hosts.{}: site name cannot be empty", host));
        }
    }

    for (i, table) in config.finalize.tables.iter().enumerate() {
        if table.trim().is_empty() {
            errors.push(format!("finalize.tables[{}]: table name cannot be empty", i));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_pipeline(pipeline: &PipelineConfig, errors: &mut Vec<String>) {
    if pipeline.name.is_empty() {
        errors.push("pipeline.name cannot be empty".to_string());
    } else if !pipeline
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        errors.push(format!(
            "pipeline.name '{}' may only contain letters, digits, '_', '-' and '.'",
            pipeline.name
        ));
    }

    if pipeline.log_path.as_os_str().is_empty() {
        errors.push("pipeline.log_path cannot be empty".to_string());
    }
    if pipeline.state_dir.as_os_str().is_empty() {
        errors.push("pipeline.state_dir cannot be empty".to_string());
    }
    if pipeline.rotation_suffix.is_empty() {
        errors.push("pipeline.rotation_suffix cannot be empty".to_string());
    }
    if !pipeline.beacon_path.starts_with('/') {
        errors.push(format!(
            "pipeline.beacon_path '{}' must start with '/'",
            pipeline.beacon_path
        ));
    }
    if pipeline.table.trim().is_empty() {
        errors.push("pipeline.table cannot be empty".to_string());
    } else if pipeline.table.split('.').count() > 2 {
        errors.push(format!(
            "pipeline.table '{}' must be 'table' or 'database.table'",
            pipeline.table
        ));
    }
}

fn validate_clickhouse(clickhouse: &ClickHouseConfig, errors: &mut Vec<String>) {
    match url::Url::parse(&clickhouse.url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(format!(
            "clickhouse.url: unsupported scheme '{}', expected http or https",
            url.scheme()
        )),
        Err(e) => errors.push(format!("clickhouse.url '{}': {}", clickhouse.url, e)),
    }

    if clickhouse.user.is_empty() {
        errors.push("clickhouse.user cannot be empty".to_string());
    }
    if clickhouse.database.is_empty() {
        errors.push("clickhouse.database cannot be empty".to_string());
    }
    if clickhouse.timeout.is_zero() {
        errors.push("clickhouse.timeout must be greater than zero".to_string());
    }
}
