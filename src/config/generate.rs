pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# BEACONTAIL CONFIGURATION
# =============================================================================
# beacontail tails a web-server access log that carries analytics beacons,
# normalizes every hit into the clickstream schema and bulk-loads the result
# into ClickHouse. Each invocation processes the unread backlog and exits;
# schedule it with cron or a systemd timer.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/beacontail/config.yml
#   3. /etc/beacontail/config.yml
#
# Values of the form $env{...} are replaced with environment variables before
# parsing. Unset variables are reported as errors.

# =============================================================================
# PIPELINE
# =============================================================================

pipeline:
  # Identity of this pipeline. Names the lock file and the default staging
  # file, so two pipelines must never share a name.
  name: clickstream

  # JSON access log written by the web server
  log_path: /var/log/nginx/piwik_access.log

  # The rotated predecessor is <log_path><rotation_suffix>
  rotation_suffix: ".1"

  # Checkpoints (<log file name>.offset), locks and staging files live here
  state_dir: /var/lib/beacontail

  # Defaults to <state_dir>/<name>.tsv
  # staging_path: /var/lib/beacontail/clickstream.tsv

  # Requests to any other path are ignored
  beacon_path: /piwik

  # Destination table, optionally qualified with a database
  table: analytics.clickstream

# =============================================================================
# CLICKHOUSE
# =============================================================================

clickhouse:
  url: http://localhost:8123
  user: default
  password: ""
  # Used for table names without a database prefix
  database: analytics
  timeout: 30s
  # Engine settings sent with every bulk import
  settings:
    input_format_allow_errors_ratio: "0.005"

# =============================================================================
# SITES
# =============================================================================
# Maps the host of the tracked page to the short site name stored in each
# row. A host matches itself and all of its subdomains; an "m." prefix marks
# the mobile version of a site.

sites:
  default: unknown
  hosts:
    example.com: example

# =============================================================================
# FINALIZE
# =============================================================================
# Tables compacted by `beacontail finalize` when no tables are given.

finalize:
  tables:
    - analytics.clickstream
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{env_var_pattern, parse_config};

    #[test]
    fn test_starter_config_is_valid() {
        let config = parse_config(&generate_starter_config()).unwrap();
        assert_eq!(config.pipeline.name, "clickstream");
        assert_eq!(config.pipeline.table, "analytics.clickstream");
        assert_eq!(config.sites.hosts.get("example.com").map(String::as_str), Some("example"));
        assert_eq!(config.finalize.tables, vec!["analytics.clickstream".to_string()]);
    }

    #[test]
    fn test_starter_config_has_no_variable_references() {
        // Comments are scanned for unset variables too
        assert!(!env_var_pattern().is_match(&generate_starter_config()));
    }
}
