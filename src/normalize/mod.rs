pub mod agent;
pub mod coerce;
pub mod envelope;
pub mod query;
pub mod row;
pub mod site;
pub mod timestamp;
pub mod transform;

pub use agent::{DetectedAgent, PatternDetector, Software, UserAgentDetector};
pub use envelope::{RawRecord, RequestLine};
pub use query::{ParamValue, QueryParams};
pub use row::{Cell, NormalizedRow, COLUMNS};
pub use site::SiteResolver;

use crate::config::types::Config;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("invalid JSON envelope: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("request line '{0}' is not 'METHOD TARGET VERSION'")]
    InvalidRequestLine(String),

    #[error("invalid event time: {0}")]
    InvalidTime(#[from] timestamp::TimestampError),
}

/// Turns raw access-log lines into clickstream rows
pub struct Normalizer {
    beacon_path: String,
    sites: SiteResolver,
    detector: Box<dyn UserAgentDetector>,
}

impl Normalizer {
    pub fn new(
        beacon_path: impl Into<String>,
        sites: SiteResolver,
        detector: Box<dyn UserAgentDetector>,
    ) -> Self {
        Self {
            beacon_path: beacon_path.into(),
            sites,
            detector,
        }
    }

    /// Normalizer with the built-in user-agent detector
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.pipeline.beacon_path.clone(),
            SiteResolver::new(&config.sites),
            Box::new(PatternDetector::new()),
        )
    }

    /// Rows for one log line.
    ///
    /// Lines for other endpoints and methods other than GET and POST give
    /// no rows. Batched POST bodies give one row per entry.
    pub fn normalize(&self, line: &str) -> Result<Vec<NormalizedRow>, NormalizeError> {
        let record: RawRecord = serde_json::from_str(line)?;
        let request = RequestLine::parse(&record.request)
            .ok_or_else(|| NormalizeError::InvalidRequestLine(record.request.clone()))?;

        if request.path != self.beacon_path {
            debug!(path = request.path, "Ignoring request outside the beacon endpoint");
            return Ok(Vec::new());
        }

        let params = match request.method {
            "GET" => vec![QueryParams::parse(request.query)],
            "POST" => envelope::post_params(record.body.as_deref().unwrap_or("")),
            other => {
                debug!(method = other, "Ignoring unsupported method");
                return Ok(Vec::new());
            }
        };

        let event_time = timestamp::format_canonical(&timestamp::parse_event_time(&record.time)?);
        Ok(params
            .iter()
            .map(|p| {
                transform::convert(&record, p, &event_time, &self.sites, self.detector.as_ref())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::SitesConfig;
    use std::collections::HashMap;

    fn normalizer() -> Normalizer {
        let sites = SiteResolver::new(&SitesConfig {
            default: "unknown".to_string(),
            hosts: HashMap::from([("example.com".to_string(), "example".to_string())]),
        });
        Normalizer::new("/piwik", sites, Box::new(PatternDetector::new()))
    }

    fn line(request: &str, body: Option<&str>) -> String {
        serde_json::json!({
            "time": "2025-12-04T02:42:11+03:00",
            "request": request,
            "body": body,
            "ip": "198.51.100.4",
            "country": "DE",
            "city": "Berlin",
            "user_agent": "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0.0.0 Safari/537.36",
        })
        .to_string()
    }

    #[test]
    fn test_get_beacon() {
        let rows = normalizer()
            .normalize(&line(
                "GET /piwik?action_name=Home&url=https%3A%2F%2Fm.example.com%2F HTTP/1.1",
                None,
            ))
            .unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.event_time, "2025-12-04 02:42:11");
        assert_eq!(row.site, "example");
        assert_eq!(row.is_mobile, 1);
        assert_eq!(row.user_browser_name.as_deref(), Some("Chrome"));
        assert_eq!(row.user_os_name.as_deref(), Some("Windows"));
        assert_eq!(row.user_is_pc, 1);
        assert_eq!(row.user_city.as_deref(), Some("Berlin"));
    }

    #[test]
    fn test_other_paths_and_methods_are_ignored() {
        let n = normalizer();
        assert!(n.normalize(&line("GET /favicon.ico HTTP/1.1", None)).unwrap().is_empty());
        assert!(n.normalize(&line("HEAD /piwik?a=1 HTTP/1.1", None)).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_records() {
        let n = normalizer();
        assert!(matches!(n.normalize("not json"), Err(NormalizeError::InvalidJson(_))));
        assert!(matches!(
            n.normalize(&line("GET /piwik", None)),
            Err(NormalizeError::InvalidRequestLine(_))
        ));

        let bad_time = line("GET /piwik?a=1 HTTP/1.1", None).replace("2025-12-04T02:42:11+03:00", "later");
        assert!(matches!(n.normalize(&bad_time), Err(NormalizeError::InvalidTime(_))));
    }

    #[test]
    fn test_post_requests_batch() {
        let body = r#"{"requests":["?action_name=first","?action_name=second"]}"#;
        let rows = normalizer()
            .normalize(&line("POST /piwik HTTP/1.1", Some(body)))
            .unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.action_name.as_deref()).collect();
        assert_eq!(names, vec![Some("first"), Some("second")]);
    }

    #[test]
    fn test_post_without_body_gives_one_empty_row() {
        let rows = normalizer().normalize(&line("POST /piwik HTTP/1.1", None)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].site, "unknown");
    }
}
