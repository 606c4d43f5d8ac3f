use super::query::QueryParams;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// One access-log line as written by the web server's JSON log format
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    pub time: String,
    pub request: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// `METHOD TARGET VERSION` split of the request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a str,
}

impl<'a> RequestLine<'a> {
    pub fn parse(request: &'a str) -> Option<Self> {
        let mut parts = request.split(' ');
        let (method, target, _version) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        let path = path.split_once('#').map_or(path, |(p, _)| p);
        Some(Self {
            method,
            path,
            query,
        })
    }
}

/// Undo nginx log escaping of a request body.
///
/// `\xHH` becomes the raw byte, the usual single-character escapes become
/// their characters, and the resulting bytes are read as UTF-8 with
/// replacement of invalid sequences.
pub fn unescape_body(body: &str) -> String {
    let bytes = body.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 == bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        match bytes[i + 1] {
            b'x' => match body.get(i + 2..i + 4).and_then(|h| u8::from_str_radix(h, 16).ok()) {
                Some(byte) => {
                    out.push(byte);
                    i += 4;
                }
                None => {
                    out.extend_from_slice(b"\\x");
                    i += 2;
                }
            },
            escaped => {
                let replacement = match escaped {
                    b'n' => Some(b'\n'),
                    b't' => Some(b'\t'),
                    b'r' => Some(b'\r'),
                    b'b' => Some(0x08),
                    b'f' => Some(0x0c),
                    b'\\' => Some(b'\\'),
                    b'"' => Some(b'"'),
                    b'\'' => Some(b'\''),
                    _ => None,
                };
                match replacement {
                    Some(byte) => out.push(byte),
                    None => out.extend_from_slice(&[b'\\', escaped]),
                }
                i += 2;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Parameter sets carried by a POST body, one per output row.
///
/// Recognised layouts, in order: a `requests` array of query strings, a
/// `request` query string with an `impressions` array of overlays, and
/// finally the whole body as one query string.
pub fn post_params(body: &str) -> Vec<QueryParams> {
    let payload = unescape_body(body);

    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(&payload) {
        if let Some(Value::Array(requests)) = object.get("requests") {
            return requests
                .iter()
                .filter_map(|entry| match entry {
                    Value::String(fragment) => {
                        Some(QueryParams::parse(fragment.strip_prefix('?').unwrap_or(fragment)))
                    }
                    other => {
                        warn!(entry = %other, "Skipping non-string entry in batched requests");
                        None
                    }
                })
                .collect();
        }

        if let (Some(request), Some(Value::Array(impressions))) =
            (object.get("request"), object.get("impressions"))
        {
            let base = match request {
                Value::String(query) => QueryParams::parse(query),
                other => {
                    warn!(request = %other, "Dropping impressions payload with non-string request");
                    return Vec::new();
                }
            };
            return impressions
                .iter()
                .filter_map(|impression| match impression {
                    Value::Object(overlay) => Some(base.with_overlay(overlay)),
                    other => {
                        warn!(impression = %other, "Skipping non-object impression");
                        None
                    }
                })
                .collect();
        }
    }

    vec![QueryParams::parse(&payload)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_line() {
        let line = RequestLine::parse("GET /piwik?a=1&b=2 HTTP/1.1").unwrap();
        assert_eq!(line.method, "GET");
        assert_eq!(line.path, "/piwik");
        assert_eq!(line.query, "a=1&b=2");

        let bare = RequestLine::parse("POST /piwik HTTP/2.0").unwrap();
        assert_eq!(bare.query, "");
    }

    #[test]
    fn test_request_line_needs_three_parts() {
        assert!(RequestLine::parse("GET /piwik").is_none());
        assert!(RequestLine::parse("GET /piwik HTTP/1.1 extra").is_none());
        assert!(RequestLine::parse("").is_none());
    }

    #[test]
    fn test_unescape_body() {
        assert_eq!(unescape_body(r#"{\x22a\x22:1}"#), r#"{"a":1}"#);
        assert_eq!(unescape_body(r"line\nnext\ttab\\"), "line\nnext\ttab\\");
        assert_eq!(unescape_body(r"caf\xC3\xA9"), "café");
        assert_eq!(unescape_body(r"\xZZ\q"), r"\xZZ\q");
        assert_eq!(unescape_body("trailing\\"), "trailing\\");
    }

    #[test]
    fn test_requests_array_in_order() {
        let body = r#"{\x22requests\x22:[\x22?action_name=a\x22,\x22action_name=b\x22,7]}"#;
        let params = post_params(body);
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].get("action_name"), Some("a"));
        assert_eq!(params[1].get("action_name"), Some("b"));
    }

    #[test]
    fn test_impressions_overlay() {
        let body = r#"{"request":"url=https://example.com/&c_n=base","impressions":[{"c_n":"one"},{"c_p":"two","url":null}]}"#;
        let params = post_params(body);
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].get("c_n"), Some("one"));
        assert_eq!(params[0].get("url"), Some("https://example.com/"));
        assert_eq!(params[1].get("c_n"), Some("base"));
        assert_eq!(params[1].get("c_p"), Some("two"));
        assert!(params[1].contains("url"));
        assert_eq!(params[1].get("url"), None);
    }

    #[test]
    fn test_impressions_with_non_string_request_are_dropped() {
        let body = r#"{"request":5,"impressions":[{"c_n":"one"}]}"#;
        assert!(post_params(body).is_empty());
    }

    #[test]
    fn test_raw_query_string_fallback() {
        let params = post_params("action_name=Home&ping=1");
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].get("action_name"), Some("Home"));

        let unrelated = post_params(r#"{"other":1}"#);
        assert_eq!(unrelated.len(), 1);
    }
}
