//! Value coercions shared by the row transformer.

use regex::Regex;
use std::sync::OnceLock;

/// Lowercase literals produced by JavaScript trackers for missing values
const JS_NULL_TOKENS: [&str; 2] = ["null", "undefined"];

/// Result of boolean token normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolToken<'a> {
    Flag(u8),
    Other(&'a str),
}

pub fn is_js_null(value: &str) -> bool {
    JS_NULL_TOKENS.contains(&value)
}

/// Trimmed string, or `None` for blank and JavaScript null tokens
pub fn clean_str(value: Option<&str>) -> Option<String> {
    let value = value?;
    if value.is_empty() || is_js_null(value) {
        return None;
    }
    Some(value.trim().to_string())
}

/// Integer parse that never fails; `None` on non-numeric input
pub fn safe_int(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse::<i64>().ok())
}

/// Integer parse defaulting to `default` when absent and to 0 when garbage
pub fn safe_int_or(value: Option<&str>, default: i64) -> i64 {
    match value {
        None => default,
        Some(v) => safe_int(Some(v)).unwrap_or(0),
    }
}

/// Map yes/no style tokens to 1/0, passing anything else through
pub fn normalize_bool(value: &str) -> BoolToken<'_> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "t" | "on" => BoolToken::Flag(1),
        "no" | "false" | "f" | "off" => BoolToken::Flag(0),
        _ => BoolToken::Other(value),
    }
}

pub fn flag(value: bool) -> u8 {
    u8::from(value)
}

/// Flag-like integer (e.g. the "new visitor" marker).
///
/// The safe integer parse runs first, so boolean tokens are garbage and
/// give 0. The parsed integer then goes through boolean normalization,
/// which passes it through unchanged.
pub fn flag_or_int(value: Option<&str>, default: i64) -> i64 {
    let parsed = safe_int_or(value, default);
    match normalize_bool(&parsed.to_string()) {
        BoolToken::Flag(f) => i64::from(f),
        BoolToken::Other(_) => parsed,
    }
}

fn underscore_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("_+").expect("static pattern"))
}

/// Collapse underscore runs in the query part of a URL.
///
/// Upstream escaping turns some characters into underscores; long runs of
/// them break percent-decoding on the ingest side. An empty query part is
/// dropped together with its `?`.
pub fn encode_qs(url: Option<&str>) -> Option<String> {
    let url = url?;
    match url.split_once('?') {
        Some((base, query)) => {
            let query = underscore_runs().replace_all(query, "_");
            if query.is_empty() {
                Some(base.to_string())
            } else {
                Some(format!("{}?{}", base, query))
            }
        }
        None => Some(url.to_string()),
    }
}

/// Comma separated tag list reduced to its nonzero integers
pub fn parse_tags(value: Option<&str>) -> Vec<i64> {
    value
        .map(|v| {
            v.split(',')
                .filter_map(|tag| tag.trim().parse::<i64>().ok())
                .filter(|tag| *tag != 0)
                .collect()
        })
        .unwrap_or_default()
}

/// Page identifier, kept only when it is a nonzero integer
pub fn page_id(value: Option<&str>) -> Option<i64> {
    safe_int(value).filter(|id| *id != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_str() {
        assert_eq!(clean_str(Some("  Home ")), Some("Home".to_string()));
        assert_eq!(clean_str(Some("")), None);
        assert_eq!(clean_str(Some("null")), None);
        assert_eq!(clean_str(Some("undefined")), None);
        assert_eq!(clean_str(None), None);
    }

    #[test]
    fn test_safe_int_defaults() {
        assert_eq!(safe_int(Some(" 42 ")), Some(42));
        assert_eq!(safe_int(Some("4.2")), None);
        assert_eq!(safe_int_or(None, 1), 1);
        assert_eq!(safe_int_or(Some("abc"), 1), 0);
        assert_eq!(safe_int_or(Some("-15"), 0), -15);
    }

    #[test]
    fn test_normalize_bool() {
        assert_eq!(normalize_bool("Yes"), BoolToken::Flag(1));
        assert_eq!(normalize_bool("on"), BoolToken::Flag(1));
        assert_eq!(normalize_bool("F"), BoolToken::Flag(0));
        assert_eq!(normalize_bool("off"), BoolToken::Flag(0));
        assert_eq!(normalize_bool("maybe"), BoolToken::Other("maybe"));
        assert_eq!(flag(true), 1);
        assert_eq!(flag(false), 0);
    }

    #[test]
    fn test_flag_or_int() {
        assert_eq!(flag_or_int(None, 1), 1);
        assert_eq!(flag_or_int(Some("0"), 1), 0);
        assert_eq!(flag_or_int(Some("3"), 1), 3);
        assert_eq!(flag_or_int(Some("junk"), 1), 0);
    }

    #[test]
    fn test_flag_or_int_parses_before_boolean_tokens() {
        assert_eq!(flag_or_int(Some("true"), 1), 0);
        assert_eq!(flag_or_int(Some("yes"), 1), 0);
        assert_eq!(flag_or_int(Some("off"), 1), 0);
    }

    #[test]
    fn test_encode_qs() {
        assert_eq!(
            encode_qs(Some("https://example.com/a?utm___source=x__y")),
            Some("https://example.com/a?utm_source=x_y".to_string())
        );
        assert_eq!(
            encode_qs(Some("https://example.com/a?")),
            Some("https://example.com/a".to_string())
        );
        assert_eq!(
            encode_qs(Some("https://example.com/snake__case")),
            Some("https://example.com/snake__case".to_string())
        );
        assert_eq!(encode_qs(None), None);
    }

    #[test]
    fn test_tags_and_page_id() {
        assert_eq!(parse_tags(Some("1,0,abc, 7")), vec![1, 7]);
        assert!(parse_tags(Some("0,x")).is_empty());
        assert!(parse_tags(None).is_empty());
        assert_eq!(page_id(Some("15")), Some(15));
        assert_eq!(page_id(Some("0")), None);
        assert_eq!(page_id(Some("x")), None);
    }
}
