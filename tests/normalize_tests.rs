use beacontail::config::types::SitesConfig;
use beacontail::normalize::{Cell, NormalizedRow, Normalizer, PatternDetector, SiteResolver, COLUMNS};
use beacontail::storage::staging::render;
use serde_json::json;
use std::collections::HashMap;

fn normalizer() -> Normalizer {
    let sites = SiteResolver::new(&SitesConfig {
        default: "unknown".to_string(),
        hosts: HashMap::from([("example.com".to_string(), "example".to_string())]),
    });
    Normalizer::new("/piwik", sites, Box::new(PatternDetector::new()))
}

fn record(request: &str, body: Option<&str>) -> String {
    json!({
        "time": "04/Dec/2025:02:42:11 +0100",
        "request": request,
        "body": body,
        "ip": "192.0.2.44",
        "country": "FR",
        "city": "Lyon",
        "user_agent": "Mozilla/5.0 (Linux; Android 14; SM-S918B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
    })
    .to_string()
}

fn column<'a>(row: &'a NormalizedRow, name: &str) -> Cell<'a> {
    let index = COLUMNS.iter().position(|c| *c == name).unwrap();
    row.cells().swap_remove(index)
}

#[test]
fn test_get_requests_yield_one_complete_row() {
    let queries = [
        "action_name=Home",
        "",
        "url=https%3A%2F%2Fwww.example.com%2Fnews%3Fa%3D1&_id=abc&pv_id=x1&res=390x844",
        "e_c=video&e_a=play&e_n=trailer&e_v=3&ping=1&gt_ms=55",
        "cvar=%7B%221%22%3A%5B%22page_tags%22%2C%222%2C3%22%5D%7D&_idts=1733280131&_idn=0",
    ];

    for query in queries {
        let rows = normalizer()
            .normalize(&record(&format!("GET /piwik?{} HTTP/1.1", query), None))
            .unwrap();
        assert_eq!(rows.len(), 1, "query {:?}", query);

        let cells = rows[0].cells();
        assert_eq!(cells.len(), COLUMNS.len());
        let rendered: Vec<String> = cells.iter().map(render).collect();
        assert!(rendered.iter().all(|v| !v.contains('\t') && !v.contains('\n')));
    }
}

#[test]
fn test_auto_click_repurposes_event_value() {
    let rows = normalizer()
        .normalize(&record(
            "GET /piwik?action_name=Home&e_c=auto-click&e_v=42&pv_id=99 HTTP/1.1",
            None,
        ))
        .unwrap();
    let row = &rows[0];
    assert_eq!(row.action_name.as_deref(), Some("Home"));
    assert_eq!(row.event_category.as_deref(), Some("auto-click"));
    assert_eq!(row.pageview_id.as_deref(), Some("42"));
    assert_eq!(row.event_value.as_deref(), Some("click"));
}

#[test]
fn test_mobile_platform_and_geo() {
    let rows = normalizer()
        .normalize(&record("GET /piwik?url=https%3A%2F%2Fm.example.com%2F HTTP/1.1", None))
        .unwrap();
    let row = &rows[0];
    assert_eq!(row.event_time, "2025-12-04 02:42:11");
    assert_eq!((row.site.as_str(), row.is_mobile), ("example", 1));
    assert_eq!(row.user_os_name.as_deref(), Some("Android"));
    assert_eq!((row.user_is_mobile, row.user_is_pc), (1, 0));
    assert_eq!(row.user_ip, "192.0.2.44");
    assert_eq!(row.user_city.as_deref(), Some("Lyon"));
    assert_eq!(row.user_device_brand, None);
}

#[test]
fn test_requests_array_gives_rows_in_order() {
    let body = r#"{\x22requests\x22:[\x22?action_name=one&pv_id=1\x22,\x22?action_name=two&pv_id=2\x22,\x22?action_name=three&pv_id=3\x22]}"#;
    let rows = normalizer()
        .normalize(&record("POST /piwik HTTP/1.1", Some(body)))
        .unwrap();

    let ids: Vec<_> = rows.iter().map(|r| r.pageview_id.clone().unwrap()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
}

#[test]
fn test_impressions_share_base_and_take_one_overlay_each() {
    let body = json!({
        "request": "action_name=Catalog&url=https%3A%2F%2Fexample.com%2Fshop&pv_id=base",
        "impressions": [
            { "c_n": "banner-1", "c_p": "hero" },
            { "c_n": "banner-2", "c_p": "sidebar" },
        ],
    })
    .to_string();
    let rows = normalizer()
        .normalize(&record("POST /piwik HTTP/1.1", Some(&body)))
        .unwrap();

    assert_eq!(rows.len(), 2);
    for (row, (label, name)) in rows.iter().zip([("banner-1", "hero"), ("banner-2", "sidebar")]) {
        assert_eq!(row.action_name.as_deref(), Some("Catalog"));
        assert_eq!(row.url.as_deref(), Some("https://example.com/shop"));
        assert_eq!(row.pageview_id.as_deref(), Some("base"));
        assert_eq!(row.event_category.as_deref(), Some("auto-view"));
        assert_eq!(row.event_label.as_deref(), Some(label));
        assert_eq!(row.event_name.as_deref(), Some(name));
        assert_eq!(row.event_value.as_deref(), Some("view"));
    }
}

#[test]
fn test_impressions_take_priority_over_raw_query_string() {
    // A JSON body is never read as a query string when it has impressions
    let body = json!({ "request": "action_name=x", "impressions": [] }).to_string();
    let rows = normalizer()
        .normalize(&record("POST /piwik HTTP/1.1", Some(&body)))
        .unwrap();
    assert!(rows.is_empty());
}

#[test]
fn test_null_tokens_are_canonical_nulls() {
    let query = "action_name=undefined&_id=null&pv_id=undefined&e_c=null&e_n=undefined&res=null&link=undefined&urlref=null&_ref=undefined";
    let rows = normalizer()
        .normalize(&record(&format!("GET /piwik?{} HTTP/1.1", query), None))
        .unwrap();
    let row = &rows[0];

    for name in [
        "action_name",
        "piwik_id",
        "pageview_id",
        "event_category",
        "event_name",
        "user_browser_resolution",
        "link",
        "referrer",
        "source",
    ] {
        assert_eq!(column(row, name), Cell::Null, "column {}", name);
    }
    assert_eq!(render(&column(row, "page_tags")), "[]");
    assert_eq!(render(&column(row, "mvt.name")), "[]");
}

#[test]
fn test_malformed_lines_are_errors_not_panics() {
    let n = normalizer();
    for line in ["", "{", "[]", r#"{"time":"x"}"#, r#"{"time":"2025-01-01 00:00:00","request":"GET"}"#] {
        assert!(n.normalize(line).is_err(), "line {:?}", line);
    }
}
