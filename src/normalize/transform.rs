use super::agent::{DetectedAgent, UserAgentDetector};
use super::coerce::{clean_str, encode_qs, flag, flag_or_int, page_id, parse_tags, safe_int_or};
use super::envelope::RawRecord;
use super::query::QueryParams;
use super::row::NormalizedRow;
use super::site::SiteResolver;
use super::timestamp::epoch_to_canonical;
use serde_json::{Map, Value};
use tracing::debug;

/// Platform names counted as desktop; everything else is mobile
const DESKTOP_PLATFORMS: [&str; 5] = ["Linux", "ChromeOS", "Mac OS", "PlayStation", "Windows"];

const AUTO_CLICK: &str = "auto-click";
const AUTO_VIEW: &str = "auto-view";

/// Page-level custom variables recognised inside `cvar`
#[derive(Debug, Default, PartialEq, Eq)]
struct CustomVars {
    page_type: Option<String>,
    page_id: Option<String>,
    page_section: Option<String>,
    page_tags: Option<String>,
    mvt_name: Vec<String>,
    mvt_value: Vec<String>,
}

impl CustomVars {
    /// `cvar` is a JSON object of numbered slots holding `[key, value]`
    fn parse(raw: Option<&str>) -> Self {
        let mut vars = Self::default();
        let slots = match raw.map(serde_json::from_str::<Map<String, Value>>) {
            Some(Ok(slots)) => slots,
            Some(Err(e)) => {
                debug!(error = %e, "Ignoring malformed cvar");
                return vars;
            }
            None => return vars,
        };

        for slot in slots.values() {
            let (key, value) = match slot.as_array().map(Vec::as_slice) {
                Some([Value::String(key), value]) => (key.as_str(), value),
                _ => continue,
            };
            match key {
                "page_type" => vars.page_type = scalar(value),
                "page_id" => vars.page_id = scalar(value),
                "page_section" => vars.page_section = scalar(value),
                "page_tags" => vars.page_tags = scalar(value),
                "mvt.name" => vars.mvt_name = string_list(value),
                "mvt.value" => vars.mvt_value = string_list(value),
                _ => {}
            }
        }
        vars
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => clean_str(Some(s)),
        other => clean_str(Some(&other.to_string())),
    }
}

/// `mvt.*` values are JSON arrays encoded as strings
fn string_list(value: &Value) -> Vec<String> {
    let items = match value {
        Value::String(encoded) => match serde_json::from_str::<Vec<Value>>(encoded) {
            Ok(items) => items,
            Err(_) => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect()
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

fn is_mobile_platform(agent: &DetectedAgent) -> bool {
    agent
        .platform
        .as_ref()
        .is_some_and(|p| !DESKTOP_PLATFORMS.contains(&p.name.as_str()))
}

/// Build the output row for one parameter set of a record.
///
/// Pure apart from the detector call; `event_time` is the record's time
/// already in canonical form.
pub fn convert(
    record: &RawRecord,
    params: &QueryParams,
    event_time: &str,
    sites: &SiteResolver,
    detector: &dyn UserAgentDetector,
) -> NormalizedRow {
    let (site, is_mobile) = sites.resolve(params.get("url"));
    let agent = detector.detect(record.user_agent.as_deref().unwrap_or(""));
    // An undetected platform counts as desktop, matching the historical data
    let mobile_platform = is_mobile_platform(&agent);
    let (browser, platform) = (agent.browser.as_ref(), agent.platform.as_ref());
    let cvar = CustomVars::parse(params.get("cvar"));

    let mut row = NormalizedRow {
        event_time: event_time.to_string(),
        site,
        is_mobile,
        url: encode_qs(params.get("url")),
        action_name: owned(params.get("action_name")),
        pageview_id: owned(params.get("pv_id")),
        ping: safe_int_or(params.get("ping"), 0),
        generation_speed: safe_int_or(params.get("gt_ms"), 0).saturating_abs(),
        piwik_id: owned(params.get("_id")),
        suid: owned(params.get("dimension1")),
        suida: owned(params.get("dimension2")),
        first_visit_time: epoch_to_canonical(params.get("_idts")),
        last_visit_time: epoch_to_canonical(params.get("_viewts")),
        visit_count: safe_int_or(params.get("_idvc"), 0),
        new_visitor: flag_or_int(params.get("_idn"), 1),
        user_ip: record.ip.clone().unwrap_or_default(),
        user_country: record.country.clone(),
        user_city: record.city.clone(),
        user_device_brand: None,
        user_device_model: None,
        user_os_name: clean_str(platform.map(|p| p.name.as_str())),
        user_os_version: clean_str(platform.and_then(|p| p.version.as_deref())),
        user_browser_name: clean_str(browser.map(|b| b.name.as_str())),
        user_browser_version: clean_str(browser.and_then(|b| b.version.as_deref())),
        user_browser_resolution: owned(params.get("res")),
        user_is_mobile: flag(mobile_platform),
        user_is_pc: flag(!mobile_platform),
        user_is_tablet: 0,
        user_is_touch: 0,
        user_is_bot: flag(agent.bot),
        source: encode_qs(params.get("_ref")),
        referrer: encode_qs(params.get("urlref")),
        referrer_time: epoch_to_canonical(params.get("_refts")),
        page_type: cvar.page_type,
        page_id: page_id(cvar.page_id.as_deref()),
        page_section: cvar.page_section,
        page_tags: parse_tags(cvar.page_tags.as_deref()),
        link: owned(params.get("link").or_else(|| params.get("download"))),
        event_category: owned(params.get("e_c")),
        event_name: owned(params.get("e_n")),
        event_value: owned(params.get("e_v")),
        event_label: owned(params.get("e_a")),
        mvt_name: cvar.mvt_name,
        mvt_value: cvar.mvt_value,
    };

    if row.event_category.as_deref() == Some(AUTO_CLICK) {
        row.pageview_id = row.event_value.take();
        row.event_value = Some("click".to_string());
    }

    // Content tracking runs last and overrides any click aliasing
    if params.contains("c_n") || params.contains("c_p") {
        row.event_category = Some(AUTO_VIEW.to_string());
        row.event_label = owned(params.get("c_n"));
        row.event_name = owned(params.get("c_p"));
        row.event_value = Some("view".to_string());
    }

    row.scrub_null_tokens();
    row
}
