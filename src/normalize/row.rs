use super::coerce::is_js_null;

/// Output columns in serialization order
pub const COLUMNS: [&str; 44] = [
    "event_time",
    "site",
    "is_mobile",
    "url",
    "action_name",
    "pageview_id",
    "ping",
    "generation_speed",
    "piwik_id",
    "suid",
    "suida",
    "first_visit_time",
    "last_visit_time",
    "visit_count",
    "new_visitor",
    "user_ip",
    "user_country",
    "user_city",
    "user_device_brand",
    "user_device_model",
    "user_os_name",
    "user_os_version",
    "user_browser_name",
    "user_browser_version",
    "user_browser_resolution",
    "user_is_mobile",
    "user_is_pc",
    "user_is_tablet",
    "user_is_touch",
    "user_is_bot",
    "source",
    "referrer",
    "referrer_time",
    "page_type",
    "page_id",
    "page_section",
    "page_tags",
    "link",
    "event_category",
    "event_name",
    "event_value",
    "event_label",
    "mvt.name",
    "mvt.value",
];

/// A single serialized value of a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell<'a> {
    Null,
    Text(&'a str),
    Int(i64),
    IntArray(&'a [i64]),
    TextArray(&'a [String]),
}

impl<'a> From<&'a Option<String>> for Cell<'a> {
    fn from(value: &'a Option<String>) -> Self {
        match value {
            Some(v) => Cell::Text(v),
            None => Cell::Null,
        }
    }
}

/// One beacon hit in the shape of the clickstream table.
///
/// Every column is represented; `None` and empty arrays are the column's
/// null form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedRow {
    pub event_time: String,
    pub site: String,
    pub is_mobile: u8,
    pub url: Option<String>,
    pub action_name: Option<String>,
    pub pageview_id: Option<String>,
    pub ping: i64,
    pub generation_speed: i64,
    pub piwik_id: Option<String>,
    pub suid: Option<String>,
    pub suida: Option<String>,
    pub first_visit_time: Option<String>,
    pub last_visit_time: Option<String>,
    pub visit_count: i64,
    pub new_visitor: i64,
    pub user_ip: String,
    pub user_country: Option<String>,
    pub user_city: Option<String>,
    pub user_device_brand: Option<String>,
    pub user_device_model: Option<String>,
    pub user_os_name: Option<String>,
    pub user_os_version: Option<String>,
    pub user_browser_name: Option<String>,
    pub user_browser_version: Option<String>,
    pub user_browser_resolution: Option<String>,
    pub user_is_mobile: u8,
    pub user_is_pc: u8,
    pub user_is_tablet: u8,
    pub user_is_touch: u8,
    pub user_is_bot: u8,
    pub source: Option<String>,
    pub referrer: Option<String>,
    pub referrer_time: Option<String>,
    pub page_type: Option<String>,
    pub page_id: Option<i64>,
    pub page_section: Option<String>,
    pub page_tags: Vec<i64>,
    pub link: Option<String>,
    pub event_category: Option<String>,
    pub event_name: Option<String>,
    pub event_value: Option<String>,
    pub event_label: Option<String>,
    pub mvt_name: Vec<String>,
    pub mvt_value: Vec<String>,
}

impl NormalizedRow {
    /// Cells in `COLUMNS` order
    pub fn cells(&self) -> Vec<Cell<'_>> {
        vec![
            Cell::Text(&self.event_time),
            Cell::Text(&self.site),
            Cell::Int(i64::from(self.is_mobile)),
            (&self.url).into(),
            (&self.action_name).into(),
            (&self.pageview_id).into(),
            Cell::Int(self.ping),
            Cell::Int(self.generation_speed),
            (&self.piwik_id).into(),
            (&self.suid).into(),
            (&self.suida).into(),
            (&self.first_visit_time).into(),
            (&self.last_visit_time).into(),
            Cell::Int(self.visit_count),
            Cell::Int(self.new_visitor),
            Cell::Text(&self.user_ip),
            (&self.user_country).into(),
            (&self.user_city).into(),
            (&self.user_device_brand).into(),
            (&self.user_device_model).into(),
            (&self.user_os_name).into(),
            (&self.user_os_version).into(),
            (&self.user_browser_name).into(),
            (&self.user_browser_version).into(),
            (&self.user_browser_resolution).into(),
            Cell::Int(i64::from(self.user_is_mobile)),
            Cell::Int(i64::from(self.user_is_pc)),
            Cell::Int(i64::from(self.user_is_tablet)),
            Cell::Int(i64::from(self.user_is_touch)),
            Cell::Int(i64::from(self.user_is_bot)),
            (&self.source).into(),
            (&self.referrer).into(),
            (&self.referrer_time).into(),
            (&self.page_type).into(),
            self.page_id.map_or(Cell::Null, Cell::Int),
            (&self.page_section).into(),
            Cell::IntArray(&self.page_tags),
            (&self.link).into(),
            (&self.event_category).into(),
            (&self.event_name).into(),
            (&self.event_value).into(),
            (&self.event_label).into(),
            Cell::TextArray(&self.mvt_name),
            Cell::TextArray(&self.mvt_value),
        ]
    }

    /// Replace literal JavaScript null tokens with the null form
    pub fn scrub_null_tokens(&mut self) {
        let text_fields = [
            &mut self.url,
            &mut self.action_name,
            &mut self.pageview_id,
            &mut self.piwik_id,
            &mut self.suid,
            &mut self.suida,
            &mut self.first_visit_time,
            &mut self.last_visit_time,
            &mut self.user_country,
            &mut self.user_city,
            &mut self.user_device_brand,
            &mut self.user_device_model,
            &mut self.user_os_name,
            &mut self.user_os_version,
            &mut self.user_browser_name,
            &mut self.user_browser_version,
            &mut self.user_browser_resolution,
            &mut self.source,
            &mut self.referrer,
            &mut self.referrer_time,
            &mut self.page_type,
            &mut self.page_section,
            &mut self.link,
            &mut self.event_category,
            &mut self.event_name,
            &mut self.event_value,
            &mut self.event_label,
        ];
        for field in text_fields {
            if field.as_deref().is_some_and(is_js_null) {
                *field = None;
            }
        }
        if is_js_null(&self.user_ip) {
            self.user_ip.clear();
        }
    }
}
