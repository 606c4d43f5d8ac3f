use crate::config::types::SitesConfig;
use std::collections::HashMap;

/// Maps the host of a tracked page to the short site name stored in rows
#[derive(Debug, Clone)]
pub struct SiteResolver {
    default: String,
    hosts: HashMap<String, String>,
}

impl SiteResolver {
    pub fn new(config: &SitesConfig) -> Self {
        let hosts = config
            .hosts
            .iter()
            .map(|(host, site)| (host.to_ascii_lowercase(), site.clone()))
            .collect();
        Self {
            default: config.default.clone(),
            hosts,
        }
    }

    /// Resolve `(site, is_mobile)` for the page URL of a hit.
    ///
    /// The host is matched exactly first, then by each parent domain. A
    /// leading `m.` label marks the mobile version of a site.
    pub fn resolve(&self, page_url: Option<&str>) -> (String, u8) {
        let host = match page_url.and_then(host_of) {
            Some(host) => host,
            None => return (self.default.clone(), 0),
        };

        let is_mobile = u8::from(host.starts_with("m."));
        let site = self.lookup(&host).unwrap_or(&self.default).clone();
        (site, is_mobile)
    }

    fn lookup(&self, host: &str) -> Option<&String> {
        let mut candidate = host;
        loop {
            if let Some(site) = self.hosts.get(candidate) {
                return Some(site);
            }
            match candidate.split_once('.') {
                Some((_, parent)) if parent.contains('.') || self.hosts.contains_key(parent) => {
                    candidate = parent;
                }
                _ => return None,
            }
        }
    }
}

fn host_of(page_url: &str) -> Option<String> {
    url::Url::parse(page_url)
        .ok()?
        .host_str()
        .map(|h| h.to_ascii_lowercase())
}
