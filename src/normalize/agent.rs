use regex::Regex;

/// Name and optional version of a browser or platform
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Software {
    pub name: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DetectedAgent {
    pub browser: Option<Software>,
    pub platform: Option<Software>,
    pub bot: bool,
}

/// User-agent detection capability.
///
/// The transformer only needs browser, platform and a bot flag; anything
/// able to provide those can be plugged in.
pub trait UserAgentDetector: Send + Sync {
    fn detect(&self, user_agent: &str) -> DetectedAgent;
}

struct Rule {
    name: &'static str,
    pattern: Regex,
}

impl Rule {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("static user-agent pattern"),
        }
    }

    fn apply(&self, user_agent: &str) -> Option<Software> {
        let caps = self.pattern.captures(user_agent)?;
        let version = caps
            .get(1)
            .map(|m| m.as_str().replace('_', "."))
            .filter(|v| !v.is_empty());
        Some(Software {
            name: self.name.to_string(),
            version,
        })
    }
}

/// Ordered regex table covering common browsers, platforms and crawlers.
///
/// The first matching rule wins, so more specific products (Edge, Opera,
/// Android) come before the engines they embed (Chrome, Linux).
pub struct PatternDetector {
    bots: Regex,
    browsers: Vec<Rule>,
    platforms: Vec<Rule>,
}

impl PatternDetector {
    pub fn new() -> Self {
        let bots = Regex::new(
            r"(?i)(googlebot|bingbot|yandex(bot|images|metrika)|baiduspider|duckduckbot|slurp|facebookexternalhit|crawler|spider|\bbot\b|[a-z]bot/)",
        )
        .expect("static user-agent pattern");

        let browsers = vec![
            Rule::new("Microsoft Edge", r"Edg(?:e|A|iOS)?/([\d.]+)"),
            Rule::new("Opera", r"(?:OPR|Opera)/([\d.]+)"),
            Rule::new("Yandex.Browser", r"YaBrowser/([\d.]+)"),
            Rule::new("Chrome", r"(?:Chrome|CriOS)/([\d.]+)"),
            Rule::new("Firefox", r"(?:Firefox|FxiOS)/([\d.]+)"),
            Rule::new("Safari", r"Version/([\d.]+).*Safari/"),
            Rule::new("Microsoft Internet Explorer", r"(?:MSIE |Trident/.*rv:)([\d.]+)"),
        ];

        let platforms = vec![
            Rule::new("Windows Phone", r"Windows Phone(?: OS)? ([\d.]+)"),
            Rule::new("Windows", r"Windows(?: NT ([\d.]+))?"),
            Rule::new("Android", r"Android(?: ([\d.]+))?"),
            Rule::new("iOS", r"(?:iPhone|iPad|iPod).*? OS ([\d_]+)"),
            Rule::new("ChromeOS", r"CrOS \S+ ([\d.]+)"),
            Rule::new("Mac OS", r"Mac OS X(?: ([\d_.]+))?"),
            Rule::new("PlayStation", r"PlayStation(?: ?(\d+))?"),
            Rule::new("Linux", r"Linux()"),
        ];

        Self {
            bots,
            browsers,
            platforms,
        }
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl UserAgentDetector for PatternDetector {
    fn detect(&self, user_agent: &str) -> DetectedAgent {
        DetectedAgent {
            browser: self.browsers.iter().find_map(|rule| rule.apply(user_agent)),
            platform: self.platforms.iter().find_map(|rule| rule.apply(user_agent)),
            bot: self.bots.is_match(user_agent),
        }
    }
}
