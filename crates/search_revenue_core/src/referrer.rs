//! Referrer interpretation.
//!
//! Turns a raw referrer URL into a [`SearchTouch`] when it points at an
//! external search engine result page that carries a keyword. Anything else
//! (internal navigation, unparsable strings, non-search hosts, empty keywords)
//! is simply not a touch; interpretation never fails loudly.

use std::borrow::Cow;

use url::Url;

use crate::config::EngineConfig;
use crate::totals::AttributionKey;

/// One resolved external search referral. Shares its shape with the key the
/// revenue is later bucketed under.
pub type SearchTouch = AttributionKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchEngine {
    pub domain: &'static str,
    pub keyword_param: &'static str,
}

/// Built-in engines, matched on the exact domain or any subdomain.
pub const KNOWN_SEARCH_ENGINES: &[SearchEngine] = &[
    SearchEngine {
        domain: "google.com",
        keyword_param: "q",
    },
    SearchEngine {
        domain: "bing.com",
        keyword_param: "q",
    },
    SearchEngine {
        domain: "yahoo.com",
        keyword_param: "p",
    },
    SearchEngine {
        domain: "msn.com",
        keyword_param: "q",
    },
];

/// Tried in order when the engine has no mapping or its mapped param is absent.
pub const GENERIC_KEYWORD_PARAMS: &[&str] = &["q", "p"];

/// Label hints for regional engine hosts outside the table (`google.co.uk`).
pub const SEARCH_HOST_HINTS: &[&str] = &["google.", "bing.", "yahoo.", "msn."];

#[derive(Debug, Clone, PartialEq, Eq)]
struct EngineRule {
    domain: String,
    keyword_param: String,
}

#[derive(Debug, Clone)]
pub struct ReferrerInterpreter {
    internal_hosts: Vec<String>,
    engines: Vec<EngineRule>,
}

impl ReferrerInterpreter {
    pub fn new(config: &EngineConfig) -> Self {
        let internal_hosts = config
            .internal_hosts
            .iter()
            .map(|host| normalize_host(host))
            .filter(|host| !host.is_empty())
            .collect();

        let configured = config.extra_engines.iter().map(|rule| EngineRule {
            domain: normalize_host(&rule.domain),
            keyword_param: rule.keyword_param.trim().to_string(),
        });
        let built_in = KNOWN_SEARCH_ENGINES.iter().map(|engine| EngineRule {
            domain: engine.domain.to_string(),
            keyword_param: engine.keyword_param.to_string(),
        });

        Self {
            internal_hosts,
            engines: configured.chain(built_in).collect(),
        }
    }

    pub fn interpret(&self, referrer: &str) -> Option<SearchTouch> {
        let referrer = referrer.trim();
        if referrer.is_empty() || referrer == "-" {
            return None;
        }

        let url = Url::parse(referrer).ok()?;
        let host = normalize_host(url.host_str()?);
        if host.is_empty() || self.is_internal_host(&host) {
            return None;
        }

        let engine = self.match_engine(&host);
        let engine_domain = match engine {
            Some(rule) => rule.domain.clone(),
            None if looks_like_search_host(&host) => host,
            None => return None,
        };

        let raw_keyword =
            select_keyword(&url, engine.map(|rule| rule.keyword_param.as_str()))?;
        let keyword = normalize_keyword(&raw_keyword);
        if keyword.is_empty() {
            return None;
        }

        Some(SearchTouch::new(engine_domain, keyword))
    }

    pub fn is_internal_host(&self, host: &str) -> bool {
        self.internal_hosts
            .iter()
            .any(|internal| is_same_or_subdomain(host, internal))
    }

    fn match_engine(&self, host: &str) -> Option<&EngineRule> {
        self.engines
            .iter()
            .find(|rule| is_same_or_subdomain(host, &rule.domain))
    }
}

/// Lowercases the phrase, collapses whitespace runs and trims.
///
/// Expects an already decoded value; applying it twice is a no-op.
pub fn normalize_keyword(decoded: &str) -> String {
    decoded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Decoded value of the first preferred parameter present in the query.
///
/// Only the first occurrence of each name counts; a present but empty value
/// still wins over later names.
fn select_keyword<'u>(url: &'u Url, preferred: Option<&str>) -> Option<Cow<'u, str>> {
    preferred
        .into_iter()
        .chain(GENERIC_KEYWORD_PARAMS.iter().copied())
        .find_map(|name| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value)
        })
}

fn normalize_host(host: &str) -> String {
    let lowered = host.trim().trim_end_matches('.').to_ascii_lowercase();
    match lowered.strip_prefix("www.") {
        Some(stripped) => stripped.to_string(),
        None => lowered,
    }
}

fn is_same_or_subdomain(host: &str, domain: &str) -> bool {
    host.strip_suffix(domain)
        .is_some_and(|rest| rest.is_empty() || rest.ends_with('.'))
}

fn looks_like_search_host(host: &str) -> bool {
    SEARCH_HOST_HINTS.iter().any(|hint| host.contains(hint))
}
