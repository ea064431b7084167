//! Analytics enrichment of submission payloads.
//!
//! Derives browser, OS, country, language and client IP from request
//! headers and stores them under `_meta`. Everything here is pure.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::models::META_KEY;

/// Headers carrying a country code, in priority order.
pub const COUNTRY_HEADERS: [&str; 3] = ["cf-ipcountry", "x-vercel-ip-country", "x-country-code"];

const UNKNOWN: &str = "Unknown";

/// Request attributes the enricher reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    pub user_agent: Option<String>,
    pub country: Option<String>,
    pub accept_language: Option<String>,
    pub ip: Option<String>,
}

impl RequestMetadata {
    /// Collects metadata from `(lower-case name, value)` header pairs.
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let headers: Vec<(&str, &str)> = headers.into_iter().collect();
        let get = |name: &str| {
            headers
                .iter()
                .find(|(key, value)| key.eq_ignore_ascii_case(name) && !value.trim().is_empty())
                .map(|(_, value)| value.trim().to_string())
        };

        let country = COUNTRY_HEADERS.into_iter().find_map(|name| get(name));
        let ip = get("x-forwarded-for")
            .and_then(|value| first_hop(&value))
            .or_else(|| get("x-real-ip"));

        Self {
            user_agent: get("user-agent"),
            country,
            accept_language: get("accept-language"),
            ip,
        }
    }
}

fn first_hop(forwarded_for: &str) -> Option<String> {
    forwarded_for
        .split(',')
        .map(str::trim)
        .find(|hop| !hop.is_empty())
        .map(str::to_string)
}

/// Derived analytics stored under `_meta`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionMeta {
    pub browser: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

impl SubmissionMeta {
    pub fn derive(request: &RequestMetadata) -> Self {
        let (browser, os) = request
            .user_agent
            .as_deref()
            .map(classify_user_agent)
            .unwrap_or((UNKNOWN, None));

        Self {
            browser: browser.to_string(),
            os: os.map(str::to_string),
            country: request
                .country
                .as_deref()
                .map(normalize_country)
                .unwrap_or_else(|| UNKNOWN.to_string()),
            language: request.accept_language.as_deref().and_then(primary_language),
            ip: request.ip.clone(),
        }
    }
}

/// Returns the payload with `_meta` added.
///
/// Original keys pass through unchanged; an existing `_meta` is kept as is.
pub fn enrich(data: &Map<String, JsonValue>, request: &RequestMetadata) -> Map<String, JsonValue> {
    let mut enriched = data.clone();
    if !enriched.contains_key(META_KEY) {
        // Plain strings only, so serialization cannot fail.
        if let Ok(meta) = serde_json::to_value(SubmissionMeta::derive(request)) {
            enriched.insert(META_KEY.to_string(), meta);
        }
    }
    enriched
}

/// Classifies a user agent into `(browser, os)`.
pub fn classify_user_agent(user_agent: &str) -> (&'static str, Option<&'static str>) {
    let ua = user_agent.to_lowercase();

    let browser = if ua.contains("bot") || ua.contains("crawler") || ua.contains("spider") {
        "Bot"
    } else if ua.contains("edg/") || ua.contains("edge/") {
        "Edge"
    } else if ua.contains("opr/") || ua.contains("opera") {
        "Opera"
    } else if ua.contains("samsungbrowser") {
        "Samsung Internet"
    } else if ua.contains("chrome/") || ua.contains("crios/") || ua.contains("chromium/") {
        "Chrome"
    } else if ua.contains("firefox/") || ua.contains("fxios/") {
        "Firefox"
    } else if ua.contains("safari/") {
        "Safari"
    } else if ua.contains("msie") || ua.contains("trident/") {
        "Internet Explorer"
    } else {
        UNKNOWN
    };

    let os = if ua.contains("windows") {
        Some("Windows")
    } else if ua.contains("android") {
        Some("Android")
    } else if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
        Some("iOS")
    } else if ua.contains("cros ") {
        Some("ChromeOS")
    } else if ua.contains("mac os x") || ua.contains("macintosh") {
        Some("macOS")
    } else if ua.contains("linux") {
        Some("Linux")
    } else {
        None
    };

    (browser, os)
}

/// Primary tag of an `Accept-Language` header, e.g. `en-US`.
pub fn primary_language(accept_language: &str) -> Option<String> {
    accept_language
        .split(',')
        .next()
        .and_then(|tag| tag.split(';').next())
        .map(str::trim)
        .filter(|tag| !tag.is_empty() && *tag != "*")
        .map(str::to_string)
}

fn normalize_country(country: &str) -> String {
    country.trim().to_uppercase()
}
