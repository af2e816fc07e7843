//! In-page navigation detection
//!
//! Each detector is a best-effort static check over untrusted HTML that
//! returns a raw (possibly relative) navigation target. The redirect chaser
//! asks its detectors in order and follows the first target found; support for
//! a new navigation idiom is added by registering another detector.

use regex::Regex;
use scraper::{Html, Selector};
use std::fmt::Debug;

/// Assignment-style script navigation: `window.location.href = "..."`
const SCRIPT_ASSIGNMENT_PATTERN: &str = r#"(?i)(?:location\.href|location\.assign|window\.location(?:\.href)?|document\.location)\s*=\s*['"]([^'"]+)['"]"#;

/// Call-style script navigation: `location.replace("...")`
const SCRIPT_CALL_PATTERN: &str =
    r#"(?i)location\.(?:assign|replace)\s*\(\s*['"]([^'"]+)['"]\s*\)"#;

/// Detects a navigation target inside an HTML document
pub trait NavigationDetector: Send + Sync + Debug {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Returns the raw navigation target, if any
    fn detect(&self, html: &str) -> Option<String>;
}

/// `<meta http-equiv="refresh" content="0;url=...">`
#[derive(Debug, Default, Clone, Copy)]
pub struct MetaRefresh;

impl NavigationDetector for MetaRefresh {
    fn name(&self) -> &'static str {
        "meta-refresh"
    }

    fn detect(&self, html: &str) -> Option<String> {
        meta_refresh_target(html)
    }
}

/// Regex-based detection of script navigation assignments and calls
#[derive(Debug, Clone)]
pub struct ScriptNavigation {
    patterns: Vec<Regex>,
}

impl ScriptNavigation {
    /// Detector for the built-in navigation idioms
    pub fn new() -> Self {
        let patterns = [SCRIPT_ASSIGNMENT_PATTERN, SCRIPT_CALL_PATTERN]
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::error!("Invalid navigation pattern {}: {}", pattern, e);
                    None
                }
            })
            .collect();

        Self { patterns }
    }

    /// Detector for custom patterns; capture group 1 must hold the target
    pub fn with_patterns(patterns: &[&str]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }
}

impl Default for ScriptNavigation {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationDetector for ScriptNavigation {
    fn name(&self) -> &'static str {
        "script-navigation"
    }

    fn detect(&self, html: &str) -> Option<String> {
        self.patterns.iter().find_map(|re| {
            re.captures(html)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|target| !target.is_empty())
        })
    }
}

/// The detectors used by default, meta refresh first
pub fn default_detectors() -> Vec<Box<dyn NavigationDetector>> {
    vec![Box::new(MetaRefresh), Box::new(ScriptNavigation::new())]
}

/// Extracts the target of a meta refresh tag
///
/// The `http-equiv` comparison is case-insensitive. The target is the part of
/// `content` after `url=` in the segment following the first `;`, with
/// surrounding quotes removed.
///
/// # Examples
///
/// ```
/// use deal_resolver::resolver::meta_refresh_target;
///
/// let html = r#"<meta http-equiv="Refresh" content="0; URL='https://shop.example/deal'">"#;
/// assert_eq!(meta_refresh_target(html), Some("https://shop.example/deal".to_string()));
/// ```
pub fn meta_refresh_target(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("meta[http-equiv]").ok()?;

    let tag = document.select(&selector).find(|element| {
        element
            .value()
            .attr("http-equiv")
            .map(|v| v.trim().eq_ignore_ascii_case("refresh"))
            .unwrap_or(false)
    })?;

    parse_refresh_content(tag.value().attr("content")?)
}

/// Parses the `content` attribute of a meta refresh tag
fn parse_refresh_content(content: &str) -> Option<String> {
    let (_, rest) = content.split_once(';')?;
    let position = rest.to_ascii_lowercase().find("url=")?;
    let mut target = rest[position + 4..].trim();

    let quoted = target.len() >= 2
        && ((target.starts_with('"') && target.ends_with('"'))
            || (target.starts_with('\'') && target.ends_with('\'')));
    if quoted {
        target = target[1..target.len() - 1].trim();
    }

    if target.is_empty() {
        None
    } else {
        Some(target.to_string())
    }
}
