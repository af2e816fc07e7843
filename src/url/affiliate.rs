//! Affiliate identifier rewriting
//!
//! Applied to already-resolved, sanitized merchant URLs just before they are
//! published.

use crate::config::{AffiliateConfig, AffiliateRule};
use crate::url::normalize::{normalize_tracking, strip_params};
use url::Url;

/// Appends the first matching affiliate fragment to a URL
///
/// The URL first goes through the light tracking cleanup. Rules are tried in
/// order and the first one whose key is a substring of the URL
/// (case-insensitive) is applied; at most one rule applies. A fragment
/// starting with `?` is merged into an existing query with `&`; any other
/// fragment is appended literally.
///
/// # Examples
///
/// ```
/// use deal_resolver::config::AffiliateRule;
/// use deal_resolver::url::apply_affiliate;
/// use url::Url;
///
/// let rules = vec![AffiliateRule {
///     key: "merchant.example".to_string(),
///     fragment: "?ref=partner42".to_string(),
/// }];
/// let url = Url::parse("https://www.merchant.example/p/1").unwrap();
/// assert_eq!(
///     apply_affiliate(&url, &rules).as_str(),
///     "https://www.merchant.example/p/1?ref=partner42"
/// );
/// ```
pub fn apply_affiliate(url: &Url, rules: &[AffiliateRule]) -> Url {
    let base = normalize_tracking(url);
    let haystack = base.as_str().to_lowercase();

    let Some(rule) = rules
        .iter()
        .find(|rule| haystack.contains(&rule.key.to_lowercase()))
    else {
        return base;
    };

    let rewritten = match rule.fragment.strip_prefix('?') {
        Some(pairs) => {
            let glue = if base.query().is_some() { '&' } else { '?' };
            format!("{}{}{}", base, glue, pairs)
        }
        None => format!("{}{}", base, rule.fragment),
    };

    match Url::parse(&rewritten) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(
                "Affiliate rule '{}' produced an invalid URL ({}), keeping {}",
                rule.key,
                e,
                base
            );
            base
        }
    }
}

/// Guarantees the partner `tag` parameter on Amazon URLs
///
/// Only URLs containing `amazon.` are touched, and only when no `tag`
/// parameter is present; an existing tag is never overwritten.
///
/// # Examples
///
/// ```
/// use deal_resolver::url::ensure_amazon_tag;
/// use url::Url;
///
/// let url = Url::parse("https://www.amazon.fr/dp/B000?th=1").unwrap();
/// assert_eq!(
///     ensure_amazon_tag(&url, Some("deals-21")).as_str(),
///     "https://www.amazon.fr/dp/B000?th=1&tag=deals-21"
/// );
/// ```
pub fn ensure_amazon_tag(url: &Url, tag: Option<&str>) -> Url {
    let Some(tag) = tag.filter(|t| !t.is_empty()) else {
        return url.clone();
    };

    if !url.as_str().contains("amazon.") {
        return url.clone();
    }

    if url.query_pairs().any(|(key, _)| key == "tag") {
        return url.clone();
    }

    let mut tagged = url.clone();
    tagged.query_pairs_mut().append_pair("tag", tag);
    tagged
}

/// Publication-time rewriting: light cleanup, configured strips, affiliate
/// rule, partner tag
#[derive(Debug, Clone, Default)]
pub struct AffiliateRewriter {
    rules: Vec<AffiliateRule>,
    strip_params: Vec<String>,
    amazon_tag: Option<String>,
}

impl AffiliateRewriter {
    pub fn from_config(config: &AffiliateConfig) -> Self {
        Self {
            rules: config.rules.clone(),
            strip_params: config.strip_params.clone(),
            amazon_tag: config.amazon_tag.clone(),
        }
    }

    /// Produces the URL to publish for an already-resolved merchant URL
    pub fn publish(&self, url: &Url) -> Url {
        let cleaned = normalize_tracking(url);
        let stripped = strip_params(&cleaned, &self.strip_params);
        let rewritten = apply_affiliate(&stripped, &self.rules);
        ensure_amazon_tag(&rewritten, self.amazon_tag.as_deref())
    }

    /// True when the rewriter would never change a URL beyond the light cleanup
    pub fn is_noop(&self) -> bool {
        self.rules.is_empty() && self.strip_params.is_empty() && self.amazon_tag.is_none()
    }
}
