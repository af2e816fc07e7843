use crate::config::SanitizeConfig;
use url::Url;

/// Keys removed by the light normalization pass applied before affiliate rewriting
const LIGHT_TRACKING_PARAMS: &[&str] = &["ref", "refsrc", "fbclid"];

/// Tracking-parameter removal rules
///
/// Generic prefix and exact-name drops apply to every URL; a merchant
/// override adds drops when the host contains its fragment. All comparisons
/// are made on lower-cased keys. Only the query string is touched.
#[derive(Debug, Clone)]
pub struct SanitizationRules {
    drop_prefixes: Vec<String>,
    drop_exact: Vec<String>,
    overrides: Vec<MerchantOverride>,
}

#[derive(Debug, Clone)]
struct MerchantOverride {
    host_fragment: String,
    drop_prefixes: Vec<String>,
    drop_exact: Vec<String>,
}

impl SanitizationRules {
    /// Builds the rule set from configuration
    pub fn from_config(config: &SanitizeConfig) -> Self {
        Self {
            drop_prefixes: lowercase_all(&config.drop_prefixes),
            drop_exact: lowercase_all(&config.drop_exact),
            overrides: config
                .merchant
                .iter()
                .map(|rule| MerchantOverride {
                    host_fragment: rule.host.to_lowercase(),
                    drop_prefixes: lowercase_all(&rule.drop_prefixes),
                    drop_exact: lowercase_all(&rule.drop_exact),
                })
                .collect(),
        }
    }

    /// Removes tracking and affiliate parameters from a URL
    ///
    /// Survivors keep their original order. The fragment is dropped; scheme,
    /// host and path are untouched. Applying this twice yields the same URL
    /// as applying it once.
    ///
    /// # Examples
    ///
    /// ```
    /// use deal_resolver::url::SanitizationRules;
    /// use url::Url;
    ///
    /// let rules = SanitizationRules::default();
    /// let url = Url::parse("https://www.fnac.com/item?awc=1&eaf-x=2&color=red").unwrap();
    /// assert_eq!(rules.sanitize(&url).as_str(), "https://www.fnac.com/item?color=red");
    /// ```
    pub fn sanitize(&self, url: &Url) -> Url {
        let host = url.host_str().unwrap_or_default().to_lowercase();
        let overrides: Vec<&MerchantOverride> = self
            .overrides
            .iter()
            .filter(|o| host.contains(&o.host_fragment))
            .collect();

        retain_query_pairs(url, |key| {
            let key = key.to_lowercase();
            let generic = matches_any(&key, &self.drop_prefixes, &self.drop_exact);
            let specific = overrides
                .iter()
                .any(|o| matches_any(&key, &o.drop_prefixes, &o.drop_exact));
            !(generic || specific)
        })
    }
}

impl Default for SanitizationRules {
    fn default() -> Self {
        Self::from_config(&SanitizeConfig::default())
    }
}

/// Sanitizes a URL with the default rule set
pub fn sanitize(url: &Url) -> Url {
    SanitizationRules::default().sanitize(url)
}

/// Light tracking cleanup applied uniformly regardless of merchant
///
/// Drops `utm_*`, `ref`, `refsrc`, `fbclid` and any key starting with `_`.
///
/// # Examples
///
/// ```
/// use deal_resolver::url::normalize_tracking;
/// use url::Url;
///
/// let url = Url::parse("https://shop.example/p?id=3&utm_source=x&_ga=1&ref=home").unwrap();
/// assert_eq!(normalize_tracking(&url).as_str(), "https://shop.example/p?id=3");
/// ```
pub fn normalize_tracking(url: &Url) -> Url {
    retain_query_pairs(url, |key| {
        let key = key.to_lowercase();
        !(key.starts_with("utm_")
            || key.starts_with('_')
            || LIGHT_TRACKING_PARAMS.contains(&key.as_str()))
    })
}

/// Removes the named query parameters (case-insensitive exact match)
pub fn strip_params<S: AsRef<str>>(url: &Url, names: &[S]) -> Url {
    if names.is_empty() {
        return url.clone();
    }

    retain_query_pairs(url, |key| {
        !names
            .iter()
            .any(|name| name.as_ref().eq_ignore_ascii_case(key))
    })
}

/// Rebuilds the query keeping only the pairs whose key passes `keep`
///
/// An empty result removes the `?` entirely.
fn retain_query_pairs<F>(url: &Url, mut keep: F) -> Url
where
    F: FnMut(&str) -> bool,
{
    let mut result = url.clone();
    result.set_fragment(None);

    if url.query().is_none() {
        return result;
    }

    let survivors: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| keep(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if survivors.is_empty() {
        result.set_query(None);
    } else {
        result.query_pairs_mut().clear().extend_pairs(survivors);
    }

    result
}

fn matches_any(key: &str, prefixes: &[String], exact: &[String]) -> bool {
    exact.iter().any(|name| name == key) || prefixes.iter().any(|p| key.starts_with(p.as_str()))
}

fn lowercase_all(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}
