/// Checks if a host contains any of the given fragments
///
/// Both sides are compared lower-cased. There is no wildcard syntax and no
/// registrable-domain awareness: `"example.com"` matches `shop.example.com`
/// and also `example.com.evil.net`. Callers must supply patterns specific
/// enough for their merchants.
///
/// An empty pattern list never matches.
///
/// # Examples
///
/// ```
/// use deal_resolver::url::is_merchant;
///
/// assert!(is_merchant("shop.example.com", &["example.com"]));
/// assert!(is_merchant("WWW.FNAC.COM", &["fnac.com"]));
/// assert!(!is_merchant("dealabs.com", &["fnac.com"]));
/// ```
pub fn is_merchant<S: AsRef<str>>(host: &str, patterns: &[S]) -> bool {
    let host = host.to_lowercase();
    patterns.iter().any(|pattern| {
        let pattern = pattern.as_ref();
        !pattern.is_empty() && host.contains(&pattern.to_lowercase())
    })
}

/// Ordered set of merchant hostname fragments
///
/// Membership is the sole test of "is this a final answer" during resolution.
/// Patterns are lower-cased once at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerchantDomains {
    patterns: Vec<String>,
}

impl MerchantDomains {
    /// Creates a merchant set from configured patterns, keeping their order
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Returns true if the host belongs to a configured merchant
    pub fn contains_host(&self, host: &str) -> bool {
        is_merchant(host, &self.patterns)
    }

    /// Returns true if the URL's host belongs to a configured merchant
    pub fn matches_url(&self, url: &url::Url) -> bool {
        url.host_str()
            .map(|host| self.contains_host(host))
            .unwrap_or(false)
    }

    /// The configured patterns, lower-cased
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
