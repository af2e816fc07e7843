use serde::Deserialize;

/// Main configuration structure for Deal-Resolver
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub sanitize: SanitizeConfig,
    #[serde(default)]
    pub affiliate: AffiliateConfig,
}

/// HTTP client behaviour: header template, timeouts and retry policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// User-Agent header sent on every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Accept header sent on every request
    pub accept: String,

    /// Accept-Language header sent on every request
    #[serde(rename = "accept-language")]
    pub accept_language: String,

    /// Cache-Control header sent on every request
    #[serde(rename = "cache-control")]
    pub cache_control: String,

    /// Total per-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// Retries after the first attempt on 429/500/502/503/504 and transient errors
    #[serde(rename = "max-retries")]
    pub max_retries: usize,

    /// Delay before the first retry (milliseconds); doubles on each retry
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Maximum HTTP 30x redirects followed transparently per request
    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome Safari".to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            accept_language: "fr-FR,fr;q=0.9,en;q=0.8".to_string(),
            cache_control: "no-cache".to_string(),
            timeout_secs: 12,
            connect_timeout_secs: 10,
            max_retries: 3,
            backoff_base_ms: 400,
            max_redirects: 10,
        }
    }
}

/// Resolution behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum fetches performed by a single redirect chase
    #[serde(rename = "max-hops")]
    pub max_hops: u32,

    /// Hostname fragments identifying merchants (case-insensitive substring match)
    #[serde(rename = "merchant-domains")]
    pub merchant_domains: Vec<String>,

    /// Hostname fragments of known affiliate-tracking intermediaries
    #[serde(rename = "affiliate-network-hints")]
    pub affiliate_network_hints: Vec<String>,

    /// Ordered CSS selectors marking "buy/visit" links on aggregator pages
    #[serde(rename = "cta-selectors")]
    pub cta_selectors: Vec<String>,

    /// Whether to use the rendering-engine fallback when it is compiled in
    pub browser: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_hops: 10,
            merchant_domains: Vec::new(),
            affiliate_network_hints: to_strings(DEFAULT_AFFILIATE_NETWORK_HINTS),
            cta_selectors: to_strings(DEFAULT_CTA_SELECTORS),
            browser: true,
        }
    }
}

/// Known affiliate-network hosts
pub const DEFAULT_AFFILIATE_NETWORK_HINTS: &[&str] = &[
    "awin1.com",
    "s.click.aliexpress.com",
    "linksynergy",
    "partnerize",
    "impact.com",
    "go.dealabs.com",
    "adtraction",
    "tradedoubler",
    "effiliation",
    "doubleclick.net",
];

/// Call-to-action selectors, most specific first
pub const DEFAULT_CTA_SELECTORS: &[&str] = &[
    r#"a[data-role="thread-buy"]"#,
    "a.cept-dealBtn",
    r#"a[href*="/visit/"]"#,
    r#"a[href*="go.dealabs.com"]"#,
    r#"a[rel~="sponsored"]"#,
    r#"a[rel~="nofollow"]"#,
];

/// Rendering-engine fallback settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Bound on the initial navigation (seconds)
    #[serde(rename = "navigation-timeout-secs")]
    pub navigation_timeout_secs: u64,

    /// Bound on locating and clicking a call-to-action element (seconds)
    #[serde(rename = "click-timeout-secs")]
    pub click_timeout_secs: u64,

    /// Bound on waiting for network quiescence after a click (seconds)
    #[serde(rename = "settle-timeout-secs")]
    pub settle_timeout_secs: u64,

    /// Silence on the network that counts as quiescence (milliseconds)
    #[serde(rename = "idle-window-ms")]
    pub idle_window_ms: u64,

    /// Explicit Chrome/Chromium executable; auto-detected when absent
    #[serde(rename = "chrome-path")]
    pub chrome_path: Option<String>,

    /// Run the browser without a window
    pub headless: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_secs: 25,
            click_timeout_secs: 5,
            settle_timeout_secs: 25,
            idle_window_ms: 1500,
            chrome_path: None,
            headless: true,
        }
    }
}

/// Tracking-parameter removal rules
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SanitizeConfig {
    /// Query keys starting with any of these are dropped
    #[serde(rename = "drop-prefixes")]
    pub drop_prefixes: Vec<String>,

    /// Query keys equal to any of these are dropped
    #[serde(rename = "drop-exact")]
    pub drop_exact: Vec<String>,

    /// Extra rules applied when the host contains a given fragment
    #[serde(rename = "merchant")]
    pub merchant: Vec<MerchantRule>,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            drop_prefixes: to_strings(&[
                "utm_", "fbclid", "gclid", "mc_", "pk_", "aff", "awc", "cjevent", "cmp",
                "campaign", "source", "medium",
            ]),
            drop_exact: to_strings(&[
                "awc",
                "tt_campaign",
                "tt_medium",
                "tt_content",
                "tt_source",
                "spm",
                "clickid",
                "sid",
                "pid",
                "ad",
                "adgroup",
            ]),
            merchant: vec![MerchantRule {
                host: "fnac.".to_string(),
                drop_prefixes: to_strings(&["eaf-", "eseg-"]),
                drop_exact: to_strings(&["origin", "sv1", "sv_campaign_id", "awc"]),
            }],
        }
    }
}

/// Per-merchant sanitization override
#[derive(Debug, Clone, Deserialize)]
pub struct MerchantRule {
    /// Hostname fragment the rule applies to (e.g., "fnac.")
    pub host: String,

    #[serde(rename = "drop-prefixes", default)]
    pub drop_prefixes: Vec<String>,

    #[serde(rename = "drop-exact", default)]
    pub drop_exact: Vec<String>,
}

/// Affiliate rewriting settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AffiliateConfig {
    /// Extra query keys removed before rewriting (case-insensitive)
    #[serde(rename = "strip-params")]
    pub strip_params: Vec<String>,

    /// Partner tag guaranteed on Amazon URLs
    #[serde(rename = "amazon-tag")]
    pub amazon_tag: Option<String>,

    /// Ordered rules; the first key found in the URL wins
    #[serde(rename = "rule")]
    pub rules: Vec<AffiliateRule>,
}

/// Single affiliate rule
#[derive(Debug, Clone, Deserialize)]
pub struct AffiliateRule {
    /// Substring of the URL that selects this rule
    pub key: String,

    /// Query fragment starting with `?`, or a literal suffix
    pub fragment: String,
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
