//! Resolver coordinator - tiered resolution logic
//!
//! This module composes the fetcher, redirect chaser, page analyzer,
//! sanitizer and optional browser into the single public operation: URL in,
//! best-effort sanitized merchant URL out. Tiers run cheapest first and a
//! merchant hit at any tier skips the rest:
//! - Merchant input: chase and sanitize
//! - Aggregator page: fetch, extract candidates, chase each in order
//! - Browser fallback, when available
//! - Last resort: chase the input once more and sanitize whatever is reached

use crate::config::Config;
use crate::resolver::browser::{default_fallback, BrowserFallback};
use crate::resolver::fetcher::Fetcher;
use crate::resolver::parser::{Candidate, CandidateOrigin, PageAnalyzer};
use crate::resolver::redirect::RedirectChaser;
use crate::url::{parse_absolute, AffiliateRewriter, MerchantDomains, SanitizationRules};
use crate::ResolverError;
use std::fmt;
use url::Url;

/// Which tier produced a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// The input was already on a merchant domain
    MerchantDirect,
    /// A candidate extracted from the input page reached a merchant
    Candidate(CandidateOrigin),
    /// The browser fallback observed a merchant URL
    Browser,
    /// Nothing reached a merchant; the input was chased and sanitized
    LastResort,
}

impl ResolutionTier {
    /// True when the resolved URL is known to be on a merchant domain
    pub fn reached_merchant(&self) -> bool {
        !matches!(self, ResolutionTier::LastResort)
    }
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionTier::MerchantDirect => f.write_str("merchant-direct"),
            ResolutionTier::Candidate(origin) => write!(f, "candidate:{}", origin),
            ResolutionTier::Browser => f.write_str("browser"),
            ResolutionTier::LastResort => f.write_str("last-resort"),
        }
    }
}

/// Outcome of a resolution: the sanitized URL and the tier that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub url: Url,
    pub tier: ResolutionTier,
}

/// Main resolver structure
///
/// Owns the HTTP client (through the [`Fetcher`]) and every rule table. It is
/// immutable after construction, so one instance can serve concurrent
/// resolutions.
#[derive(Debug)]
pub struct Resolver {
    fetcher: Fetcher,
    merchants: MerchantDomains,
    chaser: RedirectChaser,
    analyzer: PageAnalyzer,
    sanitizer: SanitizationRules,
    rewriter: AffiliateRewriter,
    browser: Option<Box<dyn BrowserFallback>>,
}

impl Resolver {
    /// Creates a resolver from configuration
    ///
    /// The browser fallback is wired in when the `browser` feature is
    /// compiled and `[resolver] browser` is true.
    ///
    /// # Returns
    ///
    /// * `Ok(Resolver)` - Ready to resolve
    /// * `Err(ResolverError)` - The HTTP client could not be built
    pub fn from_config(config: &Config) -> Result<Self, ResolverError> {
        let fetcher = Fetcher::new(&config.http)?;
        Ok(Self::with_fetcher(fetcher, config))
    }

    /// Creates a resolver around an existing fetcher
    pub fn with_fetcher(fetcher: Fetcher, config: &Config) -> Self {
        Self {
            fetcher,
            merchants: MerchantDomains::new(&config.resolver.merchant_domains),
            chaser: RedirectChaser::new(config.resolver.max_hops),
            analyzer: PageAnalyzer::from_config(&config.resolver),
            sanitizer: SanitizationRules::from_config(&config.sanitize),
            rewriter: AffiliateRewriter::from_config(&config.affiliate),
            browser: default_fallback(config),
        }
    }

    /// Replaces the browser fallback
    pub fn with_browser(mut self, browser: Box<dyn BrowserFallback>) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Removes the browser fallback
    pub fn without_browser(mut self) -> Self {
        self.browser = None;
        self
    }

    /// Replaces the redirect chaser, e.g. to register extra navigation detectors
    pub fn with_chaser(mut self, chaser: RedirectChaser) -> Self {
        self.chaser = chaser;
        self
    }

    pub fn merchants(&self) -> &MerchantDomains {
        &self.merchants
    }

    pub fn rewriter(&self) -> &AffiliateRewriter {
        &self.rewriter
    }

    pub fn has_browser(&self) -> bool {
        self.browser.is_some()
    }

    /// Resolves a URL to the best merchant URL reachable, sanitized
    ///
    /// Never fails: when no tier reaches a merchant the input is chased one
    /// last time and whatever is reached is sanitized and returned.
    pub async fn resolve(&self, url: &Url) -> Resolution {
        if self.merchants.matches_url(url) {
            let reached = self.chaser.follow(&self.fetcher, url, None).await;
            return self.finish(url, reached, ResolutionTier::MerchantDirect);
        }

        let page = match self.fetcher.fetch(url, Some(url)).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Could not fetch {}: {}", url, e);
                return self.last_resort(url).await;
            }
        };

        let candidates = if page.is_success() {
            self.analyzer
                .extract_candidates(&page.body, &page.final_url, url, &self.merchants)
        } else {
            tracing::debug!("HTTP {} from {}, skipping page analysis", page.status, url);
            vec![Candidate::new(url.clone(), CandidateOrigin::Original)]
        };

        if let Some(resolution) = self.try_candidates(url, &candidates).await {
            return resolution;
        }

        if let Some(browser) = &self.browser {
            match browser.resolve(url, &self.merchants).await {
                Some(found) if self.merchants.matches_url(&found) => {
                    return self.finish(url, found, ResolutionTier::Browser);
                }
                _ => tracing::warn!("Browser fallback found no merchant for {}", url),
            }
        }

        self.last_resort(url).await
    }

    /// Chases each candidate in order; the first to land on a merchant wins
    async fn try_candidates(&self, input: &Url, candidates: &[Candidate]) -> Option<Resolution> {
        for candidate in candidates {
            tracing::debug!("Trying {} candidate {}", candidate.origin, candidate.url);
            let reached = self.chaser.follow(&self.fetcher, &candidate.url, Some(input)).await;

            if self.merchants.matches_url(&reached) {
                return Some(self.finish(
                    input,
                    reached,
                    ResolutionTier::Candidate(candidate.origin),
                ));
            }
            tracing::debug!("Candidate {} ended off-merchant at {}", candidate.url, reached);
        }

        tracing::warn!("No candidate reached a merchant for {}", input);
        None
    }

    async fn last_resort(&self, url: &Url) -> Resolution {
        let reached = self.chaser.follow(&self.fetcher, url, Some(url)).await;
        self.finish(url, reached, ResolutionTier::LastResort)
    }

    fn finish(&self, input: &Url, reached: Url, tier: ResolutionTier) -> Resolution {
        let url = self.sanitizer.sanitize(&reached);
        tracing::info!("Resolved {} -> {} ({})", input, url, tier);
        Resolution { url, tier }
    }

    /// Applies the publication rewrite to an already-resolved URL
    pub fn publish(&self, url: &Url) -> Url {
        self.rewriter.publish(url)
    }

    /// Resolves a URL and rewrites it for publication
    pub async fn resolve_for_publication(&self, url: &Url) -> Url {
        let resolution = self.resolve(url).await;
        self.publish(&resolution.url)
    }

    /// Resolves raw feed input for publication
    ///
    /// Input that is not an absolute HTTP(S) URL is returned unchanged.
    pub async fn resolve_str(&self, input: &str) -> String {
        match parse_absolute(input) {
            Ok(url) => self.resolve_for_publication(&url).await.to_string(),
            Err(e) => {
                tracing::warn!("Not resolving {:?}: {}", input, e);
                input.to_string()
            }
        }
    }
}
