//! Candidate extraction from aggregator pages
//!
//! This module handles parsing a fetched aggregator or editorial page to find
//! the outbound links that might lead to the merchant:
//! - Product-offer structured data (JSON-LD)
//! - Call-to-action ("buy", "visit") elements
//! - Any link pointing at an affiliate network or a merchant
//!
//! The page's own URL is always appended as the last candidate.

use crate::config::ResolverConfig;
use crate::url::{extract_host, resolve_reference, MerchantDomains};
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

/// Where a candidate URL was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateOrigin {
    /// `offers.url` or `offers.seller.url` in JSON-LD
    StructuredMetadata,
    /// The first element matching a call-to-action selector
    CallToAction,
    /// The first link whose host is an affiliate network or a merchant
    NetworkHint,
    /// The URL being resolved
    Original,
}

impl std::fmt::Display for CandidateOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CandidateOrigin::StructuredMetadata => "structured-metadata",
            CandidateOrigin::CallToAction => "cta-selector",
            CandidateOrigin::NetworkHint => "network-hint",
            CandidateOrigin::Original => "original",
        };
        f.write_str(name)
    }
}

/// An outbound URL that might lead to the merchant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: Url,
    pub origin: CandidateOrigin,
}

impl Candidate {
    pub fn new(url: Url, origin: CandidateOrigin) -> Self {
        Self { url, origin }
    }
}

/// Extracts ordered candidates from aggregator pages
#[derive(Debug, Clone)]
pub struct PageAnalyzer {
    cta_selectors: Vec<Selector>,
    network_hints: Vec<String>,
}

impl PageAnalyzer {
    /// Creates an analyzer from CSS selectors and affiliate-network host fragments
    ///
    /// Selectors that fail to parse are skipped with a warning; configuration
    /// validation rejects them earlier when loading from a file.
    pub fn new<S, H>(cta_selectors: &[S], network_hints: &[H]) -> Self
    where
        S: AsRef<str>,
        H: AsRef<str>,
    {
        let cta_selectors = cta_selectors
            .iter()
            .filter_map(|raw| match Selector::parse(raw.as_ref()) {
                Ok(selector) => Some(selector),
                Err(e) => {
                    tracing::warn!("Skipping CTA selector {:?}: {:?}", raw.as_ref(), e);
                    None
                }
            })
            .collect();

        let network_hints = network_hints
            .iter()
            .map(|h| h.as_ref().trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .collect();

        Self {
            cta_selectors,
            network_hints,
        }
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(&config.cta_selectors, &config.affiliate_network_hints)
    }

    /// Extracts candidates from `html` in priority order
    ///
    /// # Arguments
    ///
    /// * `html` - The page body
    /// * `base` - URL the page was served from, for relative links
    /// * `source` - URL being resolved, appended as the final candidate
    /// * `merchants` - Merchant set used by the generic link scan
    ///
    /// At most one candidate is taken from each tier. Duplicates keep the
    /// earliest origin.
    pub fn extract_candidates(
        &self,
        html: &str,
        base: &Url,
        source: &Url,
        merchants: &MerchantDomains,
    ) -> Vec<Candidate> {
        let document = Html::parse_document(html);
        let mut candidates = Vec::with_capacity(4);

        if let Some(url) = structured_offer_url(&document, base) {
            candidates.push(Candidate::new(url, CandidateOrigin::StructuredMetadata));
        }

        if let Some(url) = self.call_to_action(&document, base) {
            candidates.push(Candidate::new(url, CandidateOrigin::CallToAction));
        }

        if let Some(url) = self.outbound_link(&document, base, merchants) {
            candidates.push(Candidate::new(url, CandidateOrigin::NetworkHint));
        }

        candidates.push(Candidate::new(source.clone(), CandidateOrigin::Original));

        dedup_candidates(candidates)
    }

    /// First element, across selectors in order, with a usable href
    fn call_to_action(&self, document: &Html, base: &Url) -> Option<Url> {
        self.cta_selectors.iter().find_map(|selector| {
            document
                .select(selector)
                .filter_map(|element| element.value().attr("href"))
                .find_map(|href| resolve_reference(href, base))
        })
    }

    /// First link in document order pointing at a network hint or a merchant
    fn outbound_link(&self, document: &Html, base: &Url, merchants: &MerchantDomains) -> Option<Url> {
        let selector = Selector::parse("a[href]").ok()?;

        document
            .select(&selector)
            .filter_map(|element| element.value().attr("href"))
            .filter_map(|href| resolve_reference(href, base))
            .find(|url| {
                let Some(host) = extract_host(url) else {
                    return false;
                };
                self.network_hints.iter().any(|hint| host.contains(hint.as_str()))
                    || merchants.contains_host(&host)
            })
    }
}

/// Finds the first offer URL in the page's JSON-LD blocks
///
/// Blocks that are not valid JSON are skipped.
fn structured_offer_url(document: &Html, base: &Url) -> Option<Url> {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;

    document.select(&selector).find_map(|script| {
        let text: String = script.text().collect();
        let data: Value = match serde_json::from_str(text.trim()) {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!("Ignoring malformed JSON-LD block: {}", e);
                return None;
            }
        };
        offer_url_in(&data).and_then(|raw| resolve_reference(raw, base))
    })
}

/// Walks a JSON-LD value: objects, arrays and `@graph` containers
fn offer_url_in(value: &Value) -> Option<&str> {
    match value {
        Value::Array(items) => items.iter().find_map(offer_url_in),
        Value::Object(map) => map
            .get("offers")
            .and_then(url_from_offers)
            .or_else(|| map.get("@graph").and_then(offer_url_in)),
        _ => None,
    }
}

/// `offers` may be one object or an array of objects
fn url_from_offers(offers: &Value) -> Option<&str> {
    match offers {
        Value::Array(items) => items.iter().find_map(url_from_offers),
        Value::Object(offer) => offer
            .get("url")
            .and_then(Value::as_str)
            .or_else(|| {
                offer
                    .get("seller")
                    .and_then(|seller| seller.get("url"))
                    .and_then(Value::as_str)
            })
            .filter(|url| !url.trim().is_empty()),
        _ => None,
    }
}

fn dedup_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut unique: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !unique.iter().any(|c| c.url == candidate.url) {
            unique.push(candidate);
        }
    }
    unique
}
