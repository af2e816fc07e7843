//! Heuristic redirect following
//!
//! HTTP 30x redirects are followed by the client itself. On top of that the
//! chaser keeps walking while the reached page carries another redirect
//! signal: an affiliate parameter encoding the destination, a meta refresh,
//! or script navigation. The walk is bounded by a hop limit and never fails;
//! it returns the last URL reached.

use crate::resolver::fetcher::{FetchedPage, Fetcher};
use crate::resolver::signals::{default_detectors, NavigationDetector};
use crate::url::resolve_reference;
use percent_encoding::percent_decode_str;
use url::Url;

/// Query keys that affiliate networks use to carry the destination URL
pub const DESTINATION_PARAMS: &[&str] = &["ued", "u", "dest", "destination", "dl", "url", "to"];

/// One step of a resolution walk
///
/// Re-derived on every hop; `hops_remaining` only ever decreases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    pub url: Url,
    pub referer: Option<Url>,
    pub hops_remaining: u32,
}

impl ResolutionRequest {
    pub fn new(url: Url, referer: Option<Url>, hops_remaining: u32) -> Self {
        Self {
            url,
            referer,
            hops_remaining,
        }
    }

    /// Consumes one hop and moves to `next`, referred by `from`
    fn advance(self, next: Url, from: Url) -> Self {
        Self {
            url: next,
            referer: Some(from),
            hops_remaining: self.hops_remaining.saturating_sub(1),
        }
    }
}

/// Extracts a destination URL encoded in affiliate query parameters
///
/// Keys are checked in [`DESTINATION_PARAMS`] order. The value is decoded
/// once more after query decoding (networks often double-encode) and
/// resolved against `url`; values that do not resolve to an HTTP(S) URL are
/// ignored.
///
/// # Examples
///
/// ```
/// use deal_resolver::resolver::decode_destination;
/// use url::Url;
///
/// let url = Url::parse(
///     "https://go.dealabs.com/visit/abc123?ued=https%3A%2F%2Fwww.fnac.com%2Fitem%3Fawc%3D1",
/// ).unwrap();
/// assert_eq!(
///     decode_destination(&url).unwrap().as_str(),
///     "https://www.fnac.com/item?awc=1"
/// );
/// ```
pub fn decode_destination(url: &Url) -> Option<Url> {
    DESTINATION_PARAMS.iter().find_map(|key| {
        let (_, value) = url.query_pairs().find(|(k, _)| k == key)?;
        let decoded = percent_decode_str(&value).decode_utf8_lossy();
        resolve_reference(&decoded, url)
    })
}

/// Follows redirect signals until none remain or the hop limit is reached
#[derive(Debug)]
pub struct RedirectChaser {
    max_hops: u32,
    detectors: Vec<Box<dyn NavigationDetector>>,
}

impl RedirectChaser {
    /// Creates a chaser with the default navigation detectors
    pub fn new(max_hops: u32) -> Self {
        Self {
            max_hops,
            detectors: default_detectors(),
        }
    }

    /// Registers an additional navigation detector, consulted last
    pub fn with_detector(mut self, detector: Box<dyn NavigationDetector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn max_hops(&self) -> u32 {
        self.max_hops
    }

    /// Walks from `url` to the final URL, performing at most `max_hops` fetches
    ///
    /// Each hop fetches the current URL (HTTP redirects included), then looks
    /// for the next hop in this order:
    /// 1. destination-encoding parameters on the URL reached
    /// 2. navigation signals in an HTML body
    ///
    /// Without a next hop the URL reached is returned. A failed fetch ends
    /// the walk at the URL that failed; hitting the hop limit ends it at the
    /// last URL derived.
    pub async fn follow(&self, fetcher: &Fetcher, url: &Url, referer: Option<&Url>) -> Url {
        let mut request = ResolutionRequest::new(url.clone(), referer.cloned(), self.max_hops);

        while request.hops_remaining > 0 {
            let page = match fetcher.fetch(&request.url, request.referer.as_ref()).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::debug!("Chase stopped at {}: {}", request.url, e);
                    return request.url;
                }
            };

            let is_html = page.is_html();
            let FetchedPage {
                final_url: reached,
                body,
                ..
            } = page;

            if let Some(next) = decode_destination(&reached) {
                tracing::debug!("Destination parameter on {} -> {}", reached, next);
                request = request.advance(next, reached);
                continue;
            }

            let signal = if is_html {
                self.navigation_target(&body, &reached)
            } else {
                None
            };

            match signal {
                Some(next) => {
                    request = request.advance(next, reached);
                }
                None => return reached,
            }
        }

        tracing::debug!(
            "Hop limit {} reached, stopping at {}",
            self.max_hops,
            request.url
        );
        request.url
    }

    /// Asks each detector in order for a target resolvable against `base`
    fn navigation_target(&self, html: &str, base: &Url) -> Option<Url> {
        self.detectors.iter().find_map(|detector| {
            let raw = detector.detect(html)?;
            let next = resolve_reference(&raw, base)?;
            tracing::debug!("{} on {} -> {}", detector.name(), base, next);
            Some(next)
        })
    }
}
