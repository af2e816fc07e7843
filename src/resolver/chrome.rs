//! Chrome-backed browser fallback
//!
//! Chrome is launched lazily on first use and shared by every resolution.
//! A launch failure is remembered so the tier is skipped for the rest of the
//! process. Each resolution runs in its own incognito browser context.

use crate::config::{BrowserConfig as FallbackSettings, Config};
use crate::resolver::browser::BrowserFallback;
use crate::url::MerchantDomains;
use crate::ResolverError;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::network::EventRequestWillBeSent;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::listeners::EventStream;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use url::Url;

type RequestEvents = EventStream<EventRequestWillBeSent>;

/// Longest network-quiet wait, whatever the configuration says
const MAX_SETTLE: Duration = Duration::from_secs(300);

/// Keeps call-to-action navigation in the observed tab
///
/// Request events are only collected for the page we opened, so links with a
/// `target` and `window.open` calls are redirected into the current tab.
const SAME_TAB_SCRIPT: &str = r#"(() => {
    window.open = function (url) {
        if (url) { window.location.href = url; }
        return window;
    };
    document.querySelectorAll('a[target], area[target], form[target]').forEach(function (el) {
        el.removeAttribute('target');
    });
    return true;
})()"#;

struct ChromeSession {
    browser: Mutex<Browser>,
    _handler: JoinHandle<()>,
}

/// Loads pages in headless Chrome and watches outgoing requests for a merchant
pub struct ChromeFallback {
    settings: FallbackSettings,
    user_agent: String,
    cta_selectors: Vec<String>,
    session: OnceCell<Option<ChromeSession>>,
}

impl std::fmt::Debug for ChromeFallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeFallback")
            .field("settings", &self.settings)
            .field("launched", &self.session.initialized())
            .finish()
    }
}

impl ChromeFallback {
    pub fn new(config: &Config) -> Self {
        Self {
            settings: config.browser.clone(),
            user_agent: config.http.user_agent.clone(),
            cta_selectors: config.resolver.cta_selectors.clone(),
            session: OnceCell::new(),
        }
    }

    async fn session(&self) -> Option<&ChromeSession> {
        self.session
            .get_or_init(|| async {
                match self.launch().await {
                    Ok(session) => {
                        tracing::info!("Browser fallback ready");
                        Some(session)
                    }
                    Err(e) => {
                        tracing::warn!("Browser fallback unavailable, skipping tier: {}", e);
                        None
                    }
                }
            })
            .await
            .as_ref()
    }

    async fn launch(&self) -> Result<ChromeSession, ResolverError> {
        let mut builder = BrowserConfig::builder()
            .arg(format!("--user-agent={}", self.user_agent))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu");

        if let Some(path) = &self.settings.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if !self.settings.headless {
            builder = builder.with_head();
        }

        let config = builder.build().map_err(ResolverError::Browser)?;
        let (browser, mut handler) = Browser::launch(config).await.map_err(browser_error)?;

        let handle = tokio::spawn(async move { while handler.next().await.is_some() {} });

        Ok(ChromeSession {
            browser: Mutex::new(browser),
            _handler: handle,
        })
    }

    async fn observe(
        &self,
        session: &ChromeSession,
        url: &Url,
        merchants: &MerchantDomains,
    ) -> Result<Option<Url>, ResolverError> {
        let browser = session.browser.lock().await;

        let context_id = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(browser_error)?
            .result
            .browser_context_id;

        let outcome = self.observe_in_context(&browser, &context_id, url, merchants).await;

        if let Err(e) = browser
            .execute(DisposeBrowserContextParams::new(context_id))
            .await
        {
            tracing::debug!("Failed to dispose browser context: {}", e);
        }

        outcome
    }

    async fn observe_in_context(
        &self,
        browser: &Browser,
        context_id: &BrowserContextId,
        url: &Url,
        merchants: &MerchantDomains,
    ) -> Result<Option<Url>, ResolverError> {
        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(ResolverError::Browser)?;

        let page = browser.new_page(target).await.map_err(browser_error)?;
        let mut events = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(browser_error)?;

        let observed = self.drive(&page, &mut events, url, merchants).await;
        let current = page.url().await.ok().flatten();

        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close page: {}", e);
        }

        Ok(observed.or_else(|| current.and_then(|u| Url::parse(&u).ok())))
    }

    /// Navigates, then clicks a call-to-action if no merchant request was seen
    async fn drive(
        &self,
        page: &Page,
        events: &mut RequestEvents,
        url: &Url,
        merchants: &MerchantDomains,
    ) -> Option<Url> {
        let navigation_timeout = Duration::from_secs(self.settings.navigation_timeout_secs);

        tokio::select! {
            navigated = timeout(navigation_timeout, page.goto(url.as_str())) => {
                match navigated {
                    Ok(Err(e)) => tracing::debug!("Navigation to {} failed: {}", url, e),
                    Err(_) => tracing::debug!("Navigation to {} timed out", url),
                    Ok(Ok(_)) => {}
                }
            }
            found = next_merchant_request(events, merchants) => {
                if found.is_some() {
                    return found;
                }
            }
        }

        if let Some(found) = drain_merchant_requests(events, merchants) {
            return Some(found);
        }

        if !self.click_call_to_action(page).await {
            return None;
        }

        self.settle(events, merchants).await
    }

    async fn click_call_to_action(&self, page: &Page) -> bool {
        let click_timeout = Duration::from_secs(self.settings.click_timeout_secs);

        let clicked = timeout(click_timeout, async {
            if let Err(e) = page.evaluate_expression(SAME_TAB_SCRIPT).await {
                tracing::debug!("Could not pin navigation to the current tab: {}", e);
            }
            for selector in &self.cta_selectors {
                let Ok(element) = page.find_element(selector.as_str()).await else {
                    continue;
                };
                match element.click().await {
                    Ok(_) => {
                        tracing::debug!("Clicked call-to-action {}", selector);
                        return true;
                    }
                    Err(e) => tracing::debug!("Click on {} failed: {}", selector, e),
                }
            }
            false
        })
        .await;

        clicked.unwrap_or(false)
    }

    /// Waits for network quiescence, returning early on a merchant request
    async fn settle(&self, events: &mut RequestEvents, merchants: &MerchantDomains) -> Option<Url> {
        let idle_window = Duration::from_millis(self.settings.idle_window_ms);
        let deadline = settle_deadline(Instant::now(), self.settings.settle_timeout_secs);

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }

            match timeout(idle_window.min(remaining), events.next()).await {
                Ok(Some(event)) => {
                    if let Some(url) = merchant_request(&event.request.url, merchants) {
                        return Some(url);
                    }
                }
                Ok(None) | Err(_) => return None,
            }
        }
    }
}

impl BrowserFallback for ChromeFallback {
    fn resolve<'a>(
        &'a self,
        url: &'a Url,
        merchants: &'a MerchantDomains,
    ) -> BoxFuture<'a, Option<Url>> {
        Box::pin(async move {
            let session = self.session().await?;

            match self.observe(session, url, merchants).await {
                Ok(Some(found)) if merchants.matches_url(&found) => Some(found),
                Ok(Some(found)) => {
                    tracing::debug!("Browser ended on non-merchant {}", found);
                    None
                }
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!("Browser fallback failed for {}: {}", url, e);
                    None
                }
            }
        })
    }
}

async fn next_merchant_request(
    events: &mut RequestEvents,
    merchants: &MerchantDomains,
) -> Option<Url> {
    while let Some(event) = events.next().await {
        if let Some(url) = merchant_request(&event.request.url, merchants) {
            return Some(url);
        }
    }
    None
}

/// Consumes already-buffered request events without waiting
fn drain_merchant_requests(events: &mut RequestEvents, merchants: &MerchantDomains) -> Option<Url> {
    while let Some(Some(event)) = events.next().now_or_never() {
        if let Some(url) = merchant_request(&event.request.url, merchants) {
            return Some(url);
        }
    }
    None
}

fn merchant_request(raw: &str, merchants: &MerchantDomains) -> Option<Url> {
    let url = Url::parse(raw).ok()?;
    if merchants.matches_url(&url) {
        tracing::debug!("Merchant request observed: {}", url);
        Some(url)
    } else {
        None
    }
}

fn settle_deadline(now: Instant, settle_timeout_secs: u64) -> Instant {
    let wait = Duration::from_secs(settle_timeout_secs).min(MAX_SETTLE);
    now.checked_add(wait).unwrap_or(now)
}

fn browser_error(e: chromiumoxide::error::CdpError) -> ResolverError {
    ResolverError::Browser(e.to_string())
}
