//! Integration tests for the resolver
//!
//! These tests use wiremock to create mock HTTP servers and test full
//! resolutions end-to-end. Every test hostname is pinned to the mock server
//! through the client's DNS overrides, so URLs carry the server port.

use deal_resolver::config::{AffiliateRule, Config};
use deal_resolver::resolver::{
    client_builder, BrowserFallback, CandidateOrigin, Fetcher, RedirectChaser, ResolutionTier,
    Resolver,
};
use deal_resolver::url::MerchantDomains;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_HOSTS: &[&str] = &[
    "go.dealabs.com",
    "www.dealabs.com",
    "www.fnac.com",
    "www.merchant.example",
    "news.example",
];

const TEST_USER_AGENT: &str = "deal-resolver-test/1.0";

/// A mock server answering for every test hostname
struct TestSite {
    server: MockServer,
}

impl TestSite {
    async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    fn url(&self, host: &str, path: &str) -> Url {
        Url::parse(&format!(
            "http://{}:{}{}",
            host,
            self.server.address().port(),
            path
        ))
        .expect("Failed to build test URL")
    }

    fn fetcher(&self, config: &Config) -> Fetcher {
        let addr = *self.server.address();
        let builder = TEST_HOSTS.iter().fold(
            client_builder(&config.http).expect("Failed to create client builder"),
            |builder, host| builder.resolve(host, addr),
        );
        let client = builder.build().expect("Failed to build client");
        Fetcher::with_client(client, &config.http)
    }

    fn resolver(&self, config: &Config) -> Resolver {
        Resolver::with_fetcher(self.fetcher(config), config).without_browser()
    }
}

/// Creates a test configuration with the given merchant domains
fn create_test_config(merchants: &[&str]) -> Config {
    let mut config = Config::default();
    config.http.user_agent = TEST_USER_AGENT.to_string();
    config.http.timeout_secs = 5;
    config.http.connect_timeout_secs = 2;
    config.http.max_retries = 0;
    config.http.backoff_base_ms = 10;
    config.resolver.merchant_domains = merchants.iter().map(|m| m.to_string()).collect();
    config.resolver.browser = false;
    config
}

fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/html")
}

/// Browser stand-in returning a fixed URL and counting calls
#[derive(Debug)]
struct FakeBrowser {
    answer: Option<Url>,
    calls: Arc<AtomicUsize>,
}

impl FakeBrowser {
    fn new(answer: Option<Url>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                answer,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl BrowserFallback for FakeBrowser {
    fn resolve<'a>(
        &'a self,
        _url: &'a Url,
        _merchants: &'a MerchantDomains,
    ) -> BoxFuture<'a, Option<Url>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { self.answer.clone() })
    }
}

#[tokio::test]
async fn test_destination_parameter_to_merchant() {
    let site = TestSite::start().await;

    Mock::given(method("GET"))
        .and(path("/visit/abc123"))
        .respond_with(html("<html><body>Redirection...</body></html>"))
        .mount(&site.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(html("<html><body>Product</body></html>"))
        .mount(&site.server)
        .await;

    let destination = site.url("www.fnac.com", "/item?awc=1&eaf-x=2");
    let mut input = site.url("go.dealabs.com", "/visit/abc123");
    input
        .query_pairs_mut()
        .append_pair("ued", destination.as_str());

    let resolver = site.resolver(&create_test_config(&["fnac.com"]));
    let resolution = resolver.resolve(&input).await;

    assert_eq!(resolution.url, site.url("www.fnac.com", "/item"));
    assert_eq!(
        resolution.tier,
        ResolutionTier::Candidate(CandidateOrigin::Original)
    );
}

#[tokio::test]
async fn test_meta_refresh_to_merchant() {
    let site = TestSite::start().await;
    let deal = site.url("www.merchant.example", "/deal");

    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(html(format!(
            r#"<html><head><meta http-equiv="refresh" content="0;url={}"></head><body>Article</body></html>"#,
            deal
        )))
        .mount(&site.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/deal"))
        .respond_with(html("<html><body>Deal</body></html>"))
        .expect(1)
        .mount(&site.server)
        .await;

    let resolver = site.resolver(&create_test_config(&["merchant.example"]));
    let resolution = resolver
        .resolve(&site.url("news.example", "/article"))
        .await;

    assert_eq!(resolution.url, deal);
    assert!(resolution.tier.reached_merchant());
}

#[tokio::test]
async fn test_script_navigation_through_http_redirect() {
    let site = TestSite::start().await;

    Mock::given(method("GET"))
        .and(path("/go/42"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "/interstitial/42"),
        )
        .mount(&site.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/interstitial/42"))
        .respond_with(html(format!(
            r#"<html><body><script>window.location.replace("{}");</script></body></html>"#,
            site.url("www.fnac.com", "/a/42?sv1=affiliate&color=red")
        )))
        .mount(&site.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a/42"))
        .respond_with(html("<html><body>Product</body></html>"))
        .mount(&site.server)
        .await;

    let resolver = site.resolver(&create_test_config(&["fnac.com"]));
    let resolution = resolver.resolve(&site.url("news.example", "/go/42")).await;

    assert_eq!(
        resolution.url,
        site.url("www.fnac.com", "/a/42?color=red")
    );
}

#[tokio::test]
async fn test_last_resort_when_nothing_matches() {
    let site = TestSite::start().await;

    Mock::given(method("GET"))
        .and(path("/bons-plans/tv-123"))
        .respond_with(html(
            r#"<html><body><p>Expired deal</p><a href="/forum">Forum</a></body></html>"#,
        ))
        .mount(&site.server)
        .await;

    let input = site.url("www.dealabs.com", "/bons-plans/tv-123?utm_source=rss&page=2");
    let resolver = site.resolver(&create_test_config(&["fnac.com"]));
    let resolution = resolver.resolve(&input).await;

    assert_eq!(resolution.tier, ResolutionTier::LastResort);
    assert_eq!(
        resolution.url,
        site.url("www.dealabs.com", "/bons-plans/tv-123?page=2")
    );
}

#[tokio::test]
async fn test_structured_offer_short_circuits_later_candidates() {
    let site = TestSite::start().await;
    let offer = site.url("www.fnac.com", "/offer");
    let cta = site.url("go.dealabs.com", "/visit/cta");

    Mock::given(method("GET"))
        .and(path("/deal/1"))
        .respond_with(html(format!(
            r#"<html><head>
            <script type="application/ld+json">{{"@type": "Product", "offers": {{"url": "{}"}}}}</script>
            </head><body><a class="cept-dealBtn" href="{}">Voir le deal</a></body></html>"#,
            offer, cta
        )))
        .mount(&site.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/offer"))
        .respond_with(html("<html><body>Offer</body></html>"))
        .mount(&site.server)
        .await;

    // Wiremock verifies expect(0) when the mock server drops
    Mock::given(method("GET"))
        .and(path("/visit/cta"))
        .respond_with(html("<html></html>"))
        .expect(0)
        .mount(&site.server)
        .await;

    let (browser, browser_calls) = FakeBrowser::new(None);
    let resolver = site
        .resolver(&create_test_config(&["fnac.com"]))
        .with_browser(Box::new(browser));
    let resolution = resolver
        .resolve(&site.url("www.dealabs.com", "/deal/1"))
        .await;

    assert_eq!(resolution.url, offer);
    assert_eq!(
        resolution.tier,
        ResolutionTier::Candidate(CandidateOrigin::StructuredMetadata)
    );
    assert_eq!(browser_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_call_to_action_redirects_to_merchant() {
    let site = TestSite::start().await;

    Mock::given(method("GET"))
        .and(path("/bons-plans/casque-7"))
        .respond_with(html(format!(
            r#"<html><body><a data-role="thread-buy" href="{}">Voir le deal</a></body></html>"#,
            site.url("go.dealabs.com", "/visit/threadbuy/7")
        )))
        .mount(&site.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/visit/threadbuy/7"))
        .respond_with(ResponseTemplate::new(302).insert_header(
            "location",
            site.url("www.fnac.com", "/casque?awc=9_abc&utm_medium=deal&ref=7")
                .as_str(),
        ))
        .mount(&site.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/casque"))
        .respond_with(html("<html><body>Casque</body></html>"))
        .mount(&site.server)
        .await;

    let resolver = site.resolver(&create_test_config(&["fnac.com"]));
    let resolution = resolver
        .resolve(&site.url("www.dealabs.com", "/bons-plans/casque-7"))
        .await;

    assert_eq!(
        resolution.tier,
        ResolutionTier::Candidate(CandidateOrigin::CallToAction)
    );
    assert_eq!(resolution.url, site.url("www.fnac.com", "/casque?ref=7"));
}

#[tokio::test]
async fn test_error_page_is_not_analyzed() {
    let site = TestSite::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_raw(
            format!(
                r#"<script type="application/ld+json">{{"offers": {{"url": "{}"}}}}</script>"#,
                site.url("www.fnac.com", "/offer")
            ),
            "text/html",
        ))
        .mount(&site.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/offer"))
        .respond_with(html("<html></html>"))
        .expect(0)
        .mount(&site.server)
        .await;

    let resolver = site.resolver(&create_test_config(&["fnac.com"]));
    let resolution = resolver.resolve(&site.url("www.dealabs.com", "/gone")).await;

    assert_eq!(resolution.tier, ResolutionTier::LastResort);
    assert_eq!(resolution.url, site.url("www.dealabs.com", "/gone"));
}

#[tokio::test]
async fn test_merchant_input_is_chased_and_sanitized() {
    let site = TestSite::start().await;

    Mock::given(method("GET"))
        .and(path("/p"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/p2?id=9&eseg-x=1"))
        .mount(&site.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/p2"))
        .respond_with(html("<html><body>Product</body></html>"))
        .mount(&site.server)
        .await;

    let resolver = site.resolver(&create_test_config(&["fnac.com"]));
    let resolution = resolver
        .resolve(&site.url("www.fnac.com", "/p?awc=3"))
        .await;

    assert_eq!(resolution.tier, ResolutionTier::MerchantDirect);
    assert_eq!(resolution.url, site.url("www.fnac.com", "/p2?id=9"));
}

#[tokio::test]
async fn test_browser_fallback_used_when_candidates_fail() {
    let site = TestSite::start().await;

    Mock::given(method("GET"))
        .and(path("/bons-plans/js-only"))
        .respond_with(html("<html><body><div id=\"app\"></div></body></html>"))
        .mount(&site.server)
        .await;

    let observed = Url::parse("https://www.fnac.com/a/77?awc=1&color=red").unwrap();
    let (browser, browser_calls) = FakeBrowser::new(Some(observed));
    let resolver = site
        .resolver(&create_test_config(&["fnac.com"]))
        .with_browser(Box::new(browser));

    let resolution = resolver
        .resolve(&site.url("www.dealabs.com", "/bons-plans/js-only"))
        .await;

    assert_eq!(resolution.tier, ResolutionTier::Browser);
    assert_eq!(
        resolution.url.as_str(),
        "https://www.fnac.com/a/77?color=red"
    );
    assert_eq!(browser_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_browser_non_merchant_answer_falls_to_last_resort() {
    let site = TestSite::start().await;

    Mock::given(method("GET"))
        .and(path("/bons-plans/js-only"))
        .respond_with(html("<html><body></body></html>"))
        .mount(&site.server)
        .await;

    let elsewhere = Url::parse("https://consent.example/wall").unwrap();
    let (browser, browser_calls) = FakeBrowser::new(Some(elsewhere));
    let resolver = site
        .resolver(&create_test_config(&["fnac.com"]))
        .with_browser(Box::new(browser));

    let input = site.url("www.dealabs.com", "/bons-plans/js-only");
    let resolution = resolver.resolve(&input).await;

    assert_eq!(resolution.tier, ResolutionTier::LastResort);
    assert_eq!(resolution.url, input);
    assert_eq!(browser_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreachable_host_returns_sanitized_input() {
    let mut config = create_test_config(&["fnac.com"]);
    config.http.connect_timeout_secs = 1;
    let (browser, calls) = FakeBrowser::new(Some(Url::parse("https://www.fnac.com/a/1").unwrap()));
    let resolver = Resolver::from_config(&config)
        .expect("Failed to create resolver")
        .with_browser(Box::new(browser));

    let input = Url::parse("http://127.0.0.1:1/deal?utm_source=x&id=2").unwrap();
    let resolution = resolver.resolve(&input).await;

    assert_eq!(resolution.tier, ResolutionTier::LastResort);
    assert_eq!(resolution.url.as_str(), "http://127.0.0.1:1/deal?id=2");
    assert_eq!(
        calls.load(Ordering::SeqCst),
        0,
        "an unreachable page never reaches the browser tier"
    );
}

#[tokio::test]
async fn test_chaser_stops_at_hop_limit() {
    let site = TestSite::start().await;
    let config = create_test_config(&[]);

    // Refreshes to itself forever
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(html(r#"<meta http-equiv="refresh" content="0;url=/loop">"#))
        .expect(3)
        .mount(&site.server)
        .await;

    let start = site.url("news.example", "/loop");
    let reached = RedirectChaser::new(3)
        .follow(&site.fetcher(&config), &start, None)
        .await;

    assert_eq!(reached, start);
}

#[tokio::test]
async fn test_chaser_follows_destination_then_meta_refresh() {
    let site = TestSite::start().await;
    let config = create_test_config(&[]);
    let landing = site.url("www.fnac.com", "/a/1");
    let refresh = site.url("news.example", "/refresh");

    Mock::given(method("GET"))
        .and(path("/hop"))
        .respond_with(html("<html><body>tracking</body></html>"))
        .expect(1)
        .mount(&site.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/refresh"))
        .respond_with(html(format!(
            r#"<meta http-equiv="refresh" content="0;url={}">"#,
            landing
        )))
        .expect(1)
        .mount(&site.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a/1"))
        .respond_with(html("<html><body>Product</body></html>"))
        .expect(1)
        .mount(&site.server)
        .await;

    let mut start = site.url("go.dealabs.com", "/hop");
    start.query_pairs_mut().append_pair("ued", refresh.as_str());

    let reached = RedirectChaser::new(5)
        .follow(&site.fetcher(&config), &start, None)
        .await;

    assert_eq!(reached, landing);
}

#[tokio::test]
async fn test_chaser_ignores_signals_in_non_html() {
    let site = TestSite::start().await;
    let config = create_test_config(&[]);

    Mock::given(method("GET"))
        .and(path("/feed.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<meta http-equiv="refresh" content="0;url=/elsewhere">"#,
            "text/plain",
        ))
        .expect(1)
        .mount(&site.server)
        .await;

    let start = site.url("news.example", "/feed.txt");
    let reached = RedirectChaser::new(5)
        .follow(&site.fetcher(&config), &start, None)
        .await;

    assert_eq!(reached, start);
}

#[tokio::test]
async fn test_fetch_retries_transient_status() {
    let site = TestSite::start().await;
    let mut config = create_test_config(&[]);
    config.http.max_retries = 3;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&site.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(html("<html><body>OK</body></html>"))
        .mount(&site.server)
        .await;

    let page = site
        .fetcher(&config)
        .fetch(&site.url("news.example", "/flaky"), None)
        .await
        .expect("Fetch failed");

    assert_eq!(page.status, 200);
    assert!(page.body.contains("OK"));
}

#[tokio::test]
async fn test_fetch_surfaces_last_response_after_retries() {
    let site = TestSite::start().await;
    let mut config = create_test_config(&[]);
    config.http.max_retries = 2;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&site.server)
        .await;

    let page = site
        .fetcher(&config)
        .fetch(&site.url("news.example", "/down"), None)
        .await
        .expect("Fetch failed");

    assert_eq!(page.status, 502);
    assert!(!page.is_success());
}

#[tokio::test]
async fn test_fetch_sends_header_template_and_referer() {
    let site = TestSite::start().await;
    let config = create_test_config(&[]);
    let referer = site.url("www.dealabs.com", "/deal/1");

    Mock::given(method("GET"))
        .and(path("/checked"))
        .and(header("user-agent", TEST_USER_AGENT))
        .and(header("cache-control", "no-cache"))
        .and(header("referer", referer.as_str()))
        .and(header_exists("accept"))
        .and(header_exists("accept-language"))
        .respond_with(html("<html></html>"))
        .expect(1)
        .mount(&site.server)
        .await;

    let page = site
        .fetcher(&config)
        .fetch(&site.url("news.example", "/checked"), Some(&referer))
        .await
        .expect("Fetch failed");

    assert_eq!(page.status, 200);
}

#[tokio::test]
async fn test_resolve_for_publication_applies_affiliate_rule() {
    let site = TestSite::start().await;

    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(html("<html><body>Product</body></html>"))
        .mount(&site.server)
        .await;

    let mut config = create_test_config(&["merchant.example"]);
    config.affiliate.rules = vec![AffiliateRule {
        key: "merchant.example".to_string(),
        fragment: "?ref=partner42".to_string(),
    }];

    let resolver = site.resolver(&config);
    let input = site.url("www.merchant.example", "/item?utm_campaign=spring");

    let published = resolver.resolve_str(input.as_str()).await;
    assert_eq!(
        published,
        site.url("www.merchant.example", "/item?ref=partner42").to_string()
    );
}
