//! Deal-Resolver main entry point
//!
//! This is the command-line interface for the Deal-Resolver link resolver.

use anyhow::Context;
use clap::Parser;
use deal_resolver::config::{load_config_with_hash, Config};
use deal_resolver::url::parse_absolute;
use deal_resolver::{AffiliateRewriter, Resolver};
use std::io::BufRead;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Deal-Resolver: outbound link resolution for deal aggregation
///
/// Deal-Resolver turns deal-site and affiliate-network links into the real
/// merchant URL, strips tracking parameters and applies the configured
/// affiliate rewriting. Each line of output is `<published>\t<original>`.
#[derive(Parser, Debug)]
#[command(name = "deal-resolver")]
#[command(version = "1.0.0")]
#[command(about = "Resolves deal links to clean merchant URLs", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// URLs to resolve; read from stdin, one per line, when omitted
    #[arg(value_name = "URL")]
    urls: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the effective settings without resolving
    #[arg(long)]
    dry_run: bool,

    /// Never use the browser fallback for this run
    #[arg(long)]
    no_browser: bool,

    /// Print the resolved URL without affiliate rewriting
    #[arg(long)]
    raw: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, cli.no_browser);
        return Ok(());
    }

    let mut resolver = Resolver::from_config(&config).context("Failed to build resolver")?;
    if cli.no_browser {
        resolver = resolver.without_browser();
    }

    if config.resolver.merchant_domains.is_empty() {
        tracing::warn!("No merchant domains configured; every link ends at the last resort");
    }
    if !cli.raw && resolver.rewriter().is_noop() {
        tracing::info!("No affiliate rewriting configured; publishing sanitized URLs");
    }

    let inputs = if cli.urls.is_empty() {
        read_stdin_urls().context("Failed to read URLs from stdin")?
    } else {
        cli.urls
    };

    handle_resolve(&resolver, &inputs, cli.raw).await;

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("deal_resolver=info,warn"),
            1 => EnvFilter::new("deal_resolver=debug,info"),
            2 => EnvFilter::new("deal_resolver=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // stdout carries results
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn read_stdin_urls() -> std::io::Result<Vec<String>> {
    let stdin = std::io::stdin();
    let mut urls = Vec::new();
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            urls.push(line.to_string());
        }
    }
    Ok(urls)
}

/// Handles the --dry-run mode: validates config and shows what would be used
fn handle_dry_run(config: &Config, no_browser: bool) {
    println!("=== Deal-Resolver Dry Run ===\n");

    println!("HTTP:");
    println!("  User agent: {}", config.http.user_agent);
    println!("  Accept-Language: {}", config.http.accept_language);
    println!(
        "  Timeout: {}s (connect {}s)",
        config.http.timeout_secs, config.http.connect_timeout_secs
    );
    println!(
        "  Retries: {} (backoff from {}ms)",
        config.http.max_retries, config.http.backoff_base_ms
    );

    println!("\nResolver:");
    println!("  Max hops: {}", config.resolver.max_hops);
    let browser = if no_browser {
        "disabled (--no-browser)"
    } else if !config.resolver.browser {
        "disabled (config)"
    } else if cfg!(feature = "browser") {
        "enabled"
    } else {
        "not compiled in"
    };
    println!("  Browser fallback: {}", browser);

    println!(
        "\nMerchant Domains ({}):",
        config.resolver.merchant_domains.len()
    );
    for domain in &config.resolver.merchant_domains {
        println!("  - {}", domain);
    }

    println!(
        "\nAffiliate Network Hints ({}):",
        config.resolver.affiliate_network_hints.len()
    );
    for hint in &config.resolver.affiliate_network_hints {
        println!("  - {}", hint);
    }

    println!("\nCTA Selectors ({}):", config.resolver.cta_selectors.len());
    for selector in &config.resolver.cta_selectors {
        println!("  - {}", selector);
    }

    println!("\nSanitization:");
    println!("  Drop prefixes: {}", config.sanitize.drop_prefixes.join(", "));
    println!("  Drop exact: {}", config.sanitize.drop_exact.join(", "));
    for rule in &config.sanitize.merchant {
        println!(
            "  - {}: prefixes [{}], exact [{}]",
            rule.host,
            rule.drop_prefixes.join(", "),
            rule.drop_exact.join(", ")
        );
    }

    println!("\nAffiliate Rules ({}):", config.affiliate.rules.len());
    if AffiliateRewriter::from_config(&config.affiliate).is_noop() {
        println!("  (none: published URLs are only sanitized)");
    }
    for rule in &config.affiliate.rules {
        println!("  - {} => {}", rule.key, rule.fragment);
    }
    if let Some(tag) = &config.affiliate.amazon_tag {
        println!("  Amazon tag: {}", tag);
    }

    println!("\n✓ Configuration is valid");
}

/// Resolves each input in order and prints `<result>\t<input>`
async fn handle_resolve(resolver: &Resolver, inputs: &[String], raw: bool) {
    for input in inputs {
        let output = if raw {
            resolve_unpublished(resolver, input).await
        } else {
            resolver.resolve_str(input).await
        };

        println!("{}\t{}", output, input);
    }

    tracing::info!("Resolved {} link(s)", inputs.len());
}

/// Resolves without the publication rewrite, echoing unparsable input
async fn resolve_unpublished(resolver: &Resolver, input: &str) -> String {
    match parse_absolute(input) {
        Ok(url) => resolver.resolve(&url).await.url.to_string(),
        Err(e) => {
            tracing::warn!("Not resolving {:?}: {}", input, e);
            input.to_string()
        }
    }
}
