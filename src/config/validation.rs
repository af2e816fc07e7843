use crate::config::types::{AffiliateConfig, BrowserConfig, Config, HttpConfig, ResolverConfig, SanitizeConfig};
use crate::ConfigError;
use scraper::Selector;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_http_config(&config.http)?;
    validate_resolver_config(&config.resolver)?;
    validate_browser_config(&config.browser)?;
    validate_sanitize_config(&config.sanitize)?;
    validate_affiliate_config(&config.affiliate)?;
    Ok(())
}

/// Validates HTTP client configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(format!(
            "timeouts must be > 0, got timeout-secs={} connect-timeout-secs={}",
            config.timeout_secs, config.connect_timeout_secs
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

/// Validates resolver configuration
fn validate_resolver_config(config: &ResolverConfig) -> Result<(), ConfigError> {
    if config.max_hops < 1 || config.max_hops > 50 {
        return Err(ConfigError::Validation(format!(
            "max-hops must be between 1 and 50, got {}",
            config.max_hops
        )));
    }

    for pattern in config
        .merchant_domains
        .iter()
        .chain(config.affiliate_network_hints.iter())
    {
        validate_host_fragment(pattern)?;
    }

    for selector in &config.cta_selectors {
        Selector::parse(selector).map_err(|e| {
            ConfigError::InvalidPattern(format!("Invalid CTA selector '{}': {:?}", selector, e))
        })?;
    }

    Ok(())
}

const MAX_BROWSER_TIMEOUT_SECS: u64 = 300;

/// Validates browser fallback configuration
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.navigation_timeout_secs == 0
        || config.click_timeout_secs == 0
        || config.settle_timeout_secs == 0
    {
        return Err(ConfigError::Validation(
            "browser timeouts must be > 0".to_string(),
        ));
    }

    for (name, secs) in [
        ("navigation-timeout-secs", config.navigation_timeout_secs),
        ("click-timeout-secs", config.click_timeout_secs),
        ("settle-timeout-secs", config.settle_timeout_secs),
    ] {
        if secs > MAX_BROWSER_TIMEOUT_SECS {
            return Err(ConfigError::Validation(format!(
                "{} must be <= {}",
                name, MAX_BROWSER_TIMEOUT_SECS
            )));
        }
    }

    if let Some(path) = &config.chrome_path {
        if path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "chrome-path cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates sanitization rules
fn validate_sanitize_config(config: &SanitizeConfig) -> Result<(), ConfigError> {
    for rule in &config.merchant {
        validate_host_fragment(&rule.host)?;
    }

    let all_names = config
        .drop_prefixes
        .iter()
        .chain(config.drop_exact.iter())
        .chain(config.merchant.iter().flat_map(|r| r.drop_prefixes.iter()))
        .chain(config.merchant.iter().flat_map(|r| r.drop_exact.iter()));

    for name in all_names {
        if name.is_empty() {
            return Err(ConfigError::InvalidPattern(
                "Parameter name cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates affiliate rules
fn validate_affiliate_config(config: &AffiliateConfig) -> Result<(), ConfigError> {
    for rule in &config.rules {
        if rule.key.trim().is_empty() {
            return Err(ConfigError::InvalidPattern(
                "Affiliate rule key cannot be empty".to_string(),
            ));
        }

        if rule.fragment.is_empty() || rule.fragment == "?" {
            return Err(ConfigError::Validation(format!(
                "Affiliate rule '{}' has an empty fragment",
                rule.key
            )));
        }
    }

    if let Some(tag) = &config.amazon_tag {
        if tag.trim().is_empty() || tag.contains(['&', '=', '?', '#']) {
            return Err(ConfigError::Validation(format!(
                "Invalid amazon-tag: '{}'",
                tag
            )));
        }
    }

    Ok(())
}

/// Validates a hostname fragment used for substring matching
fn validate_host_fragment(fragment: &str) -> Result<(), ConfigError> {
    if fragment.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Host pattern cannot be empty".to_string(),
        ));
    }

    if !fragment
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host pattern '{}' contains invalid characters",
            fragment
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{AffiliateRule, MerchantRule};

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_host_fragment() {
        assert!(validate_host_fragment("fnac.com").is_ok());
        assert!(validate_host_fragment("fnac.").is_ok());
        assert!(validate_host_fragment("127.0.0.1").is_ok());
        assert!(validate_host_fragment("amazon").is_ok());

        assert!(validate_host_fragment("").is_err());
        assert!(validate_host_fragment("*.fnac.com").is_err());
        assert!(validate_host_fragment("fnac.com/path").is_err());
    }

    #[test]
    fn test_hop_limit_bounds() {
        let mut config = Config::default();
        config.resolver.max_hops = 0;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));

        config.resolver.max_hops = 51;
        assert!(validate(&config).is_err());

        config.resolver.max_hops = 8;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_browser_timeout_bounds() {
        let mut config = Config::default();
        config.browser.settle_timeout_secs = u64::MAX;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));

        config.browser.settle_timeout_secs = 301;
        assert!(validate(&config).is_err());

        config.browser.settle_timeout_secs = 300;
        assert!(validate(&config).is_ok());

        config.browser.navigation_timeout_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_cta_selector() {
        let mut config = Config::default();
        config.resolver.cta_selectors.push("a[".to_string());
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_empty_affiliate_fragment() {
        let mut config = Config::default();
        config.affiliate.rules.push(AffiliateRule {
            key: "merchant.example".to_string(),
            fragment: "?".to_string(),
        });
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_amazon_tag_with_separator() {
        let mut config = Config::default();
        config.affiliate.amazon_tag = Some("tag-21&x=1".to_string());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_merchant_override_name() {
        let mut config = Config::default();
        config.sanitize.merchant.push(MerchantRule {
            host: "shop.example".to_string(),
            drop_prefixes: vec![String::new()],
            drop_exact: vec![],
        });
        assert!(validate(&config).is_err());
    }
}
