use crate::UrlError;
use url::Url;

/// Extracts the host from a URL, lower-cased
///
/// # Examples
///
/// ```
/// use url::Url;
/// use deal_resolver::url::extract_host;
///
/// let url = Url::parse("https://WWW.FNAC.COM/path").unwrap();
/// assert_eq!(extract_host(&url), Some("www.fnac.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Parses an absolute HTTP(S) URL
///
/// Feed items carry arbitrary strings; anything that is not an absolute
/// `http`/`https` URL with a host is rejected here, before resolution starts.
///
/// # Examples
///
/// ```
/// use deal_resolver::url::parse_absolute;
///
/// assert!(parse_absolute("https://go.dealabs.com/visit/abc").is_ok());
/// assert!(parse_absolute("/visit/abc").is_err());
/// assert!(parse_absolute("ftp://example.com/file").is_err());
/// ```
pub fn parse_absolute(input: &str) -> Result<Url, UrlError> {
    let url = Url::parse(input.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}

/// Resolves a possibly-relative reference against a base, keeping only HTTP(S)
///
/// Returns None for empty references, `javascript:`/`mailto:`/`tel:`/`data:`
/// schemes, fragment-only anchors and anything that does not resolve to an
/// HTTP(S) URL.
pub fn resolve_reference(reference: &str, base: &Url) -> Option<Url> {
    let reference = reference.trim();

    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }

    let lower = reference.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    match base.join(reference) {
        Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
            absolute.host_str()?;
            Some(absolute)
        }
        _ => None,
    }
}
