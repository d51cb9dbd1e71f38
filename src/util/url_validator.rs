use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed as an absolute URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates that a string is an absolute HTTP(S) link.
///
/// Article links from both upstream feeds pass through here before they are
/// accepted as item identifiers. Relative paths, `javascript:` links and
/// other schemes are rejected.
///
/// # Examples
///
/// ```
/// use newsroll::util::validate_url;
///
/// let url = validate_url("https://www.nytimes.com/2024/01/01/science/mars.html").unwrap();
/// assert_eq!(url.host_str(), Some("www.nytimes.com"));
///
/// assert!(validate_url("/2024/01/01/science/mars.html").is_err());
/// assert!(validate_url("javascript:alert(1)").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlValidationError::MissingHost),
    }
}

/// Returns true when `url_str` is an absolute HTTP(S) link.
pub fn is_absolute_http(url_str: &str) -> bool {
    validate_url(url_str).is_ok()
}

/// Qualifies a possibly-relative media path against a source's base URL.
///
/// Absolute HTTP(S) paths are returned unchanged. Relative paths are joined
/// onto `base`. Returns `None` when the result is not a usable HTTP(S) link.
pub fn qualify_url(path: &str, base: Option<&Url>) -> Option<String> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    if let Ok(url) = validate_url(path) {
        return Some(url.into());
    }
    let joined = base?.join(path).ok()?;
    match joined.scheme() {
        "http" | "https" => Some(joined.into()),
        _ => None,
    }
}
