use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur during endpoint validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain HTTP to a non-local host would expose the access token.
    #[error("Insecure endpoint: HTTPS required (except localhost for testing)")]
    Insecure,
    #[error("URL has no host")]
    MissingHost,
}

/// Validates the posting API endpoint.
///
/// The access token travels in every request, so the endpoint must use
/// HTTPS. Plain HTTP is accepted only for `localhost` and loopback
/// addresses, which is what local test servers bind to.
///
/// # Examples
///
/// ```
/// use feedtoot::util::validate_endpoint;
///
/// assert!(validate_endpoint("https://mastodon.social").is_ok());
/// assert!(validate_endpoint("http://127.0.0.1:8080").is_ok());
/// assert!(validate_endpoint("http://mastodon.social").is_err());
/// assert!(validate_endpoint("ftp://mastodon.social").is_err());
/// ```
pub fn validate_endpoint(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;

    match url.scheme() {
        "https" => Ok(url),
        "http" if is_local_host(host) => {
            tracing::warn!(endpoint = %url, "Using non-HTTPS endpoint (localhost only)");
            Ok(url)
        }
        "http" => Err(UrlValidationError::Insecure),
        scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
}

fn is_local_host(host: &str) -> bool {
    if host == "localhost" {
        return true;
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    host_for_parse
        .parse::<IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}
