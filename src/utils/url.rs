//! URL utilities for consistent URL handling
//!
//! Base URLs come from user configuration and stream locators come from the
//! flow service, so both are normalized before endpoints are appended.

use crate::core::constants::DEFAULT_BASE_URL;

/// Normalize a base URL by removing trailing slashes
///
/// # Examples
///
/// ```
/// use flowtalk::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:7860"), "http://localhost:7860");
/// assert_eq!(normalize_base_url("http://localhost:7860///"), "http://localhost:7860");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Construct a complete endpoint URL from a base URL and endpoint path
///
/// # Examples
///
/// ```
/// use flowtalk::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:7860/", "/api/v1/run/abc"),
///     "http://localhost:7860/api/v1/run/abc"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

/// Turn a configured service address into a usable base URL. Empty values
/// fall back to the default; bare host names are assumed to speak HTTPS.
pub fn resolve_base_url(configured: Option<&str>) -> String {
    let raw = configured.map(str::trim).unwrap_or("");
    let base = if raw.is_empty() { DEFAULT_BASE_URL } else { raw };
    let base = normalize_base_url(base);
    if base.starts_with("http") {
        base
    } else {
        format!("https://{base}")
    }
}

/// Resolve a locator returned by the service. Absolute URLs are used as-is;
/// anything else is taken as a path on the base URL.
pub fn resolve_against_base(base_url: &str, locator: &str) -> String {
    let locator = locator.trim();
    if locator.starts_with("http://") || locator.starts_with("https://") {
        locator.to_string()
    } else {
        construct_api_url(base_url, locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("http://localhost:7860/"),
            "http://localhost:7860"
        );
        assert_eq!(
            normalize_base_url("http://localhost:7860///"),
            "http://localhost:7860"
        );
        assert_eq!(normalize_base_url(""), "");
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn test_construct_api_url() {
        assert_eq!(
            construct_api_url("http://localhost:7860", "api/v1/run/f1"),
            "http://localhost:7860/api/v1/run/f1"
        );
        assert_eq!(
            construct_api_url("http://localhost:7860/", "/api/v1/run/f1"),
            "http://localhost:7860/api/v1/run/f1"
        );
        assert_eq!(
            construct_api_url("http://localhost:7860///", "///store/components/all"),
            "http://localhost:7860/store/components/all"
        );
    }

    #[test]
    fn test_resolve_base_url() {
        assert_eq!(resolve_base_url(None), DEFAULT_BASE_URL);
        assert_eq!(resolve_base_url(Some("   ")), DEFAULT_BASE_URL);
        assert_eq!(
            resolve_base_url(Some("flows.example.com/")),
            "https://flows.example.com"
        );
        assert_eq!(
            resolve_base_url(Some("http://10.0.0.2:7860/")),
            "http://10.0.0.2:7860"
        );
    }

    #[test]
    fn test_resolve_against_base() {
        assert_eq!(
            resolve_against_base("http://localhost:7860/", "/api/v1/build/x/stream"),
            "http://localhost:7860/api/v1/build/x/stream"
        );
        assert_eq!(
            resolve_against_base("http://localhost:7860", "https://cdn.example.com/s/1"),
            "https://cdn.example.com/s/1"
        );
    }
}
