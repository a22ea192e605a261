//! URL helpers: scheme repair, host extraction, and site-domain grouping keys.

use url::{Host, Url};

use crate::constants::storage::DEFAULT_URL_SCHEME;
use crate::errors::FormError;
use crate::types::SiteDomain;

/// Prepend `http://` when `url` carries no scheme separator.
pub fn add_scheme_if_missing(url: &str) -> String {
    if url.contains("//") {
        url.to_string()
    } else {
        format!("{DEFAULT_URL_SCHEME}{url}")
    }
}

/// Parse `url`, repairing a missing scheme first.
pub fn parse_url(url: &str) -> Result<Url, FormError> {
    Url::parse(&add_scheme_if_missing(url))
        .map_err(|err| FormError::Configuration(format!("invalid url '{url}': {err}")))
}

/// Host part of `url` (lowercase, without port).
pub fn url_host(url: &str) -> Result<String, FormError> {
    let parsed = parse_url(url)?;
    parsed
        .host_str()
        .map(|host| host.to_lowercase())
        .ok_or_else(|| FormError::Configuration(format!("url '{url}' has no host")))
}

/// Host of `url` followed by `:port` when a non-default port is given.
pub fn url_netloc(url: &str) -> Result<String, FormError> {
    let host = url_host(url)?;
    Ok(match parse_url(url)?.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}

/// Registrable domain of `url` without its public suffix.
///
/// `foo.example.co.uk` and `example.org` both map to `example`. IP hosts and
/// hosts without a known registrable part map to the host itself; URLs that do
/// not parse map to the lowercased input so grouping never fails.
pub fn site_domain(url: &str) -> SiteDomain {
    let Ok(parsed) = parse_url(url) else {
        return url.trim().to_lowercase();
    };
    match parsed.host() {
        Some(Host::Domain(host)) => registrable_label(&host.to_lowercase()),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => url.trim().to_lowercase(),
    }
}

fn registrable_label(host: &str) -> SiteDomain {
    let host = host.trim_end_matches('.');
    let (Some(domain), Some(suffix)) = (psl::domain_str(host), psl::suffix_str(host)) else {
        return host.to_string();
    };
    let label = domain
        .strip_suffix(suffix)
        .map(|rest| rest.trim_end_matches('.'))
        .unwrap_or(domain);
    if label.is_empty() {
        host.to_string()
    } else {
        label.to_string()
    }
}
