//! Target URL resolution and scheme normalization.

use url::Url;

use crate::config::MixedContentPolicy;
use crate::navigation::PageLocation;
use crate::types::ClientError;

/// Resolve a request target against the base URL.
///
/// Absolute `http(s)` URLs are used as-is. Anything else is appended to the
/// base URL with exactly one slash between them, so a base of
/// `https://api.example.com/api` and a target of `/projects` give
/// `https://api.example.com/api/projects`.
pub fn resolve_target(base: &Url, target: &str) -> Result<Url, ClientError> {
    if let Ok(url) = Url::parse(target) {
        if matches!(url.scheme(), "http" | "https") {
            return Ok(url);
        }
    }

    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        target.trim_start_matches('/')
    );
    Url::parse(&joined)
        .map_err(|e| ClientError::InvalidRequest(format!("invalid target {:?}: {}", target, e)))
}

/// Whether `url` points at the backend named by `base`.
///
/// Host and explicit port must match. The scheme must match too, except that
/// an `http` base also owns its `https` upgrade.
pub fn same_backend(base: &Url, url: &Url) -> bool {
    let scheme_matches = base.scheme() == url.scheme()
        || (base.scheme() == "http" && url.scheme() == "https");
    scheme_matches && base.host_str() == url.host_str() && base.port() == url.port()
}

/// Keep an `http` target from being requested by an `https` page.
pub fn enforce_page_scheme(
    mut url: Url,
    page: &PageLocation,
    policy: MixedContentPolicy,
) -> Result<Url, ClientError> {
    if !page.is_secure() || url.scheme() != "http" {
        return Ok(url);
    }

    match policy {
        MixedContentPolicy::Upgrade => {
            url.set_scheme("https").map_err(|()| {
                ClientError::InvalidRequest(format!("cannot upgrade {} to https", url))
            })?;
            tracing::debug!(%url, "Upgraded insecure target to https");
            Ok(url)
        }
        MixedContentPolicy::Reject => Err(ClientError::InsecureTarget {
            url: url.to_string(),
        }),
    }
}
