//! Page location and login redirects.
//!
//! The client never navigates on its own. It asks an injected [`Navigator`]
//! where the page is and tells it where to go, so the recovery logic stays
//! testable without a browser or a UI.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Where the user currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    /// URL scheme of the page, e.g. `https`.
    pub scheme: String,
    /// Path of the page, e.g. `/client/projects`.
    pub path: String,
}

impl PageLocation {
    pub fn new(scheme: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into().to_ascii_lowercase(),
            path: path.into(),
        }
    }

    /// Build a location from a full page URL.
    pub fn parse(page_url: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(page_url)?;
        Ok(Self::new(url.scheme(), url.path()))
    }

    /// True when the page is served over https.
    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }
}

/// Reports the current page and performs redirects.
pub trait Navigator: Send + Sync {
    fn current_location(&self) -> PageLocation;

    fn navigate(&self, destination: &str);
}

/// The two login pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginDestinations {
    pub admin: String,
    pub client: String,
}

impl Default for LoginDestinations {
    fn default() -> Self {
        Self {
            admin: "/admin/login".to_string(),
            client: "/client/login".to_string(),
        }
    }
}

impl LoginDestinations {
    /// Login page for the portal the path belongs to.
    ///
    /// Paths with a `client` segment belong to the client portal; everything
    /// else goes to the admin login.
    pub fn for_path(&self, path: &str) -> &str {
        if strip_query(path).split('/').any(|segment| segment == "client") {
            &self.client
        } else {
            &self.admin
        }
    }

    /// True when `path` is one of the login pages.
    pub fn is_login_page(&self, path: &str) -> bool {
        let path = normalize(path);
        path == normalize(&self.admin) || path == normalize(&self.client)
    }
}

fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

fn normalize(path: &str) -> &str {
    let path = strip_query(path);
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

/// In-memory navigator that records every redirect.
///
/// Navigating moves the current path, like a browser would.
#[derive(Debug)]
pub struct RecordingNavigator {
    location: Mutex<PageLocation>,
    history: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new(location: PageLocation) -> Self {
        Self {
            location: Mutex::new(location),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Navigator on an https page at `path`.
    pub fn secure(path: impl Into<String>) -> Self {
        Self::new(PageLocation::new("https", path))
    }

    /// Move to another page without recording a redirect.
    pub fn set_path(&self, path: impl Into<String>) {
        self.location.lock().path = path.into();
    }

    /// Every redirect issued so far, oldest first.
    pub fn navigations(&self) -> Vec<String> {
        self.history.lock().clone()
    }

    pub fn navigation_count(&self) -> usize {
        self.history.lock().len()
    }
}

impl Navigator for RecordingNavigator {
    fn current_location(&self) -> PageLocation {
        self.location.lock().clone()
    }

    fn navigate(&self, destination: &str) {
        self.history.lock().push(destination.to_string());
        self.location.lock().path = destination.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_path_client_segment() {
        let destinations = LoginDestinations::default();
        assert_eq!(destinations.for_path("/client/projects"), "/client/login");
        assert_eq!(destinations.for_path("/client"), "/client/login");
        assert_eq!(destinations.for_path("/admin/dashboard"), "/admin/login");
        assert_eq!(destinations.for_path("/"), "/admin/login");
        // Substrings of a segment do not count.
        assert_eq!(destinations.for_path("/clients/overview"), "/admin/login");
        assert_eq!(destinations.for_path("/admin?from=client"), "/admin/login");
    }

    #[test]
    fn test_is_login_page() {
        let destinations = LoginDestinations::default();
        assert!(destinations.is_login_page("/admin/login"));
        assert!(destinations.is_login_page("/client/login/"));
        assert!(destinations.is_login_page("/client/login?next=/client/chat"));
        assert!(!destinations.is_login_page("/client/projects"));
        assert!(!destinations.is_login_page("/"));
    }

    #[test]
    fn test_page_location_parse() {
        let location = PageLocation::parse("https://studio.example.com/client/chat?id=4").unwrap();
        assert_eq!(location.path, "/client/chat");
        assert!(location.is_secure());
        assert!(!PageLocation::new("HTTP", "/").is_secure());
    }

    #[test]
    fn test_recording_navigator_moves() {
        let navigator = RecordingNavigator::secure("/admin/dashboard");
        navigator.navigate("/admin/login");

        assert_eq!(navigator.navigations(), vec!["/admin/login"]);
        assert_eq!(navigator.current_location().path, "/admin/login");
    }
}
