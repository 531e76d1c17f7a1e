use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::transport::TransportError;

/// Message surfaced when the backend did not answer in time.
pub const TIMEOUT_MESSAGE: &str =
    "The server took too long to respond. Please try again in a moment.";

/// Message surfaced when no response was received at all.
pub const UNREACHABLE_MESSAGE: &str =
    "Unable to reach the server. Please check your connection and try again.";

/// A request as issued by a caller, before credentials are attached.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the configured base URL, or an absolute URL.
    pub target: String,
    /// Extra headers.
    pub headers: HeaderMap,
    /// JSON body.
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// Create a request with no headers and no body.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn put(target: impl Into<String>) -> Self {
        Self::new(Method::PUT, target)
    }

    pub fn patch(target: impl Into<String>) -> Self {
        Self::new(Method::PATCH, target)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::DELETE, target)
    }

    /// Attach a JSON body.
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        self
            .headers
            .entry(reqwest::header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static("application/json"));
        Ok(self)
    }

    /// Add a header, replacing any previous value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// A response from the backend, body already read.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// The body as text.
    pub fn text(&self) -> &str {
        &self.body
    }
}

/// Why an authentication failure was settled as an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    /// The page is already a login destination; nothing to recover.
    #[error("already on a login page")]
    OnLoginPage,

    /// The request was already re-dispatched once after a session reset.
    #[error("request already retried after a session reset")]
    AlreadyRetried,

    /// No credential was attached; the user was sent to log in.
    #[error("not logged in, redirected to {redirect_to}")]
    Unauthenticated { redirect_to: String },

    /// The session was invalidated; credentials were cleared and the user
    /// was sent to log in.
    #[error("session expired, redirected to {redirect_to}")]
    SessionExpired { redirect_to: String },
}

impl AuthFailure {
    /// Login destination the user was sent to, if this failure navigated.
    pub fn redirect_to(&self) -> Option<&str> {
        match self {
            Self::Unauthenticated { redirect_to } | Self::SessionExpired { redirect_to } => {
                Some(redirect_to)
            }
            Self::OnLoginPage | Self::AlreadyRetried => None,
        }
    }
}

/// Errors settled by the session client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No response was received. The message is safe to show to users.
    #[error("{message}")]
    Network {
        message: String,
        #[source]
        cause: TransportError,
    },

    /// The backend rejected the credential.
    #[error("authentication failed ({status}): {failure}")]
    Authentication {
        status: StatusCode,
        failure: AuthFailure,
    },

    /// Any other non-success response, passed through untouched.
    #[error("request failed with status {}", .0.status)]
    Business(ApiResponse),

    /// The target uses plain http while the page is served over https.
    #[error("refusing insecure request to {url} from a secure page")]
    InsecureTarget { url: String },

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The client was built with missing or invalid settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// A body could not be serialized or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Wrap a transport failure with a human-readable message.
    pub fn network(cause: TransportError) -> Self {
        let message = match cause {
            TransportError::Timeout => TIMEOUT_MESSAGE,
            TransportError::Unreachable { .. } => UNREACHABLE_MESSAGE,
        };
        Self::Network {
            message: message.to_string(),
            cause,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// The authentication outcome, if this is an authentication error.
    pub fn auth_failure(&self) -> Option<&AuthFailure> {
        match self {
            Self::Authentication { failure, .. } => Some(failure),
            _ => None,
        }
    }

    /// Response status, when a response was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Authentication { status, .. } => Some(*status),
            Self::Business(response) => Some(response.status),
            _ => None,
        }
    }
}

/// Result type for session client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
