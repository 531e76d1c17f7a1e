//! Portal Session Client
//!
//! Authenticated HTTP client for the admin and client portals.
//!
//! Every request carries the best stored bearer token. When the backend says
//! the session is no longer valid, the client clears all stored credentials
//! and redirects to the matching login page exactly once, no matter how many
//! requests were in flight.
//!
//! # Overview
//!
//! - [`SessionClient`] decorates, sends and settles requests
//! - [`Transport`] is the network seam; [`HttpTransport`] uses reqwest
//! - [`Navigator`] reports the current page and performs redirects
//! - [`SessionConfig`] holds the base URL, timeout, failure statuses and
//!   login destinations
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use portal_session_client::{RecordingNavigator, SessionClient, SessionConfig};
//! use portal_session_core::MemoryStore;
//!
//! let navigator = Arc::new(RecordingNavigator::secure("/admin/dashboard"));
//! let client = SessionClient::builder(SessionConfig::default())
//!     .store(Arc::new(MemoryStore::new()))
//!     .navigator(navigator.clone())
//!     .build()?;
//!
//! match client.get("/testimonials").await {
//!     Ok(response) => println!("{}", response.text()),
//!     Err(e) if e.is_network() => eprintln!("{e}"),
//!     Err(e) => eprintln!("request failed: {e}"),
//! }
//! ```
//!
//! # Settlement
//!
//! | Outcome | Result |
//! |---------|--------|
//! | 2xx | `Ok(ApiResponse)` |
//! | No response | [`ClientError::Network`] with a user-facing message |
//! | Auth failure status | [`ClientError::Authentication`] after recovery, or `Ok` after a successful retry |
//! | Any other status | [`ClientError::Business`] carrying the response |
//!
//! Absolute targets on another origin are sent without the bearer token, and
//! every non-2xx status from them is a [`ClientError::Business`].

mod client;
pub mod config;
pub mod navigation;
pub mod normalize;
mod recovery;
pub mod transport;
pub mod types;

pub use client::{SessionClient, SessionClientBuilder};
pub use config::{MixedContentPolicy, SessionConfig, DEFAULT_TIMEOUT_SECS};
pub use navigation::{LoginDestinations, Navigator, PageLocation, RecordingNavigator};
pub use recovery::RecoverySnapshot;
pub use transport::{HttpTransport, OutboundRequest, Transport, TransportError};
pub use reqwest::{Method, StatusCode};
pub use types::{
    ApiRequest, ApiResponse, AuthFailure, ClientError, Result, TIMEOUT_MESSAGE,
    UNREACHABLE_MESSAGE,
};
