use std::sync::Arc;

use portal_session_core::{CredentialStore, Secret, SecretStore};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::navigation::Navigator;
use crate::normalize::{enforce_page_scheme, resolve_target, same_backend};
use crate::recovery::{RecoverySnapshot, RecoveryState, Role};
use crate::transport::{HttpTransport, OutboundRequest, Transport};
use crate::types::{ApiRequest, ApiResponse, AuthFailure, ClientError, Result};

/// One outbound call, from first dispatch until it settles.
struct RequestContext {
    id: Uuid,
    request: ApiRequest,
    /// Set once the request has been through recovery; never re-enters it.
    retried: bool,
    /// Whether the last dispatch carried a bearer token.
    carried_credential: bool,
    /// Recovery epoch observed at the last dispatch.
    epoch: u64,
}

impl RequestContext {
    fn new(request: ApiRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            retried: false,
            carried_credential: false,
            epoch: 0,
        }
    }
}

enum Attempt {
    Done(ApiResponse),
    Unauthorized(StatusCode),
}

enum Recovery {
    Retry,
    Reject(AuthFailure),
}

/// Authenticated API client for the portals.
///
/// Every request is decorated with the best available bearer token. When the
/// backend reports the credential as invalid, exactly one request per
/// episode clears the stored credentials and redirects to the login page;
/// requests failing alongside it wait for that to finish and are then
/// re-dispatched once.
///
/// Clone is cheap; clones share credentials, recovery state and transport.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use portal_session_client::{RecordingNavigator, SessionClient, SessionConfig};
/// use portal_session_core::MemoryStore;
///
/// let client = SessionClient::builder(SessionConfig::default())
///     .store(Arc::new(MemoryStore::new()))
///     .navigator(Arc::new(RecordingNavigator::secure("/client/projects")))
///     .build()?;
///
/// let projects = client.get("/projects").await?.json::<Vec<Project>>()?;
/// ```
#[derive(Clone)]
pub struct SessionClient {
    config: Arc<SessionConfig>,
    base_url: Url,
    credentials: CredentialStore,
    transport: Arc<dyn Transport>,
    navigator: Arc<dyn Navigator>,
    recovery: Arc<RecoveryState>,
}

impl SessionClient {
    pub fn builder(config: SessionConfig) -> SessionClientBuilder {
        SessionClientBuilder::new(config)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// Current recovery state.
    pub fn recovery_snapshot(&self) -> RecoverySnapshot {
        self.recovery.snapshot()
    }

    pub async fn get(&self, target: &str) -> Result<ApiResponse> {
        self.send(ApiRequest::get(target)).await
    }

    pub async fn delete(&self, target: &str) -> Result<ApiResponse> {
        self.send(ApiRequest::delete(target)).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, target: &str, body: &B) -> Result<ApiResponse> {
        self.send(ApiRequest::post(target).with_json(body)?).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, target: &str, body: &B) -> Result<ApiResponse> {
        self.send(ApiRequest::put(target).with_json(body)?).await
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, target: &str, body: &B) -> Result<ApiResponse> {
        self.send(ApiRequest::patch(target).with_json(body)?).await
    }

    /// Send a request and settle it.
    ///
    /// Returns the response for 2xx statuses. Network failures, business
    /// errors and authentication outcomes come back as [`ClientError`].
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut ctx = RequestContext::new(request);

        loop {
            match self.dispatch(&mut ctx).await? {
                Attempt::Done(response) => return Ok(response),
                Attempt::Unauthorized(status) => match self.recover(&mut ctx).await {
                    Recovery::Retry => {
                        debug!(request_id = %ctx.id, "Re-dispatching after session recovery");
                    }
                    Recovery::Reject(failure) => {
                        return Err(ClientError::Authentication { status, failure });
                    }
                },
            }
        }
    }

    async fn dispatch(&self, ctx: &mut RequestContext) -> Result<Attempt> {
        let page = self.navigator.current_location();
        let url = resolve_target(&self.base_url, &ctx.request.target)?;
        let url = enforce_page_scheme(url, &page, self.config.mixed_content)?;
        let own_backend = same_backend(&self.base_url, &url);

        // Stamp the epoch before reading the token: a token read after an
        // episode started must never be mistaken for a fresh session.
        ctx.epoch = self.recovery.epoch();
        let token = if own_backend {
            self.credentials.resolve_token().await
        } else {
            None
        };
        ctx.carried_credential = token.is_some();

        let mut headers = ctx.request.headers.clone();
        if let Some(token) = &token {
            headers.insert(AUTHORIZATION, bearer(token)?);
        }

        debug!(
            request_id = %ctx.id,
            method = %ctx.request.method,
            %url,
            authenticated = ctx.carried_credential,
            own_backend,
            retried = ctx.retried,
            "Dispatching request"
        );

        let outbound = OutboundRequest {
            method: ctx.request.method.clone(),
            url,
            headers,
            body: ctx.request.body.clone(),
        };

        match self.transport.send(outbound).await {
            Err(e) => {
                warn!(request_id = %ctx.id, error = %e, "Request failed without a response");
                Err(ClientError::network(e))
            }
            Ok(response) if own_backend && self.config.is_auth_failure(response.status) => {
                Ok(Attempt::Unauthorized(response.status))
            }
            Ok(response) if response.is_success() => Ok(Attempt::Done(response)),
            Ok(response) => {
                debug!(request_id = %ctx.id, status = %response.status, "Passing through error response");
                Err(ClientError::Business(response))
            }
        }
    }

    async fn recover(&self, ctx: &mut RequestContext) -> Recovery {
        let page = self.navigator.current_location();
        let destinations = &self.config.destinations;

        if destinations.is_login_page(&page.path) {
            debug!(request_id = %ctx.id, path = %page.path, "Authentication failed on a login page");
            return Recovery::Reject(AuthFailure::OnLoginPage);
        }

        if ctx.retried {
            debug!(request_id = %ctx.id, "Authentication failed again after recovery");
            return Recovery::Reject(AuthFailure::AlreadyRetried);
        }

        match self.recovery.enter(ctx.epoch, ctx.carried_credential) {
            Role::Join(waiter) => {
                info!(request_id = %ctx.id, "Session recovery in progress, queueing request");
                // A dropped sender also means the episode is over.
                let _ = waiter.await;
                ctx.retried = true;
                Recovery::Retry
            }
            Role::Rejoin => {
                debug!(request_id = %ctx.id, "Session was recovered since dispatch");
                ctx.retried = true;
                Recovery::Retry
            }
            Role::Unauthenticated => {
                let redirect_to = destinations.for_path(&page.path).to_string();
                info!(request_id = %ctx.id, %redirect_to, "No credential, redirecting to login");
                self.navigator.navigate(&redirect_to);
                Recovery::Reject(AuthFailure::Unauthenticated { redirect_to })
            }
            Role::Lead(episode) => {
                ctx.retried = true;
                warn!(request_id = %ctx.id, "Session invalidated, clearing credentials");

                self.credentials.clear_all().await;
                let released = episode.release_waiters();

                let redirect_to = destinations.for_path(&page.path).to_string();
                self.navigator.navigate(&redirect_to);
                let late = episode.finish();

                info!(
                    request_id = %ctx.id,
                    %redirect_to,
                    released = released + late,
                    "Session recovery complete"
                );
                Recovery::Reject(AuthFailure::SessionExpired { redirect_to })
            }
        }
    }
}

fn bearer(token: &Secret) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose())).map_err(|_| {
        ClientError::InvalidRequest("stored token contains characters not allowed in a header".to_string())
    })?;
    value.set_sensitive(true);
    Ok(value)
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("base_url", &self.base_url.as_str())
            .field("recovery", &self.recovery.snapshot())
            .finish_non_exhaustive()
    }
}

/// Builder for a [`SessionClient`].
///
/// A credential source ([`credentials`](Self::credentials) or
/// [`store`](Self::store)) and a [`navigator`](Self::navigator) are required.
/// The transport defaults to [`HttpTransport`] with the configured timeout.
pub struct SessionClientBuilder {
    config: SessionConfig,
    credentials: Option<CredentialStore>,
    transport: Option<Arc<dyn Transport>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl SessionClientBuilder {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            credentials: None,
            transport: None,
            navigator: None,
        }
    }

    /// Use an existing credential store (its own slot layout applies).
    pub fn credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Build a credential store over `store` with the configured slot layout.
    pub fn store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.credentials = Some(CredentialStore::new(store, self.config.slots.clone()));
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn build(self) -> Result<SessionClient> {
        let base_url = self.config.validate()?;
        let credentials = self
            .credentials
            .ok_or_else(|| ClientError::Config("no credential store configured".to_string()))?;
        let navigator = self
            .navigator
            .ok_or_else(|| ClientError::Config("no navigator configured".to_string()))?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(self.config.timeout())?),
        };

        Ok(SessionClient {
            config: Arc::new(self.config),
            base_url,
            credentials,
            transport,
            navigator,
            recovery: Arc::new(RecoveryState::new()),
        })
    }
}
