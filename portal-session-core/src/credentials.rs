//! Named credential slots over a [`SecretStore`].
//!
//! [`CredentialStore`] maps "the best credential available right now" to a
//! bearer token and wipes every slot at once when a session is invalidated.
//! Reads never fail: a missing key, an empty value, or a backend error all
//! read as absent (errors are logged).

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{CredentialSlot, Identity, SlotLayout, SlotName, SlotSpec};
use crate::store::{Secret, SecretStore, StoreError};

/// Error type for credential writes.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The slot is not part of the layout.
    #[error("unknown credential slot: {slot}")]
    UnknownSlot { slot: String },

    /// An identity was supplied for a slot without a profile key.
    #[error("slot {slot} has no profile key")]
    NoProfileKey { slot: String },

    /// The token is empty.
    #[error("refusing to store an empty token for slot {slot}")]
    EmptyToken { slot: String },

    /// The identity payload could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Credential slots backed by a persistent key/value store.
///
/// Cloning is cheap; clones share the same backend.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn SecretStore>,
    layout: SlotLayout,
}

impl CredentialStore {
    /// Create a credential store with an explicit slot layout.
    pub fn new(store: Arc<dyn SecretStore>, layout: SlotLayout) -> Self {
        Self { store, layout }
    }

    /// Create a credential store with the default legacy-admin, admin,
    /// client layout.
    pub fn with_default_layout(store: Arc<dyn SecretStore>) -> Self {
        Self::new(store, SlotLayout::default())
    }

    /// The slot layout, in precedence order.
    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    /// The underlying key/value store.
    pub fn backend(&self) -> &Arc<dyn SecretStore> {
        &self.store
    }

    /// Return the highest-precedence slot holding a token, with the token.
    pub async fn resolve(&self) -> Option<(SlotName, Secret)> {
        for slot in self.layout.slots() {
            if let Some(token) = self.read(&slot.token_key).await {
                debug!(slot = %slot.name, "Resolved credential");
                return Some((slot.name.clone(), token));
            }
        }
        None
    }

    /// Return the highest-precedence token, or `None` if no slot holds one.
    pub async fn resolve_token(&self) -> Option<Secret> {
        self.resolve().await.map(|(_, token)| token)
    }

    /// Read one slot's token and identity.
    pub async fn slot(&self, name: &SlotName) -> Result<CredentialSlot, CredentialError> {
        let spec = self.spec(name)?;
        let token = self.read(&spec.token_key).await;
        let identity = match &spec.profile_key {
            Some(key) => self.read_identity(key).await,
            None => None,
        };

        Ok(CredentialSlot {
            name: spec.name.clone(),
            token,
            identity,
        })
    }

    /// Read one slot's cached identity.
    pub async fn identity(&self, name: &SlotName) -> Option<Identity> {
        let key = self.layout.get(name)?.profile_key.as_ref()?;
        self.read_identity(key).await
    }

    /// Store a token (and optionally an identity) in a slot.
    ///
    /// This is the login path; the session client never writes credentials.
    pub async fn store_slot(
        &self,
        name: &SlotName,
        token: &Secret,
        identity: Option<&Identity>,
    ) -> Result<(), CredentialError> {
        let spec = self.spec(name)?;
        if token.is_empty() {
            return Err(CredentialError::EmptyToken {
                slot: name.to_string(),
            });
        }

        let profile = match (identity, &spec.profile_key) {
            (Some(identity), Some(key)) => Some((key, Secret::new(serde_json::to_string(identity)?))),
            (Some(_), None) => {
                return Err(CredentialError::NoProfileKey {
                    slot: name.to_string(),
                });
            }
            (None, _) => None,
        };

        self.store.set(&spec.token_key, token).await?;
        if let Some((key, payload)) = profile {
            self.store.set(key, &payload).await?;
        }

        info!(slot = %name, "Stored credential");
        Ok(())
    }

    /// Remove one slot's token and identity.
    pub async fn clear_slot(&self, name: &SlotName) -> Result<(), CredentialError> {
        let spec = self.spec(name)?;
        self.store.delete(&spec.token_key).await?;
        if let Some(key) = &spec.profile_key {
            self.store.delete(key).await?;
        }
        Ok(())
    }

    /// Remove every slot's token and identity payload.
    ///
    /// Idempotent. A key that fails to delete is logged and the remaining
    /// keys are still removed.
    pub async fn clear_all(&self) {
        let mut failed = 0usize;
        for key in self.layout.persisted_keys() {
            if let Err(e) = self.store.delete(key).await {
                failed += 1;
                warn!(key, error = %e, "Failed to remove credential key");
            }
        }

        if failed == 0 {
            info!("Cleared all credential slots");
        } else {
            warn!(failed, "Cleared credential slots with failures");
        }
    }

    fn spec(&self, name: &SlotName) -> Result<&SlotSpec, CredentialError> {
        self.layout
            .get(name)
            .ok_or_else(|| CredentialError::UnknownSlot {
                slot: name.to_string(),
            })
    }

    async fn read(&self, key: &str) -> Option<Secret> {
        match self.store.get(key).await {
            Ok(Some(value)) if !value.is_empty() => Some(value),
            Ok(_) => None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read credential key, treating as absent");
                None
            }
        }
    }

    async fn read_identity(&self, key: &str) -> Option<Identity> {
        let raw = self.read(key).await?;
        match serde_json::from_str(raw.expose()) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!(key, error = %e, "Discarding unreadable identity payload");
                None
            }
        }
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}
