//! # Portal Session Core
//!
//! Credential storage for the admin and client portals.
//!
//! This crate provides:
//! - [`Secret`], a redacting, zero-on-drop wrapper for tokens
//! - The [`SecretStore`] trait with memory, file and (optionally) keyring backends
//! - The slot model: [`SlotName`], [`SlotSpec`], [`SlotLayout`], [`Identity`]
//! - [`CredentialStore`], which resolves the best bearer token and clears
//!   every slot at once
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use portal_session_core::{CredentialStore, MemoryStore, Secret, SlotName};
//!
//! let creds = CredentialStore::with_default_layout(Arc::new(MemoryStore::new()));
//! creds.store_slot(&SlotName::client(), &Secret::new("eyJ..."), None).await?;
//!
//! let token = creds.resolve_token().await;   // Some(client token)
//! creds.clear_all().await;
//! assert!(creds.resolve_token().await.is_none());
//! ```

pub mod credentials;
pub mod model;
pub mod store;

// Re-export commonly used types at crate root
pub use model::{
    CredentialSlot,
    Identity,
    LayoutError,
    SlotLayout,
    SlotName,
    SlotSpec,
};

pub use store::{
    create_store,
    FileStore,
    MemoryStore,
    Secret,
    SecretStore,
    StoreBackend,
    StoreError,
};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;

pub use credentials::{CredentialError, CredentialStore};
