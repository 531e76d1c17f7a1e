//! Domain model types for portal sessions.
//!
//! This module defines the types the credential store is built from:
//! - [`SlotName`] - Identifier for a credential slot (e.g., "admin", "client")
//! - [`SlotSpec`] - Which persisted keys back a slot
//! - [`SlotLayout`] - The ordered set of slots; order is token precedence
//! - [`Identity`] - Cached profile payload stored next to a slot's token
//! - [`CredentialSlot`] - A slot as read back from storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::store::Secret;

/// Identifier for a credential slot.
///
/// Slot names are normalized to lowercase.
///
/// # Examples
///
/// ```
/// use portal_session_core::SlotName;
///
/// let admin = SlotName::new("Admin");
/// assert_eq!(admin.as_str(), "admin");
/// assert_eq!(admin, SlotName::admin());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct SlotName(String);

impl SlotName {
    /// Create a new slot name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().to_lowercase())
    }

    /// Slot written by older admin logins, before admin and client were split.
    pub fn legacy_admin() -> Self {
        Self::new("legacy-admin")
    }

    /// The admin portal slot.
    pub fn admin() -> Self {
        Self::new("admin")
    }

    /// The client portal slot.
    pub fn client() -> Self {
        Self::new("client")
    }

    /// Get the slot name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SlotName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SlotName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Persisted keys backing one credential slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSpec {
    /// Slot name.
    pub name: SlotName,

    /// Key holding the bearer token.
    pub token_key: String,

    /// Key holding the cached identity payload, if the slot has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_key: Option<String>,
}

impl SlotSpec {
    /// Create a slot spec with a token key only.
    pub fn new(name: impl Into<SlotName>, token_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token_key: token_key.into(),
            profile_key: None,
        }
    }

    /// Attach a profile key.
    pub fn with_profile_key(mut self, key: impl Into<String>) -> Self {
        self.profile_key = Some(key.into());
        self
    }
}

/// Error type for invalid slot layouts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    /// The layout has no slots.
    #[error("slot layout is empty")]
    Empty,

    /// Two slots share a name.
    #[error("duplicate slot name: {name}")]
    DuplicateSlot { name: String },

    /// Two slots (or a token and a profile) share a persisted key.
    #[error("persisted key used twice: {key}")]
    DuplicateKey { key: String },

    /// A slot has an empty token or profile key.
    #[error("slot {slot} has an empty key")]
    EmptyKey { slot: String },
}

/// Ordered set of credential slots.
///
/// The order is the token precedence: when several slots hold a token, the
/// first one in the layout wins. Names and persisted keys are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<SlotSpec>", into = "Vec<SlotSpec>")]
pub struct SlotLayout {
    slots: Vec<SlotSpec>,
}

impl SlotLayout {
    /// Build a layout, validating names and keys.
    pub fn new(slots: Vec<SlotSpec>) -> Result<Self, LayoutError> {
        validate(&slots)?;
        Ok(Self { slots })
    }

    /// Slots in precedence order.
    pub fn slots(&self) -> &[SlotSpec] {
        &self.slots
    }

    /// Look up a slot by name.
    pub fn get(&self, name: &SlotName) -> Option<&SlotSpec> {
        self.slots.iter().find(|s| &s.name == name)
    }

    /// Every persisted key the layout owns, tokens and profiles alike.
    pub fn persisted_keys(&self) -> Vec<&str> {
        self.slots
            .iter()
            .flat_map(|s| std::iter::once(s.token_key.as_str()).chain(s.profile_key.as_deref()))
            .collect()
    }
}

fn validate(slots: &[SlotSpec]) -> Result<(), LayoutError> {
    if slots.is_empty() {
        return Err(LayoutError::Empty);
    }

    let mut names = HashSet::new();
    let mut keys = HashSet::new();
    for slot in slots {
        if !names.insert(slot.name.as_str()) {
            return Err(LayoutError::DuplicateSlot {
                name: slot.name.to_string(),
            });
        }

        let slot_keys = std::iter::once(slot.token_key.as_str()).chain(slot.profile_key.as_deref());
        for key in slot_keys {
            if key.is_empty() {
                return Err(LayoutError::EmptyKey {
                    slot: slot.name.to_string(),
                });
            }
            if !keys.insert(key) {
                return Err(LayoutError::DuplicateKey {
                    key: key.to_string(),
                });
            }
        }
    }

    Ok(())
}

impl Default for SlotLayout {
    fn default() -> Self {
        Self {
            slots: vec![
                SlotSpec::new(SlotName::legacy_admin(), "token"),
                SlotSpec::new(SlotName::admin(), "admin_token").with_profile_key("admin_user"),
                SlotSpec::new(SlotName::client(), "client_token").with_profile_key("client_user"),
            ],
        }
    }
}

impl TryFrom<Vec<SlotSpec>> for SlotLayout {
    type Error = LayoutError;

    fn try_from(slots: Vec<SlotSpec>) -> Result<Self, Self::Error> {
        Self::new(slots)
    }
}

impl From<SlotLayout> for Vec<SlotSpec> {
    fn from(layout: SlotLayout) -> Self {
        layout.slots
    }
}

/// Cached identity payload for a logged-in user.
///
/// Known fields are typed; anything else the backend returned is kept in
/// `attributes` so it survives a round trip through storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// When the payload was cached.
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub stored_at: DateTime<Utc>,

    /// Remaining attributes.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Any JSON value; non-strings are kept as their JSON text.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// An unreadable timestamp is replaced by the time of reading.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_else(|_| Utc::now()))
}

impl Identity {
    /// Create an empty identity stamped with the current time.
    pub fn new() -> Self {
        Self {
            id: None,
            email: None,
            name: None,
            role: None,
            stored_at: Utc::now(),
            attributes: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Short label for display: name, then email, then id.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .or(self.id.as_deref())
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::new()
    }
}

/// A credential slot as read back from storage.
#[derive(Debug, Clone)]
pub struct CredentialSlot {
    pub name: SlotName,
    pub token: Option<Secret>,
    pub identity: Option<Identity>,
}

impl CredentialSlot {
    /// True when neither a token nor an identity is stored.
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.identity.is_none()
    }
}
