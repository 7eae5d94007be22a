//! Identities produced and consumed by one login round-trip.
//!
//! None of these types are persisted; they live for the duration of a
//! single `/callback` request (or, for [`RoleGrant`], until the chat
//! context has processed it).

use serde::{Deserialize, Serialize};

use crate::{ExternalUserId, ModelError};

/// The Discord identity returned by the OAuth profile endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    /// User id at the identity provider, kept verbatim.
    #[serde(rename = "id")]
    pub user_id: ExternalUserId,
    /// Discord username (not the display name).
    pub username: String,
}

impl ExternalIdentity {
    /// Build an identity, rejecting an empty username.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingField`] when `username` is blank.
    pub fn new(user_id: ExternalUserId, username: impl Into<String>) -> Result<Self, ModelError> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(ModelError::MissingField {
                field: "username".into(),
            });
        }
        Ok(Self { user_id, username })
    }

    /// The custom id under which this identity is known to the game backend.
    pub fn custom_id(&self) -> String {
        self.user_id.as_str().to_string()
    }
}

/// Credential returned by the game backend after a custom-id login.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BridgedAccount {
    /// Custom id used for the login (the Discord user id).
    pub custom_id: String,
    /// Session ticket issued by the backend.
    pub session_ticket: String,
    /// Backend-side account id, when reported.
    pub backend_account_id: Option<String>,
    /// `true` when the login created the account.
    pub newly_created: bool,
}

/// A request to grant the configured login role to a Discord user.
///
/// Guild and role are fixed by configuration, so the user is the only
/// variable part.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    /// User who completed the login.
    pub user_id: ExternalUserId,
}
