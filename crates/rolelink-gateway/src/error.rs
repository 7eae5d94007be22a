//! Error types for the login gateway.
//!
//! [`GatewayError`] covers every terminal failure of the `/callback` chain.
//! Errors are shown to the browser as plain text; [`GatewayError::user_message`]
//! decides whether raw upstream bodies are echoed or replaced by a generic
//! message.

use std::fmt;

use crate::bridge::BridgeError;

/// Outbound step of the callback chain, used to label transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// `POST /oauth2/token`.
    TokenExchange,
    /// `GET /users/@me`.
    ProfileFetch,
    /// PlayFab `LoginWithCustomID`.
    BackendLogin,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::TokenExchange => "token exchange",
            Self::ProfileFetch => "profile fetch",
            Self::BackendLogin => "game backend login",
        };
        f.write_str(label)
    }
}

/// Errors that can end a login attempt.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// `/callback` was hit without a `code` query parameter.
    #[error("no authorization code provided")]
    MissingCode,

    /// The `state` parameter did not match the signed state cookie.
    #[error("OAuth state missing or invalid")]
    InvalidState,

    /// Discord refused the authorization code or returned an unusable body.
    #[error("token exchange failed: {body}")]
    TokenExchange {
        /// Raw upstream body, or a description of what was wrong with it.
        body: String,
    },

    /// Discord refused the profile request or returned an unusable body.
    #[error("profile fetch failed: {body}")]
    ProfileFetch {
        /// Raw upstream body, or a description of what was wrong with it.
        body: String,
    },

    /// The game backend refused the login.
    #[error("game backend login failed: {0}")]
    BackendLogin(BridgeError),

    /// An outbound call exceeded its deadline.
    #[error("{0} timed out")]
    NetworkTimeout(Stage),

    /// An outbound call failed at the transport level.
    #[error("failed to reach upstream during {stage}: {source}")]
    Transport {
        /// Which call failed.
        stage: Stage,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
}

impl GatewayError {
    /// Classify a `reqwest` failure for the given stage.
    pub fn from_transport(stage: Stage, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::NetworkTimeout(stage)
        } else {
            Self::Transport { stage, source }
        }
    }

    /// Text shown to the browser.
    ///
    /// With `expose_upstream` unset, upstream bodies and backend error
    /// details are replaced by fixed messages.
    pub fn user_message(&self, expose_upstream: bool) -> String {
        match self {
            Self::MissingCode => "Error: No authorization code provided".to_string(),
            Self::InvalidState => {
                "Error: Login session expired or was not started here. Please log in again."
                    .to_string()
            }
            Self::TokenExchange { body } if expose_upstream => {
                format!("Error fetching token: {body}")
            }
            Self::TokenExchange { .. } => {
                "Error fetching token: Discord rejected the authorization code.".to_string()
            }
            Self::ProfileFetch { body } if expose_upstream => {
                format!("Error fetching user data: {body}")
            }
            Self::ProfileFetch { .. } => {
                "Error fetching user data: Discord did not return your profile.".to_string()
            }
            Self::BackendLogin(e) if expose_upstream => format!("Error with PlayFab login: {e}"),
            Self::BackendLogin(_) => {
                "Error with PlayFab login: the game backend rejected the login.".to_string()
            }
            Self::NetworkTimeout(stage) => {
                format!("Error: {stage} timed out. Please try again.")
            }
            Self::Transport { stage, source } if expose_upstream => {
                format!("Error: {stage} failed: {source}")
            }
            Self::Transport { stage, .. } => {
                format!("Error: {stage} failed. Please try again.")
            }
        }
    }
}

impl From<BridgeError> for GatewayError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Timeout => Self::NetworkTimeout(Stage::BackendLogin),
            other => Self::BackendLogin(other),
        }
    }
}
