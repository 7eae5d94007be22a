//! Account bridge to the PlayFab title API.
//!
//! Maps a Discord identity onto a PlayFab account through
//! `Client/LoginWithCustomID`, creating the account on first login.

use std::time::Duration;

use rolelink_models::{BridgedAccount, ExternalIdentity};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

/// Failures of the PlayFab login call.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// PlayFab answered with its error envelope.
    #[error("PlayFab returned {error} ({status}): {message}")]
    Api {
        /// HTTP status reported in the envelope.
        status: u16,
        /// PlayFab error name (e.g. `InvalidParams`).
        error: String,
        /// Human-readable message.
        message: String,
    },

    /// PlayFab answered with something that is not its envelope.
    #[error("unexpected PlayFab response ({status}): {body}")]
    UnexpectedResponse {
        /// HTTP status code.
        status: u16,
        /// Raw body.
        body: String,
    },

    /// The request exceeded its deadline.
    #[error("PlayFab request timed out")]
    Timeout,

    /// The request failed at the transport level.
    #[error("failed to reach PlayFab: {0}")]
    Http(reqwest::Error),
}

impl From<reqwest::Error> for BridgeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(e)
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct LoginWithCustomIdRequest<'a> {
    title_id: &'a str,
    custom_id: &'a str,
    create_account: bool,
}

/// PlayFab wraps every response in `{code, status, data}` on success and
/// `{code, status, error, errorCode, errorMessage}` on failure.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayFabEnvelope<T> {
    code: u16,
    data: Option<T>,
    error: Option<String>,
    error_message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoginResult {
    session_ticket: String,
    play_fab_id: Option<String>,
    #[serde(default)]
    newly_created: bool,
}

/// Client for the game backend's custom-id login.
#[derive(Clone)]
pub struct AccountBridge {
    http: reqwest::Client,
    login_url: String,
    title_id: String,
}

impl AccountBridge {
    /// Create a bridge for the given title.
    ///
    /// `api_url` is the title API root, e.g. `https://{title}.playfabapi.com`.
    pub fn new(api_url: &Url, title_id: &str, timeout: Duration) -> Result<Self, BridgeError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            login_url: format!(
                "{}/Client/LoginWithCustomID",
                api_url.as_str().trim_end_matches('/')
            ),
            title_id: title_id.to_string(),
        })
    }

    /// Log in (or create) the PlayFab account whose custom id is the
    /// Discord user id.
    pub async fn login(&self, identity: &ExternalIdentity) -> Result<BridgedAccount, BridgeError> {
        let custom_id = identity.custom_id();
        let request = LoginWithCustomIdRequest {
            title_id: &self.title_id,
            custom_id: &custom_id,
            create_account: true,
        };

        debug!(custom_id = %custom_id, "calling LoginWithCustomID");
        let res = self.http.post(&self.login_url).json(&request).send().await?;
        let status = res.status().as_u16();
        let body = res.text().await?;

        let envelope: PlayFabEnvelope<LoginResult> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) => return Err(BridgeError::UnexpectedResponse { status, body }),
        };

        match envelope {
            PlayFabEnvelope {
                data: Some(result),
                error: None,
                ..
            } if (200..300).contains(&status) => {
                info!(
                    custom_id = %custom_id,
                    playfab_id = result.play_fab_id.as_deref().unwrap_or("-"),
                    newly_created = result.newly_created,
                    "PlayFab login successful"
                );
                Ok(BridgedAccount {
                    custom_id,
                    session_ticket: result.session_ticket,
                    backend_account_id: result.play_fab_id,
                    newly_created: result.newly_created,
                })
            }
            PlayFabEnvelope {
                code,
                error: Some(error),
                error_message,
                ..
            } => Err(BridgeError::Api {
                status: code,
                error,
                message: error_message.unwrap_or_default(),
            }),
            _ => Err(BridgeError::UnexpectedResponse { status, body }),
        }
    }
}
