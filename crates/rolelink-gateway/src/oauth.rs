//! Discord OAuth2 authorization-code flow.
//!
//! Builds the authorize redirect, exchanges the returned code for an access
//! token and fetches the user's profile with it.

use std::time::Duration;

use rolelink_models::ExternalIdentity;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::AppConfig;
use crate::error::{GatewayError, Stage};

/// Only the user's id and username are needed.
const SCOPE: &str = "identify";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// OAuth client for one Discord application.
#[derive(Clone)]
pub struct DiscordOAuth {
    http: reqwest::Client,
    api_base: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl DiscordOAuth {
    /// Create the client from the gateway configuration.
    pub fn new(config: &AppConfig) -> Result<Self, reqwest::Error> {
        Self::with_timeout(config, config.http_timeout)
    }

    fn with_timeout(config: &AppConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: config
                .discord_api_base
                .as_str()
                .trim_end_matches('/')
                .to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.to_string(),
        })
    }

    /// URL of Discord's consent page for this application.
    pub fn authorize_url(&self, state: &str) -> Result<Url, url::ParseError> {
        Url::parse_with_params(
            &format!("{}/oauth2/authorize", self.api_base),
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPE),
                ("state", state),
            ],
        )
    }

    /// Exchange an authorization code for an access token.
    pub async fn exchange_code(&self, code: &str) -> Result<String, GatewayError> {
        let res = self
            .http
            .post(format!("{}/oauth2/token", self.api_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| GatewayError::from_transport(Stage::TokenExchange, e))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| GatewayError::from_transport(Stage::TokenExchange, e))?;
        if !status.is_success() {
            return Err(GatewayError::TokenExchange { body: text });
        }

        let token: TokenResponse =
            serde_json::from_str(&text).map_err(|_| GatewayError::TokenExchange {
                body: format!("missing access_token in response: {text}"),
            })?;
        debug!("access token obtained");
        Ok(token.access_token)
    }

    /// Fetch the authenticated user's id and username.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<ExternalIdentity, GatewayError> {
        let res = self
            .http
            .get(format!("{}/users/@me", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| GatewayError::from_transport(Stage::ProfileFetch, e))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| GatewayError::from_transport(Stage::ProfileFetch, e))?;
        if !status.is_success() {
            return Err(GatewayError::ProfileFetch { body: text });
        }

        let identity: ExternalIdentity =
            serde_json::from_str(&text).map_err(|e| GatewayError::ProfileFetch {
                body: format!("unexpected profile payload ({e}): {text}"),
            })?;
        ExternalIdentity::new(identity.user_id, identity.username).map_err(|e| {
            GatewayError::ProfileFetch {
                body: e.to_string(),
            }
        })
    }
}
