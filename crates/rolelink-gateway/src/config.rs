//! Gateway configuration.
//!
//! Every value is read from the environment once at startup (after an
//! optional `.env` file has been loaded) and validated in a single pass, so a
//! misconfigured deployment fails before any listener starts and reports all
//! offending keys at once.

use std::fmt;
use std::time::Duration;

use rolelink_models::{ChannelId, GuildId, RoleId};
use url::Url;

const DEFAULT_LISTEN_PORT: u16 = 5000;
const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Environment keys that must be present for the service to start.
pub const REQUIRED_KEYS: [&str; 9] = [
    "DISCORD_BOT_TOKEN",
    "DISCORD_CLIENT_ID",
    "DISCORD_CLIENT_SECRET",
    "DISCORD_REDIRECT_URI",
    "DISCORD_GUILD_ID",
    "DISCORD_LOGIN_CHANNEL_ID",
    "DISCORD_LOGIN_ROLE_ID",
    "PLAYFAB_TITLE_ID",
    "SECRET_KEY",
];

/// Startup validation failure, enumerating every missing or invalid key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", self.describe())]
pub struct ConfigError {
    /// Required keys that were unset or blank.
    pub missing: Vec<&'static str>,
    /// `(key, reason)` pairs for values that were present but unusable.
    pub invalid: Vec<(&'static str, String)>,
}

impl ConfigError {
    fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }

    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing {}", self.missing.join(", ")));
        }
        for (key, reason) in &self.invalid {
            parts.push(format!("invalid {key}: {reason}"));
        }
        format!("configuration error: {}", parts.join("; "))
    }
}

/// Global configuration shared across the HTTP and chat contexts.
///
/// Constructed once at startup; read-only afterwards.
#[derive(Clone)]
pub struct AppConfig {
    /// Bot token for the Discord gateway connection.
    pub bot_token: String,
    /// OAuth application client id.
    pub client_id: String,
    /// OAuth application client secret.
    pub client_secret: String,
    /// Absolute OAuth redirect URI (points at this service's `/callback`).
    pub redirect_uri: Url,
    /// Guild in which the login role is granted.
    pub guild_id: GuildId,
    /// Channel watched for the `!login` trigger.
    pub login_channel_id: ChannelId,
    /// Role granted after a successful login.
    pub login_role_id: RoleId,
    /// PlayFab title id.
    pub playfab_title_id: String,
    /// Key used to sign the OAuth state cookie.
    pub secret_key: String,
    /// Port to listen on (default `5000`).
    pub listen_port: u16,
    /// Base URL of Discord's REST API used for OAuth and the profile fetch.
    pub discord_api_base: Url,
    /// Base URL of the PlayFab title API.
    pub playfab_api_url: Url,
    /// Link placed on the login button posted in the trigger channel.
    pub public_login_url: Url,
    /// Deadline for each outbound HTTP call.
    pub http_timeout: Duration,
    /// Echo raw upstream error bodies to the browser.
    pub expose_upstream_errors: bool,
}

impl AppConfig {
    /// Build the configuration from process environment variables.
    ///
    /// | Variable                  | Default                                 |
    /// |---------------------------|-----------------------------------------|
    /// | `GATEWAY_PORT`            | `5000`                                  |
    /// | `DISCORD_API_BASE_URL`    | `https://discord.com/api`               |
    /// | `PLAYFAB_API_URL`         | `https://{PLAYFAB_TITLE_ID}.playfabapi.com` |
    /// | `PUBLIC_LOGIN_URL`        | `DISCORD_REDIRECT_URI` with path `/login` |
    /// | `HTTP_TIMEOUT_SECS`       | `10`                                    |
    /// | `EXPOSE_UPSTREAM_ERRORS`  | `false`                                 |
    ///
    /// All keys in [`REQUIRED_KEYS`] have no default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut err = ConfigError {
            missing: Vec::new(),
            invalid: Vec::new(),
        };

        let mut required = |key: &'static str| -> Option<String> {
            match lookup(key).filter(|v| !v.trim().is_empty()) {
                Some(v) => Some(v.trim().to_string()),
                None => {
                    err.missing.push(key);
                    None
                }
            }
        };

        let [
            bot_token,
            client_id,
            client_secret,
            redirect_uri,
            guild_id,
            login_channel_id,
            login_role_id,
            playfab_title_id,
            secret_key,
        ] = REQUIRED_KEYS.map(&mut required);

        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let redirect_uri = redirect_uri.and_then(|v| parse_url(&mut err, "DISCORD_REDIRECT_URI", &v));
        let guild_id = guild_id.and_then(|v| parse_value(&mut err, "DISCORD_GUILD_ID", &v));
        let login_channel_id =
            login_channel_id.and_then(|v| parse_value(&mut err, "DISCORD_LOGIN_CHANNEL_ID", &v));
        let login_role_id =
            login_role_id.and_then(|v| parse_value(&mut err, "DISCORD_LOGIN_ROLE_ID", &v));

        let listen_port = match optional("GATEWAY_PORT") {
            Some(v) => parse_value(&mut err, "GATEWAY_PORT", &v),
            None => Some(DEFAULT_LISTEN_PORT),
        };
        let discord_api_base = parse_url(
            &mut err,
            "DISCORD_API_BASE_URL",
            &optional("DISCORD_API_BASE_URL").unwrap_or_else(|| DEFAULT_DISCORD_API_BASE.into()),
        );
        let playfab_api_url = match (optional("PLAYFAB_API_URL"), &playfab_title_id) {
            (Some(v), _) => parse_url(&mut err, "PLAYFAB_API_URL", &v),
            (None, Some(title)) => parse_url(
                &mut err,
                "PLAYFAB_TITLE_ID",
                &format!("https://{}.playfabapi.com", title.to_lowercase()),
            ),
            (None, None) => None,
        };
        let public_login_url = match (optional("PUBLIC_LOGIN_URL"), &redirect_uri) {
            (Some(v), _) => parse_url(&mut err, "PUBLIC_LOGIN_URL", &v),
            (None, Some(redirect)) => {
                let mut url = redirect.clone();
                url.set_path("/login");
                url.set_query(None);
                Some(url)
            }
            (None, None) => None,
        };
        let http_timeout = match optional("HTTP_TIMEOUT_SECS") {
            Some(v) => match v.trim().parse::<u64>() {
                Ok(0) | Err(_) => {
                    err.invalid
                        .push(("HTTP_TIMEOUT_SECS", format!("expected a positive number of seconds, got \"{v}\"")));
                    None
                }
                Ok(secs) => Some(Duration::from_secs(secs)),
            },
            None => Some(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)),
        };
        let expose_upstream_errors = match optional("EXPOSE_UPSTREAM_ERRORS") {
            Some(v) => parse_flag(&mut err, "EXPOSE_UPSTREAM_ERRORS", &v),
            None => Some(false),
        };

        if !err.is_empty() {
            return Err(err);
        }

        // Every field is `Some` once no key was reported missing or invalid.
        match (
            bot_token,
            client_id,
            client_secret,
            redirect_uri,
            guild_id,
            login_channel_id,
            login_role_id,
            playfab_title_id,
            secret_key,
            listen_port,
            discord_api_base,
            playfab_api_url,
            public_login_url,
            http_timeout,
            expose_upstream_errors,
        ) {
            (
                Some(bot_token),
                Some(client_id),
                Some(client_secret),
                Some(redirect_uri),
                Some(guild_id),
                Some(login_channel_id),
                Some(login_role_id),
                Some(playfab_title_id),
                Some(secret_key),
                Some(listen_port),
                Some(discord_api_base),
                Some(playfab_api_url),
                Some(public_login_url),
                Some(http_timeout),
                Some(expose_upstream_errors),
            ) => Ok(Self {
                bot_token,
                client_id,
                client_secret,
                redirect_uri,
                guild_id,
                login_channel_id,
                login_role_id,
                playfab_title_id,
                secret_key,
                listen_port,
                discord_api_base,
                playfab_api_url,
                public_login_url,
                http_timeout,
                expose_upstream_errors,
            }),
            _ => Err(err),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("bot_token", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("guild_id", &self.guild_id)
            .field("login_channel_id", &self.login_channel_id)
            .field("login_role_id", &self.login_role_id)
            .field("playfab_title_id", &self.playfab_title_id)
            .field("secret_key", &"<redacted>")
            .field("listen_port", &self.listen_port)
            .field("discord_api_base", &self.discord_api_base.as_str())
            .field("playfab_api_url", &self.playfab_api_url.as_str())
            .field("public_login_url", &self.public_login_url.as_str())
            .field("http_timeout", &self.http_timeout)
            .field("expose_upstream_errors", &self.expose_upstream_errors)
            .finish()
    }
}

fn parse_value<T>(err: &mut ConfigError, key: &'static str, raw: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(e) => {
            err.invalid.push((key, e.to_string()));
            None
        }
    }
}

fn parse_url(err: &mut ConfigError, key: &'static str, raw: &str) -> Option<Url> {
    match Url::parse(raw.trim()) {
        Ok(url) if url.has_host() => Some(url),
        Ok(_) => {
            err.invalid.push((key, format!("\"{raw}\" has no host")));
            None
        }
        Err(e) => {
            err.invalid.push((key, format!("\"{raw}\": {e}")));
            None
        }
    }
}

fn parse_flag(err: &mut ConfigError, key: &'static str, raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            err.invalid.push((key, format!("expected true/false, got \"{raw}\"")));
            None
        }
    }
}
