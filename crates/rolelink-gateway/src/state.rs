//! OAuth `state` parameter handling.
//!
//! `/login` issues a random nonce, sends it to Discord as `state` and stores
//! `<nonce>.<hex HMAC-SHA256(nonce)>` in an HttpOnly cookie.  `/callback`
//! accepts the code only if the returned `state` equals the nonce in a cookie
//! whose MAC verifies under `SECRET_KEY`, which ties the callback to the
//! browser that started the login.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use time::Duration;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Name of the cookie carrying the signed nonce.
pub const STATE_COOKIE: &str = "rolelink_oauth_state";

/// Lifetime of a pending login.
const STATE_TTL: Duration = Duration::minutes(10);

/// A freshly issued state: the nonce for Discord and the cookie for the browser.
#[derive(Debug, Clone)]
pub struct IssuedState {
    /// Value sent as the `state` query parameter.
    pub nonce: String,
    /// Signed state cookie to add to the response jar.
    pub cookie: Cookie<'static>,
}

/// Signs and verifies OAuth state nonces.
#[derive(Clone)]
pub struct StateSigner {
    mac: HmacSha256,
    secure_cookie: bool,
}

impl StateSigner {
    /// Create a signer.
    ///
    /// `secure_cookie` adds the `Secure` attribute; set it when the service
    /// is reached over https.
    pub fn new(secret_key: &str, secure_cookie: bool) -> Result<Self, InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret_key.as_bytes())?,
            secure_cookie,
        })
    }

    /// Issue a new nonce and the cookie that will vouch for it.
    pub fn issue(&self) -> IssuedState {
        let nonce = Uuid::new_v4().simple().to_string();
        let signature = hex::encode(self.mac(&nonce).finalize().into_bytes());
        let cookie = self.cookie(format!("{nonce}.{signature}"), STATE_TTL);
        IssuedState { nonce, cookie }
    }

    /// Cookie that removes the state cookie from the browser.
    pub fn clear_cookie(&self) -> Cookie<'static> {
        self.cookie(String::new(), Duration::ZERO)
    }

    /// Check the `state` query parameter against the request's cookies.
    pub fn verify(&self, jar: &CookieJar, state: Option<&str>) -> bool {
        let (Some(state), Some(cookie)) = (state, jar.get(STATE_COOKIE)) else {
            return false;
        };
        let Some((nonce, signature)) = cookie.value().split_once('.') else {
            return false;
        };
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };
        nonce == state && self.mac(nonce).verify_slice(&signature).is_ok()
    }

    fn cookie(&self, value: String, max_age: Duration) -> Cookie<'static> {
        Cookie::build((STATE_COOKIE, value))
            .path("/")
            .max_age(max_age)
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookie)
            .build()
    }

    fn mac(&self, nonce: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(nonce.as_bytes());
        mac
    }
}
