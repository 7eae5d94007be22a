//! HTTP login gateway: `/`, `/login` and `/callback`.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::bridge::AccountBridge;
use crate::config::AppConfig;
use crate::error::GatewayError;
use crate::notifier::RoleNotifier;
use crate::oauth::DiscordOAuth;
use crate::state::StateSigner;

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// State shared across all Axum handlers.
pub struct AppState {
    /// Discord OAuth client.
    oauth: DiscordOAuth,
    /// PlayFab custom-id login.
    bridge: AccountBridge,
    /// Hand-off to the role-grant worker.
    notifier: RoleNotifier,
    /// OAuth state cookie signer.
    states: StateSigner,
    /// Echo upstream error bodies to the browser.
    expose_upstream_errors: bool,
}

impl AppState {
    /// Build the handler state from the validated configuration.
    pub fn new(config: &AppConfig, notifier: RoleNotifier) -> anyhow::Result<Self> {
        Ok(Self {
            oauth: DiscordOAuth::new(config)?,
            bridge: AccountBridge::new(
                &config.playfab_api_url,
                &config.playfab_title_id,
                config.http_timeout,
            )?,
            notifier,
            states: StateSigner::new(
                &config.secret_key,
                config.redirect_uri.scheme() == "https",
            )
            .map_err(|e| anyhow::anyhow!("invalid SECRET_KEY: {e}"))?,
            expose_upstream_errors: config.expose_upstream_errors,
        })
    }
}

/// Build the gateway router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login))
        .route("/callback", get(callback))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Query string Discord appends to the redirect URI.
#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    /// Set instead of `code` when the user declines (e.g. `access_denied`).
    error: Option<String>,
}

/// `GET /` — static welcome page.
async fn home() -> Html<&'static str> {
    Html("<h1>Welcome to the Login System</h1>")
}

/// `GET /login` — redirect to Discord's consent page.
async fn login(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let issued = state.states.issue();
    match state.oauth.authorize_url(&issued.nonce) {
        Ok(url) => (
            StatusCode::FOUND,
            jar.add(issued.cookie),
            [(LOCATION, url.to_string())],
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "cannot build authorize URL");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error: login is not available").into_response()
        }
    }
}

/// `GET /callback` — finish the OAuth flow, bridge the account and queue
/// the role grant.
///
/// Always answers `200` with a plain-text body; failures are described in
/// the body.
async fn callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    let body = match complete_login(&state, &jar, params).await {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "login failed");
            e.user_message(state.expose_upstream_errors)
        }
    };
    (jar.add(state.states.clear_cookie()), body).into_response()
}

async fn complete_login(
    state: &AppState,
    jar: &CookieJar,
    params: CallbackParams,
) -> Result<String, GatewayError> {
    // 1. Authorization code
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        if let Some(reason) = params.error.as_deref() {
            info!(reason, "authorization declined");
        }
        return Err(GatewayError::MissingCode);
    };

    // 2. State cookie
    if !state.states.verify(jar, params.state.as_deref()) {
        return Err(GatewayError::InvalidState);
    }

    // 3. Token and profile
    let access_token = state.oauth.exchange_code(&code).await?;
    let identity = state.oauth.fetch_profile(&access_token).await?;
    info!(user = %identity.user_id, username = %identity.username, "Discord authentication successful");

    // 4. Game backend account
    let account = state.bridge.login(&identity).await?;
    info!(
        user = %identity.user_id,
        newly_created = account.newly_created,
        "game account linked"
    );

    // 5. Role grant, not awaited
    state.notifier.notify(identity.user_id);

    Ok(format!(
        "Welcome, {}! You are now logged in and have been assigned the @login role.",
        identity.username
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::header::COOKIE;
    use axum::http::{HeaderMap, HeaderValue};
    use axum_extra::extract::cookie::{Cookie, SameSite};
    use axum_test::TestServer;
    use rolelink_models::{ExternalUserId, RoleGrant};
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::sync::mpsc::error::TryRecvError;
    use wiremock::matchers::{any, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::tests::{base_env, config_from};
    use crate::state::STATE_COOKIE;

    const USER_ID: &str = "80351110224678912";

    fn app(
        upstream: &MockServer,
        expose: bool,
    ) -> (TestServer, Arc<AppState>, UnboundedReceiver<RoleGrant>) {
        let mut env = base_env();
        env.insert("DISCORD_API_BASE_URL", format!("{}/api", upstream.uri()));
        env.insert("PLAYFAB_API_URL", upstream.uri());
        env.insert("HTTP_TIMEOUT_SECS", "5".to_string());
        env.insert("EXPOSE_UPSTREAM_ERRORS", expose.to_string());
        let config = config_from(&env).unwrap();

        let (notifier, rx) = RoleNotifier::channel();
        let state = Arc::new(AppState::new(&config, notifier).unwrap());
        let server = TestServer::new(router(state.clone())).unwrap();
        (server, state, rx)
    }

    /// A valid `(state, Cookie header)` pair as if `/login` had been visited.
    fn login_session(state: &AppState) -> (String, HeaderValue) {
        let issued = state.states.issue();
        let pair = issued.cookie.stripped().to_string();
        (issued.nonce, HeaderValue::from_str(&pair).unwrap())
    }

    async fn mount_token_ok(upstream: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(upstream)
            .await;
    }

    async fn mount_profile_ok(upstream: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/users/@me"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": USER_ID, "username": "alice"})),
            )
            .expect(1)
            .mount(upstream)
            .await;
    }

    async fn mount_playfab(upstream: &MockServer, template: ResponseTemplate, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/Client/LoginWithCustomID"))
            .respond_with(template)
            .expect(calls)
            .mount(upstream)
            .await;
    }

    fn playfab_ok() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "status": "OK",
            "data": {"SessionTicket": "TICKET", "PlayFabId": "PF1", "NewlyCreated": false}
        }))
    }

    #[tokio::test]
    async fn home_is_static() {
        let upstream = MockServer::start().await;
        Mock::given(any()).respond_with(ResponseTemplate::new(500)).expect(0).mount(&upstream).await;
        let (server, _, _) = app(&upstream, false);

        let res = server.get("/").await;
        res.assert_status_ok();
        assert_eq!(res.text(), "<h1>Welcome to the Login System</h1>");
    }

    #[tokio::test]
    async fn login_redirects_to_discord_with_state_cookie() {
        let upstream = MockServer::start().await;
        let (server, state, _) = app(&upstream, false);

        let res = server.get("/login").await;
        res.assert_status(StatusCode::FOUND);

        let location = res.header("location");
        let location = url::Url::parse(location.to_str().unwrap()).unwrap();
        assert_eq!(location.path(), "/api/oauth2/authorize");
        let params: std::collections::HashMap<String, String> =
            location.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "1234");
        assert_eq!(params["redirect_uri"], "https://login.example.com/callback");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "identify");

        let cookie = res.header("set-cookie");
        let parsed = Cookie::parse(cookie.to_str().unwrap()).unwrap();
        assert_eq!(parsed.name(), STATE_COOKIE);
        assert_eq!(parsed.http_only(), Some(true));
        assert_eq!(parsed.same_site(), Some(SameSite::Lax));
        assert_eq!(parsed.secure(), Some(true));
        let pair = cookie.to_str().unwrap().split(';').next().unwrap().to_string();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&pair).unwrap());
        assert!(state.states.verify(&CookieJar::from_headers(&headers), Some(&params["state"])));
    }

    #[tokio::test]
    async fn callback_without_code_makes_no_outbound_calls() {
        let upstream = MockServer::start().await;
        Mock::given(any()).respond_with(ResponseTemplate::new(500)).expect(0).mount(&upstream).await;
        let (server, _, mut rx) = app(&upstream, true);

        let res = server.get("/callback").await;
        res.assert_status_ok();
        assert_eq!(res.text(), "Error: No authorization code provided");
        let cleared = Cookie::parse(res.header("set-cookie").to_str().unwrap().to_string()).unwrap();
        assert_eq!(cleared.name(), STATE_COOKIE);
        assert_eq!(cleared.value(), "");

        let res = server.get("/callback").add_query_param("error", "access_denied").await;
        assert_eq!(res.text(), "Error: No authorization code provided");
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn callback_with_bad_state_makes_no_outbound_calls() {
        let upstream = MockServer::start().await;
        Mock::given(any()).respond_with(ResponseTemplate::new(500)).expect(0).mount(&upstream).await;
        let (server, state, _) = app(&upstream, true);
        let (_, cookie) = login_session(&state);

        let res = server
            .get("/callback")
            .add_query_param("code", "abc")
            .add_query_param("state", "forged")
            .add_header(COOKIE, cookie)
            .await;
        assert!(res.text().contains("Login session expired"));

        let res = server
            .get("/callback")
            .add_query_param("code", "abc")
            .add_query_param("state", "forged")
            .await;
        assert!(res.text().contains("Login session expired"));
    }

    #[tokio::test]
    async fn token_exchange_failure_echoes_upstream_body_and_stops() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/oauth2/token"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"error": "invalid_grant", "error_description": "Invalid \"code\" in request."}"#),
            )
            .expect(1)
            .mount(&upstream)
            .await;
        Mock::given(path("/api/users/@me")).respond_with(ResponseTemplate::new(500)).expect(0).mount(&upstream).await;
        mount_playfab(&upstream, playfab_ok(), 0).await;
        let (server, state, mut rx) = app(&upstream, true);
        let (nonce, cookie) = login_session(&state);

        let res = server
            .get("/callback")
            .add_query_param("code", "stale")
            .add_query_param("state", &nonce)
            .add_header(COOKIE, cookie)
            .await;
        res.assert_status_ok();
        assert_eq!(
            res.text(),
            r#"Error fetching token: {"error": "invalid_grant", "error_description": "Invalid \"code\" in request."}"#
        );
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn token_exchange_failure_is_generic_by_default() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&upstream)
            .await;
        let (server, state, _) = app(&upstream, false);
        let (nonce, cookie) = login_session(&state);

        let res = server
            .get("/callback")
            .add_query_param("code", "stale")
            .add_query_param("state", &nonce)
            .add_header(COOKIE, cookie)
            .await;
        assert!(res.text().starts_with("Error fetching token"));
        assert!(!res.text().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn profile_failure_skips_backend_login() {
        let upstream = MockServer::start().await;
        mount_token_ok(&upstream).await;
        Mock::given(method("GET"))
            .and(path("/api/users/@me"))
            .respond_with(ResponseTemplate::new(401).set_body_string("401: Unauthorized"))
            .expect(1)
            .mount(&upstream)
            .await;
        mount_playfab(&upstream, playfab_ok(), 0).await;
        let (server, state, mut rx) = app(&upstream, true);
        let (nonce, cookie) = login_session(&state);

        let res = server
            .get("/callback")
            .add_query_param("code", "abc")
            .add_query_param("state", &nonce)
            .add_header(COOKIE, cookie)
            .await;
        assert_eq!(res.text(), "Error fetching user data: 401: Unauthorized");
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn successful_login_bridges_once_and_queues_role_grant() {
        let upstream = MockServer::start().await;
        mount_token_ok(&upstream).await;
        mount_profile_ok(&upstream).await;
        Mock::given(method("POST"))
            .and(path("/Client/LoginWithCustomID"))
            .and(body_json(json!({
                "TitleId": "AB12C",
                "CustomId": USER_ID,
                "CreateAccount": true
            })))
            .respond_with(playfab_ok())
            .expect(1)
            .mount(&upstream)
            .await;
        let (server, state, mut rx) = app(&upstream, false);
        let (nonce, cookie) = login_session(&state);

        let res = server
            .get("/callback")
            .add_query_param("code", "abc")
            .add_query_param("state", &nonce)
            .add_header(COOKIE, cookie)
            .await;
        res.assert_status_ok();
        assert!(res.text().contains("alice"));
        assert!(res.text().starts_with("Welcome"));
        assert!(res.header("set-cookie").to_str().unwrap().contains("Max-Age=0"));

        let grant = rx.try_recv().unwrap();
        assert_eq!(grant.user_id, USER_ID.parse::<ExternalUserId>().unwrap());
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn non_numeric_profile_id_is_forwarded_verbatim() {
        let upstream = MockServer::start().await;
        mount_token_ok(&upstream).await;
        Mock::given(method("GET"))
            .and(path("/api/users/@me"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "U123", "username": "alice"})),
            )
            .expect(1)
            .mount(&upstream)
            .await;
        Mock::given(method("POST"))
            .and(path("/Client/LoginWithCustomID"))
            .and(body_json(json!({
                "TitleId": "AB12C",
                "CustomId": "U123",
                "CreateAccount": true
            })))
            .respond_with(playfab_ok())
            .expect(1)
            .mount(&upstream)
            .await;
        let (server, state, mut rx) = app(&upstream, false);
        let (nonce, cookie) = login_session(&state);

        let res = server
            .get("/callback")
            .add_query_param("code", "abc")
            .add_query_param("state", &nonce)
            .add_header(COOKIE, cookie)
            .await;
        res.assert_status_ok();
        assert!(res.text().starts_with("Welcome"));
        assert!(res.text().contains("alice"));

        let grant = rx.try_recv().unwrap();
        assert_eq!(grant.user_id.as_str(), "U123");
    }

    #[tokio::test]
    async fn backend_failure_is_flattened_and_grants_nothing() {
        let upstream = MockServer::start().await;
        mount_token_ok(&upstream).await;
        mount_profile_ok(&upstream).await;
        mount_playfab(
            &upstream,
            ResponseTemplate::new(400).set_body_json(json!({
                "code": 400,
                "status": "BadRequest",
                "error": "InvalidTitleId",
                "errorCode": 1004,
                "errorMessage": "Invalid title id"
            })),
            1,
        )
        .await;
        let (server, state, mut rx) = app(&upstream, true);
        let (nonce, cookie) = login_session(&state);

        let res = server
            .get("/callback")
            .add_query_param("code", "abc")
            .add_query_param("state", &nonce)
            .add_header(COOKIE, cookie)
            .await;
        res.assert_status_ok();
        assert_eq!(
            res.text(),
            "Error with PlayFab login: PlayFab returned InvalidTitleId (400): Invalid title id"
        );
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn login_succeeds_even_when_role_worker_is_gone() {
        let upstream = MockServer::start().await;
        mount_token_ok(&upstream).await;
        mount_profile_ok(&upstream).await;
        mount_playfab(&upstream, playfab_ok(), 1).await;
        let (server, state, rx) = app(&upstream, false);
        drop(rx);
        let (nonce, cookie) = login_session(&state);

        let res = server
            .get("/callback")
            .add_query_param("code", "abc")
            .add_query_param("state", &nonce)
            .add_header(COOKIE, cookie)
            .await;
        res.assert_status_ok();
        assert!(res.text().contains("alice"));
    }
}
