//! Local stand-in for Discord OAuth and PlayFab, for running the gateway
//! end to end without real credentials.
//!
//! Point the gateway at it with
//! `DISCORD_API_BASE_URL=http://localhost:4000/api` and
//! `PLAYFAB_API_URL=http://localhost:4000`, then start it with `--http-only`.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Form, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use url::Url;
use uuid::Uuid;

/// Code rejected by the token endpoint, to exercise the error path.
const INVALID_CODE: &str = "invalid";

/// Accounts known to the fake PlayFab title: custom id → PlayFab id.
#[derive(Default)]
struct MockState {
    accounts: Mutex<HashMap<String, String>>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let port = std::env::var("MOCK_PORT").unwrap_or_else(|_| "4000".to_string());

    let app = Router::new()
        .route("/api/oauth2/authorize", get(authorize))
        .route("/api/oauth2/token", post(token))
        .route("/api/users/@me", get(current_user))
        .route("/Client/LoginWithCustomID", post(login_with_custom_id))
        .with_state(Arc::new(MockState::default()));

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listener");
    info!(address = %addr, "mock Discord/PlayFab listening");
    axum::serve(listener, app).await.expect("server error");
}

// --- Discord OAuth ---

#[derive(Deserialize)]
struct AuthorizeParams {
    client_id: Option<String>,
    redirect_uri: String,
    state: Option<String>,
    /// Not part of Discord's API: picks the username to log in as.
    login_hint: Option<String>,
}

/// Auto-approve and bounce straight back to the gateway.
async fn authorize(Query(params): Query<AuthorizeParams>) -> Response {
    let code = params.login_hint.unwrap_or_else(|| "alice".to_string());
    info!(client_id = ?params.client_id, code = %code, "authorize request");

    let state = params.state.unwrap_or_default();
    match callback_url(&params.redirect_uri, &code, &state) {
        Ok(url) => Redirect::to(url.as_str()).into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_request",
                "error_description": format!("Invalid redirect_uri: {e}")
            })),
        )
            .into_response(),
    }
}

fn callback_url(redirect_uri: &str, code: &str, state: &str) -> Result<Url, url::ParseError> {
    Url::parse_with_params(redirect_uri, &[("code", code), ("state", state)])
}

#[derive(Deserialize)]
struct TokenRequest {
    code: String,
    grant_type: Option<String>,
}

async fn token(Form(req): Form<TokenRequest>) -> Response {
    info!(code = %req.code, "token request");

    if req.code == INVALID_CODE || req.grant_type.as_deref() != Some("authorization_code") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid \"code\" in request."
            })),
        )
            .into_response();
    }

    Json(json!({
        "access_token": format!("mock_{}", req.code),
        "token_type": "Bearer",
        "expires_in": 604_800,
        "refresh_token": Uuid::new_v4().simple().to_string(),
        "scope": "identify"
    }))
    .into_response()
}

async fn current_user(headers: HeaderMap) -> Response {
    let username = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer mock_"))
        .filter(|name| !name.is_empty());

    let Some(username) = username else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "401: Unauthorized", "code": 0})),
        )
            .into_response();
    };

    Json(json!({
        "id": user_id_for(username).to_string(),
        "username": username,
        "discriminator": "0",
        "global_name": username,
        "avatar": null
    }))
    .into_response()
}

/// Stable snowflake-looking id for a username.
fn user_id_for(username: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    username.hash(&mut hasher);
    // Keep it in the range of real snowflakes and never zero.
    (hasher.finish() >> 8) | (1 << 50)
}

// --- PlayFab ---

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoginWithCustomIdRequest {
    title_id: String,
    custom_id: Option<String>,
    #[serde(default)]
    create_account: bool,
}

async fn login_with_custom_id(
    State(state): State<Arc<MockState>>,
    Json(req): Json<LoginWithCustomIdRequest>,
) -> Response {
    let Some(custom_id) = req.custom_id.filter(|id| !id.is_empty()) else {
        return playfab_error(StatusCode::BAD_REQUEST, "InvalidParams", 1000, "Invalid input parameters");
    };
    info!(title = %req.title_id, custom_id = %custom_id, "LoginWithCustomID");

    let mut accounts = state.accounts.lock().unwrap_or_else(|e| e.into_inner());
    let (play_fab_id, newly_created) = match accounts.get(&custom_id) {
        Some(id) => (id.clone(), false),
        None if req.create_account => {
            let id = Uuid::new_v4().simple().to_string()[..16].to_uppercase();
            accounts.insert(custom_id.clone(), id.clone());
            (id, true)
        }
        None => {
            return playfab_error(
                StatusCode::BAD_REQUEST,
                "AccountNotFound",
                1001,
                "User not found",
            );
        }
    };

    Json(json!({
        "code": 200,
        "status": "OK",
        "data": {
            "SessionTicket": format!("{play_fab_id}-{}", Uuid::new_v4().simple()),
            "PlayFabId": play_fab_id,
            "NewlyCreated": newly_created
        }
    }))
    .into_response()
}

fn playfab_error(status: StatusCode, error: &str, error_code: u32, message: &str) -> Response {
    (
        status,
        Json(json!({
            "code": status.as_u16(),
            "status": status.canonical_reason().unwrap_or_default(),
            "error": error,
            "errorCode": error_code,
            "errorMessage": message
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_url_encodes_code_and_state() {
        let url = callback_url("http://localhost:5000/callback", "bob smith&co", "a b").unwrap();
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(params["code"], "bob smith&co");
        assert_eq!(params["state"], "a b");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn callback_url_keeps_existing_query() {
        let url = callback_url("http://localhost:5000/callback?next=home", "alice", "s").unwrap();
        assert_eq!(url.query(), Some("next=home&code=alice&state=s"));
    }

    #[test]
    fn user_ids_are_stable_and_distinct() {
        assert_eq!(user_id_for("alice"), user_id_for("alice"));
        assert_ne!(user_id_for("alice"), user_id_for("bob"));
        assert_ne!(user_id_for("alice"), 0);
    }
}
