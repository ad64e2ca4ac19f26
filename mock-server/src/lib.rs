use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const SERVER_ID: &str = "mock-server-0001";
pub const USER_ID: &str = "6f1c0d8e2a";
pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "secret";
pub const RESTRICTED_CODE: &str = "ParentalControl";
pub const AUDIO_LEN: usize = 50_000;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticateByName {
    pub username: String,
    #[serde(default)]
    pub pw: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticationResult {
    pub access_token: String,
    pub server_id: String,
    pub user: User,
}

/// Access tokens issued by `AuthenticateByName`, mapped to their user id.
pub type Tokens = Arc<RwLock<HashMap<String, String>>>;

#[derive(Clone, Default)]
pub struct AppState {
    pub tokens: Tokens,
    /// 502 responses `Test/Flaky` still has to hand out before succeeding.
    pub flaky_remaining: Arc<AtomicU32>,
    /// Requests seen by `Test/Flaky`.
    pub flaky_hits: Arc<AtomicU32>,
}

impl AppState {
    pub fn with_flaky_failures(failures: u32) -> Self {
        Self {
            flaky_remaining: Arc::new(AtomicU32::new(failures)),
            ..Self::default()
        }
    }
}

/// Deterministic body served by the audio stream endpoint.
pub fn audio_payload() -> Vec<u8> {
    (0..AUDIO_LEN).map(|i| (i % 251) as u8).collect()
}

pub fn app() -> Router {
    app_with_state(AppState::with_flaky_failures(2))
}

pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/System/Info/Public", get(public_info))
        .route("/System/Info", get(system_info))
        .route("/Moved/System/Info/Public", get(moved))
        .route("/Users/AuthenticateByName", post(authenticate))
        .route("/Users/{user_id}/Views", get(views))
        .route("/Users/{user_id}/Items", get(user_items))
        .route("/Shows/{show_id}/Episodes", get(episodes))
        .route("/Audio/{item_id}/universal", get(audio))
        .route("/SyncPlay/Join", post(join_sync_play))
        .route("/GetUTCTime", get(utc_time))
        .route("/Test/Restricted", get(restricted))
        .route("/Test/Broken", get(broken))
        .route("/Test/Flaky", get(flaky))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_state(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

/// Resolve the caller's user id from the token and authorization headers.
async fn authenticated_user(state: &AppState, headers: &HeaderMap) -> Result<String, StatusCode> {
    let authorization = headers
        .get("x-emby-authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::BAD_REQUEST)?;
    if !authorization.starts_with("MediaBrowser ") {
        return Err(StatusCode::BAD_REQUEST);
    }
    let token = headers
        .get("x-mediabrowser-token")
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let user_id = state.tokens.read().await.get(token).cloned().ok_or(StatusCode::UNAUTHORIZED)?;
    if !authorization.contains(&format!(r#"UserId="{user_id}""#)) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(user_id)
}

async fn public_info() -> Json<Value> {
    Json(json!({"ServerName": "Mock Jellyfin", "Version": "10.9.0", "Id": SERVER_ID}))
}

/// Full server information for any issued token; no `UserId` needed.
async fn system_info(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    let token = headers
        .get("x-mediabrowser-token")
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;
    if !state.tokens.read().await.contains_key(token) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(json!({
        "ServerName": "Mock Jellyfin",
        "Version": "10.9.0",
        "Id": SERVER_ID,
        "OperatingSystem": "Linux"
    })))
}

/// The server moved to the root; old links are redirected.
async fn moved() -> Redirect {
    Redirect::permanent("/System/Info/Public")
}

async fn authenticate(
    State(state): State<AppState>,
    Json(input): Json<AuthenticateByName>,
) -> Result<Json<AuthenticationResult>, StatusCode> {
    if input.username != USERNAME || input.pw != PASSWORD {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let token = Uuid::new_v4().simple().to_string();
    state.tokens.write().await.insert(token.clone(), USER_ID.to_string());
    Ok(Json(AuthenticationResult {
        access_token: token,
        server_id: SERVER_ID.to_string(),
        user: User {
            id: USER_ID.to_string(),
            name: USERNAME.to_string(),
        },
    }))
}

async fn views(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    let caller = authenticated_user(&state, &headers).await?;
    if caller != user_id {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(Json(json!({
        "Items": [{"Name": "Movies", "CollectionType": "movies"}, {"Name": "Shows", "CollectionType": "tvshows"}],
        "TotalRecordCount": 2
    })))
}

async fn user_items(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    authenticated_user(&state, &headers).await?;
    Ok(Json(json!({"UserId": user_id, "Query": query})))
}

async fn episodes(
    State(state): State<AppState>,
    Path(show_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    authenticated_user(&state, &headers).await?;
    Ok(Json(json!({"ShowId": show_id, "Query": query})))
}

async fn audio(
    State(state): State<AppState>,
    Path(_item_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, StatusCode> {
    let user_id = authenticated_user(&state, &headers).await?;
    if query.get("UserId") != Some(&user_id) || !query.contains_key("DeviceId") {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio_payload()).into_response())
}

async fn join_sync_play(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<StatusCode, StatusCode> {
    authenticated_user(&state, &headers).await?;
    if body.get("GroupId").and_then(Value::as_str).is_none() {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn utc_time() -> Json<Value> {
    Json(json!({
        "RequestReceptionTime": "2024-01-01T00:00:00.1234567Z",
        "ResponseTransmissionTime": "2024-01-01T00:00:00.1244567Z"
    }))
}

async fn restricted() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [("X-Application-Error-Code", RESTRICTED_CODE)],
        "Access restricted",
    )
        .into_response()
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "database is locked")
}

async fn flaky(State(state): State<AppState>) -> Response {
    state.flaky_hits.fetch_add(1, Ordering::SeqCst);
    let failed = state
        .flaky_remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failed {
        (StatusCode::BAD_GATEWAY, "upstream not ready").into_response()
    } else {
        Json(json!({"Recovered": true})).into_response()
    }
}
