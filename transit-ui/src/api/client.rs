//! HTTP API Client
//!
//! Functions for the transit REST API. Authenticated calls read the token
//! from local storage on every request; a 401 removes it.

use gloo_net::http::{Request, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::models::{
    Bus, BusId, BusStop, ChatMessage, ConversationId, Notification, Route, RouteId, RouteShape,
    TokenResponse, User,
};

/// Default API base URL
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";

/// Local storage key of the bearer token
pub const TOKEN_KEY: &str = "access_token";

pub const DEFAULT_MAP_STYLE: &str = "mapbox/streets-v12";

const API_URL_KEY: &str = "transit_api_url";

// ============ Configuration ============

fn storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok()?
}

/// API base URL: local storage override, then build-time setting, then default
pub fn get_api_base() -> String {
    let url = storage()
        .and_then(|s| s.get_item(API_URL_KEY).ok().flatten())
        .filter(|url| !url.trim().is_empty())
        .or_else(|| option_env!("TRANSIT_API_URL").map(str::to_string))
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    url.trim_end_matches('/').to_string()
}

/// Set the API base URL in local storage
pub fn set_api_base(url: &str) {
    if let Some(storage) = storage() {
        let _ = storage.set_item(API_URL_KEY, url);
    }
}

/// WebSocket endpoint, from the build-time setting or derived from the API base
pub fn get_ws_base() -> String {
    match option_env!("TRANSIT_WS_URL") {
        Some(url) => url.to_string(),
        None => derive_ws_base(&get_api_base()),
    }
}

/// `http://host/api` -> `ws://host/ws/connect`
pub fn derive_ws_base(api_base: &str) -> String {
    let base = api_base
        .trim_end_matches('/')
        .replacen("https://", "wss://", 1)
        .replacen("http://", "ws://", 1);
    let root = base.strip_suffix("/api").unwrap_or(&base);
    format!("{}/ws/connect", root)
}

/// Map provider access token, if one was built in
pub fn map_token() -> Option<&'static str> {
    option_env!("TRANSIT_MAP_TOKEN").filter(|t| !t.is_empty())
}

/// Map style, same default as the native `[map]` section
pub fn map_style() -> &'static str {
    option_env!("TRANSIT_MAP_STYLE")
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_MAP_STYLE)
}

// ============ Token ============

pub fn get_token() -> Option<String> {
    storage()
        .and_then(|s| s.get_item(TOKEN_KEY).ok().flatten())
        .filter(|t| !t.is_empty())
}

pub fn set_token(token: &str) {
    if let Some(storage) = storage() {
        let _ = storage.set_item(TOKEN_KEY, token);
    }
}

pub fn clear_token() {
    if let Some(storage) = storage() {
        let _ = storage.remove_item(TOKEN_KEY);
    }
}

/// Socket URL carrying the token as a query parameter
pub fn socket_url(ws_base: &str, token: &str) -> String {
    let encoded: String = js_sys::encode_uri_component(token).into();
    format!("{}?token={}", ws_base, encoded)
}

// ============ Errors ============

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// No token, or the backend answered 401. The token is gone.
    Unauthorized,
    Http { status: u16, message: String },
    Network(String),
    Parse(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unauthorized => write!(f, "Session expired, please log in again"),
            ApiError::Http { status, message } => write!(f, "{} ({})", message, status),
            ApiError::Network(e) => write!(f, "Network error: {}", e),
            ApiError::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

/// Message for a failed response; FastAPI puts it under `detail`
fn error_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(detail)) => return detail.clone(),
            Some(detail) => return detail.to_string(),
            None => {}
        }
    }
    if body.trim().is_empty() {
        format!("Request failed with status {}", status)
    } else {
        body.trim().to_string()
    }
}

// ============ Plumbing ============

fn authorized(builder: RequestBuilder) -> Result<RequestBuilder, ApiError> {
    let token = get_token().ok_or(ApiError::Unauthorized)?;
    Ok(builder.header("Authorization", &format!("Bearer {}", token)))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();

    if status == 401 {
        clear_token();
        return Err(ApiError::Unauthorized);
    }

    if !response.ok() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Http {
            status,
            message: error_message(status, &body),
        });
    }

    response
        .json()
        .await
        .map_err(|e| ApiError::Parse(e.to_string()))
}

async fn get_json<T: DeserializeOwned>(path: &str) -> Result<T, ApiError> {
    let request = authorized(Request::get(&format!("{}{}", get_api_base(), path)))?;
    let response = request
        .send()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;
    read_json(response).await
}

async fn post_json<B: Serialize, T: DeserializeOwned>(path: &str, body: &B) -> Result<T, ApiError> {
    let request = authorized(Request::post(&format!("{}{}", get_api_base(), path)))?
        .json(body)
        .map_err(|e| ApiError::Network(format!("Request build error: {}", e)))?;
    let response = request
        .send()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;
    read_json(response).await
}

fn encode(value: &str) -> String {
    js_sys::encode_uri_component(value).into()
}

// ============ Auth ============

/// Log in with a form post and store the token
pub async fn login(username: &str, password: &str) -> Result<TokenResponse, ApiError> {
    let form = format!("username={}&password={}", encode(username), encode(password));

    let response = Request::post(&format!("{}/accounts/login", get_api_base()))
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(form)
        .map_err(|e| ApiError::Network(format!("Request build error: {}", e)))?
        .send()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;

    let status = response.status();
    if status == 401 || status == 400 {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Http {
            status,
            message: error_message(status, &body),
        });
    }

    let token: TokenResponse = read_json(response).await?;
    set_token(&token.access_token);
    Ok(token)
}

/// Tell the backend, then forget the token whatever it answered
pub async fn logout() {
    if let Ok(request) = authorized(Request::post(&format!("{}/accounts/logout", get_api_base()))) {
        if let Err(e) = request.send().await {
            web_sys::console::warn_1(&format!("Logout call failed: {}", e).into());
        }
    }
    clear_token();
}

pub async fn fetch_me() -> Result<User, ApiError> {
    get_json("/account/me").await
}

// ============ Fleet ============

pub async fn fetch_buses() -> Result<Vec<Bus>, ApiError> {
    get_json("/buses").await
}

pub async fn fetch_bus(id: BusId) -> Result<Bus, ApiError> {
    get_json(&format!("/buses/{}", id)).await
}

pub async fn fetch_stops() -> Result<Vec<BusStop>, ApiError> {
    get_json("/buses/stops").await
}

pub async fn fetch_routes() -> Result<Vec<Route>, ApiError> {
    get_json("/routes").await
}

/// Ask the backend to build the road geometry of a route
pub async fn generate_route_shape(route_id: RouteId) -> Result<RouteShape, ApiError> {
    post_json(&format!("/routes/{}/generate-shape", route_id), &()).await
}

// ============ Chat & notifications ============

pub async fn fetch_messages(conversation_id: ConversationId) -> Result<Vec<ChatMessage>, ApiError> {
    get_json(&format!("/conversations/{}/messages", conversation_id)).await
}

pub async fn send_message(
    conversation_id: ConversationId,
    content: &str,
) -> Result<ChatMessage, ApiError> {
    #[derive(Serialize)]
    struct SendMessageRequest<'a> {
        content: &'a str,
    }

    post_json(
        &format!("/conversations/{}/messages", conversation_id),
        &SendMessageRequest { content },
    )
    .await
}

pub async fn fetch_notifications() -> Result<Vec<Notification>, ApiError> {
    get_json("/notifications").await
}
