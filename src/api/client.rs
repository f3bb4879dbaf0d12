//! Backend REST Client
//!
//! Typed methods mapping 1:1 onto the backend's endpoints. Every
//! authenticated call reads the token from the [`TokenStore`] at call time
//! and attaches it as a bearer header. A 401 clears the token.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::error::{error_message, ClientError, ClientResult};
use crate::config::ApiConfig;
use crate::models::{
    Bus, BusId, BusStop, ChatMessage, ConversationId, Notification, Route, RouteId, RouteShape,
    TokenResponse, User,
};
use crate::session::TokenStore;

/// Header carrying a per-request id for log correlation
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// REST client for the transit backend
#[derive(Clone)]
pub struct TransitClient {
    http: Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
}

#[derive(Serialize)]
struct LoginForm<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    content: &'a str,
}

impl TransitClient {
    /// Create a client for `config.base_url` (the `/api` root)
    pub fn new(config: &ApiConfig, tokens: Arc<dyn TokenStore>) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The token holder shared with the live client
    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn token(&self) -> ClientResult<String> {
        self.tokens.load().ok_or(ClientError::Unauthorized)
    }

    // ============ Auth ============

    /// Log in and store the returned token
    pub async fn login(&self, username: &str, password: &str) -> ClientResult<TokenResponse> {
        let request = self
            .http
            .post(self.url("/accounts/login"))
            .form(&LoginForm { username, password });

        let response = self.send(request, "/accounts/login").await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST {
            tracing::warn!(username = %username, status = status.as_u16(), "Login rejected");
            return Err(ClientError::InvalidCredentials);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        let token: TokenResponse = Self::decode(response).await?;
        self.tokens.save(&token.access_token)?;

        tracing::info!(username = %username, "Logged in");
        Ok(token)
    }

    /// Log out. The local token is cleared whatever the backend says.
    pub async fn logout(&self) -> ClientResult<()> {
        let Some(token) = self.tokens.load() else {
            return Ok(());
        };

        let request = self
            .http
            .post(self.url("/accounts/logout"))
            .bearer_auth(&token);

        match self.send(request, "/accounts/logout").await {
            Ok(response) if !response.status().is_success() => {
                tracing::debug!(status = response.status().as_u16(), "Logout call rejected");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "Logout call failed");
            }
        }

        self.tokens.clear()?;
        tracing::info!("Logged out");
        Ok(())
    }

    /// Current user
    pub async fn me(&self) -> ClientResult<User> {
        self.get_json("/account/me").await
    }

    // ============ Fleet ============

    pub async fn buses(&self) -> ClientResult<Vec<Bus>> {
        self.get_json("/buses").await
    }

    pub async fn bus(&self, id: BusId) -> ClientResult<Bus> {
        self.get_json(&format!("/buses/{}", id)).await
    }

    pub async fn stops(&self) -> ClientResult<Vec<BusStop>> {
        self.get_json("/buses/stops").await
    }

    pub async fn routes(&self) -> ClientResult<Vec<Route>> {
        self.get_json("/routes").await
    }

    /// Ask the backend to generate road geometry for a route
    pub async fn route_shape(&self, route_id: RouteId) -> ClientResult<RouteShape> {
        self.post_json(&format!("/routes/{}/generate-shape", route_id), &())
            .await
    }

    // ============ Chat & notifications ============

    pub async fn messages(&self, conversation_id: ConversationId) -> ClientResult<Vec<ChatMessage>> {
        self.get_json(&format!("/conversations/{}/messages", conversation_id))
            .await
    }

    pub async fn send_message(
        &self,
        conversation_id: ConversationId,
        content: &str,
    ) -> ClientResult<ChatMessage> {
        self.post_json(
            &format!("/conversations/{}/messages", conversation_id),
            &SendMessageRequest { content },
        )
        .await
    }

    pub async fn notifications(&self) -> ClientResult<Vec<Notification>> {
        self.get_json("/notifications").await
    }

    // ============ Live feed ============

    /// Socket URL with the current token as the `token` query parameter
    pub fn websocket_url(&self, ws_base: &str) -> ClientResult<String> {
        let token = self.token()?;
        Ok(crate::live::socket_url(ws_base, &token))
    }

    // ============ Plumbing ============

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let request = self.http.get(self.url(path));
        let response = self.authorized(request, path).await?;
        Self::decode(response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let request = self.http.post(self.url(path)).json(body);
        let response = self.authorized(request, path).await?;
        Self::decode(response).await
    }

    /// Send with the bearer token; 401 clears it, other failures become errors
    async fn authorized(&self, request: RequestBuilder, path: &str) -> ClientResult<Response> {
        let token = self.token()?;
        let response = self.send(request.bearer_auth(token), path).await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(path = %path, "Session rejected by backend, clearing token");
            self.tokens.clear()?;
            return Err(ClientError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(status, &body);
            tracing::warn!(path = %path, status = status.as_u16(), error = %message, "API call failed");
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn send(&self, request: RequestBuilder, path: &str) -> ClientResult<Response> {
        let request_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!(request_id = %request_id, path = %path, "API request");

        request
            .header(REQUEST_ID_HEADER, &request_id)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(request_id = %request_id, error = %e, "API request failed");
                ClientError::from_transport(e)
            })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        let bytes = response.bytes().await.map_err(ClientError::from_transport)?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryTokenStore;
    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode as AxumStatus},
        response::{IntoResponse, Response as AxumResponse},
        routing::{get, post},
        Form, Json, Router,
    };
    use serde::Deserialize;
    use serde_json::json;

    const TOKEN: &str = "tok-1";

    #[derive(Deserialize)]
    struct Credentials {
        username: String,
        password: String,
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Bearer {}", TOKEN))
            .unwrap_or(false)
    }

    fn unauthorized() -> AxumResponse {
        (
            AxumStatus::UNAUTHORIZED,
            Json(json!({"detail": "Could not validate credentials"})),
        )
            .into_response()
    }

    async fn login(Form(creds): Form<Credentials>) -> AxumResponse {
        if creds.username == "asha" && creds.password == "secret" {
            Json(json!({"access_token": TOKEN, "token_type": "bearer"})).into_response()
        } else {
            unauthorized()
        }
    }

    async fn me(headers: HeaderMap) -> AxumResponse {
        if !authorized(&headers) {
            return unauthorized();
        }
        Json(json!({"id": 1, "username": "asha", "role": "admin"})).into_response()
    }

    async fn buses(headers: HeaderMap) -> AxumResponse {
        if !authorized(&headers) {
            return unauthorized();
        }
        Json(json!([
            {"id": 1, "license_plate": "A-1", "status": "operational"},
            {"id": 2, "license_plate": "A-2", "status": "idle"}
        ]))
        .into_response()
    }

    async fn bus(headers: HeaderMap, Path(id): Path<i64>) -> AxumResponse {
        if !authorized(&headers) {
            return unauthorized();
        }
        if id == 1 {
            Json(json!({"id": 1, "license_plate": "A-1", "status": "operational"})).into_response()
        } else {
            (AxumStatus::NOT_FOUND, Json(json!({"detail": "Bus not found"}))).into_response()
        }
    }

    async fn send_message(
        headers: HeaderMap,
        Path(id): Path<i64>,
        Json(body): Json<serde_json::Value>,
    ) -> AxumResponse {
        if !authorized(&headers) {
            return unauthorized();
        }
        Json(json!({
            "id": 99,
            "conversation_id": id,
            "sender_id": 1,
            "content": body["content"],
            "created_at": "2024-03-01T08:30:00Z"
        }))
        .into_response()
    }

    async fn expired() -> AxumResponse {
        unauthorized()
    }

    async fn broken() -> AxumResponse {
        (
            AxumStatus::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "database offline"})),
        )
            .into_response()
    }

    async fn spawn_backend() -> String {
        let app = Router::new()
            .route("/api/accounts/login", post(login))
            .route("/api/accounts/logout", post(|| async { AxumStatus::NO_CONTENT }))
            .route("/api/account/me", get(me))
            .route("/api/buses", get(buses))
            .route("/api/buses/:id", get(bus))
            .route("/api/conversations/:id/messages", post(send_message))
            .route("/api/routes", get(expired))
            .route("/api/notifications", get(broken));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}/api", addr)
    }

    fn client(base_url: &str, tokens: Arc<dyn TokenStore>) -> TransitClient {
        let config = ApiConfig {
            base_url: base_url.to_string(),
            request_timeout_secs: 5,
        };
        TransitClient::new(&config, tokens).unwrap()
    }

    #[tokio::test]
    async fn test_login_token_attached_to_later_calls() {
        let base = spawn_backend().await;
        let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
        let client = client(&base, Arc::clone(&tokens));

        let token = client.login("asha", "secret").await.unwrap();
        assert_eq!(token.access_token, TOKEN);
        assert_eq!(tokens.load().as_deref(), Some(TOKEN));

        let user = client.me().await.unwrap();
        assert_eq!(user.username, "asha");

        let buses = client.buses().await.unwrap();
        assert_eq!(buses.len(), 2);

        let bus = client.bus(1).await.unwrap();
        assert_eq!(bus.license_plate, "A-1");

        let message = client.send_message(4, "on my way").await.unwrap();
        assert_eq!(message.conversation_id, 4);
        assert_eq!(message.content, "on my way");
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let base = spawn_backend().await;
        let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
        let client = client(&base, Arc::clone(&tokens));

        let err = client.login("asha", "wrong").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidCredentials));
        assert!(tokens.load().is_none());
    }

    #[tokio::test]
    async fn test_401_clears_token() {
        let base = spawn_backend().await;
        let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::with_token(TOKEN));
        let client = client(&base, Arc::clone(&tokens));

        let err = client.routes().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(tokens.load().is_none());

        // Later calls fail locally until the next login
        assert!(client.me().await.unwrap_err().is_unauthorized());
    }

    #[tokio::test]
    async fn test_stale_token_rejected() {
        let base = spawn_backend().await;
        let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::with_token("old"));
        let client = client(&base, Arc::clone(&tokens));

        assert!(client.buses().await.unwrap_err().is_unauthorized());
        assert!(tokens.load().is_none());
    }

    #[tokio::test]
    async fn test_api_error_keeps_token() {
        let base = spawn_backend().await;
        let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::with_token(TOKEN));
        let client = client(&base, Arc::clone(&tokens));

        match client.notifications().await.unwrap_err() {
            ClientError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "database offline");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }

        match client.bus(42).await.unwrap_err() {
            ClientError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Bus not found");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }

        assert_eq!(tokens.load().as_deref(), Some(TOKEN));
    }

    #[tokio::test]
    async fn test_no_token_skips_network() {
        // Nothing listens on port 9; a real request would be Unavailable
        let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
        let client = client("http://127.0.0.1:9/api", tokens);

        assert!(client.buses().await.unwrap_err().is_unauthorized());
        assert!(client.websocket_url("ws://localhost/ws/connect").is_err());
    }

    #[tokio::test]
    async fn test_backend_down() {
        let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::with_token(TOKEN));
        let client = client("http://127.0.0.1:9/api", tokens);

        let err = client.buses().await.unwrap_err();
        assert!(matches!(err, ClientError::Unavailable));
    }

    #[tokio::test]
    async fn test_logout_clears_token() {
        let base = spawn_backend().await;
        let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::with_token(TOKEN));
        let client = client(&base, Arc::clone(&tokens));

        client.logout().await.unwrap();
        assert!(tokens.load().is_none());

        // Already logged out is fine
        client.logout().await.unwrap();
    }

    #[test]
    fn test_websocket_url_encodes_token() {
        let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::with_token("a.b+c/d"));
        let client = client("http://localhost:8000/api/", tokens);

        assert_eq!(client.base_url(), "http://localhost:8000/api");
        let url = client.websocket_url("ws://localhost:8000/ws/connect").unwrap();
        assert_eq!(url, "ws://localhost:8000/ws/connect?token=a.b%2Bc%2Fd");
    }
}
