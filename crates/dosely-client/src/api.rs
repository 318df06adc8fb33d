//! # REST Adapter
//!
//! Typed calls against the stock and user service.
//!
//! ## Request Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          HttpApi::dispatch                              │
//! │                                                                         │
//! │  call(method, path)                                                    │
//! │  ├── Authorization: Bearer <SessionStore::current_token()>             │
//! │  └── x-request-id: <uuid v4>                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  send ──► transport error ──────────────► ClientError::Transport       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  status 2xx ──────────────────────────► body decoded by caller         │
//! │  status 401 (current token) ─► invalidate ► ClientError::AuthInvalid   │
//! │  status 4xx ──────────────────────────► ClientError::Rejected          │
//! │  status 5xx ──────────────────────────► ClientError::Server            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The 401 side effect happens here and nowhere else. A 401 on a request
//! that carried no token (a failed login), or a token the user has since
//! replaced by logging in again, is a plain rejection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use dosely_core::{
    AuthResponse, Credentials, GoogleLoginRequest, Medicine, MedicineAdded, MedicineFields,
    MedicineId, MedicinePatch, SignupRequest, Stock, StockId, StockListResponse, StockPage,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::session::SessionStore;

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// =============================================================================
// Traits
// =============================================================================

/// Stock and medicine endpoints.
#[async_trait]
pub trait StockApi: Send + Sync {
    /// `GET /stock/getAll?page=&limit=`, normalized to one page.
    async fn list_stocks(&self, page: u32, page_size: u32) -> ClientResult<StockPage>;

    /// Single stock with its medicines.
    async fn get_stock(&self, id: StockId) -> ClientResult<Stock>;

    async fn create_stock(&self, name: &str) -> ClientResult<Stock>;

    async fn rename_stock(&self, id: StockId, name: &str) -> ClientResult<Stock>;

    async fn delete_stock(&self, id: StockId) -> ClientResult<()>;

    async fn add_medicine(
        &self,
        stock_id: StockId,
        fields: &MedicineFields,
    ) -> ClientResult<MedicineAdded>;

    async fn edit_medicine(&self, med_id: MedicineId, patch: &MedicinePatch)
        -> ClientResult<Medicine>;

    async fn delete_medicine(&self, med_id: MedicineId) -> ClientResult<()>;
}

/// User endpoints. None of them stores the returned token.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> ClientResult<AuthResponse>;

    async fn signup(&self, request: &SignupRequest) -> ClientResult<AuthResponse>;

    /// Exchanges a Google ID token for a session token.
    async fn google_login(&self, id_token: &str) -> ClientResult<AuthResponse>;
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// A request about to be sent, plus what the response handler needs to know.
struct Call {
    builder: RequestBuilder,
    endpoint: String,
    request_id: String,
    /// Bearer token the request carried.
    token: Option<String>,
}

impl Call {
    fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        self.builder = self.builder.json(body);
        self
    }

    fn query<Q: Serialize + ?Sized>(mut self, query: &Q) -> Self {
        self.builder = self.builder.query(query);
        self
    }
}

/// The reqwest-backed adapter.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl HttpApi {
    /// Builds the adapter from configuration and an injected session.
    pub fn new(config: &ClientConfig, session: Arc<SessionStore>) -> ClientResult<Self> {
        Self::with_base_url(config.base_url(), config.timeout(), session)
    }

    pub fn with_base_url(
        base_url: &str,
        timeout: Duration,
        session: Arc<SessionStore>,
    ) -> ClientResult<Self> {
        let parsed = Url::parse(base_url)?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::InvalidConfig(e.to_string()))?;

        Ok(HttpApi {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    fn call(&self, method: Method, path: &str) -> Call {
        let request_id = Uuid::new_v4().to_string();
        let url = format!("{}{}", self.base_url, path);

        let mut builder = self
            .client
            .request(method.clone(), url)
            .header(REQUEST_ID_HEADER, &request_id);

        let token = self.session.current_token();
        if let Some(token) = &token {
            builder = builder.bearer_auth(token);
        }

        Call {
            builder,
            endpoint: format!("{} {}", method, path),
            request_id,
            token,
        }
    }

    /// Sends a call and maps every non-success status. The only place that
    /// reacts to 401.
    async fn dispatch(&self, call: Call) -> ClientResult<Response> {
        let Call {
            builder,
            endpoint,
            request_id,
            token,
        } = call;

        debug!(%endpoint, %request_id, "Sending request");
        let started = Instant::now();

        let response = builder.send().await.map_err(|e| {
            warn!(%endpoint, %request_id, error = %e, "Request failed before a response");
            ClientError::from(e)
        })?;

        let status = response.status();
        debug!(
            %endpoint,
            %request_id,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Response received"
        );

        if status.is_success() {
            return Ok(response);
        }

        let message = error_message(status, response.text().await.unwrap_or_default());

        if status == StatusCode::UNAUTHORIZED {
            if let Some(token) = token {
                if self.session.invalidate_token(&token) {
                    return Err(ClientError::AuthInvalid);
                }
                debug!(%endpoint, %request_id, "401 for a token replaced in flight");
            }
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        warn!(%endpoint, %request_id, status = status.as_u16(), %message, "Request rejected");
        Err(ClientError::from_status(status.as_u16(), message))
    }

    async fn dispatch_json<T: DeserializeOwned>(&self, call: Call) -> ClientResult<T> {
        let endpoint = call.endpoint.clone();
        let response = self.dispatch(call).await?;
        let bytes = response.bytes().await?;

        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode {
            endpoint,
            reason: e.to_string(),
        })
    }

    async fn dispatch_empty(&self, call: Call) -> ClientResult<()> {
        self.dispatch(call).await.map(|_| ())
    }
}

/// Picks the human-readable part of an error body.
///
/// Servers answer with `{"message": "..."}` or, for field validation,
/// `{"message": ["...", "..."]}`.
fn error_message(status: StatusCode, body: String) -> String {
    let from_json = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| match value.get("message") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            _ => None,
        })
        .filter(|m| !m.is_empty());

    from_json
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty() && b.len() <= 200))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string())
}

#[async_trait]
impl StockApi for HttpApi {
    async fn list_stocks(&self, page: u32, page_size: u32) -> ClientResult<StockPage> {
        let call = self
            .call(Method::GET, "/stock/getAll")
            .query(&[("page", page), ("limit", page_size)]);

        let response: StockListResponse = self.dispatch_json(call).await?;
        if response.is_legacy() {
            debug!(page, "Server answered with an unpaginated stock list");
        }
        Ok(response.into_page())
    }

    async fn get_stock(&self, id: StockId) -> ClientResult<Stock> {
        match self
            .dispatch_json::<Stock>(self.call(Method::GET, &format!("/stock/{}", id)))
            .await
        {
            Err(e) if e.is_not_found() => {
                debug!(stock_id = id, "Falling back to /stock/get/{id}");
                self.dispatch_json(self.call(Method::GET, &format!("/stock/get/{}", id)))
                    .await
            }
            other => other,
        }
    }

    async fn create_stock(&self, name: &str) -> ClientResult<Stock> {
        let call = self
            .call(Method::POST, "/stock/create")
            .json(&json!({ "name": name }));
        self.dispatch_json(call).await
    }

    async fn rename_stock(&self, id: StockId, name: &str) -> ClientResult<Stock> {
        let call = self
            .call(Method::PATCH, &format!("/stock/{}", id))
            .json(&json!({ "name": name }));
        self.dispatch_json(call).await
    }

    async fn delete_stock(&self, id: StockId) -> ClientResult<()> {
        self.dispatch_empty(self.call(Method::DELETE, &format!("/stock/{}", id)))
            .await
    }

    async fn add_medicine(
        &self,
        stock_id: StockId,
        fields: &MedicineFields,
    ) -> ClientResult<MedicineAdded> {
        let call = self
            .call(Method::POST, &format!("/stock/insertMedicine/{}", stock_id))
            .json(fields);
        let value: Value = self.dispatch_json(call).await?;
        Ok(MedicineAdded::from_value(value)?)
    }

    async fn edit_medicine(
        &self,
        med_id: MedicineId,
        patch: &MedicinePatch,
    ) -> ClientResult<Medicine> {
        let call = self
            .call(Method::PATCH, &format!("/stock/medicine/{}", med_id))
            .json(patch);
        self.dispatch_json(call).await
    }

    async fn delete_medicine(&self, med_id: MedicineId) -> ClientResult<()> {
        self.dispatch_empty(self.call(Method::DELETE, &format!("/stock/medicine/{}", med_id)))
            .await
    }
}

#[async_trait]
impl AuthApi for HttpApi {
    async fn login(&self, credentials: &Credentials) -> ClientResult<AuthResponse> {
        let call = self.call(Method::POST, "/user/login").json(credentials);
        self.dispatch_json(call).await
    }

    async fn signup(&self, request: &SignupRequest) -> ClientResult<AuthResponse> {
        let call = self.call(Method::POST, "/user/signup").json(request);
        self.dispatch_json(call).await
    }

    async fn google_login(&self, id_token: &str) -> ClientResult<AuthResponse> {
        let body = GoogleLoginRequest {
            token: id_token.to_string(),
        };
        let call = self.call(Method::POST, "/user/google-login").json(&body);
        self.dispatch_json(call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::AuthState;
    use axum::extract::{Path, Query};
    use axum::http::HeaderMap;
    use axum::routing::{delete, get, patch, post};
    use axum::{Json, Router};
    use std::collections::HashMap;
    use tokio::sync::Notify;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn api(base_url: &str, session: Arc<SessionStore>) -> HttpApi {
        HttpApi::with_base_url(base_url, Duration::from_secs(5), session).unwrap()
    }

    fn logged_in() -> Arc<SessionStore> {
        let session = Arc::new(SessionStore::in_memory());
        session.login("token-123").unwrap();
        session
    }

    fn stock_router() -> Router {
        Router::new()
            .route(
                "/stock/getAll",
                get(
                    |headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        let has_request_id = headers.contains_key(REQUEST_ID_HEADER);
                        let page: i64 = q.get("page").and_then(|p| p.parse().ok()).unwrap_or(0);
                        let limit = q.get("limit").cloned().unwrap_or_default();
                        Json(json!({
                            "data": [{"id": page, "name": format!("{}|{}|{}", auth, limit, has_request_id)}],
                            "total": 25
                        }))
                    },
                ),
            )
            .route(
                "/stock/{id}",
                get(|Path(id): Path<i64>| async move {
                    if id == 5 {
                        Err(axum::http::StatusCode::NOT_FOUND)
                    } else {
                        Ok(Json(json!({"id": id, "name": "Direct", "medicines": []})))
                    }
                })
                .patch(|Path(id): Path<i64>, Json(body): Json<Value>| async move {
                    Json(json!({"id": id, "name": body["name"]}))
                })
                .delete(|| async { axum::http::StatusCode::NO_CONTENT }),
            )
            .route(
                "/stock/get/{id}",
                get(|Path(id): Path<i64>| async move {
                    Json(json!({
                        "id": id,
                        "name": "Fallback",
                        "medicines": [{"id": 1, "name": "Aspirin", "dose": "100", "quantity": "20"}]
                    }))
                }),
            )
            .route(
                "/stock/create",
                post(|Json(body): Json<Value>| async move {
                    if body["name"] == "" {
                        Err((
                            axum::http::StatusCode::BAD_REQUEST,
                            Json(json!({"message": ["name should not be empty"]})),
                        ))
                    } else {
                        Ok(Json(json!({"id": 7, "name": body["name"]})))
                    }
                }),
            )
            .route(
                "/stock/insertMedicine/{id}",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({"id": 33, "name": body["name"], "dose": body["dose"], "quantity": body["quantity"]}))
                }),
            )
            .route(
                "/stock/medicine/{id}",
                patch(|Path(id): Path<i64>, Json(body): Json<Value>| async move {
                    Json(json!({"id": id, "name": "Ibuprofen", "quantity": body["quantity"]}))
                })
                .delete(|| async { "" }),
            )
    }

    #[tokio::test]
    async fn test_list_stocks_sends_auth_and_paging() {
        let base = serve(stock_router()).await;
        let api = api(&base, logged_in());

        let page = api.list_stocks(2, 10).await.unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.items[0].id, 2);
        assert_eq!(page.items[0].name, "Bearer token-123|10|true");
    }

    #[tokio::test]
    async fn test_list_stocks_without_session_sends_no_auth() {
        let base = serve(stock_router()).await;
        let api = api(&base, Arc::new(SessionStore::in_memory()));

        let page = api.list_stocks(1, 10).await.unwrap();
        assert_eq!(page.items[0].name, "|10|true");
    }

    #[tokio::test]
    async fn test_legacy_array_response() {
        let router = Router::new().route(
            "/stock/getAll",
            get(|| async { Json(json!([{"id": 1, "name": "A"}, {"id": 2, "name": "B"}])) }),
        );
        let base = serve(router).await;

        let page = api(&base, logged_in()).list_stocks(1, 10).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_get_stock_falls_back_on_404() {
        let base = serve(stock_router()).await;
        let api = api(&base, logged_in());

        let direct = api.get_stock(3).await.unwrap();
        assert_eq!(direct.name, "Direct");

        let fallback = api.get_stock(5).await.unwrap();
        assert_eq!(fallback.name, "Fallback");
        assert_eq!(fallback.medicines[0].dose, 100.0);
        assert_eq!(fallback.medicines[0].quantity, 20);
    }

    #[tokio::test]
    async fn test_create_rename_delete() {
        let base = serve(stock_router()).await;
        let api = api(&base, logged_in());

        let created = api.create_stock("Travel Kit").await.unwrap();
        assert_eq!((created.id, created.name.as_str()), (7, "Travel Kit"));

        let renamed = api.rename_stock(7, "Beach Kit").await.unwrap();
        assert_eq!(renamed.name, "Beach Kit");

        api.delete_stock(7).await.unwrap();
        api.delete_medicine(33).await.unwrap();
    }

    #[tokio::test]
    async fn test_validation_rejection_carries_message() {
        let base = serve(stock_router()).await;
        let session = logged_in();
        let api = api(&base, session.clone());

        let err = api.create_stock("").await.unwrap_err();
        match err {
            ClientError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "name should not be empty");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_insert_medicine_normalizes_medicine_payload() {
        let base = serve(stock_router()).await;
        let api = api(&base, logged_in());

        let fields = MedicineFields {
            name: "Vitamin C".into(),
            dose: 500.0,
            quantity: 60,
            take_morning: true,
            take_afternoon: false,
            take_evening: false,
        };
        let added = api.add_medicine(1, &fields).await.unwrap();
        match added {
            MedicineAdded::Medicine(m) => {
                assert_eq!(m.id, 33);
                assert_eq!(m.quantity, 60);
            }
            other => panic!("expected a medicine, got {:?}", other),
        }

        let patch = MedicinePatch {
            quantity: Some(4),
            ..MedicinePatch::default()
        };
        let edited = api.edit_medicine(9, &patch).await.unwrap();
        assert_eq!((edited.id, edited.quantity), (9, 4));
    }

    #[tokio::test]
    async fn test_401_invalidates_session() {
        let router = Router::new().route(
            "/stock/getAll",
            get(|| async { (axum::http::StatusCode::UNAUTHORIZED, "expired") }),
        );
        let base = serve(router).await;
        let session = logged_in();
        let mut auth_rx = session.subscribe();
        let api = api(&base, session.clone());

        let err = api.list_stocks(1, 10).await.unwrap_err();
        assert!(err.is_auth_invalid());
        assert!(!session.is_authenticated());

        auth_rx.changed().await.unwrap();
        assert_eq!(*auth_rx.borrow(), AuthState::Expired);
    }

    #[tokio::test]
    async fn test_401_for_replaced_token_keeps_new_session() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let router = Router::new().route(
            "/stock/getAll",
            get({
                let entered = entered.clone();
                let release = release.clone();
                move || {
                    let entered = entered.clone();
                    let release = release.clone();
                    async move {
                        entered.notify_one();
                        release.notified().await;
                        (axum::http::StatusCode::UNAUTHORIZED, "expired")
                    }
                }
            }),
        );
        let base = serve(router).await;
        let session = logged_in();
        let api = api(&base, session.clone());

        let request = tokio::spawn({
            let api = api.clone();
            async move { api.list_stocks(1, 10).await }
        });
        entered.notified().await;
        session.login("token-456").unwrap();
        release.notify_one();

        let err = request.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::Rejected { status: 401, .. }));
        assert_eq!(session.current_token().as_deref(), Some("token-456"));
        assert_eq!(session.state(), AuthState::Authenticated);
    }

    #[tokio::test]
    async fn test_failed_login_is_not_session_expiry() {
        let router = Router::new().route(
            "/user/login",
            post(|| async {
                (
                    axum::http::StatusCode::UNAUTHORIZED,
                    Json(json!({"message": "Invalid credentials"})),
                )
            }),
        );
        let base = serve(router).await;
        let session = Arc::new(SessionStore::in_memory());
        let api = api(&base, session.clone());

        let creds = Credentials {
            email: "ana@example.com".into(),
            password: "wrong!".into(),
        };
        let err = api.login(&creds).await.unwrap_err();
        assert!(matches!(err, ClientError::Rejected { status: 401, ref message } if message == "Invalid credentials"));
        assert_eq!(session.state(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn test_auth_endpoints_return_token() {
        let router = Router::new()
            .route(
                "/user/login",
                post(|| async { Json(json!({"token": "t1", "user": {"id": 1, "name": "Ana"}})) }),
            )
            .route("/user/signup", post(|| async { Json(json!({"token": "t2"})) }))
            .route(
                "/user/google-login",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({"token": format!("g-{}", body["token"].as_str().unwrap_or(""))}))
                }),
            );
        let base = serve(router).await;
        let session = Arc::new(SessionStore::in_memory());
        let api = api(&base, session.clone());

        let creds = Credentials {
            email: "ana@example.com".into(),
            password: "secret".into(),
        };
        let resp = api.login(&creds).await.unwrap();
        assert_eq!(resp.token, "t1");
        assert_eq!(resp.user.unwrap().id, "1");

        let signup = SignupRequest {
            name: "Ana".into(),
            email: "ana@example.com".into(),
            password: "secret".into(),
        };
        assert_eq!(api.signup(&signup).await.unwrap().token, "t2");
        assert_eq!(api.google_login("abc").await.unwrap().token, "g-abc");

        // The adapter never stores tokens itself.
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_server_error_and_transport_error() {
        let router = Router::new().route(
            "/stock/{id}",
            delete(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = serve(router).await;

        let err = api(&base, logged_in()).delete_stock(1).await.unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 500, ref message } if message == "boom"));

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dead = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = api(&dead, logged_in()).list_stocks(1, 10).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_undecodable_body_is_decode_error() {
        let router = Router::new().route("/stock/create", post(|| async { "not json" }));
        let base = serve(router).await;

        let err = api(&base, logged_in()).create_stock("X").await.unwrap_err();
        assert!(matches!(err, ClientError::Decode { ref endpoint, .. } if endpoint == "POST /stock/create"));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let session = Arc::new(SessionStore::in_memory());
        assert!(HttpApi::with_base_url("ftp://x", Duration::from_secs(1), session).is_err());
    }
}
