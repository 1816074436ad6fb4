//! crates/storefront_core/src/api.rs
//!
//! The API client: the only component that talks to the backend. It attaches
//! the bearer token, unwraps the response envelope and normalizes every
//! failure into a `ClientError`.

use http::StatusCode;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{
    AddToWishlistRequest, AuthPayload, LoginRequest, Page, Product, ProfilePayload,
    SendOtpRequest, SignupRequest, VerifyOtpRequest, VerifyOtpResponse, WishlistItem,
};
use crate::ports::{
    ClientError, ClientResult, HttpMethod, HttpRequest, HttpResponse, HttpTransport, SessionStore,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

//=========================================================================================
// Wire Envelope
//=========================================================================================

#[derive(Deserialize)]
struct WireError {
    message: String,
}

#[derive(Deserialize)]
struct WireEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<WireError>,
}

const ENVELOPE_MEMBERS: [&str; 4] = ["data", "error", "success", "message"];

/// Splits a body into payload and backend-reported error. An object carrying
/// `data` or `error` and nothing beyond the envelope members is an envelope;
/// anything else is a bare payload.
fn open_envelope(value: Value) -> (Value, Option<String>) {
    let is_envelope = value
        .as_object()
        .map(|o| {
            (o.contains_key("data") || o.contains_key("error"))
                && o.keys().all(|k| ENVELOPE_MEMBERS.contains(&k.as_str()))
        })
        .unwrap_or(false);
    if !is_envelope {
        return (value, None);
    }
    match serde_json::from_value::<WireEnvelope>(value.clone()) {
        Ok(envelope) => (
            envelope.data.unwrap_or(Value::Null),
            envelope.error.map(|e| e.message),
        ),
        // `error` present but not shaped like `{message}`; keep the raw value.
        Err(_) => (value, None),
    }
}

fn reason_phrase(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Request failed")
}

fn classify(method: HttpMethod, path: &str, status: u16, message: String) -> ClientError {
    let path = path.to_string();
    match status {
        400 | 422 => ClientError::Validation {
            method,
            path,
            status,
            message,
        },
        _ => ClientError::Http {
            method,
            path,
            status,
            message,
        },
    }
}

//=========================================================================================
// The Client
//=========================================================================================

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn SessionStore>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>, store: Arc<dyn SessionStore>) -> Self {
        Self { transport, store }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.request(HttpMethod::Get, path, Vec::new(), None).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ClientResult<T> {
        let query = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.request(HttpMethod::Get, path, query, None).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(|e| ClientError::Decode {
            method: HttpMethod::Post,
            path: path.to_string(),
            status: 0,
            message: format!("failed to encode request body: {}", e),
        })?;
        self.request(HttpMethod::Post, path, Vec::new(), Some(body))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.request(HttpMethod::Delete, path, Vec::new(), None)
            .await
    }

    /// Reads the token for the `Authorization` header. An unreadable slot is
    /// treated as an empty one.
    fn bearer(&self) -> Option<String> {
        match self.store.get() {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!("Could not read session token, sending request anonymously: {}", e);
                None
            }
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> ClientResult<T> {
        let request_id = Uuid::new_v4().to_string();
        let mut headers = vec![
            ("accept".to_string(), "application/json".to_string()),
            (REQUEST_ID_HEADER.to_string(), request_id.clone()),
        ];
        if let Some(token) = self.bearer() {
            headers.push(("authorization".to_string(), format!("Bearer {}", token)));
        }

        debug!(%method, path, request_id = %request_id, "Sending request");
        let request = HttpRequest {
            method,
            path: path.to_string(),
            query,
            headers,
            body,
        };

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ClientError::Network {
                method,
                path: path.to_string(),
                message: e.to_string(),
            })?;
        debug!(%method, path, status = response.status, request_id = %request_id, "Received response");

        Self::decode(method, path, response)
    }

    fn decode<T: DeserializeOwned>(
        method: HttpMethod,
        path: &str,
        response: HttpResponse,
    ) -> ClientResult<T> {
        let status = response.status;
        let raw = response.body.trim();
        let parsed = if raw.is_empty() {
            Some(Value::Null)
        } else {
            serde_json::from_str::<Value>(raw).ok()
        };

        if !response.is_success() {
            let message = parsed
                .map(open_envelope)
                .and_then(|(payload, error)| {
                    error.or_else(|| {
                        payload
                            .get("message")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    })
                })
                .or_else(|| (!raw.is_empty()).then(|| raw.to_string()))
                .unwrap_or_else(|| reason_phrase(status).to_string());
            return Err(classify(method, path, status, message));
        }

        let value = parsed.ok_or_else(|| ClientError::Decode {
            method,
            path: path.to_string(),
            status,
            message: "response body is not valid JSON".to_string(),
        })?;
        let (payload, error) = open_envelope(value);
        if let Some(message) = error {
            return Err(classify(method, path, status, message));
        }

        serde_json::from_value(payload).map_err(|e| ClientError::Decode {
            method,
            path: path.to_string(),
            status,
            message: e.to_string(),
        })
    }
}

//=========================================================================================
// Typed Endpoints
//=========================================================================================

impl ApiClient {
    /// GET /api/health
    pub async fn health(&self) -> ClientResult<()> {
        self.get::<IgnoredAny>("/api/health").await.map(|_| ())
    }

    /// POST /api/auth/login
    pub async fn login(&self, request: &LoginRequest) -> ClientResult<AuthPayload> {
        self.post("/api/auth/login", request).await
    }

    /// POST /api/auth/signup
    pub async fn signup(&self, request: &SignupRequest) -> ClientResult<AuthPayload> {
        self.post("/api/auth/signup", request).await
    }

    /// POST /api/auth/send-otp
    pub async fn send_otp(&self, phone: &str) -> ClientResult<()> {
        let request = SendOtpRequest {
            phone: phone.to_string(),
        };
        self.post::<_, IgnoredAny>("/api/auth/send-otp", &request)
            .await
            .map(|_| ())
    }

    /// POST /api/auth/verify-otp
    pub async fn verify_otp(&self, phone: &str, otp: &str) -> ClientResult<bool> {
        let request = VerifyOtpRequest {
            phone: phone.to_string(),
            otp: otp.to_string(),
        };
        let response: VerifyOtpResponse = self.post("/api/auth/verify-otp", &request).await?;
        Ok(response.valid)
    }

    /// GET /api/auth/profile
    pub async fn profile(&self) -> ClientResult<ProfilePayload> {
        self.get("/api/auth/profile").await
    }

    /// POST /api/auth/logout
    pub async fn logout(&self) -> ClientResult<()> {
        self.post::<_, IgnoredAny>("/api/auth/logout", &serde_json::json!({}))
            .await
            .map(|_| ())
    }

    /// GET /api/products?page=N&limit=M
    pub async fn products(&self, page: u32, limit: u32) -> ClientResult<Page<Product>> {
        self.get_with_query(
            "/api/products",
            &[("page", page.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    /// GET /api/wishlist
    pub async fn wishlist(&self) -> ClientResult<Vec<WishlistItem>> {
        self.get("/api/wishlist").await
    }

    /// POST /api/wishlist
    pub async fn add_to_wishlist(&self, product_id: &str) -> ClientResult<WishlistItem> {
        let request = AddToWishlistRequest {
            product_id: product_id.to_string(),
        };
        self.post("/api/wishlist", &request).await
    }

    /// DELETE /api/wishlist/{product_id}
    pub async fn remove_from_wishlist(&self, product_id: &str) -> ClientResult<()> {
        self.delete::<IgnoredAny>(&format!("/api/wishlist/{}", product_id))
            .await
            .map(|_| ())
    }
}

//=========================================================================================
// Tests
//=========================================================================================
