//! crates/storefront_core/src/ports.rs
//!
//! Defines the service contracts (traits) the client core depends on.
//! These traits form the boundary of the hexagonal architecture, so the core
//! never touches a concrete HTTP stack, storage medium or viewport primitive.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::domain::Page;

//=========================================================================================
// Client Error and Result Types
//=========================================================================================

/// The uniform failure shape every layer of the client sees.
///
/// Failures from the transport and the backend are normalized into this enum by
/// the `ApiClient` before they reach any stateful component.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    #[error("{method} {path}: network error: {message}")]
    Network {
        method: HttpMethod,
        path: String,
        message: String,
    },
    #[error("{method} {path}: HTTP {status}: {message}")]
    Http {
        method: HttpMethod,
        path: String,
        status: u16,
        message: String,
    },
    #[error("{method} {path}: {message}")]
    Validation {
        method: HttpMethod,
        path: String,
        status: u16,
        message: String,
    },
    #[error("{method} {path}: unexpected response body: {message}")]
    Decode {
        method: HttpMethod,
        path: String,
        status: u16,
        message: String,
    },
    #[error("Token storage error: {0}")]
    Storage(String),
    #[error("Another authentication request is already in progress")]
    Busy,
    #[error("Cannot {action} while {from}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },
}

impl ClientError {
    /// HTTP status of the failed request, or 0 when no response was received.
    pub fn status(&self) -> u16 {
        match self {
            Self::Http { status, .. }
            | Self::Validation { status, .. }
            | Self::Decode { status, .. } => *status,
            _ => 0,
        }
    }

    /// The human-readable message without request diagnostics.
    pub fn message(&self) -> String {
        match self {
            Self::Network { message, .. }
            | Self::Http { message, .. }
            | Self::Validation { message, .. }
            | Self::Decode { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == 401
    }
}

/// A convenience type alias for `Result<T, ClientError>`.
pub type ClientResult<T> = Result<T, ClientError>;

//=========================================================================================
// HTTP Transport Port
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        })
    }
}

/// A fully described request, relative to the backend base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A raw response as received from the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Raised by a transport when no response could be obtained at all.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends a request and returns whatever status the server answered with.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

//=========================================================================================
// Session Token Storage Port
//=========================================================================================

/// The single durable slot holding the bearer token.
///
/// Only the auth session store writes to it; the API client only reads.
pub trait SessionStore: Send + Sync {
    fn get(&self) -> ClientResult<Option<String>>;
    fn set(&self, token: &str) -> ClientResult<()>;
    fn clear(&self) -> ClientResult<()>;
}

//=========================================================================================
// Visibility Signal Port
//=========================================================================================

/// Identifies a rendered element a visibility observation is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Invoked when an observed element enters the viewport. The returned future
/// completes once the work the event started has settled.
pub type VisibleCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// A live observation. Dropping it without calling `dispose` is allowed but
/// implementations may keep firing until they notice.
pub trait VisibilityObservation: Send {
    fn dispose(self: Box<Self>);
}

pub trait VisibilitySignal: Send + Sync {
    /// Starts observing `element`, firing `callback` when it comes within
    /// `threshold` pixels of the viewport edge.
    fn on_visible(
        &self,
        element: &ElementHandle,
        threshold: f64,
        callback: VisibleCallback,
    ) -> Box<dyn VisibilityObservation>;
}

//=========================================================================================
// Page Source Port
//=========================================================================================

#[async_trait]
pub trait PageSource<T>: Send + Sync {
    /// Fetches the given 1-indexed page.
    async fn fetch_page(&self, page: u32) -> ClientResult<Page<T>>;
}

#[async_trait]
impl<T, F, Fut> PageSource<T> for F
where
    T: Send + 'static,
    F: Fn(u32) -> Fut + Send + Sync,
    Fut: Future<Output = ClientResult<Page<T>>> + Send + 'static,
{
    async fn fetch_page(&self, page: u32) -> ClientResult<Page<T>> {
        (self)(page).await
    }
}
