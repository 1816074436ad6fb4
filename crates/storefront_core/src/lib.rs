pub mod api;
pub mod auth;
pub mod domain;
pub mod memory;
pub mod operation;
pub mod ports;
pub mod scroll;
pub mod visibility;

pub use api::ApiClient;
pub use auth::{AuthEvent, AuthSessionStore, AuthState, Session};
pub use domain::{
    AuthPayload, LoginRequest, Page, Product, ProfilePayload, SignupRequest, User, Variation,
    WishlistItem,
};
pub use memory::MemorySessionStore;
pub use operation::{AsyncOperation, OperationState};
pub use ports::{
    ClientError, ClientResult, ElementHandle, HttpMethod, HttpRequest, HttpResponse,
    HttpTransport, PageSource, SessionStore, TransportError, VisibilityObservation,
    VisibilitySignal, VisibleCallback,
};
pub use scroll::{InfiniteScroll, LoadOutcome, ScrollState, SkipReason};
pub use visibility::ManualVisibility;
