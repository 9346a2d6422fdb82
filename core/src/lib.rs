//! Client-side sync core for the pet diary app.
//!
//! # Overview
//! Mirrors the user's remote data (pets and their diary records, todos,
//! calendar events, the community feed) in observable in-memory stores and
//! keeps a persisted credential record in step with them.
//!
//! # Design
//! - `ApiClient` is stateless: `build_*` methods produce `HttpRequest` values
//!   and `parse_*` methods consume `HttpResponse` values.
//! - `HttpAdapter` is the only place requests meet credentials. It re-reads
//!   the token on every call and never attaches it to the login,
//!   registration or email-check routes.
//! - Stores commit only after the server confirmed a change. The pet store
//!   also regenerates the persisted profile's pet list before committing.
//! - `Transport` and `SecureStorage` are traits, so the host picks the
//!   network stack and the on-device storage.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod adapter;
pub mod auth;
pub mod client;
pub mod community;
pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod http;
pub mod records;
pub mod storage;
pub mod stores;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;
pub mod types;

pub use adapter::{HttpAdapter, TokenPolicy};
pub use auth::{AuthState, AuthStore};
pub use client::ApiClient;
pub use community::CommunityService;
pub use config::ClientConfig;
pub use context::{AppContext, Tab, ViewState};
pub use credentials::{CredentialRecord, CredentialStore};
pub use error::ApiError;
pub use http::{HttpBody, HttpMethod, HttpRequest, HttpResponse, Transport};
pub use records::RecordService;
pub use storage::{FileStorage, MemoryStorage, SecureStorage};
pub use stores::{EventStore, PetStore, StoreState, TodoStore};
pub use transport::ReqwestTransport;
