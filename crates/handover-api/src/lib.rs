// handover-api: Async Rust client for the Handover hosted backend
//
// The backend is a hosted relational store fronted by four services:
// a PostgREST-style table API, object storage, password auth, and a
// Phoenix-protocol realtime channel. Each gets its own client; they share
// one `Credentials` cell so a sign-in upgrades every subsequent request.

pub mod auth;
pub mod error;
pub mod realtime;
pub mod rest;
pub mod storage;
pub mod transport;

pub use auth::{AuthClient, AuthUser, Credentials, Session, SignUp};
pub use error::Error;
pub use realtime::{
    ChangeRecord, ChangeType, RealtimeConfig, RealtimeHandle, RealtimeMessage, ReconnectConfig,
};
pub use rest::{
    Direction, Filter, RestClient, RowRange, Rows, TableQuery, sanitize_search_text,
};
pub use storage::StorageClient;
pub use transport::{TlsMode, TransportConfig};
