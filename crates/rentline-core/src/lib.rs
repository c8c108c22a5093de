//! Session and authentication core for the rentline client.
//!
//! The pieces, leaves first:
//! - [`storage`]: durable key/value backends
//! - [`auth::CredentialStore`]: the live bearer token
//! - [`api::ApiClient`]: the request pipeline every API call goes through
//! - [`auth::SessionManager`]: the session state machine
//! - [`routes::RouteGuard`] and [`routes::EdgeFilter`]: render and pre-render gates
//!
//! [`AuthContext`] wires them together.

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod models;
pub mod routes;
pub mod storage;

pub use context::AuthContext;
