//! REST API client module for the rentline service.
//!
//! This module provides the `ApiClient` request pipeline that every API
//! call goes through. It stamps outbound requests with the live bearer
//! credential and turns inbound 401 responses into a cleared credential
//! plus an "authentication required" broadcast.

pub mod client;
pub mod error;

pub use client::{ApiClient, IDENTITY_PATH, REQUEST_TIMEOUT_SECS};
pub use error::{ApiError, Outcome};
