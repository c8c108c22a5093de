//! Data models for the identity API.
//!
//! Only the identity record is modelled here; listings, chats and other
//! business resources belong to their own collaborators.

pub mod user;

pub use user::{IdentityResponse, User};
