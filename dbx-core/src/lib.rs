//! # Dropbox client core
//!
//! Authenticated Dropbox API access with transparent OAuth2 refresh-token
//! renewal and credential persistence.
//!
//! ## Overview
//!
//! - [`credentials`] — `KEY=value` credential file with an in-memory cache,
//!   owned by the session and passed explicitly (no global state).
//! - [`auth`] — exchanges the refresh token for a new access token and
//!   persists it.
//! - [`client`] — the request executor: bearer auth on every call, one
//!   refresh-and-retry cycle on the first 401 of a logical call, every
//!   other failure surfaced unchanged.
//! - [`ops`] — the file/folder operations (list, search, download, upload,
//!   create-folder, account) composed on top of the executor.
//!
//! Single logical call in flight at a time; awaits are strictly sequential.

pub mod auth;
pub mod client;
pub mod credentials;
pub mod error;
pub mod http;
pub mod ops;
pub mod types;

pub use client::ApiClient;
pub use credentials::{CredentialStore, Credentials};
pub use error::{Error, Result};
pub use http::{HttpTransport, ReqwestTransport};
