//! OAuth2 refresh-token renewal.
//!
//! Dropbox access tokens are short-lived; the long-lived refresh token in
//! the credential file is exchanged for a new one whenever the API reports
//! an authorization failure. This module performs that single exchange and
//! persists the result. It never retries: a rejected refresh surfaces as
//! [`Error::Auth`] so the caller cannot loop on a dead refresh token.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::credentials::{
    CredentialStore, ACCESS_TOKEN_KEY, APP_KEY_KEY, APP_SECRET_KEY, REFRESH_TOKEN_KEY,
};
use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest, HttpTransport};

/// Dropbox OAuth2 token endpoint.
pub const TOKEN_URL: &str = "https://api.dropboxapi.com/oauth2/token";

/// Token endpoint response. Only `access_token` matters here; Dropbox
/// refresh grants do not rotate the refresh token.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Exchange the stored refresh token for a new access token.
///
/// Reads `DROPBOX_REFRESH_TOKEN`, `DROPBOX_APP_KEY` and
/// `DROPBOX_APP_SECRET` from the store, POSTs a form-encoded
/// `grant_type=refresh_token` request, persists the new
/// `DROPBOX_ACCESS_TOKEN` through the store, and returns it.
///
/// # Errors
///
/// - [`Error::Config`] if any of the three required keys is missing,
///   before any network I/O happens.
/// - [`Error::Auth`] with the provider's status and body if the endpoint
///   rejects the request.
/// - [`Error::Protocol`] if a 2xx response lacks the `access_token` field.
pub async fn refresh_access_token(
    store: &mut CredentialStore,
    transport: &dyn HttpTransport,
) -> Result<String> {
    let mut creds = store.load()?.clone();

    let refresh_token = required(&creds, REFRESH_TOKEN_KEY)?;
    let app_key = required(&creds, APP_KEY_KEY)?;
    let app_secret = required(&creds, APP_SECRET_KEY)?;

    let mut params = HashMap::new();
    params.insert("grant_type", "refresh_token");
    params.insert("refresh_token", &refresh_token);
    params.insert("client_id", &app_key);
    params.insert("client_secret", &app_secret);

    let body = serde_urlencoded::to_string(&params)
        .map_err(|e| Error::Protocol(format!("failed to encode token request: {}", e)))?;

    debug!("Requesting access token refresh");

    let request = HttpRequest::new(HttpMethod::Post, TOKEN_URL)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(body.into());

    let response = transport.execute(request).await?;

    if !response.is_success() {
        let status = response.status;
        let body = response.text();
        warn!(status = status, "Token refresh rejected by provider");
        return Err(Error::Auth { status, body });
    }

    let token_response: TokenResponse = response
        .json()
        .map_err(|_| Error::Protocol("malformed token response".to_string()))?;
    let access_token = token_response
        .access_token
        .ok_or_else(|| Error::Protocol("malformed token response".to_string()))?;

    creds.set(ACCESS_TOKEN_KEY, &access_token);
    store.save(creds)?;

    // Diagnostic side channel only; command output on stdout stays clean.
    info!("Access token refreshed");

    Ok(access_token)
}

fn required(creds: &crate::credentials::Credentials, key: &str) -> Result<String> {
    creds
        .get(key)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::Config(format!("missing {} in credential file", key)))
}
