//! Authenticated request executor.
//!
//! Every Dropbox call goes through [`ApiClient`], which attaches the bearer
//! token from the credential store and applies one uniform retry rule: on
//! the first 401 of a logical call it invalidates the cached credentials,
//! refreshes the access token once, and retries once. Any other failure,
//! and any failure of the retried attempt, surfaces unchanged. Worst case
//! is two underlying API round trips plus one token round trip.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, instrument, warn};

use crate::auth::refresh_access_token;
use crate::credentials::{CredentialStore, ACCESS_TOKEN_KEY};
use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};

/// RPC endpoint family root.
pub const API_BASE: &str = "https://api.dropboxapi.com/2";
/// Content (download/upload) endpoint family root.
pub const CONTENT_BASE: &str = "https://content.dropboxapi.com/2";

/// `Dropbox-API-Arg` payload for `files/upload`.
#[derive(Debug, Serialize)]
struct UploadArg<'a> {
    path: &'a str,
    mode: &'a str,
    autorename: bool,
    mute: bool,
}

/// Authenticated Dropbox API client.
///
/// Owns the credential store (the session is explicit, not process-global)
/// and a shared transport. All operations take `&mut self` because a
/// refresh rewrites the stored credentials.
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    store: CredentialStore,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>, store: CredentialStore) -> Self {
        Self { transport, store }
    }

    /// Current access token from the store. Absent means the first attempt
    /// will 401 and trigger a refresh, exactly like an expired token.
    fn access_token(&mut self) -> Result<String> {
        Ok(self
            .store
            .load()?
            .get(ACCESS_TOKEN_KEY)
            .unwrap_or_default()
            .to_string())
    }

    /// Run a request with the refresh-once-on-401 rule.
    ///
    /// Bounded loop, maximum two attempts: the `refreshed` flag guarantees
    /// termination even when the refresh token itself is invalid (a failed
    /// refresh propagates as [`Error::Auth`] instead of recursing).
    async fn execute_authorized<F>(&mut self, build: F) -> Result<HttpResponse>
    where
        F: Fn(&str) -> Result<HttpRequest>,
    {
        let mut refreshed = false;
        loop {
            let token = self.access_token()?;
            let request = build(&token)?;
            let response = self.transport.execute(request).await?;

            if response.status == 401 && !refreshed {
                refreshed = true;
                warn!("Authorization failed (401), refreshing access token and retrying once");
                self.store.invalidate();
                let transport = Arc::clone(&self.transport);
                refresh_access_token(&mut self.store, transport.as_ref()).await?;
                continue;
            }

            return Ok(response);
        }
    }

    fn ensure_success(response: HttpResponse) -> Result<HttpResponse> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(Error::Api {
                status: response.status,
                body: response.text(),
            })
        }
    }

    /// RPC-style call: JSON payload in, parsed JSON out.
    #[instrument(skip(self, payload))]
    pub async fn call<T, P>(&mut self, endpoint: &str, payload: &P) -> Result<T>
    where
        T: DeserializeOwned,
        P: Serialize,
    {
        let url = format!("{}/{}", API_BASE, endpoint);
        let response = self
            .execute_authorized(|token| {
                HttpRequest::new(HttpMethod::Post, &url)
                    .bearer_token(token)
                    .json(payload)
            })
            .await?;
        Self::ensure_success(response)?.json()
    }

    /// Content download: the operation argument rides in the
    /// `Dropbox-API-Arg` header, the body is empty. Bytes are written to
    /// `dest` when given, and returned either way.
    #[instrument(skip(self, api_arg))]
    pub async fn call_download<P: Serialize>(
        &mut self,
        endpoint: &str,
        api_arg: &P,
        dest: Option<&Path>,
    ) -> Result<Bytes> {
        let url = format!("{}/{}", CONTENT_BASE, endpoint);
        let arg = serde_json::to_string(api_arg)
            .map_err(|e| Error::Protocol(format!("failed to encode API argument: {}", e)))?;

        let response = self
            .execute_authorized(|token| {
                Ok(HttpRequest::new(HttpMethod::Post, &url)
                    .bearer_token(token)
                    .header("Dropbox-API-Arg", arg.as_str())
                    .body(Bytes::new()))
            })
            .await?;
        let response = Self::ensure_success(response)?;

        if let Some(dest) = dest {
            tokio::fs::write(dest, &response.body).await?;
            debug!(dest = %dest.display(), bytes = response.body.len(), "Saved download");
        }

        Ok(response.body)
    }

    /// Content upload: local bytes are read fully into memory and sent as
    /// the body; destination path and write mode ride in `Dropbox-API-Arg`.
    /// Always autorenames on collision, never mutes notifications.
    #[instrument(skip(self))]
    pub async fn call_upload<T: DeserializeOwned>(
        &mut self,
        local: &Path,
        remote: &str,
        mode: &str,
    ) -> Result<T> {
        let data = Bytes::from(tokio::fs::read(local).await?);
        let arg = serde_json::to_string(&UploadArg {
            path: remote,
            mode,
            autorename: true,
            mute: false,
        })
        .map_err(|e| Error::Protocol(format!("failed to encode API argument: {}", e)))?;

        let url = format!("{}/files/upload", CONTENT_BASE);
        let response = self
            .execute_authorized(|token| {
                Ok(HttpRequest::new(HttpMethod::Post, &url)
                    .bearer_token(token)
                    .header("Dropbox-API-Arg", arg.as_str())
                    .header("Content-Type", "application/octet-stream")
                    .body(data.clone()))
            })
            .await?;
        Self::ensure_success(response)?.json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TOKEN_URL;
    use async_trait::async_trait;
    use mockall::mock;
    use std::fs;
    use tempfile::TempDir;

    mock! {
        Transport {}

        #[async_trait]
        impl HttpTransport for Transport {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    const FULL_CONFIG: &str = "DROPBOX_REFRESH_TOKEN=R1\n\
                               DROPBOX_APP_KEY=K\n\
                               DROPBOX_APP_SECRET=S\n\
                               DROPBOX_ACCESS_TOKEN=OLD\n";

    fn store_with(contents: &str) -> (TempDir, CredentialStore) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.env");
        fs::write(&path, contents).unwrap();
        (dir, CredentialStore::new(path))
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            body: Bytes::from(body.to_string()),
        }
    }

    fn is_token_request(req: &HttpRequest) -> bool {
        req.url == TOKEN_URL
    }

    fn bearer(req: &HttpRequest) -> &str {
        req.headers
            .get("Authorization")
            .map(String::as_str)
            .unwrap_or("")
    }

    const ONE_ENTRY_PAGE: &str = r#"{
        "entries": [{".tag": "file", "name": "a.txt", "size": 1}],
        "cursor": "c1",
        "has_more": false
    }"#;

    #[tokio::test]
    async fn test_401_triggers_one_refresh_then_retry_succeeds() {
        let (_dir, store) = store_with(FULL_CONFIG);

        let mut transport = MockTransport::new();
        // First attempt with the stale token is rejected.
        transport
            .expect_execute()
            .times(1)
            .withf(|req| !is_token_request(req) && bearer(req) == "Bearer OLD")
            .returning(|_| Ok(response(401, "expired_access_token")));
        // Exactly one refresh.
        transport
            .expect_execute()
            .times(1)
            .withf(is_token_request)
            .returning(|_| Ok(response(200, r#"{"access_token": "NEW"}"#)));
        // Retried attempt carries the fresh token.
        transport
            .expect_execute()
            .times(1)
            .withf(|req| !is_token_request(req) && bearer(req) == "Bearer NEW")
            .returning(|_| Ok(response(200, ONE_ENTRY_PAGE)));

        let mut client = ApiClient::new(Arc::new(transport), store);
        let result: crate::types::ListFolderResult = client
            .call("files/list_folder", &serde_json::json!({"path": ""}))
            .await
            .unwrap();

        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].name, "a.txt");

        // The new token is durably persisted.
        let mut store = client.store;
        store.invalidate();
        assert_eq!(store.load().unwrap().get(ACCESS_TOKEN_KEY), Some("NEW"));
    }

    #[tokio::test]
    async fn test_second_401_surfaces_without_further_refresh() {
        let (_dir, store) = store_with(FULL_CONFIG);

        let mut transport = MockTransport::new();
        // Both the first and the retried attempt are rejected.
        transport
            .expect_execute()
            .times(2)
            .withf(|req| !is_token_request(req))
            .returning(|_| Ok(response(401, "expired_access_token")));
        // The refresh in between happens exactly once.
        transport
            .expect_execute()
            .times(1)
            .withf(is_token_request)
            .returning(|_| Ok(response(200, r#"{"access_token": "NEW"}"#)));

        let mut client = ApiClient::new(Arc::new(transport), store);
        let err = client
            .call::<serde_json::Value, _>("files/list_folder", &serde_json::json!({"path": ""}))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_non_401_error_surfaces_immediately_without_refresh() {
        let (_dir, store) = store_with(FULL_CONFIG);

        let mut transport = MockTransport::new();
        // A single attempt; any token-endpoint call would be unexpected
        // and panic the test.
        transport
            .expect_execute()
            .times(1)
            .withf(|req| !is_token_request(req))
            .returning(|_| Ok(response(409, r#"{"error_summary": "path/not_found/"}"#)));

        let mut client = ApiClient::new(Arc::new(transport), store);
        let err = client
            .call::<serde_json::Value, _>("files/list_folder", &serde_json::json!({"path": "/x"}))
            .await
            .unwrap_err();

        match err {
            Error::Api { status, body } => {
                assert_eq!(status, 409);
                assert!(body.contains("not_found"));
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_refresh_propagates_instead_of_looping() {
        let (_dir, store) = store_with(FULL_CONFIG);

        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .withf(|req| !is_token_request(req))
            .returning(|_| Ok(response(401, "expired_access_token")));
        transport
            .expect_execute()
            .times(1)
            .withf(is_token_request)
            .returning(|_| Ok(response(400, r#"{"error": "invalid_grant"}"#)));

        let mut client = ApiClient::new(Arc::new(transport), store);
        let err = client
            .call::<serde_json::Value, _>("files/list_folder", &serde_json::json!({"path": ""}))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_transport_error_passes_through() {
        let (_dir, store) = store_with(FULL_CONFIG);

        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Err(Error::Transport("connection refused".to_string())));

        let mut client = ApiClient::new(Arc::new(transport), store);
        let err = client
            .call::<serde_json::Value, _>("users/get_current_account", &serde_json::Value::Null)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_download_writes_destination_and_returns_bytes() {
        let (dir, store) = store_with(FULL_CONFIG);

        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .withf(|req| {
                req.url == format!("{}/files/download", CONTENT_BASE)
                    && req.headers.get("Dropbox-API-Arg")
                        == Some(&r#"{"path":"/a.txt"}"#.to_string())
                    && req.body.as_ref().is_some_and(|b| b.is_empty())
            })
            .returning(|_| Ok(response(200, "file contents")));

        let dest = dir.path().join("a.txt");
        let mut client = ApiClient::new(Arc::new(transport), store);
        let bytes = client
            .call_download(
                "files/download",
                &serde_json::json!({"path": "/a.txt"}),
                Some(&dest),
            )
            .await
            .unwrap();

        assert_eq!(&bytes[..], b"file contents");
        assert_eq!(fs::read_to_string(&dest).unwrap(), "file contents");
    }

    #[tokio::test]
    async fn test_upload_arg_header_carries_mode_autorename_mute() {
        let (dir, store) = store_with(FULL_CONFIG);
        let local = dir.path().join("local.txt");
        fs::write(&local, "payload").unwrap();

        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .withf(|req| {
                let arg: serde_json::Value =
                    serde_json::from_str(req.headers.get("Dropbox-API-Arg").unwrap()).unwrap();
                arg["path"] == "/dest.txt"
                    && arg["mode"] == "add"
                    && arg["autorename"] == true
                    && arg["mute"] == false
                    && req.headers.get("Content-Type")
                        == Some(&"application/octet-stream".to_string())
                    && req.body.as_deref() == Some(b"payload".as_ref())
            })
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"name": "dest.txt", "path_display": "/dest.txt", "size": 7}"#,
                ))
            });

        let mut client = ApiClient::new(Arc::new(transport), store);
        let meta: crate::types::FileMetadata = client
            .call_upload(&local, "/dest.txt", "add")
            .await
            .unwrap();

        assert_eq!(meta.name, "dest.txt");
        assert_eq!(meta.size, Some(7));
    }

    #[tokio::test]
    async fn test_upload_retry_resends_same_bytes_after_refresh() {
        let (dir, store) = store_with(FULL_CONFIG);
        let local = dir.path().join("local.txt");
        fs::write(&local, "payload").unwrap();

        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .withf(|req| !is_token_request(req) && bearer(req) == "Bearer OLD")
            .returning(|_| Ok(response(401, "expired_access_token")));
        transport
            .expect_execute()
            .times(1)
            .withf(is_token_request)
            .returning(|_| Ok(response(200, r#"{"access_token": "NEW"}"#)));
        transport
            .expect_execute()
            .times(1)
            .withf(|req| {
                bearer(req) == "Bearer NEW" && req.body.as_deref() == Some(b"payload".as_ref())
            })
            .returning(|_| Ok(response(200, r#"{"name": "local.txt"}"#)));

        let mut client = ApiClient::new(Arc::new(transport), store);
        let meta: crate::types::FileMetadata =
            client.call_upload(&local, "/local.txt", "add").await.unwrap();

        assert_eq!(meta.name, "local.txt");
    }

    #[tokio::test]
    async fn test_missing_access_token_sends_empty_bearer_then_refreshes() {
        // No DROPBOX_ACCESS_TOKEN stored at all: the first attempt goes out
        // with an empty token, 401s, and the refresh path fills it in.
        let (_dir, store) = store_with(
            "DROPBOX_REFRESH_TOKEN=R1\nDROPBOX_APP_KEY=K\nDROPBOX_APP_SECRET=S\n",
        );

        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .withf(|req| !is_token_request(req) && bearer(req) == "Bearer ")
            .returning(|_| Ok(response(401, "invalid_access_token")));
        transport
            .expect_execute()
            .times(1)
            .withf(is_token_request)
            .returning(|_| Ok(response(200, r#"{"access_token": "NEW"}"#)));
        transport
            .expect_execute()
            .times(1)
            .withf(|req| !is_token_request(req) && bearer(req) == "Bearer NEW")
            .returning(|_| Ok(response(200, ONE_ENTRY_PAGE)));

        let mut client = ApiClient::new(Arc::new(transport), store);
        let result: crate::types::ListFolderResult = client
            .call("files/list_folder", &serde_json::json!({"path": ""}))
            .await
            .unwrap();

        assert_eq!(result.entries.len(), 1);
    }
}
