//! Domain operations: thin compositions of the executor with specific
//! endpoints and payload shapes. All of them inherit the refresh-on-401
//! contract from [`ApiClient`]; none carries its own retry logic.

use std::mem;
use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::{info, instrument};

use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::types::{Account, CreateFolderResult, FileMetadata, ListFolderResult, Metadata, SearchResult};

/// Page size requested per listing call.
const LIST_PAGE_LIMIT: u32 = 100;
/// Bounded result count for search.
const SEARCH_MAX_RESULTS: u32 = 50;

impl ApiClient {
    /// List a folder's contents, following the cursor while the server
    /// reports more pages. Fully materialized, encounter order.
    #[instrument(skip(self))]
    pub async fn list_folder(&mut self, path: &str) -> Result<Vec<Metadata>> {
        let mut page: ListFolderResult = self
            .call(
                "files/list_folder",
                &json!({"path": path, "limit": LIST_PAGE_LIMIT}),
            )
            .await?;

        let mut entries = mem::take(&mut page.entries);
        while page.has_more {
            page = self
                .call("files/list_folder/continue", &json!({"cursor": page.cursor}))
                .await?;
            entries.append(&mut page.entries);
        }

        info!(count = entries.len(), "Listed folder");
        Ok(entries)
    }

    /// Search files and folders. Single call, no pagination.
    #[instrument(skip(self))]
    pub async fn search(&mut self, query: &str, path: &str) -> Result<Vec<Metadata>> {
        let result: SearchResult = self
            .call(
                "files/search_v2",
                &json!({
                    "query": query,
                    "options": {"path": path, "max_results": SEARCH_MAX_RESULTS},
                }),
            )
            .await?;

        Ok(result
            .matches
            .into_iter()
            .map(|m| m.metadata.metadata)
            .collect())
    }

    /// Download a file. The local path defaults to the remote entry's base
    /// name when omitted. Returns the path written.
    #[instrument(skip(self))]
    pub async fn download(&mut self, remote: &str, local: Option<PathBuf>) -> Result<PathBuf> {
        let dest = match local {
            Some(path) => path,
            None => PathBuf::from(base_name(remote)?),
        };

        self.call_download("files/download", &json!({"path": remote}), Some(dest.as_path()))
            .await?;
        Ok(dest)
    }

    /// Upload a file with write mode "add": never overwrites, autorenames
    /// on collision.
    #[instrument(skip(self))]
    pub async fn upload(&mut self, local: &Path, remote: &str) -> Result<FileMetadata> {
        self.call_upload(local, remote, "add").await
    }

    /// Create a folder. Never autorenames: fails if the path exists.
    #[instrument(skip(self))]
    pub async fn create_folder(&mut self, path: &str) -> Result<FileMetadata> {
        let result: CreateFolderResult = self
            .call(
                "files/create_folder_v2",
                &json!({"path": path, "autorename": false}),
            )
            .await?;
        Ok(result.metadata)
    }

    /// Fetch the authenticated account. Same executor, same retry contract;
    /// the endpoint takes a JSON `null` payload.
    #[instrument(skip(self))]
    pub async fn get_account(&mut self) -> Result<Account> {
        self.call("users/get_current_account", &serde_json::Value::Null)
            .await
    }
}

fn base_name(remote: &str) -> Result<&str> {
    remote
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::Config(format!("cannot derive a local file name from '{}'", remote)))
}
