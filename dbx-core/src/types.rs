//! Serde types for the Dropbox API wire format.

use serde::Deserialize;

/// A file or folder entry as returned by listing and search calls.
///
/// Dropbox tags entries with a `.tag` discriminator of `"file"` or
/// `"folder"`; file-only fields like `size` are absent on folders.
#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    #[serde(rename = ".tag")]
    pub tag: String,
    pub name: String,
    #[serde(default)]
    pub path_display: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub id: Option<String>,
}

impl Metadata {
    pub fn is_folder(&self) -> bool {
        self.tag == "folder"
    }
}

/// One page of a `files/list_folder` result.
#[derive(Debug, Deserialize)]
pub struct ListFolderResult {
    pub entries: Vec<Metadata>,
    pub cursor: String,
    pub has_more: bool,
}

/// `files/search_v2` result. Dropbox nests the entry metadata two levels
/// deep (`matches[].metadata.metadata`).
#[derive(Debug, Deserialize)]
pub struct SearchResult {
    pub matches: Vec<SearchMatch>,
}

#[derive(Debug, Deserialize)]
pub struct SearchMatch {
    pub metadata: SearchMatchMetadata,
}

#[derive(Debug, Deserialize)]
pub struct SearchMatchMetadata {
    pub metadata: Metadata,
}

/// Untagged file metadata, as returned by `files/upload` and inside the
/// `files/create_folder_v2` confirmation.
#[derive(Debug, Clone, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    #[serde(default)]
    pub path_display: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub id: Option<String>,
}

/// `files/create_folder_v2` confirmation record.
#[derive(Debug, Deserialize)]
pub struct CreateFolderResult {
    pub metadata: FileMetadata,
}

/// `users/get_current_account` record.
#[derive(Debug, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub name: AccountName,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct AccountName {
    pub display_name: String,
}
