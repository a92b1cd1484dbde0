//! Credential persistence.
//!
//! Credentials live in a plain `KEY=value` text file (by default
//! `~/.config/dbx/credentials.env`). [`CredentialStore`] owns the backing
//! path and an in-memory cache; it is held by the session object and passed
//! explicitly to everything that reads or writes tokens, so there is no
//! process-global credential state.
//!
//! Token values are never logged; audit messages carry key names only.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Key holding the long-lived refresh token.
pub const REFRESH_TOKEN_KEY: &str = "DROPBOX_REFRESH_TOKEN";
/// Key holding the OAuth app key (client id).
pub const APP_KEY_KEY: &str = "DROPBOX_APP_KEY";
/// Key holding the OAuth app secret (client secret).
pub const APP_SECRET_KEY: &str = "DROPBOX_APP_SECRET";
/// Key holding the cached short-lived access token.
pub const ACCESS_TOKEN_KEY: &str = "DROPBOX_ACCESS_TOKEN";

/// An ordered set of unique credential key/value pairs.
///
/// Insertion order is preserved across load and save so the backing file
/// stays readable for humans editing it by hand.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pairs: Vec<(String, String)>,
}

impl Credentials {
    /// Parse file contents.
    ///
    /// Blank lines and lines starting with `#` are ignored; so are lines
    /// without an `=` separator. The first `=` splits key from value; both
    /// sides are trimmed. A repeated key overwrites the earlier value.
    pub fn parse(contents: &str) -> Self {
        let mut creds = Credentials::default();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            creds.set(key.trim(), value.trim());
        }
        creds
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a value, replacing in place if the key exists (keeps file order).
    pub fn set(&mut self, key: &str, value: &str) {
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some(pair) => pair.1 = value.to_string(),
            None => self.pairs.push((key.to_string(), value.to_string())),
        }
    }

    /// Render back to `KEY=value` lines with a trailing newline.
    pub fn to_file_contents(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.pairs {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl fmt::Debug for Credentials {
    // Values are secrets; print key names only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.pairs.iter().map(|(k, _)| k))
            .finish()
    }
}

/// Credential store backed by a `KEY=value` file.
///
/// The file is read once and cached; [`CredentialStore::save`] fully
/// rewrites it and updates the cache in the same step, and
/// [`CredentialStore::invalidate`] forces the next load to re-read from
/// disk.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    cache: Option<Credentials>,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load credentials, reading the backing file only on the first call
    /// (or the first call after [`CredentialStore::invalidate`]).
    pub fn load(&mut self) -> Result<&Credentials> {
        if self.cache.is_none() {
            let contents = fs::read_to_string(&self.path).map_err(|e| {
                Error::Config(format!(
                    "cannot read credential file {}: {}",
                    self.path.display(),
                    e
                ))
            })?;
            let creds = Credentials::parse(&contents);
            debug!(path = %self.path.display(), "Loaded credential file");
            self.cache = Some(creds);
        }
        Ok(self.cache.as_ref().expect("cache populated above"))
    }

    /// Persist credentials with a full rewrite of the backing file, then
    /// update the cache to match.
    pub fn save(&mut self, creds: Credentials) -> Result<()> {
        fs::write(&self.path, creds.to_file_contents()).map_err(|e| {
            Error::Config(format!(
                "cannot write credential file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        info!(path = %self.path.display(), "Credential file updated");
        self.cache = Some(creds);
        Ok(())
    }

    /// Drop the in-memory cache so the next load re-reads from storage.
    pub fn invalidate(&mut self) {
        debug!("Credential cache invalidated");
        self.cache = None;
    }
}
