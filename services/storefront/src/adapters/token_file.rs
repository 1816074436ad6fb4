//! services/storefront/src/adapters/token_file.rs
//!
//! This module contains the durable token adapter, the concrete implementation
//! of the `SessionStore` port. The bearer token lives in a single file so a
//! session survives across invocations of the client.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use storefront_core::ports::{ClientError, ClientResult, SessionStore};
use tracing::debug;

/// A `SessionStore` backed by one file holding the raw token.
#[derive(Clone, Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn storage_error(action: &str, path: &Path, e: std::io::Error) -> ClientError {
    ClientError::Storage(format!("failed to {} {}: {}", action, path.display(), e))
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> ClientResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error("read", &self.path, e)),
        }
    }

    fn set(&self, token: &str) -> ClientResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| storage_error("create", parent, e))?;
        }
        fs::write(&self.path, token).map_err(|e| storage_error("write", &self.path, e))?;
        debug!(path = %self.path.display(), "Session token persisted");
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Session token removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("remove", &self.path, e)),
        }
    }
}
