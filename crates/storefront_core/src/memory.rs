//! crates/storefront_core/src/memory.rs
//!
//! An in-process implementation of the `SessionStore` port. Used by tests and
//! by embedders that do not need the token to survive a restart.

use std::sync::RwLock;

use crate::ports::{ClientError, ClientResult, SessionStore};

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    token: RwLock<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

fn poisoned<E>(_: E) -> ClientError {
    ClientError::Storage("token slot lock poisoned".to_string())
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> ClientResult<Option<String>> {
        Ok(self.token.read().map_err(poisoned)?.clone())
    }

    fn set(&self, token: &str) -> ClientResult<()> {
        *self.token.write().map_err(poisoned)? = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        *self.token.write().map_err(poisoned)? = None;
        Ok(())
    }
}
