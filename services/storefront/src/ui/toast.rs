//! services/storefront/src/ui/toast.rs
//!
//! Transient notifications. Every user-visible failure is shown as a toast.

use std::fmt;
use storefront_core::ports::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            message: message.into(),
        }
    }

    /// Maps a client failure to wording a shopper can act on.
    pub fn from_error(error: &ClientError) -> Self {
        let message = match error {
            ClientError::Network { .. } => {
                "Can't reach the store right now. Check your connection and try again.".to_string()
            }
            e if e.is_unauthorized() => "Please log in to continue.".to_string(),
            ClientError::Busy => "Hang on, we're still signing you in.".to_string(),
            e => e.message(),
        };
        Self::error(message)
    }
}

impl fmt::Display for Toast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.level {
            ToastLevel::Success => "✔",
            ToastLevel::Info => "ℹ",
            ToastLevel::Error => "✖",
        };
        write!(f, "{} {}", marker, self.message)
    }
}
