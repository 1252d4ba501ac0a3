//! Unified application error model and mapping helpers.
//! This module provides a common error enum used across the identity core and
//! the school-facing modules, along with a mapper describing how each class of
//! failure is presented to the user.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::identity::ProviderError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Credential rejected or provider unreachable during sign-in/sign-up/sign-out.
    Auth { code: String, message: String },
    /// Profile lookup failed during initialization or an auth event.
    ProfileRead { code: String, message: String },
    /// Profile record could not be created/updated after a credential operation
    /// succeeded. Leaves an orphaned credential the caller must reconcile.
    ProfileWrite { code: String, message: String },
    UserInput { code: String, message: String },
    Internal { code: String, message: String },
}

/// Where a failure is shown, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSurface {
    /// Inline message near the form that triggered the call.
    InlineForm,
    /// Not shown; the app degrades (e.g. user appears logged in with no role).
    Silent,
    /// Prominent banner; the caller is expected to offer a retry.
    Banner,
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Auth { code, .. }
            | AppError::ProfileRead { code, .. }
            | AppError::ProfileWrite { code, .. }
            | AppError::UserInput { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Auth { message, .. }
            | AppError::ProfileRead { message, .. }
            | AppError::ProfileWrite { message, .. }
            | AppError::UserInput { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn auth<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn profile_read<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::ProfileRead { code: code.into(), message: msg.into() } }
    pub fn profile_write<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::ProfileWrite { code: code.into(), message: msg.into() } }
    pub fn user<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to the UI surface that reports this class of failure.
    pub fn surface(&self) -> ErrorSurface {
        match self {
            AppError::Auth { .. } => ErrorSurface::InlineForm,
            AppError::UserInput { .. } => ErrorSurface::InlineForm,
            // Profile lookups degrade to an authenticated-but-roleless session.
            AppError::ProfileRead { .. } => ErrorSurface::Silent,
            AppError::ProfileWrite { .. } => ErrorSurface::Banner,
            AppError::Internal { .. } => ErrorSurface::Banner,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        // Default mapping: treat as an auth-surface failure unless the call
        // site maps it to a more specific variant.
        AppError::Auth { code: "provider_error".into(), message: err.to_string() }
    }
}
