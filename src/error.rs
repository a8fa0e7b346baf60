/*
 * Responsibility
 * - アプリ共通の AuthError 定義
 * - 認証・認可・入力検証の失敗理由を明示的な variant で表す
 * - RepoError など内部エラーの変換 (fail closed: 内部エラーは絶対に許可側へ倒さない)
 */
use thiserror::Error;

use crate::repos::error::RepoError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credential")]
    InvalidCredential,

    #[error("username already exists")]
    DuplicateUsername,

    #[error("password rejected: {reason}")]
    WeakPassword { reason: &'static str },

    #[error("token expired")]
    TokenExpired,

    #[error("token malformed")]
    TokenMalformed,

    #[error("token signature mismatch")]
    SignatureMismatch,

    #[error("too many attempts, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    // `field` is the name of the rejected field, never its value.
    #[error("invalid input: {field}")]
    InvalidInput { field: &'static str },

    #[error("denied: {reason}")]
    Denied { reason: &'static str },

    #[error("principal is locked")]
    Locked,

    #[error("internal error")]
    Internal,
}

impl AuthError {
    /// Stable reason code for audit entries and transport layers.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredential => "invalid_credential",
            AuthError::DuplicateUsername => "duplicate_username",
            AuthError::WeakPassword { .. } => "weak_password",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenMalformed => "token_malformed",
            AuthError::SignatureMismatch => "signature_mismatch",
            AuthError::RateLimited { .. } => "rate_limited",
            AuthError::InvalidInput { .. } => "invalid_input",
            AuthError::Denied { reason } => reason,
            AuthError::Locked => "principal_locked",
            AuthError::Internal => "internal_error",
        }
    }

    pub fn invalid_input(field: &'static str) -> Self {
        AuthError::InvalidInput { field }
    }

    pub fn denied(reason: &'static str) -> Self {
        AuthError::Denied { reason }
    }
}

impl From<RepoError> for AuthError {
    fn from(e: RepoError) -> Self {
        match e {
            // Store-level failures never become an allow.
            RepoError::Poisoned => AuthError::Internal,
            RepoError::Duplicate(_) => AuthError::DuplicateUsername,
        }
    }
}
