//! Credential store: registration, verification, password changes.
//!
//! Credential records live privately in this module; nothing else in the
//! crate can see a password hash. The raw password exists only as the
//! `&str` argument and is never stored, logged, or echoed back.
//!
//! Hashing is bcrypt with a per-record salt generated by the library; the
//! stored string embeds the algorithm tag, cost and salt. `verify` runs a
//! bcrypt comparison even for unknown usernames (against a dummy record)
//! so response timing does not reveal whether an account exists.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AuthError;
use crate::repos::error::RepoError;
use crate::repos::principal_repo::{Principal, PrincipalRepo, PrincipalStatus, Role};
use crate::services::validate;

const MAX_PASSWORD_BYTES: usize = 72; // bcrypt input limit

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_symbol: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 10,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_symbol: true,
        }
    }
}

impl PasswordPolicy {
    pub fn check(&self, raw: &str, username: &str) -> Result<(), AuthError> {
        if raw.chars().count() < self.min_length {
            return Err(AuthError::WeakPassword {
                reason: "too short",
            });
        }
        if raw.len() > MAX_PASSWORD_BYTES {
            return Err(AuthError::WeakPassword {
                reason: "longer than 72 bytes",
            });
        }
        if self.require_uppercase && !raw.chars().any(|c| c.is_uppercase()) {
            return Err(AuthError::WeakPassword {
                reason: "missing uppercase letter",
            });
        }
        if self.require_lowercase && !raw.chars().any(|c| c.is_lowercase()) {
            return Err(AuthError::WeakPassword {
                reason: "missing lowercase letter",
            });
        }
        if self.require_digit && !raw.chars().any(|c| c.is_ascii_digit()) {
            return Err(AuthError::WeakPassword {
                reason: "missing digit",
            });
        }
        if self.require_symbol && raw.chars().all(|c| c.is_alphanumeric()) {
            return Err(AuthError::WeakPassword {
                reason: "missing symbol",
            });
        }
        if !username.is_empty()
            && raw
                .to_ascii_lowercase()
                .contains(&username.to_ascii_lowercase())
        {
            return Err(AuthError::WeakPassword {
                reason: "contains username",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HashAlgorithm {
    Bcrypt,
}

#[derive(Debug, Clone)]
struct CredentialRecord {
    principal_id: Uuid,
    password_hash: String,
    #[allow(dead_code)]
    algorithm: HashAlgorithm,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

pub struct CredentialService {
    principals: Arc<dyn PrincipalRepo>,
    // Keyed by lowercase username; duplicate check and insert happen under
    // one lock acquisition.
    records: Mutex<HashMap<String, CredentialRecord>>,
    policy: PasswordPolicy,
    cost: u32,
    dummy_hash: String,
}

impl CredentialService {
    pub fn new(
        principals: Arc<dyn PrincipalRepo>,
        policy: PasswordPolicy,
        cost: u32,
    ) -> Result<Self, AuthError> {
        // Burned against unknown usernames so lookups cost the same either
        // way.
        let dummy_hash = bcrypt::hash("authgate.dummy.credential", cost).map_err(|e| {
            error!(error = %e, "failed to prepare dummy credential hash");
            AuthError::Internal
        })?;

        Ok(Self {
            principals,
            records: Mutex::new(HashMap::new()),
            policy,
            cost,
            dummy_hash,
        })
    }

    /// Register a new principal with the `user` role.
    pub async fn register(
        &self,
        username: &str,
        raw_password: &str,
        email: &str,
    ) -> Result<Principal, AuthError> {
        self.register_with_role(username, raw_password, email, Role::User)
            .await
    }

    /// Administrative registration path; callers are expected to have been
    /// admitted for `AdminAction::CreatePrincipal` when `role` is not
    /// `Role::User`.
    pub async fn register_with_role(
        &self,
        username: &str,
        raw_password: &str,
        email: &str,
        role: Role,
    ) -> Result<Principal, AuthError> {
        let username = validate::username(username)?;
        let email = validate::email(email)?;

        if self
            .principals
            .find_by_username(&username)
            .await?
            .is_some()
        {
            return Err(AuthError::DuplicateUsername);
        }

        self.policy.check(raw_password, &username)?;

        let password_hash = bcrypt::hash(raw_password, self.cost).map_err(|e| {
            error!(error = %e, "password hashing failed");
            AuthError::Internal
        })?;

        let now = Utc::now();
        let principal = Principal {
            id: Uuid::new_v4(),
            username: username.clone(),
            email,
            role,
            status: PrincipalStatus::Active,
            created_at: now,
        };

        let key = username.to_ascii_lowercase();
        {
            let mut records = self.records.lock().map_err(|_| AuthError::Internal)?;
            if records.contains_key(&key) {
                return Err(AuthError::DuplicateUsername);
            }
            records.insert(
                key.clone(),
                CredentialRecord {
                    principal_id: principal.id,
                    password_hash,
                    algorithm: HashAlgorithm::Bcrypt,
                    created_at: now,
                    updated_at: now,
                },
            );
        }

        if let Err(e) = self.principals.insert(principal.clone()).await {
            if let Ok(mut records) = self.records.lock() {
                records.remove(&key);
            }
            return Err(match e {
                RepoError::Duplicate(_) => AuthError::DuplicateUsername,
                RepoError::Poisoned => AuthError::Internal,
            });
        }

        info!(principal_id = %principal.id, "principal registered");
        Ok(principal)
    }

    /// Verify a (username, password) pair. Returns the principal only when
    /// the password matches and the principal is active.
    pub async fn verify(&self, username: &str, raw_password: &str) -> Result<Principal, AuthError> {
        let key = username.trim().to_ascii_lowercase();
        let record = {
            let records = self.records.lock().map_err(|_| AuthError::Internal)?;
            records.get(&key).cloned()
        };

        let Some(record) = record else {
            // Equalize timing with the known-username path.
            let _ = bcrypt::verify(raw_password, &self.dummy_hash);
            return Err(AuthError::InvalidCredential);
        };

        let matches = bcrypt::verify(raw_password, &record.password_hash).map_err(|e| {
            warn!(error = %e, "credential verification failed to run");
            AuthError::InvalidCredential
        })?;
        if !matches {
            return Err(AuthError::InvalidCredential);
        }

        let principal = self
            .principals
            .find(record.principal_id)
            .await?
            .ok_or_else(|| {
                error!(principal_id = %record.principal_id, "credential points at a missing principal");
                AuthError::Internal
            })?;

        if !principal.is_active() {
            return Err(AuthError::Locked);
        }

        Ok(principal)
    }

    /// Change a password after re-verifying the current one.
    pub async fn change_password(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let principal = self.verify(username, current_password).await?;
        self.policy.check(new_password, &principal.username)?;

        let password_hash = bcrypt::hash(new_password, self.cost).map_err(|e| {
            error!(error = %e, "password hashing failed");
            AuthError::Internal
        })?;

        let key = principal.username.to_ascii_lowercase();
        let mut records = self.records.lock().map_err(|_| AuthError::Internal)?;
        match records.get_mut(&key) {
            Some(record) => {
                record.password_hash = password_hash;
                record.updated_at = Utc::now();
                info!(principal_id = %principal.id, "password changed");
                Ok(())
            }
            None => Err(AuthError::Internal),
        }
    }
}
