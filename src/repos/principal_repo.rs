/*
 * Responsibility
 * - Principal (認証済み主体) のレコード定義と保管
 * - username は大文字小文字を区別せずに一意
 * - 削除 API は置かない: 無効化は set_status(Locked) のみ (管理操作専用)
 */
use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::repos::error::RepoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalStatus {
    Active,
    Locked,
}

/// An authenticated identity. Identity only; what the principal may do is
/// decided per request by the policy engine.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub status: PrincipalStatus,
    pub created_at: DateTime<Utc>,
}

impl Principal {
    pub fn is_active(&self) -> bool {
        self.status == PrincipalStatus::Active
    }
}

#[async_trait]
pub trait PrincipalRepo: Send + Sync {
    /// Insert a new principal. Fails on a username collision
    /// (case-insensitive).
    async fn insert(&self, principal: Principal) -> Result<(), RepoError>;

    async fn find(&self, id: Uuid) -> Result<Option<Principal>, RepoError>;

    /// Case-insensitive username lookup.
    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, RepoError>;

    /// Returns false when no such principal exists.
    async fn set_role(&self, id: Uuid, role: Role) -> Result<bool, RepoError>;

    /// Returns false when no such principal exists.
    async fn set_status(&self, id: Uuid, status: PrincipalStatus) -> Result<bool, RepoError>;
}

#[derive(Default)]
pub struct InMemoryPrincipalRepo {
    inner: RwLock<HashMap<Uuid, Principal>>,
}

impl InMemoryPrincipalRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrincipalRepo for InMemoryPrincipalRepo {
    async fn insert(&self, principal: Principal) -> Result<(), RepoError> {
        let mut map = self.inner.write().map_err(|_| RepoError::Poisoned)?;
        let collision = map
            .values()
            .any(|p| p.username.eq_ignore_ascii_case(&principal.username));
        if collision || map.contains_key(&principal.id) {
            return Err(RepoError::Duplicate("principal"));
        }
        map.insert(principal.id, principal);
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Principal>, RepoError> {
        let map = self.inner.read().map_err(|_| RepoError::Poisoned)?;
        Ok(map.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, RepoError> {
        let map = self.inner.read().map_err(|_| RepoError::Poisoned)?;
        Ok(map
            .values()
            .find(|p| p.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<bool, RepoError> {
        let mut map = self.inner.write().map_err(|_| RepoError::Poisoned)?;
        match map.get_mut(&id) {
            Some(p) => {
                p.role = role;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_status(&self, id: Uuid, status: PrincipalStatus) -> Result<bool, RepoError> {
        let mut map = self.inner.write().map_err(|_| RepoError::Poisoned)?;
        match map.get_mut(&id) {
            Some(p) => {
                p.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
