/*
 * Responsibility
 * - Resource (owner + visibility) のレコード定義と保管
 * - ResourceId は検証済み識別子のみ: 生の文字列からは services::validate 経由で作る
 */
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::repos::error::RepoError;

/// A validated resource identifier.
///
/// The only public way to obtain one from untrusted input is
/// [`crate::services::validate::resource_id`], which enforces the
/// allow-list character set. Path traversal and shell metacharacters
/// cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId(String);

impl ResourceId {
    pub(crate) fn new_unchecked(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone)]
pub struct Resource {
    pub id: ResourceId,
    pub owner: Uuid,
    pub visibility: Visibility,
}

#[async_trait]
pub trait ResourceRepo: Send + Sync {
    async fn insert(&self, resource: Resource) -> Result<(), RepoError>;

    async fn find(&self, id: &ResourceId) -> Result<Option<Resource>, RepoError>;
}

#[derive(Default)]
pub struct InMemoryResourceRepo {
    inner: RwLock<HashMap<ResourceId, Resource>>,
}

impl InMemoryResourceRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceRepo for InMemoryResourceRepo {
    async fn insert(&self, resource: Resource) -> Result<(), RepoError> {
        let mut map = self.inner.write().map_err(|_| RepoError::Poisoned)?;
        if map.contains_key(&resource.id) {
            return Err(RepoError::Duplicate("resource"));
        }
        map.insert(resource.id.clone(), resource);
        Ok(())
    }

    async fn find(&self, id: &ResourceId) -> Result<Option<Resource>, RepoError> {
        let map = self.inner.read().map_err(|_| RepoError::Poisoned)?;
        Ok(map.get(id).cloned())
    }
}
