//! Credential store — user records keyed by id and normalized username.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::UserRecord;
use crate::uuid::{new_security_stamp, uuidv7};

/// Credential store errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("username already taken")]
    DuplicateUsername,

    #[error("user not found")]
    NotFound,

    #[error("store error: {0}")]
    Internal(String),
}

/// Persistence for user records.
///
/// Username lookups are case-insensitive. `create` must check uniqueness and
/// insert as one atomic step.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Create a user with a fresh id and security stamp.
    async fn create(&self, username: &str, password_hash: &str) -> Result<UserRecord, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<UserRecord, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<UserRecord, StoreError>;

    /// Replace the password hash and rotate the security stamp.
    async fn update_password(&self, id: Uuid, password_hash: &str)
    -> Result<UserRecord, StoreError>;
}

/// Canonical form used for username comparison.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_uppercase()
}

/// In-memory credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: DashMap<Uuid, UserRecord>,
    /// normalized username → user id
    by_name: DashMap<String, Uuid>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create(&self, username: &str, password_hash: &str) -> Result<UserRecord, StoreError> {
        let normalized = normalize_username(username);
        // The entry guard holds the shard lock until the name is claimed.
        match self.by_name.entry(normalized.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateUsername),
            Entry::Vacant(slot) => {
                let record = UserRecord {
                    id: uuidv7(),
                    username: username.trim().to_string(),
                    normalized_username: normalized,
                    password_hash: password_hash.to_string(),
                    security_stamp: new_security_stamp(),
                    created_at: Utc::now(),
                };
                // Insert the record before publishing the name so a lookup
                // never resolves to a missing id.
                self.users.insert(record.id, record.clone());
                slot.insert(record.id);
                Ok(record)
            }
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<UserRecord, StoreError> {
        let id = self
            .by_name
            .get(&normalize_username(username))
            .map(|r| *r.value())
            .ok_or(StoreError::NotFound)?;
        self.find_by_id(id).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<UserRecord, StoreError> {
        self.users
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<UserRecord, StoreError> {
        let mut user = self.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.security_stamp = new_security_stamp();
        Ok(user.clone())
    }
}
