//! User lookup collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::UserId;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;

/// A customer known to the identity system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
}

/// Looks up users by id.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns the user, or `None` if no such user exists.
    async fn get_by_id(&self, id: UserId) -> Result<Option<User>>;
}

/// In-memory user directory for tests and the standalone server.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<UserId, User>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new user with a fresh id.
    pub async fn register(&self, email: impl Into<String>, name: impl Into<String>) -> User {
        let user = User {
            id: UserId::new(),
            email: email.into(),
            name: name.into(),
        };
        self.insert(user.clone()).await;
        user
    }

    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    /// Removes a user, returning it if it existed.
    pub async fn remove(&self, id: UserId) -> Option<User> {
        self.users.write().await.remove(&id)
    }

    /// All users ordered by email.
    pub async fn list(&self) -> Vec<User> {
        let mut users: Vec<_> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        users
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_by_id(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}
