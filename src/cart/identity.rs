use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    models::CartOwner,
    storage::{StorageAdapter, StorageType},
};

pub const SESSION_ID_KEY: &str = "cart_session_id";

/// The signed-in account, as seen by the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i64,
}

/// Anonymous session id, minted once and kept in durable storage.
#[derive(Debug)]
pub struct SessionIdentity {
    storage: Arc<StorageAdapter>,
    cached: Mutex<Option<String>>,
}

impl SessionIdentity {
    pub fn new(storage: Arc<StorageAdapter>) -> Self {
        Self {
            storage,
            cached: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> String {
        let mut cached = self.cached.lock();
        if let Some(id) = cached.as_ref() {
            return id.clone();
        }

        let id = match self
            .storage
            .read(StorageType::Durable, SESSION_ID_KEY)
            .filter(|id| !id.trim().is_empty())
        {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                if !self.storage.write(StorageType::Durable, SESSION_ID_KEY, &id) {
                    tracing::warn!("session id could not be persisted, it will not survive a restart");
                }
                tracing::debug!(session_id = %id, "minted guest session id");
                id
            }
        };
        *cached = Some(id.clone());
        id
    }

    /// Account id when signed in, the guest session otherwise.
    pub fn owner(&self, user: Option<&AuthUser>) -> CartOwner {
        match user {
            Some(user) => CartOwner::User(user.user_id),
            None => CartOwner::Session(self.session_id()),
        }
    }
}
