use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::notify::ChangeHub;
use crate::store::{Backend, StoreClient};
use crate::sync::Workspace;

/// The authenticated user. How the token was obtained is not our concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
}

impl Session {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            access_token: None,
        }
    }
}

/// Holds at most one signed-in workspace for the process.
pub struct SessionContext {
    backend: Backend,
    changes: ChangeHub,
    current: RwLock<Option<Workspace>>,
}

impl SessionContext {
    pub fn new(backend: Backend, changes: ChangeHub) -> Self {
        Self {
            backend,
            changes,
            current: RwLock::new(None),
        }
    }

    pub fn changes(&self) -> &ChangeHub {
        &self.changes
    }

    /// Replaces any existing workspace; the old one is closed first.
    pub async fn sign_in(&self, session: Session) {
        let mut current = self.current.write().await;
        if let Some(previous) = current.take() {
            previous.close().await;
        }
        let store = self.backend.store_for(session.access_token.as_deref());
        let client = StoreClient::new(store, self.changes.clone());
        info!(user = %session.user_id, "signing in");
        *current = Some(Workspace::open(client, session).await);
    }

    /// Returns whether anyone was signed in.
    pub async fn sign_out(&self) -> bool {
        let previous = self.current.write().await.take();
        match previous {
            Some(workspace) => {
                info!(user = %workspace.session().user_id, "signing out");
                workspace.close().await;
                true
            }
            None => false,
        }
    }

    pub async fn is_signed_in(&self) -> bool {
        self.current.read().await.is_some()
    }

    pub async fn workspace(&self) -> Result<RwLockReadGuard<'_, Workspace>, AppError> {
        let guard = self.current.read().await;
        RwLockReadGuard::try_map(guard, |current| current.as_ref())
            .map_err(|_| AppError::Unauthorized)
    }
}
