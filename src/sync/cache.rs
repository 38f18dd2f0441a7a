use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{StoreError, SyncError};
use crate::models::{Entity, EntityId};
use crate::notify::Subscription;
use crate::store::StoreClient;

/// What views read: the last good snapshot plus the error indicator.
#[derive(Debug, Clone)]
pub struct CacheView<E> {
    pub snapshot: Arc<Vec<E>>,
    pub error: Option<String>,
    /// Set once any refresh has succeeded.
    pub loaded: bool,
    ticket: u64,
}

impl<E> Default for CacheView<E> {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(Vec::new()),
            error: None,
            loaded: false,
            ticket: 0,
        }
    }
}

pub enum Mutation<E: Entity> {
    Insert(E::Draft),
    Update(EntityId, E::Patch),
    Delete(EntityId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum MutationOutcome {
    Applied { id: EntityId },
    /// The target row was already gone.
    Missing,
}

struct Shared<E: Entity> {
    client: StoreClient,
    owner_id: Uuid,
    state: watch::Sender<CacheView<E>>,
    tickets: AtomicU64,
    closed: AtomicBool,
}

impl<E: Entity> Shared<E> {
    fn ensure_open(&self) -> Result<(), SyncError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SyncError::Closed);
        }
        Ok(())
    }

    async fn refresh(&self) -> Result<usize, SyncError> {
        self.ensure_open()?;
        let ticket = self.tickets.fetch_add(1, Ordering::AcqRel) + 1;
        let result = self.client.fetch_all::<E>(self.owner_id).await;

        if self.closed.load(Ordering::Acquire) {
            debug!(table = %E::TABLE, ticket, "discarding refresh for closed cache");
            return Err(SyncError::Closed);
        }

        match result {
            Ok(rows) => {
                let rows = self.owned_rows(rows);
                let count = rows.len();
                let applied = self.state.send_if_modified(|view| {
                    if ticket < view.ticket {
                        return false;
                    }
                    view.snapshot = Arc::new(rows);
                    view.error = None;
                    view.loaded = true;
                    view.ticket = ticket;
                    true
                });
                if applied {
                    debug!(table = %E::TABLE, ticket, count, "snapshot replaced");
                } else {
                    debug!(table = %E::TABLE, ticket, "refresh superseded by a newer one");
                }
                Ok(count)
            }
            Err(err) => {
                let err = SyncError::Store(err);
                let message = err.user_message(E::TABLE.name());
                warn!(table = %E::TABLE, ticket, "refresh failed: {}", err);
                self.state.send_if_modified(|view| {
                    if ticket < view.ticket {
                        return false;
                    }
                    view.error = Some(message);
                    true
                });
                Err(err)
            }
        }
    }

    fn owned_rows(&self, rows: Vec<E>) -> Vec<E> {
        let total = rows.len();
        let rows: Vec<E> = rows
            .into_iter()
            .filter(|row| row.owner_id() == self.owner_id)
            .collect();
        if rows.len() != total {
            warn!(
                table = %E::TABLE,
                dropped = total - rows.len(),
                "store returned rows for another owner"
            );
        }
        rows
    }
}

/// Local copy of one user's rows of one entity type, kept in step with the
/// store by refetching after every local write and every change notification.
pub struct CollectionCache<E: Entity> {
    shared: Arc<Shared<E>>,
    listener: Option<JoinHandle<()>>,
}

impl<E: Entity> CollectionCache<E> {
    /// Subscribes first, then loads, so no change between the two is lost.
    /// A failed first load leaves an empty snapshot with the error set.
    pub async fn open(client: StoreClient, owner_id: Uuid) -> Self {
        let subscription = client.changes().subscribe(E::TABLE, owner_id);
        let (state, _) = watch::channel(CacheView::default());
        let shared = Arc::new(Shared {
            client,
            owner_id,
            state,
            tickets: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });
        let listener = tokio::spawn(listen(shared.clone(), subscription));

        let cache = Self {
            shared,
            listener: Some(listener),
        };
        if let Err(e) = cache.refresh().await {
            debug!(table = %E::TABLE, "initial load failed: {}", e);
        }
        info!(table = %E::TABLE, owner = %owner_id, "collection cache opened");
        cache
    }

    pub fn owner_id(&self) -> Uuid {
        self.shared.owner_id
    }

    /// Point-in-time copy; later refreshes do not change it.
    pub fn snapshot(&self) -> Arc<Vec<E>> {
        self.shared.state.borrow().snapshot.clone()
    }

    pub fn view(&self) -> CacheView<E> {
        self.shared.state.borrow().clone()
    }

    pub fn error(&self) -> Option<String> {
        self.shared.state.borrow().error.clone()
    }

    pub fn find(&self, id: EntityId) -> Option<E> {
        self.snapshot().iter().find(|row| row.id() == id).cloned()
    }

    /// Receiver that wakes whenever the snapshot or error indicator changes.
    pub fn watch(&self) -> watch::Receiver<CacheView<E>> {
        self.shared.state.subscribe()
    }

    /// Full filtered read replacing the snapshot. On failure the snapshot is
    /// kept and the error indicator is set.
    pub async fn refresh(&self) -> Result<usize, SyncError> {
        self.shared.refresh().await
    }

    /// Sends the write, then resynchronizes. Nothing is patched locally.
    pub async fn mutate(&self, mutation: Mutation<E>) -> Result<MutationOutcome, SyncError> {
        self.shared.ensure_open()?;
        let client = &self.shared.client;
        let owner_id = self.shared.owner_id;

        let result = match &mutation {
            Mutation::Insert(draft) => client.insert::<E>(owner_id, draft).await,
            Mutation::Update(id, patch) => client.update::<E>(owner_id, *id, patch).await.map(|_| *id),
            Mutation::Delete(id) => client.delete::<E>(owner_id, *id).await.map(|_| *id),
        };

        let outcome = match result {
            Ok(id) => MutationOutcome::Applied { id },
            Err(StoreError::NotFound) => {
                info!(table = %E::TABLE, "mutation target no longer exists");
                MutationOutcome::Missing
            }
            Err(err) => {
                warn!(table = %E::TABLE, "mutation failed: {}", err);
                return Err(err.into());
            }
        };

        // A failed follow-up refresh only shows up in the error indicator.
        if let Err(e) = self.shared.refresh().await {
            debug!(table = %E::TABLE, "refresh after mutation failed: {}", e);
        }
        Ok(outcome)
    }

    /// Stops change delivery and waits for the listener to finish. A refresh
    /// the listener has in flight is cancelled at its next await and never
    /// applied; one that completes first on another thread finds the cache
    /// closed and is discarded.
    pub async fn close(mut self) {
        self.shared.closed.store(true, Ordering::Release);
        if let Some(listener) = self.listener.take() {
            listener.abort();
            if let Err(e) = listener.await {
                if !e.is_cancelled() {
                    warn!(table = %E::TABLE, "change listener ended abnormally: {}", e);
                }
            }
        }
        info!(table = %E::TABLE, owner = %self.shared.owner_id, "collection cache closed");
    }
}

impl<E: Entity> Drop for CollectionCache<E> {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

async fn listen<E: Entity>(shared: Arc<Shared<E>>, mut subscription: Subscription) {
    while let Some(notification) = subscription.next().await {
        let folded = subscription.drain();
        debug!(table = %subscription.table(), ?notification, folded, "change notification");
        if let Err(SyncError::Closed) = shared.refresh().await {
            break;
        }
    }
    subscription.unsubscribe();
}
