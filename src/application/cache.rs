//! Change notifications and a read-through cache invalidated by them.
//!
//! Writers publish a [`Change`] on the [`ChangeFeed`] after a successful
//! write. Each [`QueryCache`] holds its own subscription and drops matching
//! entries before serving a read, so a reader in the same process sees its
//! own writes. A cache fed only by [`QueryCache::spawn_invalidator`] may serve
//! a stale entry until the background task catches up.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::OwnerId;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Customers,
    Transactions,
    Inventory,
    Expenses,
    Sales,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityKind::Customers => "customers",
            EntityKind::Transactions => "transactions",
            EntityKind::Inventory => "inventory",
            EntityKind::Expenses => "expenses",
            EntityKind::Sales => "sales",
        };
        write!(f, "{}", s)
    }
}

/// Something changed for an owner. `scope` narrows the change to one
/// record (e.g. the customer whose transactions changed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Change {
    pub entity: EntityKind,
    pub owner: OwnerId,
    pub scope: Option<Uuid>,
}

impl Change {
    pub fn all(entity: EntityKind, owner: OwnerId) -> Self {
        Self {
            entity,
            owner,
            scope: None,
        }
    }

    pub fn scoped(entity: EntityKind, owner: OwnerId, scope: Uuid) -> Self {
        Self {
            entity,
            owner,
            scope: Some(scope),
        }
    }

    /// Whether a cached entry under `key` is affected by this change.
    /// Unscoped changes and unscoped entries match any scope.
    pub fn affects(&self, key: &CacheKey) -> bool {
        self.entity == key.entity
            && self.owner == key.owner
            && match (self.scope, key.scope) {
                (Some(changed), Some(cached)) => changed == cached,
                _ => true,
            }
    }
}

/// Cache key: same shape as a [`Change`].
pub type CacheKey = Change;

/// Broadcast feed of changes. Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<Change>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a change. Returns how many subscribers will see it.
    pub fn publish(&self, change: Change) -> usize {
        tracing::debug!(entity = %change.entity, owner = %change.owner, scope = ?change.scope, "change published");
        // No subscribers is not an error
        self.sender.send(change).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.sender.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Read-through cache of query results keyed by entity, owner and scope.
#[derive(Debug)]
pub struct QueryCache<V> {
    entries: Arc<RwLock<HashMap<CacheKey, V>>>,
    pending: Arc<Mutex<broadcast::Receiver<Change>>>,
}

impl<V> Clone for QueryCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<V: Clone> QueryCache<V> {
    /// Create an empty cache subscribed to `feed`.
    pub fn new(feed: &ChangeFeed) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            pending: Arc::new(Mutex::new(feed.subscribe())),
        }
    }

    /// Return the cached value for `key`, or load, store and return it.
    pub async fn get_or_load<F, Fut, E>(&self, key: CacheKey, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.sync().await;

        if let Some(value) = self.entries.read().await.get(&key) {
            tracing::debug!(entity = %key.entity, scope = ?key.scope, "cache hit");
            return Ok(value.clone());
        }

        let value = load().await?;
        self.entries.write().await.insert(key, value.clone());
        Ok(value)
    }

    /// Apply every change published since the last sync. Returns the number
    /// of changes processed.
    pub async fn sync(&self) -> usize {
        let mut receiver = self.pending.lock().await;
        let mut processed = 0;
        loop {
            match receiver.try_recv() {
                Ok(change) => {
                    self.invalidate(&change).await;
                    processed += 1;
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "change feed lagged, clearing cache");
                    self.clear().await;
                    processed += 1;
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => break,
            }
        }
        processed
    }

    /// Drop every entry affected by `change`. Returns the number dropped.
    pub async fn invalidate(&self, change: &Change) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !change.affects(key));
        before - entries.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<V: Clone + Send + Sync + 'static> QueryCache<V> {
    /// Invalidate entries in the background as changes arrive on `feed`.
    /// The task ends when every sender of the feed is dropped.
    pub fn spawn_invalidator(&self, feed: &ChangeFeed) -> JoinHandle<()> {
        let mut receiver = feed.subscribe();
        let cache = self.clone();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(change) => {
                        cache.invalidate(&change).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "invalidator lagged, clearing cache");
                        cache.clear().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
