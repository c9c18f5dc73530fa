//! List synchronizer: the four list operations over a refetch-on-write cache.
//!
//! The server is the source of truth. The synchronizer keeps one cached
//! snapshot of the list tagged with the cache generation it was fetched at.
//! Every successful mutation bumps the generation, so the next [`list`]
//! refetches. Nothing is ever patched locally.
//!
//! [`list`]: ListSynchronizer::list

use crate::api::{ApiError, NewItem, ShoppingApi, ShoppingListItem};
use crate::auth::{Credential, Session};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Key of the single cache entry.
pub const QUERY_KEY: &str = "shopping-items";

#[derive(Debug, Error)]
pub enum SyncError {
    /// Credential missing, invalid or expired. The session has been
    /// cleared.
    #[error("{0}")]
    Auth(String),

    /// Rejected before reaching the network.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Network(ApiError),
}

impl SyncError {
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

#[derive(Debug)]
struct CacheEntry {
    generation: u64,
    items: Vec<ShoppingListItem>,
}

pub struct ListSynchronizer {
    api: Arc<dyn ShoppingApi>,
    session: Arc<Session>,
    cache: Mutex<Option<CacheEntry>>,
    generation: AtomicU64,
    /// Held for the duration of a mutation; writes never overlap.
    write_gate: tokio::sync::Mutex<()>,
}

impl ListSynchronizer {
    pub fn new(api: Arc<dyn ShoppingApi>, session: Arc<Session>) -> Self {
        Self {
            api,
            session,
            cache: Mutex::new(None),
            generation: AtomicU64::new(0),
            write_gate: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Current cache generation. Increases on every invalidation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// The cached snapshot, if it is still current.
    #[must_use]
    pub fn cached(&self) -> Option<Vec<ShoppingListItem>> {
        let generation = self.generation();
        self.cache_entry()
            .as_ref()
            .filter(|entry| entry.generation == generation)
            .map(|entry| entry.items.clone())
    }

    /// Discard the cached snapshot; the next [`list`](Self::list) refetches.
    pub fn invalidate(&self) {
        let mut cache = self.cache_entry();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        cache.take();
        tracing::debug!(key = QUERY_KEY, generation, "cache invalidated");
    }

    /// True while an add or remove is in flight.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        self.write_gate.try_lock().is_err()
    }

    /// Items in server order. Served from cache when current.
    pub async fn list(&self) -> Result<Vec<ShoppingListItem>, SyncError> {
        let credential = self.credential()?;
        if let Some(items) = self.cached() {
            tracing::debug!(key = QUERY_KEY, "cache hit");
            return Ok(items);
        }

        let generation = self.generation();
        let items = self
            .api
            .list_items(&credential)
            .await
            .map_err(|e| self.fail(e))?;

        // A mutation that landed while we were fetching makes this snapshot
        // stale; hand it back but don't cache it.
        let mut cache = self.cache_entry();
        if self.generation() == generation {
            *cache = Some(CacheEntry {
                generation,
                items: items.clone(),
            });
        }
        tracing::debug!(key = QUERY_KEY, count = items.len(), generation, "list fetched");
        Ok(items)
    }

    /// Add an item. The name is trimmed; an empty name never reaches the
    /// server.
    pub async fn add(&self, name: &str) -> Result<ShoppingListItem, SyncError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SyncError::Validation("Item name cannot be empty".into()));
        }
        let credential = self.credential()?;

        let _gate = self.write_gate.lock().await;
        let item = self
            .api
            .create_item(
                &credential,
                &NewItem {
                    name: name.to_string(),
                },
            )
            .await
            .map_err(|e| self.fail(e))?;
        self.invalidate();
        Ok(item)
    }

    /// Remove one item. Removing an id the server no longer has is whatever
    /// the server says it is; usually success.
    pub async fn remove_one(&self, id: &str) -> Result<(), SyncError> {
        let credential = self.credential()?;

        let _gate = self.write_gate.lock().await;
        self.api
            .delete_item(&credential, id)
            .await
            .map_err(|e| self.fail(e))?;
        self.invalidate();
        Ok(())
    }

    pub async fn remove_all(&self) -> Result<(), SyncError> {
        let credential = self.credential()?;

        let _gate = self.write_gate.lock().await;
        self.api
            .delete_all_items(&credential)
            .await
            .map_err(|e| self.fail(e))?;
        self.invalidate();
        Ok(())
    }

    fn credential(&self) -> Result<Credential, SyncError> {
        self.session
            .credential()
            .ok_or_else(|| SyncError::Auth("Not signed in".into()))
    }

    fn fail(&self, error: ApiError) -> SyncError {
        if error.is_unauthorized() {
            self.session.handle_unauthorized();
            self.invalidate();
            return SyncError::Auth(error.to_string());
        }
        tracing::warn!("shopping api call failed: {error}");
        SyncError::Network(error)
    }

    fn cache_entry(&self) -> MutexGuard<'_, Option<CacheEntry>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
