//! Reconciliation driver.
//!
//! A [`Reconciler`] runs the two synchronization passes over the record store:
//!
//! - [`Reconciler::sync_addresses`]: fetch the address feed, and for every line
//!   match the stored sliver tool by fqdn, merge the addresses and persist.
//! - [`Reconciler::sync_statuses`]: for every slice and address family, fetch
//!   the monitoring feed, match the slice's sliver tools by fqdn, merge the
//!   status and persist.
//!
//! Only failures that prevent a pass from starting are returned. Anything that
//! goes wrong with an individual line, record or (slice, family) unit is
//! logged, counted and skipped.
//!
//! Passes of the same kind are serialized. An address pass and a status pass
//! may run at the same time: each merge re-reads the record and writes it back
//! under the store lock through [`SliverStore::update_sliver_tool`], so neither
//! pass can overwrite the other's fields with a stale copy.
//!
//! Store calls are blocking and run on the blocking thread pool.

mod address;
mod status;

use std::sync::Arc;

use chrono::{
    DateTime,
    Utc,
};
use sliver_sync_core::{
    AddressFamily,
    SliverTool,
};
use tokio::sync::{
    Mutex,
    broadcast,
};
use url::Url;

use crate::{
    error::StoreError,
    store::SliverStore,
};

pub use status::monitoring_url;

const UPDATE_CHANNEL_CAPACITY: usize = 64;
const DEFAULT_MONITORING_CONCURRENCY: usize = 4;

/// Source of the current time for status stamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Which feed produced a [`DirectoryUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    Addresses,
    Status(AddressFamily),
}

/// Records persisted by an address pass or a monitoring unit. Consumers such
/// as a location index refresh themselves from it.
#[derive(Debug, Clone)]
pub struct DirectoryUpdate {
    pub source: UpdateSource,
    pub updated: Vec<SliverTool>,
}

pub struct Reconciler<S, F> {
    store: Arc<S>,
    fetcher: F,
    address_feed_url: Url,
    clock: Arc<dyn Clock>,
    monitoring_concurrency: usize,
    updates: broadcast::Sender<DirectoryUpdate>,
    address_pass: Mutex<()>,
    status_pass: Mutex<()>,
}

impl<S, F> Reconciler<S, F> {
    pub fn new(store: Arc<S>, fetcher: F, address_feed_url: Url) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            store,
            fetcher,
            address_feed_url,
            clock: Arc::new(SystemClock),
            monitoring_concurrency: DEFAULT_MONITORING_CONCURRENCY,
            updates,
            address_pass: Mutex::new(()),
            status_pass: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Maximum number of (slice, family) units fetched at once.
    #[must_use]
    pub fn with_monitoring_concurrency(mut self, concurrency: usize) -> Self {
        self.monitoring_concurrency = concurrency.max(1);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Subscribe to records persisted by subsequent passes.
    pub fn subscribe(&self) -> broadcast::Receiver<DirectoryUpdate> {
        self.updates.subscribe()
    }

    /// Run a store operation on the blocking thread pool.
    async fn with_store<T, Op>(&self, op: Op) -> Result<T, StoreError>
    where
        S: SliverStore + 'static,
        T: Send + 'static,
        Op: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || op(&store)).await?
    }

    fn publish(&self, source: UpdateSource, updated: Vec<SliverTool>) {
        if updated.is_empty() {
            return;
        }
        // No subscriber is not an error.
        let _ = self.updates.send(DirectoryUpdate { source, updated });
    }
}
