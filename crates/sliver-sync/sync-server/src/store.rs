//! Persistent directory of sliver tools, slices and the monitoring entry.
//!
//! The reconciliation driver only needs upserts, field-scoped updates and
//! field-filtered queries, expressed by [`SliverStore`]. [`SledStore`] keeps
//! every record kind in its own sled tree with bincode encoded values, plus
//! `fqdn` and `tool_id` index trees so a query is a prefix range instead of a
//! full scan.

use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
};

use bincode::{
    deserialize as de,
    serialize as ser,
};
use serde::de::DeserializeOwned;
use sliver_sync_core::{
    MonitoringConfig,
    Slice,
    SliverTool,
    SliverToolId,
};

use crate::error::StoreError;

const SLIVER_TOOLS_TREE: &str = "sliver_tools";
const BY_FQDN_TREE: &str = "sliver_tools_by_fqdn";
const BY_TOOL_ID_TREE: &str = "sliver_tools_by_tool_id";
const SLICES_TREE: &str = "slices";
const MONITORING_TREE: &str = "monitoring";

/// Record store used by a reconciliation pass.
///
/// Every `put_*` call is a single-record upsert. [`SliverStore::update_sliver_tool`]
/// runs its read, merge and write without any other write to the store in
/// between, so passes touching disjoint fields of the same record never undo
/// each other.
pub trait SliverStore: Send + Sync {
    fn sliver_tool(&self, id: &SliverToolId) -> Result<Option<SliverTool>, StoreError>;
    fn sliver_tools_by_fqdn(&self, fqdn: &str) -> Result<Vec<SliverTool>, StoreError>;
    fn sliver_tools_by_tool_id(&self, tool_id: &str) -> Result<Vec<SliverTool>, StoreError>;
    fn put_sliver_tool(&self, tool: &SliverTool) -> Result<SliverToolId, StoreError>;

    /// Apply `update` to the current version of a stored record. The record is
    /// written back only if `update` returns `true`.
    ///
    /// Returns the written record, or `None` if the record does not exist or
    /// was left unchanged.
    fn update_sliver_tool<U>(
        &self,
        id: &SliverToolId,
        update: U,
    ) -> Result<Option<SliverTool>, StoreError>
    where
        U: FnOnce(&mut SliverTool) -> bool;

    fn slices(&self) -> Result<Vec<Slice>, StoreError>;
    fn put_slice(&self, slice: &Slice) -> Result<(), StoreError>;

    fn monitoring_config(&self) -> Result<Option<MonitoringConfig>, StoreError>;
    fn put_monitoring_config(&self, config: &MonitoringConfig) -> Result<(), StoreError>;
}

/// sled handles are not `Sync`; every access goes through the mutex.
struct StoreInner {
    db: sled::Db,
    sliver_tools: sled::Tree,
    by_fqdn: sled::Tree,
    by_tool_id: sled::Tree,
    slices: sled::Tree,
    monitoring: sled::Tree,
}

#[derive(Clone)]
pub struct SledStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl SledStore {
    pub fn new(db: sled::Db) -> Result<Self, StoreError> {
        let inner = StoreInner {
            sliver_tools: db.open_tree(SLIVER_TOOLS_TREE)?,
            by_fqdn: db.open_tree(BY_FQDN_TREE)?,
            by_tool_id: db.open_tree(BY_TOOL_ID_TREE)?,
            slices: db.open_tree(SLICES_TREE)?,
            monitoring: db.open_tree(MONITORING_TREE)?,
            db,
        };

        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    /// Bytes used by the database on disk.
    pub fn size_on_disk(&self) -> Result<u64, StoreError> {
        Ok(self.lock().db.size_on_disk()?)
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `<value> 0x00 <id>`: all ids indexed under one value share a prefix.
fn index_key(value: &str, id: &SliverToolId) -> Vec<u8> {
    let mut key = index_prefix(value);
    key.extend_from_slice(id.as_bytes());
    key
}

fn index_prefix(value: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(value.len() + 1);
    prefix.extend_from_slice(value.as_bytes());
    prefix.push(0);
    prefix
}

impl StoreInner {
    fn get_tool(&self, id: &[u8]) -> Result<Option<SliverTool>, StoreError> {
        self.sliver_tools
            .get(id)?
            .map(|bytes| de(&bytes))
            .transpose()
            .map_err(StoreError::from)
    }

    fn put_tool(&self, tool: &SliverTool) -> Result<SliverToolId, StoreError> {
        let id = tool.id();
        let previous = self.get_tool(id.as_bytes())?;

        self.by_fqdn.insert(index_key(&tool.fqdn, &id), id.as_bytes())?;
        self.by_tool_id
            .insert(index_key(&tool.tool_id, &id), id.as_bytes())?;
        self.sliver_tools.insert(&id, ser(tool)?)?;

        match previous {
            Some(previous) if previous.fqdn != tool.fqdn => {
                self.by_fqdn.remove(index_key(&previous.fqdn, &id))?;
            }
            _ => {}
        }
        Ok(id)
    }

    /// Records listed under `value` in `index`. Entries whose record no longer
    /// carries `value` are ignored.
    fn indexed_tools<P>(
        &self,
        index: &sled::Tree,
        value: &str,
        matches: P,
    ) -> Result<Vec<SliverTool>, StoreError>
    where
        P: Fn(&SliverTool) -> bool,
    {
        let prefix = index_prefix(value);
        let mut tools = Vec::new();
        for entry in index.range(prefix.clone()..) {
            let (key, id) = entry?;
            if !key.starts_with(&prefix) {
                break;
            }
            match self.get_tool(&id)? {
                Some(tool) if matches(&tool) => tools.push(tool),
                _ => {}
            }
        }
        Ok(tools)
    }
}

fn scan<T: DeserializeOwned>(tree: &sled::Tree) -> impl Iterator<Item = Result<T, StoreError>> + '_ {
    tree.iter().map(|entry| {
        let (_key, value) = entry?;
        Ok(de(&value)?)
    })
}

impl SliverStore for SledStore {
    fn sliver_tool(&self, id: &SliverToolId) -> Result<Option<SliverTool>, StoreError> {
        self.lock().get_tool(id.as_bytes())
    }

    fn sliver_tools_by_fqdn(&self, fqdn: &str) -> Result<Vec<SliverTool>, StoreError> {
        let inner = self.lock();
        inner.indexed_tools(&inner.by_fqdn, fqdn, |tool| tool.fqdn == fqdn)
    }

    fn sliver_tools_by_tool_id(&self, tool_id: &str) -> Result<Vec<SliverTool>, StoreError> {
        let inner = self.lock();
        inner.indexed_tools(&inner.by_tool_id, tool_id, |tool| tool.tool_id == tool_id)
    }

    fn put_sliver_tool(&self, tool: &SliverTool) -> Result<SliverToolId, StoreError> {
        self.lock().put_tool(tool)
    }

    fn update_sliver_tool<U>(
        &self,
        id: &SliverToolId,
        update: U,
    ) -> Result<Option<SliverTool>, StoreError>
    where
        U: FnOnce(&mut SliverTool) -> bool,
    {
        let inner = self.lock();
        let Some(mut tool) = inner.get_tool(id.as_bytes())? else {
            return Ok(None);
        };
        if !update(&mut tool) {
            return Ok(None);
        }
        inner.put_tool(&tool)?;
        Ok(Some(tool))
    }

    fn slices(&self) -> Result<Vec<Slice>, StoreError> {
        scan(&self.lock().slices).collect()
    }

    fn put_slice(&self, slice: &Slice) -> Result<(), StoreError> {
        self.lock()
            .slices
            .insert(slice.tool_id.as_bytes(), ser(slice)?)?;
        Ok(())
    }

    fn monitoring_config(&self) -> Result<Option<MonitoringConfig>, StoreError> {
        self.lock()
            .monitoring
            .get(MonitoringConfig::DEFAULT_ENTRY)?
            .map(|bytes| de(&bytes))
            .transpose()
            .map_err(StoreError::from)
    }

    fn put_monitoring_config(&self, config: &MonitoringConfig) -> Result<(), StoreError> {
        self.lock()
            .monitoring
            .insert(MonitoringConfig::DEFAULT_ENTRY, ser(config)?)?;
        Ok(())
    }
}
