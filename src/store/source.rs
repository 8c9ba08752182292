//! The time-series storage collaborator.
//!
//! The engine only talks to storage through [`FlightDataStore`]. A run wraps
//! the store in a [`Session`] so it is closed on every exit path.

use super::types::Parameter;
use crate::graph::dag::DependencyTree;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::{Deref, DerefMut};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Channel '{0}' not found in flight data")]
    ChannelNotFound(String),
    #[error("Flight data store is not open")]
    NotOpen,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait FlightDataStore {
    fn open(&mut self) -> Result<(), StoreError> { Ok(()) }
    fn close(&mut self) -> Result<(), StoreError> { Ok(()) }

    /// Reads a channel with its own frequency and offset.
    fn read(&mut self, name: &str) -> Result<Parameter, StoreError>;
    fn write(&mut self, param: Parameter) -> Result<(), StoreError>;
    fn contains(&self, name: &str) -> bool;

    /// Flight duration in seconds, if known.
    fn duration(&self) -> Option<f64>;

    /// Channels holding at least some valid data.
    fn valid_channel_names(&self) -> BTreeSet<String>;

    fn set_version(&mut self, version: &str) -> Result<(), StoreError>;
    fn set_dependency_tree(&mut self, tree: &DependencyTree) -> Result<(), StoreError>;

    /// Advisory: channels worth keeping resident instead of re-reading.
    fn set_cache_channels(&mut self, _names: Vec<String>) {}
}

/// Scoped access to a store; `close` runs on drop.
pub struct Session<'a, S: FlightDataStore + ?Sized> {
    store: &'a mut S,
}

impl<'a, S: FlightDataStore + ?Sized> Session<'a, S> {
    pub fn open(store: &'a mut S) -> Result<Self, StoreError> {
        store.open()?;
        Ok(Self { store })
    }
}

impl<S: FlightDataStore + ?Sized> Deref for Session<'_, S> {
    type Target = S;
    fn deref(&self) -> &S { self.store }
}

impl<S: FlightDataStore + ?Sized> DerefMut for Session<'_, S> {
    fn deref_mut(&mut self) -> &mut S { self.store }
}

impl<S: FlightDataStore + ?Sized> Drop for Session<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.store.close() {
            tracing::warn!(error = %e, "Failed to close flight data store");
        }
    }
}

// --- In-Memory Store ---

/// A store holding every channel in memory.
///
/// Reads return clones, mimicking a file-backed store; channels marked for
/// caching are served from a resident copy after their first read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    channels: BTreeMap<String, Parameter>,
    duration: Option<f64>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    dependency_tree: Option<DependencyTree>,
    #[serde(skip)]
    is_open: bool,
    #[serde(skip)]
    cache_channels: BTreeSet<String>,
    #[serde(skip)]
    resident: HashMap<String, Parameter>,
    #[serde(skip)]
    backing_reads: HashMap<String, usize>,
}

impl MemoryStore {
    pub fn new(duration: Option<f64>) -> Self {
        Self { duration, ..Default::default() }
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Inserts a channel directly, bypassing the open check.
    pub fn insert(&mut self, param: Parameter) {
        self.channels.insert(param.name.clone(), param);
    }

    pub fn with_channel(mut self, param: Parameter) -> Self {
        self.insert(param);
        self
    }

    pub fn channel(&self, name: &str) -> Option<&Parameter> {
        self.channels.get(name)
    }

    pub fn is_open(&self) -> bool { self.is_open }
    pub fn version(&self) -> Option<&str> { self.version.as_deref() }
    pub fn dependency_tree(&self) -> Option<&DependencyTree> { self.dependency_tree.as_ref() }
    pub fn cache_channels(&self) -> &BTreeSet<String> { &self.cache_channels }

    /// Number of reads that went to the backing channel map.
    pub fn backing_reads(&self, name: &str) -> usize {
        self.backing_reads.get(name).copied().unwrap_or(0)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.is_open { Ok(()) } else { Err(StoreError::NotOpen) }
    }
}

impl FlightDataStore for MemoryStore {
    fn open(&mut self) -> Result<(), StoreError> {
        self.is_open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.is_open = false;
        self.resident.clear();
        Ok(())
    }

    fn read(&mut self, name: &str) -> Result<Parameter, StoreError> {
        self.ensure_open()?;
        if let Some(param) = self.resident.get(name) {
            return Ok(param.clone());
        }
        let param = self
            .channels
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::ChannelNotFound(name.to_string()))?;
        *self.backing_reads.entry(name.to_string()).or_insert(0) += 1;
        if self.cache_channels.contains(name) {
            self.resident.insert(name.to_string(), param.clone());
        }
        Ok(param)
    }

    fn write(&mut self, param: Parameter) -> Result<(), StoreError> {
        self.ensure_open()?;
        // A rewritten channel invalidates any resident copy.
        self.resident.remove(&param.name);
        self.channels.insert(param.name.clone(), param);
        Ok(())
    }

    fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn valid_channel_names(&self) -> BTreeSet<String> {
        self.channels
            .values()
            .filter(|p| !p.array.is_fully_masked())
            .map(|p| p.name.clone())
            .collect()
    }

    fn set_version(&mut self, version: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.version = Some(version.to_string());
        Ok(())
    }

    fn set_dependency_tree(&mut self, tree: &DependencyTree) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.dependency_tree = Some(tree.clone());
        Ok(())
    }

    fn set_cache_channels(&mut self, names: Vec<String>) {
        self.cache_channels = names.into_iter().collect();
    }
}
