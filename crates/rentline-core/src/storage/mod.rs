//! Durable key/value storage for client-side state.
//!
//! This module provides:
//! - `Storage`: the string key/value contract every backend implements
//! - `FileStorage`: a JSON document on disk
//! - `KeyringStorage`: entries in the OS keychain
//! - `MemoryStorage`: process-local storage for tests and ephemeral runs
//!
//! The credential store and the route guard's return-path marker both
//! persist through this trait, so swapping backends never touches them.

pub mod file;
pub mod keychain;

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;

pub use file::FileStorage;
pub use keychain::KeyringStorage;

/// String key/value storage, shaped like a browser's local storage.
pub trait Storage: Send + Sync {
    /// Read a value. `Ok(None)` means the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory storage. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory storage lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory storage lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory storage lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}
