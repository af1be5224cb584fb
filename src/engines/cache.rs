//! Process-wide construct-once cache for expensive engines.
//!
//! Loading a layout or NER model can take seconds and hundreds of megabytes,
//! so each default engine is built once and shared by every request. A
//! [`ModelCell`] guarantees that when several requests race on first use,
//! exactly one of them runs the constructor while the others wait for it and
//! then reuse the published instance. A constructor that fails leaves the
//! cell empty, so the next request retries instead of caching the error.
//!
//! Engines whose construction depends on per-request settings (provider,
//! model name, call options) live in a [`ModelRegistry`]: one cell per
//! distinct key, so two configurations never share an instance.

use crate::error::MedOcrError;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Lazily-initialised, shared engine slot.
pub struct ModelCell<T: ?Sized> {
    name: &'static str,
    cell: OnceCell<Arc<T>>,
}

impl<T: ?Sized> ModelCell<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cell: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The cached instance, if it has been constructed.
    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// Return the cached instance, constructing it with `init` on first use.
    pub async fn get_or_try_init<F, Fut>(&self, init: F) -> Result<Arc<T>, MedOcrError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<T>, MedOcrError>>,
    {
        if let Some(model) = self.cell.get() {
            return Ok(Arc::clone(model));
        }

        let name = self.name;
        let model = self
            .cell
            .get_or_try_init(|| async move {
                info!("Initialising {} model", name);
                init().await
            })
            .await?;
        debug!("Using cached {} model", name);
        Ok(Arc::clone(model))
    }
}

/// A [`ModelCell`] per construction key.
pub struct ModelRegistry<K, T: ?Sized> {
    name: &'static str,
    cells: Mutex<HashMap<K, Arc<ModelCell<T>>>>,
}

impl<K: Eq + Hash, T: ?Sized> ModelRegistry<K, T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// The cell for `key`, created empty on first lookup.
    pub fn cell(&self, key: K) -> Arc<ModelCell<T>> {
        let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        let name = self.name;
        Arc::clone(
            cells
                .entry(key)
                .or_insert_with(|| Arc::new(ModelCell::new(name))),
        )
    }

    /// Number of distinct keys seen so far.
    pub fn len(&self) -> usize {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the instance cached under `key`, constructing it on first use.
    pub async fn get_or_try_init<F, Fut>(&self, key: K, init: F) -> Result<Arc<T>, MedOcrError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<T>, MedOcrError>>,
    {
        // The map lock is released before awaiting the constructor.
        let cell = self.cell(key);
        cell.get_or_try_init(init).await
    }
}
