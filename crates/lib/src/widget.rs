//! Externally embedded widgets (e.g. a messenger button) with scoped lifetime.
//!
//! The registry is the single record of which widgets are loaded. It is created by the
//! host and passed in; mounting returns a guard, and dropping the guard unloads the
//! widget, clears the registry entry and aborts its poll task.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

/// Loads and removes the external script/element behind a widget.
pub trait WidgetLoader: Send + Sync {
    fn load(&self, id: &str) -> anyhow::Result<()>;
    fn unload(&self, id: &str);
}

#[derive(Debug, thiserror::Error)]
pub enum WidgetError {
    #[error("widget {0} is already mounted")]
    AlreadyMounted(String),
    #[error("loading widget {id} failed: {source}")]
    Load {
        id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// Which widgets are currently loaded. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct WidgetRegistry {
    loaded: Arc<Mutex<HashSet<String>>>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The set stays consistent under a panic elsewhere, so a poisoned lock is recovered.
    fn entries(&self) -> MutexGuard<'_, HashSet<String>> {
        self.loaded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.entries().contains(id)
    }

    pub fn loaded_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries().iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Load `id` through `loader` and register it. A failed load leaves nothing registered.
    pub fn mount(
        &self,
        loader: Arc<dyn WidgetLoader>,
        id: impl Into<String>,
    ) -> Result<WidgetGuard, WidgetError> {
        let id = id.into();
        if !self.entries().insert(id.clone()) {
            return Err(WidgetError::AlreadyMounted(id));
        }
        if let Err(e) = loader.load(&id) {
            self.forget(&id);
            return Err(WidgetError::Load {
                id,
                source: e.into(),
            });
        }
        log::info!("widget {} mounted", id);
        Ok(WidgetGuard {
            id,
            loader,
            registry: self.clone(),
            poll: None,
        })
    }

    fn forget(&self, id: &str) {
        self.entries().remove(id);
    }
}

/// A mounted widget. Dropping it releases everything acquired at mount.
pub struct WidgetGuard {
    id: String,
    loader: Arc<dyn WidgetLoader>,
    registry: WidgetRegistry,
    poll: Option<JoinHandle<()>>,
}

impl WidgetGuard {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run `task` once in the background (e.g. the notification fetch on mount).
    /// Replaces and aborts any earlier poll still running.
    pub fn poll_once<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Some(old) = self.poll.replace(tokio::spawn(task)) {
            old.abort();
        }
    }

    /// Explicit unmount; same as dropping.
    pub fn unmount(self) {}
}

impl Drop for WidgetGuard {
    fn drop(&mut self) {
        if let Some(poll) = self.poll.take() {
            if !poll.is_finished() {
                log::debug!("widget {}: aborting poll", self.id);
            }
            poll.abort();
        }
        self.loader.unload(&self.id);
        self.registry.forget(&self.id);
        log::info!("widget {} unmounted", self.id);
    }
}
