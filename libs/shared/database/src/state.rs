use std::sync::Arc;

use tracing::info;

use shared_config::{AppConfig, StoreBackend};

use crate::locks::KeyedLocks;
use crate::memory::MemoryStore;
use crate::store::DocumentStore;
use crate::supabase::SupabaseStore;

/// Shared state handed to every router.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub locks: Arc<KeyedLocks>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            config,
            store,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Picks the store named by `STORE_BACKEND`.
    pub fn from_config(config: AppConfig) -> Self {
        let store: Arc<dyn DocumentStore> = match config.store_backend {
            StoreBackend::Memory => {
                info!("Using in-memory document store");
                Arc::new(MemoryStore::new())
            }
            StoreBackend::Supabase => {
                info!("Using Supabase document store at {}", config.supabase_url);
                Arc::new(SupabaseStore::new(&config))
            }
        };
        Self::new(Arc::new(config), store)
    }

    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(Arc::new(config), Arc::new(MemoryStore::new()))
    }
}
