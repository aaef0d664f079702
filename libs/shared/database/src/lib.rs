pub mod locks;
pub mod memory;
pub mod state;
pub mod store;
pub mod supabase;

pub use locks::{KeyedGuard, KeyedLocks};
pub use memory::MemoryStore;
pub use state::AppState;
pub use store::{decode, decode_all, fields_of, to_document, Condition, DocumentStore, Filter, FindOptions, SortOrder, StoreError};
pub use supabase::{SupabaseClient, SupabaseStore};

use shared_models::error::AppError;

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        AppError::Database(error.to_string())
    }
}
