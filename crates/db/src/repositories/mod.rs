//! [`crate::ProjectStore`] backends.

pub mod cache_store;
pub mod fallback_store;
pub mod memory_store;
pub mod pg_store;

pub use cache_store::LocalCacheStore;
pub use fallback_store::FallbackStore;
pub use memory_store::MemoryProjectStore;
pub use pg_store::PgProjectStore;
