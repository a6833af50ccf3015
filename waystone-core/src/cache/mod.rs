//! Caching module for Waystone
//!
//! Storage backends ([`MemoryCacheStorage`], [`FileCacheStorage`]) behind the
//! [`CacheStorage`] trait, the per-namespace [`BoundedCacheStore`] with its
//! eviction routine, and the versioned [`NamespaceManager`].

pub mod entries;
pub mod file;
pub mod memory;
pub mod namespace;
pub mod store;
pub mod traits;

pub use entries::EntryTable;
pub use file::FileCacheStorage;
pub use memory::MemoryCacheStorage;
pub use namespace::{CacheNames, NamespaceManager};
pub use store::BoundedCacheStore;
pub use traits::CacheStorage;
