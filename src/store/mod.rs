pub mod adapter;
pub mod base;
pub mod local_store;
pub mod memory_store;
pub mod reduction;
pub mod secure_store;

// Re-export the primary store items so code outside can do
// "use crate::store::{PhysicalStore, SessionStorage, create_store};"
pub use adapter::{encode_key, SessionStorage, StorageAdapter};
pub use base::{create_store, PhysicalStore, Platform, StoreError};
