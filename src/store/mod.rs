//! Durable key-value storage with named partitions
//! One sled database multiplexed by every partition, plus an in-memory
//! backend for tests and embedding

pub mod backend;
pub mod durable;
pub mod error;
pub mod memory;

pub use backend::StorageBackend;
pub use durable::{DurableStore, StoreStats};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryBackend;
