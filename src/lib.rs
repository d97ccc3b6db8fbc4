//! durastate - local persistence engine for in-memory app state
//! Makes state containers durable across restarts without blocking their callers
//!
//! Three pieces:
//! - a durable key-value store with named partitions (sled-backed, with an
//!   in-memory backend for tests and embedding)
//! - a codec that round-trips timestamps and unique-element sets through JSON
//! - a middleware that hydrates a container once at construction and writes
//!   back a projected snapshot after a debounce window on every mutation
//!
//! Consumers hand the middleware a partition name, an initial-state factory,
//! and a [`Persist`] implementation selecting which fields are durable. Reads
//! may observe initial values until hydration completes; writes land in
//! memory immediately and on disk best-effort within the debounce window.

pub mod codec;
pub mod config;
pub mod partitions;
pub mod persist;
pub mod store;

pub use codec::{decode, encode, CodecError, Stamp, TaggedSet};
pub use config::EngineConfig;
pub use partitions::{Partition, RECORD_KEY};
pub use persist::{DebounceCell, HydrationState, Persist, PersistOptions, PersistedStore};
pub use store::{DurableStore, MemoryBackend, StorageBackend, StoreError, StoreResult};
