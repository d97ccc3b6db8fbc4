//! Persistence middleware
//! One async hydrate-and-merge pass at construction, debounced write-back
//! of a projected snapshot on every mutation

pub mod debounce;
pub mod middleware;

pub use debounce::DebounceCell;
pub use middleware::{HydrationState, Persist, PersistOptions, PersistedStore};
