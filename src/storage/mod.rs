//! Persisted-store collaborator: the interface the engine needs and an
//! in-memory implementation of it.

pub mod memory;
pub mod traits;

pub use memory::InMemoryStore;
pub use traits::{Fields, Filter, InventoryStore, Row, StorageError, UnitOfWork};
