// crates/subnet-store/src/lib.rs
//
// subnet-store: Host-side collaborators for the subnet epoch engine.
//
// Provides an in-memory participant registry and epoch store for simulation
// and tests, and a RocksDB-backed epoch store that commits each epoch's bonds
// and marker in a single atomic write batch.

pub mod memory;
pub mod rocks;

// Re-export key types for ergonomic access from downstream crates.
pub use memory::{MemoryRegistry, MemoryStore};
pub use rocks::RocksStore;
