// crates/subnet-core/src/lib.rs
//
// subnet-core: Core types, traits, and fixed-point math for the subnet epoch engine.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines the participant and bonds data model, the typed epoch parameters,
// the error type, and the trait interfaces a host chain implements to feed
// the engine and persist its state.

pub mod bonds;
pub mod error;
pub mod math;
pub mod params;
pub mod participant;
pub mod result;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use subnet_core::Participant;`

// Numeric types
pub use math::Fixed;

// Participant types
pub use participant::{Participant, WeightEntry};

// Bonds
pub use bonds::BondsMatrix;

// Parameters
pub use params::{EpochParams, RawParams};

// Results
pub use result::{DegenerateReason, EpochOutcome, EpochResult, ParticipantOutcome};

// Error type
pub use error::EpochError;

// Traits
pub use traits::{EpochStore, ParticipantRegistry};

/// Identifier of a subnet.
pub type NetUid = u16;
