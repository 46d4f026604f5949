//! Abstract syntax trees for networks and choreographies
//!
//! A network is written per process with [`Behavior`]s; a choreography is a
//! single global [`ChoreographyBody`] over all of its participants.

/// Local behaviors of a single process
pub mod behavior;

/// Choreographies, procedures and programs
pub mod choreography;

/// Validation errors and utilities
pub mod validation;

pub use behavior::*;
pub use choreography::*;
pub use validation::*;
