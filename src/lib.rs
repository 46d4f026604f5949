//! Choreography extraction for networks of communicating processes
//!
//! A *network* gives every process its own local program; a *choreography*
//! describes the same system as one global program of interactions. This
//! crate synthesizes the choreography a network implements:
//!
//! ```rust
//! use chorex::ast::Behavior;
//! use chorex::extraction::{extract, ExtractionConfig};
//! use chorex::network::{Network, ProcessTerm};
//! use std::collections::BTreeSet;
//!
//! let network = Network::new()
//!     .with_process(
//!         "p",
//!         ProcessTerm::new(
//!             [("X", Behavior::send("q", "e", Behavior::invoke("X")))],
//!             Behavior::invoke("X"),
//!         ),
//!     )
//!     .with_process(
//!         "q",
//!         ProcessTerm::new(
//!             [("Y", Behavior::receive("p", Behavior::invoke("Y")))],
//!             Behavior::invoke("Y"),
//!         ),
//!     );
//!
//! let result = extract(&network, &BTreeSet::new(), &ExtractionConfig::default()).unwrap();
//! assert_eq!(result.program.to_string(), "def X1 { p.e->q; X1 } main {X1}");
//! ```
//!
//! The inverse direction, endpoint projection, lives in the
//! `chorex-projection` crate of this workspace.

/// Behaviors, choreographies and programs
pub mod ast;
/// Choreography extraction
pub mod extraction;
/// Networks and their reduction
pub mod network;

// Re-export main APIs
pub use ast::{Behavior, Choreography, ChoreographyBody, Interaction, Program};
pub use extraction::{extract, ExtractionConfig, ExtractionError, ExtractionResult, Strategy};
pub use network::{Network, ProcessTerm};
