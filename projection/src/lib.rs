//! Endpoint projection for chorex
//!
//! Projection is the inverse of extraction: it compiles a choreography into
//! the network of processes that implements it. Extracting a network and
//! projecting the result gives back an equivalent network.
//!
//! ```rust
//! use chorex::ast::{Choreography, ChoreographyBody};
//! use chorex_projection::project_choreography;
//!
//! let choreography = Choreography::new(
//!     vec![],
//!     ChoreographyBody::communication("p", "q", "e", ChoreographyBody::Termination),
//! );
//! let network = project_choreography(&choreography).unwrap();
//! assert_eq!(network.to_string(), "p{main {q!<e>; stop}} | q{main {p?; stop}}");
//! ```

/// Projection and merging
pub mod compiler;

// Re-export main APIs
pub use compiler::{
    merge, project, project_choreography, project_collecting, project_process, Conflict,
    MergeError, ProjectionError,
};
