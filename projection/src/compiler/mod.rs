//! Projection pipeline
//!
//! Turns a choreography into one local program per participant. Processes
//! that do not evaluate a conditional must behave the same in both of its
//! branches up to the labels they are offered; [`merge`] reconciles the two.

/// Merging of branch behaviors
pub mod merge;
/// Projection of choreographies onto processes
pub mod projection;

pub use merge::{merge, Conflict, MergeError};
pub use projection::*;
