//! PADDOCK Core - Grid and Resource Types
//!
//! Geometry, the immutable grid context, the mutable resource field,
//! configuration and errors. Every other crate in the workspace depends on
//! this one; it carries no scheduling logic.

mod config;
mod error;
mod geometry;
mod grid;
mod priority;
mod relief;
mod resource;
pub mod serde_helpers;

pub use config::*;
pub use error::*;
pub use geometry::*;
pub use grid::*;
pub use priority::*;
pub use relief::*;
pub use resource::*;
