//! Scoped route discovery and canonicalization.
//!
//! Adapters feed [`crate::model::RouteCandidate`]s into this module; the
//! [`driver`] runs them over a project and [`canonicalize`] turns the merged
//! candidate list into the final route table.

pub mod canonicalize;
pub mod combinator;
pub mod driver;
pub mod node;
pub mod path_template;
pub mod schema_walker;
pub mod scope;
