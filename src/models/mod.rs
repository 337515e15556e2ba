//! Data models for the DAO registry.
//!
//! Wire format is camelCase to match the web frontend.

mod activity;
mod attestation;
mod dao;
mod document;
mod sync;

pub use activity::*;
pub use attestation::*;
pub use dao::*;
pub use document::*;
pub use sync::*;

#[cfg(test)]
pub(crate) use attestation::fixtures;
