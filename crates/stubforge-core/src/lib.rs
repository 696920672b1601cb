//! Stubforge core library: test-scaffold generation from requirement matrices
//! and UML exports.
//!
//! The crate ingests a CSV requirements matrix, vendor XML sequence diagrams
//! and a class diagram, builds an inter-class call graph from the diagrams,
//! and renders Java stubs for the callees and drivers for the callers of the
//! classes selected for testing. [`workspace::Workspace`] is the stateful
//! entry point a UI shell drives; every layer below it is usable on its own.

pub mod analysis;
pub mod config;
pub mod errors;
pub mod ingest;
pub mod models;
pub mod store;
pub mod synth;
pub mod workspace;

#[cfg(test)]
mod testing;
