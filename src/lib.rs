//! Purpose: Typed, thread-safe access to netCDF datasets over a flat, handle-based engine.
//! Exports: `api` (containers, groups, dimensions, variables, attributes) and `core` internals.
//! Role: Library crate; the engine is the built-in reference engine or the system library
//! (`libnetcdf` feature).
//! Invariants: All engine calls are serialized process-wide; descriptors are plain snapshots.
//! Invariants: Name lookups report absence as `Ok(None)`, never as an error.
pub mod api;
pub mod core;

pub use api::*;
