//! Core types and definitions for the LANDFALL terrain engine.
//!
//! This crate defines the vocabulary shared by the terrain pipeline and
//! its tools: ground types, query results, world extents and constants.
//! It performs no I/O.

pub mod constants;
pub mod types;
