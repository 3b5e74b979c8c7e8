//! Data model and layout constants for cellxgene-mcp.
//!
//! This crate defines the tabular frame, organism and release-directory types
//! shared by the query core, the snapshot backend and the MCP layer.

pub mod models;
pub mod schema;

pub use models::*;
