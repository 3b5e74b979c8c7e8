//! Core query layer for cellxgene-mcp.
//!
//! This crate validates and shapes tool requests, defines the seam to the
//! Census data source, and ships a snapshot-backed source plus a client for
//! the public release directory.

pub mod control;
pub mod format;
pub mod query;
pub mod release;
pub mod services;
pub mod store;
