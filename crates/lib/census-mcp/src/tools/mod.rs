//! MCP tool modules.
//!
//! Tools are grouped by domain: census-wide info, obs/var metadata lookup,
//! and cells x genes slice summaries.

pub mod census;
pub mod data;
pub mod metadata;
