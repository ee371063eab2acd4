//! AWS-oriented adapters and handlers for report generation.
//!
//! This crate owns runtime integration details (the S3-triggered Lambda
//! handler and object storage adapters). Attribution itself lives in
//! `search_revenue_core`; the handler only wires an object stream into it and
//! ships the rendered report back to storage.

pub mod adapters;
pub mod handlers;
