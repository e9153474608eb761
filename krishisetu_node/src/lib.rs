//! KrishiSetu traceability node.
//!
//! Tracks agricultural batches from farmer to consumer. Products and their
//! transfer transactions live in a relational store; when the store is
//! unreachable, an in-memory simulated chain keeps registration and lookup
//! working for the lifetime of the process.

pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod pricing;
pub mod qr;
pub mod service;
pub mod storage;
pub mod types;
pub mod validation;

pub use crate::config::NodeConfig;
pub use crate::error::TraceError;
pub use crate::service::TraceabilityService;
