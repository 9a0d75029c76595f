//! Popstore Common - Shared types and utilities
//!
//! This crate provides the data model, error taxonomy, client
//! configuration and the multipart part planner shared by the popstore
//! client library and CLI.

pub mod checksum;
pub mod config;
pub mod error;
pub mod plan;
pub mod types;

pub use checksum::DigestCalculator;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use plan::{PartPlan, plan_parts};
pub use types::*;
