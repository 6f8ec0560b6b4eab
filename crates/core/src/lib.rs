//! Core types for the consensus price oracle
//!
//! This crate provides shared types used across all components:
//! - The published consensus snapshot
//! - Source, retry and configuration errors
//! - Layered process configuration

pub mod config;
pub mod errors;
pub mod types;

pub use self::config::*;
pub use errors::*;
pub use types::*;
