// crates/error-archive-config/src/lib.rs
// ============================================================================
// Module: Error Archive Config Library
// Description: Canonical config model, validation, and runtime wiring.
// Purpose: Single source of truth for error-archive.toml semantics.
// Dependencies: error-archive-core, error-archive-store-*, serde, toml
// ============================================================================

//! ## Overview
//! `error-archive-config` defines the configuration model for the error
//! archive. It loads `error-archive.toml` with strict, fail-closed validation,
//! reads filter-definition files, and wires stores and capture pipelines from
//! the result.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod filters;
pub mod wiring;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use filters::load_filter_file;
pub use filters::parse_filter_definitions;
pub use wiring::build_store;
pub use wiring::build_store_with_list_client;
