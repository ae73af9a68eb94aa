//! # Orchard Support
//!
//! Shared helpers for the Orchard dependency injection crates.
//!
//! This crate provides:
//! - Rendering of type names, key lists and dependency chains for diagnostics
//! - "Did you mean?" suggestions for unknown bindings

pub mod rendering;
