//! Barberboard Core - Shared types library.
//!
//! This crate provides common types used across all Barberboard components:
//! - `display` - The display-side synchronization library
//! - `server` - The hosted record store (HTTP API)
//! - `cli` - Command-line tools for seeding and management
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no HTTP
//! clients, no storage access. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! All record types serialize with camelCase field names so their JSON
//! matches the documents the legacy deployment already has on disk and in
//! its remote store.
//!
//! # Modules
//!
//! - [`types`] - Records (settings, contacts, gallery, background, board),
//!   newtype IDs, and version tokens

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
