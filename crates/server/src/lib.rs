//! Barberboard API server library.
//!
//! JSON-file records behind a small axum API: the shared store every
//! display instance converges on. Records are opaque JSON; validation
//! belongs to the displays writing them, the server only versions and
//! serves them. Exposed as a library so integration tests can boot the
//! real app on an ephemeral port.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod store;
