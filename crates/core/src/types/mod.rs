//! Core types for Barberboard.
//!
//! This module provides the shared record types and type-safe wrappers for
//! common domain concepts.

pub mod background;
pub mod board;
pub mod contact;
pub mod gallery;
pub mod id;
pub mod settings;
pub mod version;

pub use background::Background;
pub use board::{BoardSnapshot, BoardState, ChairStatus};
pub use contact::{Contact, ContactError, ContactKind, ContactList};
pub use gallery::{Gallery, GalleryImage, NewImage};
pub use id::*;
pub use settings::{SettingsError, SettingsPatch, ShopSettings};
pub use version::{VersionMarker, version_token};
