//! Barberboard display synchronization.
//!
//! Keeps every open display instance of a barbershop board (shop settings,
//! contact links, photo gallery, background image, queue board) converged on
//! the latest saved state. One instance edits; everyone else notices within
//! seconds through three independent mechanisms:
//!
//! - a live subscription on the remote version marker,
//! - a timed poll of the static version document,
//! - a cross-instance force-update broadcast.
//!
//! The crate deliberately splits policy from mechanism: [`SyncCoordinator`]
//! owns the application state and the mutation pipeline,
//! [`watch::VersionWatcher`] owns change detection and reload debouncing,
//! and the display shell plugs in through the [`Notifier`] and
//! [`ReloadHandler`] seams.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod notify;
pub mod reload;
pub mod store;
pub mod sync;
pub mod tabs;
pub mod watch;

pub use config::{ConfigError, SyncConfig};
pub use notify::{LogNotifier, Notice, NoticeKind, Notifier};
pub use reload::{LogReloadHandler, ReloadGate, ReloadHandler, ReloadReason};
pub use store::{
    HttpRemoteStore, LocalStore, MemoryRemoteStore, RecordPath, RemoteError, RemoteStore,
    Subscription,
};
pub use sync::{AppData, MutationKind, SyncCoordinator, SyncError};
pub use tabs::{TabChannel, TabMessage};
pub use watch::{ReconcileState, VersionWatcher};
