//! Storage adapters: the local key-value cache and the remote store.

pub mod http;
pub mod local;
pub mod memory;
pub mod remote;

pub use http::HttpRemoteStore;
pub use local::{LocalStore, LocalStoreError, keys};
pub use memory::MemoryRemoteStore;
pub use remote::{RecordPath, RemoteError, RemoteStore, Subscription};
