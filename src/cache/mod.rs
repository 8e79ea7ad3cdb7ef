pub mod config;
pub mod data_cache;
pub mod remote;

pub use config::CacheConfig;
pub use data_cache::{DataCache, INFO_FILE};
pub use remote::{EntryKind, HttpRemote, RemoteEntry, RemoteSource};
