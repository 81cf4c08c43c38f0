pub mod cli;
pub mod config;
pub mod database;
pub mod fingerprint;
pub mod indexer;
mod metrics;
pub mod search;
mod server;
pub mod utils;

pub use config::Opts;
pub use database::{Database, DatabaseWriter, Entry};
pub use fingerprint::{FingerprintKind, FingerprintProvider};
pub use search::{SearchEngine, SearchResult};
