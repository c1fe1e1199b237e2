pub mod active;
pub mod filter;
pub mod pending;
pub mod watcher;
