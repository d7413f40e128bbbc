//! Shared test helpers for the sync engine crates.

pub mod mock_hn_server;

pub use mock_hn_server::MockHnServer;
