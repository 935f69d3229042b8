//! Integration test common infrastructure.
//!
//! Spawns a real `malefircd` process per test, configured entirely through
//! the `IRC_*` environment variables `Config::from_env` reads, and drives it
//! over a plain TCP client.

pub mod client;
pub mod server;

pub use client::TestClient;
pub use server::TestServer;
