//! Account & history persistence (spec §4.C).
//!
//! `Store` is the interface the core consumes; `MemoryStore` backs the test
//! harness (§4.K) and `SqliteStore` is the production implementation,
//! grounded on the teacher's `db/accounts.rs` repository-over-pool shape.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct Account {
    pub username: String,
    /// Opaque password verifier (an argon2 PHC string for `SqliteStore`).
    pub password_verifier: String,
    pub email: Option<String>,
    pub created_at_ms: i64,
    pub last_login_ms: Option<i64>,
    pub verified: bool,
    pub allow_message_logging: bool,
    pub allow_history_access: bool,
}

#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub id: i64,
    pub timestamp_ms: i64,
    pub sender: String,
    pub target: String,
    pub body: String,
    pub message_type: String,
    pub is_channel_message: bool,
    pub reply_to_id: Option<i64>,
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("account {0} already exists")]
    AccountExists(String),
    #[error("no such account {0}")]
    NoSuchAccount(String),
    #[error(transparent)]
    Sqlite(#[from] sqlx::Error),
}

/// Privacy flags returned for a sender when deciding whether to persist/serve
/// history involving them.
#[derive(Clone, Copy, Debug)]
pub struct Privacy {
    pub allow_logging: bool,
    pub allow_history: bool,
}

impl Default for Privacy {
    fn default() -> Self {
        Privacy {
            allow_logging: true,
            allow_history: true,
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> bool;
    async fn account_exists(&self, username: &str) -> bool;
    async fn get_privacy(&self, username: &str) -> Privacy;

    async fn append_history(
        &self,
        sender: &str,
        target: &str,
        body: &str,
        message_type: &str,
        is_channel: bool,
        reply_to_id: Option<i64>,
    ) -> Option<i64>;

    async fn get_channel_history(
        &self,
        channel: &str,
        limit: usize,
        before_ts: Option<i64>,
    ) -> Vec<HistoryEntry>;

    async fn get_private_history(
        &self,
        u1: &str,
        u2: &str,
        limit: usize,
        before_ts: Option<i64>,
    ) -> Vec<HistoryEntry>;

    async fn search(&self, query: &str, target: Option<&str>, limit: usize) -> Vec<HistoryEntry>;
    async fn get_messages_by_sender(&self, sender: &str, limit: usize) -> Vec<HistoryEntry>;
    async fn get_message(&self, id: i64) -> Option<HistoryEntry>;
    async fn get_replies(&self, parent_id: i64, limit: usize) -> Vec<HistoryEntry>;
    async fn cleanup_older_than_ms(&self, cutoff_ts: i64) -> u64;
}
