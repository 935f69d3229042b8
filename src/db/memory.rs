//! In-memory `Store` implementation for the test harness (spec §4.K).
//!
//! Not present in the teacher (which only ever talks to sqlite); built new
//! so the core "must compile and run with the in-memory implementation" per
//! SPEC_FULL §4.C, using the same `dashmap`/`parking_lot` primitives the
//! rest of the crate already depends on for `World`.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::state::now_ms;

use super::{Account, DbError, HistoryEntry, Privacy, Store};

pub struct MemoryStore {
    accounts: DashMap<String, Account>,
    history: Mutex<Vec<HistoryEntry>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            accounts: DashMap::new(),
            history: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Create an account directly (test/admin helper; there is no public
    /// registration flow in this spec — accounts are provisioned
    /// out-of-band per §3.3).
    pub fn create_account(&self, username: &str, password_verifier: &str) -> Result<(), DbError> {
        if self.accounts.contains_key(username) {
            return Err(DbError::AccountExists(username.to_string()));
        }
        self.accounts.insert(
            username.to_string(),
            Account {
                username: username.to_string(),
                password_verifier: password_verifier.to_string(),
                email: None,
                created_at_ms: now_ms(),
                last_login_ms: None,
                verified: false,
                allow_message_logging: true,
                allow_history_access: true,
            },
        );
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn authenticate(&self, username: &str, password: &str) -> bool {
        match self.accounts.get(username) {
            Some(account) => account.password_verifier == password,
            None => false,
        }
    }

    async fn account_exists(&self, username: &str) -> bool {
        self.accounts.contains_key(username)
    }

    async fn get_privacy(&self, username: &str) -> Privacy {
        match self.accounts.get(username) {
            Some(account) => Privacy {
                allow_logging: account.allow_message_logging,
                allow_history: account.allow_history_access,
            },
            None => Privacy::default(),
        }
    }

    async fn append_history(
        &self,
        sender: &str,
        target: &str,
        body: &str,
        message_type: &str,
        is_channel: bool,
        reply_to_id: Option<i64>,
    ) -> Option<i64> {
        if !self.get_privacy(sender).await.allow_logging {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let entry = HistoryEntry {
            id,
            timestamp_ms: now_ms(),
            sender: sender.to_string(),
            target: target.to_string(),
            body: body.to_string(),
            message_type: message_type.to_string(),
            is_channel_message: is_channel,
            reply_to_id,
        };
        self.history.lock().push(entry);
        Some(id)
    }

    async fn get_channel_history(
        &self,
        channel: &str,
        limit: usize,
        before_ts: Option<i64>,
    ) -> Vec<HistoryEntry> {
        self.history
            .lock()
            .iter()
            .filter(|e| e.is_channel_message && e.target == channel)
            .filter(|e| before_ts.is_none_or(|ts| e.timestamp_ms < ts))
            .rev()
            .take(limit)
            .rev()
            .cloned()
            .collect()
    }

    async fn get_private_history(
        &self,
        u1: &str,
        u2: &str,
        limit: usize,
        before_ts: Option<i64>,
    ) -> Vec<HistoryEntry> {
        self.history
            .lock()
            .iter()
            .filter(|e| !e.is_channel_message)
            .filter(|e| {
                (e.sender == u1 && e.target == u2) || (e.sender == u2 && e.target == u1)
            })
            .filter(|e| before_ts.is_none_or(|ts| e.timestamp_ms < ts))
            .rev()
            .take(limit)
            .rev()
            .cloned()
            .collect()
    }

    async fn search(&self, query: &str, target: Option<&str>, limit: usize) -> Vec<HistoryEntry> {
        self.history
            .lock()
            .iter()
            .filter(|e| e.body.contains(query))
            .filter(|e| target.is_none_or(|t| e.target == t))
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    async fn get_messages_by_sender(&self, sender: &str, limit: usize) -> Vec<HistoryEntry> {
        self.history
            .lock()
            .iter()
            .filter(|e| e.sender == sender)
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    async fn get_message(&self, id: i64) -> Option<HistoryEntry> {
        self.history.lock().iter().find(|e| e.id == id).cloned()
    }

    async fn get_replies(&self, parent_id: i64, limit: usize) -> Vec<HistoryEntry> {
        self.history
            .lock()
            .iter()
            .filter(|e| e.reply_to_id == Some(parent_id))
            .take(limit)
            .cloned()
            .collect()
    }

    async fn cleanup_older_than_ms(&self, cutoff_ts: i64) -> u64 {
        let mut history = self.history.lock();
        let before = history.len();
        history.retain(|e| e.timestamp_ms >= cutoff_ts);
        (before - history.len()) as u64
    }
}
