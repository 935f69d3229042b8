//! SQLite-backed `Store`, grounded on the teacher's `db/accounts.rs`
//! repository-over-pool shape and argon2 verifier hashing.
//!
//! Uses runtime-checked `sqlx::query` rather than the `query!`/`query_as!`
//! macros, which need a live database or offline cache at compile time.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use rand::rngs::OsRng;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::state::now_ms;

use super::{Account, DbError, HistoryEntry, Privacy, Store};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(connection_string: &str) -> Result<Self, DbError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(&format!("sqlite://{connection_string}?mode=rwc"))
            .await?;
        let store = SqliteStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                username TEXT PRIMARY KEY,
                password_verifier TEXT NOT NULL,
                email TEXT,
                created_at_ms INTEGER NOT NULL,
                last_login_ms INTEGER,
                verified INTEGER NOT NULL DEFAULT 0,
                allow_message_logging INTEGER NOT NULL DEFAULT 1,
                allow_history_access INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp_ms INTEGER NOT NULL,
                sender TEXT NOT NULL,
                target TEXT NOT NULL,
                body TEXT NOT NULL,
                message_type TEXT NOT NULL,
                is_channel_message INTEGER NOT NULL,
                reply_to_id INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS history_target_idx ON history(target, timestamp_ms)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Provision an account out-of-band (spec §3.3: accounts are created by
    /// external administration, not by a client-facing command).
    pub async fn register(&self, username: &str, password: &str) -> Result<(), DbError> {
        let salt = SaltString::generate(&mut OsRng);
        let verifier = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| DbError::AccountExists(e.to_string()))?
            .to_string();

        let result = sqlx::query(
            "INSERT INTO accounts (username, password_verifier, created_at_ms) VALUES (?, ?, ?)",
        )
        .bind(username)
        .bind(verifier)
        .bind(now_ms())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(DbError::AccountExists(username.to_string()))
            }
            Err(e) => Err(DbError::Sqlite(e)),
        }
    }

    async fn load_account(&self, username: &str) -> Option<Account> {
        let row = sqlx::query("SELECT * FROM accounts WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .ok()??;
        Some(Account {
            username: row.get("username"),
            password_verifier: row.get("password_verifier"),
            email: row.get("email"),
            created_at_ms: row.get("created_at_ms"),
            last_login_ms: row.get("last_login_ms"),
            verified: row.get::<i64, _>("verified") != 0,
            allow_message_logging: row.get::<i64, _>("allow_message_logging") != 0,
            allow_history_access: row.get::<i64, _>("allow_history_access") != 0,
        })
    }
}

fn row_to_history(row: sqlx::sqlite::SqliteRow) -> HistoryEntry {
    HistoryEntry {
        id: row.get("id"),
        timestamp_ms: row.get("timestamp_ms"),
        sender: row.get("sender"),
        target: row.get("target"),
        body: row.get("body"),
        message_type: row.get("message_type"),
        is_channel_message: row.get::<i64, _>("is_channel_message") != 0,
        reply_to_id: row.get("reply_to_id"),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn authenticate(&self, username: &str, password: &str) -> bool {
        let Some(account) = self.load_account(username).await else {
            return false;
        };
        let Ok(hash) = PasswordHash::new(&account.password_verifier) else {
            return false;
        };
        let ok = Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok();
        if ok {
            let _ = sqlx::query("UPDATE accounts SET last_login_ms = ? WHERE username = ?")
                .bind(now_ms())
                .bind(username)
                .execute(&self.pool)
                .await;
        }
        ok
    }

    async fn account_exists(&self, username: &str) -> bool {
        self.load_account(username).await.is_some()
    }

    async fn get_privacy(&self, username: &str) -> Privacy {
        match self.load_account(username).await {
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
        let result = sqlx::query(
            r#"INSERT INTO history
               (timestamp_ms, sender, target, body, message_type, is_channel_message, reply_to_id)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(now_ms())
        .bind(sender)
        .bind(target)
        .bind(body)
        .bind(message_type)
        .bind(is_channel)
        .bind(reply_to_id)
        .execute(&self.pool)
        .await
        .ok()?;
        Some(result.last_insert_rowid())
    }

    async fn get_channel_history(
        &self,
        channel: &str,
        limit: usize,
        before_ts: Option<i64>,
    ) -> Vec<HistoryEntry> {
        let cutoff = before_ts.unwrap_or(i64::MAX);
        sqlx::query(
            r#"SELECT * FROM history
               WHERE is_channel_message = 1 AND target = ? AND timestamp_ms < ?
               ORDER BY timestamp_ms DESC LIMIT ?"#,
        )
        .bind(channel)
        .bind(cutoff)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(row_to_history)
        .rev()
        .collect()
    }

    async fn get_private_history(
        &self,
        u1: &str,
        u2: &str,
        limit: usize,
        before_ts: Option<i64>,
    ) -> Vec<HistoryEntry> {
        let cutoff = before_ts.unwrap_or(i64::MAX);
        sqlx::query(
            r#"SELECT * FROM history
               WHERE is_channel_message = 0 AND timestamp_ms < ?
                     AND ((sender = ? AND target = ?) OR (sender = ? AND target = ?))
               ORDER BY timestamp_ms DESC LIMIT ?"#,
        )
        .bind(cutoff)
        .bind(u1)
        .bind(u2)
        .bind(u2)
        .bind(u1)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(row_to_history)
        .rev()
        .collect()
    }

    async fn search(&self, query: &str, target: Option<&str>, limit: usize) -> Vec<HistoryEntry> {
        let pattern = format!("%{query}%");
        let rows = match target {
            Some(t) => {
                sqlx::query("SELECT * FROM history WHERE body LIKE ? AND target = ? ORDER BY timestamp_ms DESC LIMIT ?")
                    .bind(pattern)
                    .bind(t)
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM history WHERE body LIKE ? ORDER BY timestamp_ms DESC LIMIT ?")
                    .bind(pattern)
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await
            }
        };
        rows.unwrap_or_default().into_iter().map(row_to_history).collect()
    }

    async fn get_messages_by_sender(&self, sender: &str, limit: usize) -> Vec<HistoryEntry> {
        sqlx::query("SELECT * FROM history WHERE sender = ? ORDER BY timestamp_ms DESC LIMIT ?")
            .bind(sender)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(row_to_history)
            .collect()
    }

    async fn get_message(&self, id: i64) -> Option<HistoryEntry> {
        sqlx::query("SELECT * FROM history WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .ok()?
            .map(row_to_history)
    }

    async fn get_replies(&self, parent_id: i64, limit: usize) -> Vec<HistoryEntry> {
        sqlx::query("SELECT * FROM history WHERE reply_to_id = ? ORDER BY timestamp_ms ASC LIMIT ?")
            .bind(parent_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(row_to_history)
            .collect()
    }

    async fn cleanup_older_than_ms(&self, cutoff_ts: i64) -> u64 {
        sqlx::query("DELETE FROM history WHERE timestamp_ms < ?")
            .bind(cutoff_ts)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .unwrap_or(0)
    }
}
