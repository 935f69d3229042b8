//! Process-wide concurrency-safe registry (spec §4.D).
//!
//! Two sharded maps — nickname→connection handle, channel-name→`Channel` —
//! mirror the teacher's `state/managers/*.rs` pattern of a `DashMap` keyed
//! by lowercased name with per-entity locking, instead of one giant mutex.

pub mod channel;
pub mod user;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use malefirc_proto::Message;
use parking_lot::Mutex;
use tokio::sync::mpsc;

pub use channel::{Channel, ChannelModes, MemberModes};
pub use user::{User, UserModes};

/// Bound on the per-connection outbound queue (spec §4.G).
pub const OUTBOUND_QUEUE_DEPTH: usize = 256;

pub type OutboundSender = mpsc::Sender<Arc<Message>>;

/// Everything the world knows about one connected client, keyed by
/// lowercased nickname.
pub struct ConnectionHandle {
    pub user: Mutex<User>,
    pub sender: OutboundSender,
}

/// A disconnect record kept for `WHOWAS`.
#[derive(Clone, Debug)]
pub struct WhowasEntry {
    pub nickname: String,
    pub username: String,
    pub realname: String,
    pub host: String,
    pub disconnected_at_ms: i64,
}

#[derive(Default)]
pub struct World {
    users: DashMap<String, Arc<ConnectionHandle>>,
    channels: DashMap<String, Arc<Mutex<Channel>>>,
    whowas: Mutex<Vec<WhowasEntry>>,
}

fn fold(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl World {
    pub fn new() -> Self {
        World::default()
    }

    /// Register a brand-new nickname. Fails if already taken (spec invariant 1).
    pub fn register_nick(&self, handle: Arc<ConnectionHandle>) -> Result<(), ()> {
        let nick = fold(&handle.user.lock().nickname);
        match self.users.entry(nick) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(()),
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(handle);
                Ok(())
            }
        }
    }

    /// Atomically rename a connected user, failing if the new name is taken.
    ///
    /// Releases the old-key shard lock before taking the new-key one (rather
    /// than holding both at once, which could deadlock if they hash to the
    /// same shard); the new-key `entry()` call is what makes the "is it
    /// taken" check and the insert atomic, closing the TOCTOU window between
    /// a separate `contains_key` and `insert`.
    pub fn rename_nick(&self, old: &str, new: &str) -> Result<(), ()> {
        let old_key = fold(old);
        let new_key = fold(new);
        if old_key == new_key {
            return Ok(());
        }
        let Some((_, handle)) = self.users.remove(&old_key) else {
            return Err(());
        };
        match self.users.entry(new_key) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                self.users.insert(old_key, handle);
                Err(())
            }
            dashmap::mapref::entry::Entry::Vacant(v) => {
                handle.user.lock().nickname = new.to_string();
                v.insert(handle);
                Ok(())
            }
        }
    }

    pub fn remove_nick(&self, nick: &str) -> Option<Arc<ConnectionHandle>> {
        let handle = self.users.remove(&fold(nick)).map(|(_, h)| h);
        if let Some(h) = &handle {
            let user = h.user.lock();
            self.record_whowas(&user);
        }
        handle
    }

    pub fn get(&self, nick: &str) -> Option<Arc<ConnectionHandle>> {
        self.users.get(&fold(nick)).map(|e| e.value().clone())
    }

    pub fn contains_nick(&self, nick: &str) -> bool {
        self.users.contains_key(&fold(nick))
    }

    pub fn nick_count(&self) -> usize {
        self.users.len()
    }

    /// All currently connected handles, for USERHOST/ISON-style fan-out.
    pub fn all_users(&self) -> Vec<Arc<ConnectionHandle>> {
        self.users.iter().map(|e| e.value().clone()).collect()
    }

    pub fn get_channel(&self, name: &str) -> Option<Arc<Mutex<Channel>>> {
        self.channels.get(&fold(name)).map(|e| e.value().clone())
    }

    pub fn get_or_create_channel(&self, name: &str) -> Arc<Mutex<Channel>> {
        self.channels
            .entry(fold(name))
            .or_insert_with(|| Arc::new(Mutex::new(Channel::new(name.to_string()))))
            .clone()
    }

    /// Remove the channel if it has no members left (spec invariant 3). Call
    /// after releasing the channel's own lock to avoid holding two locks.
    pub fn destroy_channel_if_empty(&self, name: &str) {
        let key = fold(name);
        if let Some(chan) = self.channels.get(&key) {
            if !chan.lock().is_empty() {
                return;
            }
        } else {
            return;
        }
        self.channels.remove_if(&key, |_, chan| chan.lock().is_empty());
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|e| e.value().lock().name.clone()).collect()
    }

    fn record_whowas(&self, user: &User) {
        let mut log = self.whowas.lock();
        log.push(WhowasEntry {
            nickname: user.nickname.clone(),
            username: user.username.clone(),
            realname: user.realname.clone(),
            host: user.host.clone(),
            disconnected_at_ms: now_ms(),
        });
    }

    /// Most recent `limit` disconnect records for `nick`, newest first.
    pub fn whowas(&self, nick: &str, limit: usize) -> Vec<WhowasEntry> {
        let key = fold(nick);
        self.whowas
            .lock()
            .iter()
            .rev()
            .filter(|e| fold(&e.nickname) == key)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Drop WHOWAS records older than `max_age_ms` (housekeeping task).
    pub fn prune_whowas(&self, max_age_ms: i64) {
        let cutoff = now_ms() - max_age_ms;
        self.whowas.lock().retain(|e| e.disconnected_at_ms >= cutoff);
    }
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
