//! Connected-user state (spec §3.1/§3.2).

use std::collections::BTreeSet;

/// A connected user as seen by the rest of the world: identity plus the
/// per-user mode flags that affect routing (away, operator, invisible).
///
/// Field layout mirrors the teacher's `state/user.rs`; the CRDT merge
/// machinery (`to_crdt`/`merge_crdt`/`HybridTimestamp`) has no counterpart
/// here since there is no distributed sync in this server.
#[derive(Clone, Debug)]
pub struct User {
    pub nickname: String,
    pub username: String,
    pub realname: String,
    pub host: String,
    pub modes: UserModes,
    pub away_message: Option<String>,
    pub channels: BTreeSet<String>,
    pub authenticated: bool,
    pub account_name: Option<String>,
    pub signon_time_ms: i64,
}

impl User {
    pub fn new(nickname: String, username: String, realname: String, host: String, signon_time_ms: i64) -> Self {
        User {
            nickname,
            username,
            realname,
            host,
            modes: UserModes::default(),
            away_message: None,
            channels: BTreeSet::new(),
            authenticated: false,
            account_name: None,
            signon_time_ms,
        }
    }

    pub fn hostmask(&self) -> String {
        format!("{}!{}@{}", self.nickname, self.username, self.host)
    }

    pub fn is_away(&self) -> bool {
        self.away_message.is_some()
    }

    pub fn is_operator(&self) -> bool {
        self.modes.has('o')
    }
}

/// User-mode flags (RFC 2812 §3.1.5/§3.1.6). Only `o` (operator) is
/// privileged; the rest are plain self-service toggles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserModes {
    flags: BTreeSet<char>,
}

impl UserModes {
    pub fn has(&self, c: char) -> bool {
        self.flags.contains(&c)
    }

    pub fn set(&mut self, c: char) -> bool {
        self.flags.insert(c)
    }

    pub fn unset(&mut self, c: char) -> bool {
        self.flags.remove(&c)
    }

    /// Render as `+abc` (empty string if no flags are set).
    pub fn as_mode_string(&self) -> String {
        if self.flags.is_empty() {
            return String::new();
        }
        let mut s = String::with_capacity(self.flags.len() + 1);
        s.push('+');
        s.extend(self.flags.iter());
        s
    }
}
