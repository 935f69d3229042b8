//! IRCv3 capability negotiation (spec §4.E).
//!
//! A deliberately small replacement for the teacher's unforgeable
//! capability-token framework (`Cap<T>`/`CapabilityAuthority` in
//! `src/caps/` + `src/caps/tokens.rs`): this server advertises exactly
//! three capabilities and tracks which a session has enabled as a plain
//! `BTreeSet`, since nothing here needs proof-carrying tokens.

use std::collections::BTreeSet;

pub const SASL: &str = "sasl";
pub const MESSAGE_TAGS: &str = "message-tags";
pub const MSGID: &str = "msgid";

pub const ADVERTISED: &[&str] = &[SASL, MESSAGE_TAGS, MSGID];

#[derive(Clone, Debug, Default)]
pub struct CapState {
    enabled: BTreeSet<String>,
}

impl CapState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    /// `CAP LS` response body: the space-joined advertised set.
    pub fn ls_reply() -> String {
        ADVERTISED.join(" ")
    }

    /// `CAP REQ <names>`: all-or-nothing per spec §4.E. Returns `(acked, body)`
    /// where `body` is the text to echo back on the ACK/NAK line.
    pub fn request(&mut self, requested: &str) -> (bool, String) {
        let names: Vec<&str> = requested.split_whitespace().collect();
        if names.iter().all(|n| ADVERTISED.contains(n)) {
            for n in &names {
                self.enabled.insert(n.to_string());
            }
            (true, names.join(" "))
        } else {
            (false, names.join(" "))
        }
    }
}
