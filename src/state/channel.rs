//! Channel state: membership, modes, topic, ban/invite lists (spec §3.1/§3.2).

use indexmap::IndexMap;

/// Per-member flags within one channel. The teacher's richer five-tier
/// (`~ & @ % +`) prefix ladder is not part of this spec; only op and voice
/// exist here.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemberModes {
    pub op: bool,
    pub voice: bool,
}

impl MemberModes {
    /// The single prefix character NAMES/WHO render ahead of a nick, if any.
    pub fn prefix_char(&self) -> Option<char> {
        if self.op {
            Some('@')
        } else if self.voice {
            Some('+')
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ChannelModes {
    /// `n`: no external messages (sender must be a member).
    pub no_external_messages: bool,
    /// `s`: secret (omitted from LIST unless caller is a member).
    pub secret: bool,
    /// `i`: invite-only.
    pub invite_only: bool,
    /// `t`: topic changes require channel-operator privileges.
    pub topic_locked: bool,
    /// `m`: moderated (only ops/voiced may PRIVMSG).
    pub moderated: bool,
    pub key: Option<String>,
    pub limit: Option<usize>,
    /// `b`: ban masks (`nick!user@host` with `*`/`?` wildcards).
    pub bans: Vec<String>,
}

impl ChannelModes {
    /// Render the non-argument flags as `+nst...`, matching RFC 324's
    /// `<channel mode string>` (key/limit are appended by the caller, since
    /// whether to reveal them depends on context).
    pub fn flag_string(&self) -> String {
        let mut s = String::from("+");
        if self.no_external_messages {
            s.push('n');
        }
        if self.secret {
            s.push('s');
        }
        if self.invite_only {
            s.push('i');
        }
        if self.topic_locked {
            s.push('t');
        }
        if self.moderated {
            s.push('m');
        }
        if self.key.is_some() {
            s.push('k');
        }
        if self.limit.is_some() {
            s.push('l');
        }
        s
    }
}

pub struct Channel {
    pub name: String,
    pub topic: Option<String>,
    pub modes: ChannelModes,
    /// Insertion-ordered so NAMES/WHO render members in join order.
    pub members: IndexMap<String, MemberModes>,
    pub invited: std::collections::HashSet<String>,
}

impl Channel {
    pub fn new(name: String) -> Self {
        Channel {
            name,
            topic: None,
            modes: ChannelModes::default(),
            members: IndexMap::new(),
            invited: std::collections::HashSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_member(&self, nick: &str) -> bool {
        self.members.contains_key(nick)
    }

    pub fn is_operator(&self, nick: &str) -> bool {
        self.members.get(nick).is_some_and(|m| m.op)
    }

    pub fn is_voiced(&self, nick: &str) -> bool {
        self.members.get(nick).is_some_and(|m| m.voice)
    }

    /// Rendered NAMES tokens (`@nick`, `+nick`, or bare `nick`) in join order.
    pub fn name_tokens(&self) -> Vec<String> {
        self.members
            .iter()
            .map(|(nick, modes)| match modes.prefix_char() {
                Some(c) => format!("{c}{nick}"),
                None => nick.clone(),
            })
            .collect()
    }

    pub fn matches_ban(&self, hostmask: &str) -> bool {
        self.modes.bans.iter().any(|mask| mask_matches(mask, hostmask))
    }
}

/// `*`/`?` glob match, case-insensitive (spec §3.2 invariant 6).
pub fn mask_matches(mask: &str, hostmask: &str) -> bool {
    fn helper(mask: &[u8], text: &[u8]) -> bool {
        match (mask.first(), text.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                helper(&mask[1..], text) || (!text.is_empty() && helper(mask, &text[1..]))
            }
            (Some(b'?'), Some(_)) => helper(&mask[1..], &text[1..]),
            (Some(m), Some(t)) if m.to_ascii_lowercase() == t.to_ascii_lowercase() => {
                helper(&mask[1..], &text[1..])
            }
            _ => false,
        }
    }
    helper(mask.as_bytes(), hostmask.as_bytes())
}
