//! The command catalog this server dispatches on (spec §4.B).
//!
//! Unlike the teacher's fully-typed S2S/service command enum, this surface is
//! exactly the client commands named in the catalog: a plain name lookup, not
//! a parsed variant carrying its own arguments (`Message::params`/`trailing`
//! already carries those).

/// Registration & connection negotiation.
pub const PASS: &str = "PASS";
pub const NICK: &str = "NICK";
pub const USER: &str = "USER";
pub const CAP: &str = "CAP";
pub const AUTHENTICATE: &str = "AUTHENTICATE";
pub const QUIT: &str = "QUIT";
pub const PING: &str = "PING";
pub const PONG: &str = "PONG";
pub const ERROR: &str = "ERROR";

/// Channel operations.
pub const JOIN: &str = "JOIN";
pub const PART: &str = "PART";
pub const MODE: &str = "MODE";
pub const TOPIC: &str = "TOPIC";
pub const NAMES: &str = "NAMES";
pub const LIST: &str = "LIST";
pub const INVITE: &str = "INVITE";
pub const KICK: &str = "KICK";

/// Messaging.
pub const PRIVMSG: &str = "PRIVMSG";
pub const NOTICE: &str = "NOTICE";

/// User/server queries.
pub const WHO: &str = "WHO";
pub const WHOIS: &str = "WHOIS";
pub const WHOWAS: &str = "WHOWAS";
pub const USERHOST: &str = "USERHOST";
pub const ISON: &str = "ISON";
pub const AWAY: &str = "AWAY";
pub const VERSION: &str = "VERSION";
pub const ADMIN: &str = "ADMIN";
pub const TIME: &str = "TIME";
pub const INFO: &str = "INFO";
pub const MOTD: &str = "MOTD";

/// Operator privileges.
pub const OPER: &str = "OPER";
pub const KILL: &str = "KILL";

/// A command name as lifted off the wire, matched case-insensitively at parse
/// time (`Message::command` is already upper-cased).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Command(pub &'static str);

/// All command names this server recognizes, for CAP-independent dispatch
/// validation and `HELP`/introspection-style tooling.
pub const ALL: &[&str] = &[
    PASS, NICK, USER, CAP, AUTHENTICATE, QUIT, PING, PONG, ERROR, JOIN, PART, MODE, TOPIC, NAMES,
    LIST, INVITE, KICK, PRIVMSG, NOTICE, WHO, WHOIS, WHOWAS, USERHOST, ISON, AWAY, VERSION, ADMIN,
    TIME, INFO, MOTD, OPER, KILL,
];

/// Look up the canonical `&'static str` for a command name received on the
/// wire (already upper-cased by the parser), if recognized.
pub fn canonical(name: &str) -> Option<&'static str> {
    ALL.iter().find(|&&c| c == name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_recognizes_known_commands() {
        assert_eq!(canonical("PRIVMSG"), Some(PRIVMSG));
        assert_eq!(canonical("BOGUS"), None);
    }
}
