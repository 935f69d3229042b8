//! Numeric reply catalog and server-message builders (spec §4.B).

use crate::message::{Message, Tag};

/// Numeric replies this server emits, grouped the way RFC 2812 groups them.
///
/// Only the subset §4.B names is represented; this is deliberately smaller
/// than the teacher's `#[non_exhaustive]` catalog of every S2S/service reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum Response {
    // --- 001-005: welcome burst ---
    RplWelcome = 1,
    RplYourHost = 2,
    RplCreated = 3,
    RplMyInfo = 4,
    RplISupport = 5,

    // --- 2xx: user-mode / stats ---
    RplUModeIs = 221,

    // --- 3xx: query replies ---
    RplAway = 301,
    RplUserhost = 302,
    RplIson = 303,
    RplUnaway = 305,
    RplNowAway = 306,
    RplWhoisUser = 311,
    RplWhoisServer = 312,
    RplWhoisOperator = 313,
    RplWhowasUser = 314,
    RplEndOfWho = 315,
    RplWhoisIdle = 317,
    RplEndOfWhois = 318,
    RplWhoisChannels = 319,
    RplWhoisAccount = 330,
    RplListStart = 321,
    RplList = 322,
    RplListEnd = 323,
    RplChannelModeIs = 324,
    RplNoTopic = 331,
    RplTopic = 332,
    RplInviting = 341,
    RplWhoReply = 352,
    RplNameReply = 353,
    RplEndOfNames = 366,
    RplBanList = 367,
    RplEndOfBanList = 368,
    RplEndOfWhowas = 369,
    RplInfo = 371,
    RplMotd = 372,
    RplEndOfInfo = 374,
    RplMotdStart = 375,
    RplEndOfMotd = 376,
    RplYoureOper = 381,
    RplVersion = 351,
    RplTime = 391,
    RplAdminMe = 256,
    RplAdminLoc1 = 257,
    RplAdminLoc2 = 258,
    RplAdminEmail = 259,

    // --- 4xx/5xx: errors ---
    ErrNoSuchNick = 401,
    ErrWasNoSuchNick = 406,
    ErrNoMotd = 422,
    ErrNoSuchChannel = 403,
    ErrCannotSendToChan = 404,
    ErrUnknownCommand = 421,
    ErrNicknameInUse = 433,
    ErrNotOnChannel = 442,
    ErrUserOnChannel = 443,
    ErrNotRegistered = 451,
    ErrNeedMoreParams = 461,
    ErrAlreadyRegistered = 462,
    ErrPasswdMismatch = 464,
    ErrBannedFromChan = 474,
    ErrChannelIsFull = 471,
    ErrInviteOnlyChan = 473,
    ErrBadChannelKey = 475,
    ErrNoNickGiven = 431,
    ErrErroneousNickname = 432,
    ErrUserNotInChannel = 441,
    ErrUnknownMode = 472,
    ErrChanOPrivsNeeded = 482,
    ErrUModeUnknownFlag = 501,
    ErrUsersDontMatch = 502,

    // --- 9xx: SASL (IRCv3) ---
    RplSaslSuccess = 903,
    RplLoggedIn = 900,
    ErrSaslFail = 904,
    ErrSaslTooLong = 905,
    ErrSaslAborted = 906,
    ErrSaslAlready = 907,
}

impl Response {
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Build a numeric reply addressed to `target_nick` with `params` as the
/// remaining middle parameters and `trailing` as the human-readable text.
pub fn numeric(
    server_name: &str,
    reply: Response,
    target_nick: &str,
    params: Vec<String>,
    trailing: Option<String>,
) -> Message {
    let mut all_params = vec![target_nick.to_string()];
    all_params.extend(params);
    Message::new(format!("{:03}", reply.code()), all_params, trailing).with_prefix(server_name)
}

/// The 001-004 welcome burst (005 ISUPPORT and 900 logged-in are appended by
/// the caller when applicable, per §4.B and §9).
pub fn welcome_burst(server_name: &str, nick: &str, user: &str, host: &str) -> Vec<Message> {
    vec![
        numeric(
            server_name,
            Response::RplWelcome,
            nick,
            vec![],
            Some(format!(
                "Welcome to the Internet Relay Network {nick}!{user}@{host}"
            )),
        ),
        numeric(
            server_name,
            Response::RplYourHost,
            nick,
            vec![],
            Some(format!("Your host is {server_name}, running version malefirc-1.0")),
        ),
        numeric(
            server_name,
            Response::RplCreated,
            nick,
            vec![],
            Some("This server was created today".to_string()),
        ),
        numeric(
            server_name,
            Response::RplMyInfo,
            nick,
            vec![server_name.to_string(), "malefirc-1.0".to_string()],
            None,
        ),
    ]
}

/// `332`/`331`: topic reply for `chan`, present or absent.
pub fn topic_reply(server_name: &str, nick: &str, chan: &str, topic: Option<&str>) -> Message {
    match topic {
        Some(t) => numeric(
            server_name,
            Response::RplTopic,
            nick,
            vec![chan.to_string()],
            Some(t.to_string()),
        ),
        None => numeric(
            server_name,
            Response::RplNoTopic,
            nick,
            vec![chan.to_string()],
            Some("No topic is set".to_string()),
        ),
    }
}

/// `353`+`366`: the NAMES list for a channel, already split by the caller
/// into as many lines as needed and rendered with `@`/`+` prefixes.
pub fn names_reply(server_name: &str, nick: &str, chan: &str, names: &[String]) -> Vec<Message> {
    let mut out = vec![numeric(
        server_name,
        Response::RplNameReply,
        nick,
        vec!["=".to_string(), chan.to_string()],
        Some(names.join(" ")),
    )];
    out.push(numeric(
        server_name,
        Response::RplEndOfNames,
        nick,
        vec![chan.to_string()],
        Some("End of /NAMES list".to_string()),
    ));
    out
}

/// A generic numeric error reply with a single trailing text.
pub fn error_reply(server_name: &str, nick: &str, reply: Response, text: impl Into<String>) -> Message {
    numeric(server_name, reply, nick, vec![], Some(text.into()))
}

/// A numeric error reply with leading params before the trailing text, e.g.
/// `433 <nick> <attempted-nick> :Nickname is already in use`.
pub fn error_reply_with_params(
    server_name: &str,
    nick: &str,
    reply: Response,
    params: Vec<String>,
    text: impl Into<String>,
) -> Message {
    numeric(server_name, reply, nick, params, Some(text.into()))
}

/// `:<mask> PRIVMSG <target> :<text>`, tagged with `msgid` and, if present,
/// the `+reply` client tag being echoed back.
pub fn privmsg(mask: &str, target: &str, text: &str, msgid: Option<&str>, reply_to: Option<&str>) -> Message {
    chat_message("PRIVMSG", mask, target, text, msgid, reply_to)
}

/// Same shape as [`privmsg`] but for NOTICE, which never carries `+reply`.
pub fn notice(mask: &str, target: &str, text: &str, msgid: Option<&str>) -> Message {
    chat_message("NOTICE", mask, target, text, msgid, None)
}

fn chat_message(
    command: &str,
    mask: &str,
    target: &str,
    text: &str,
    msgid: Option<&str>,
    reply_to: Option<&str>,
) -> Message {
    let mut tags = Vec::new();
    if let Some(id) = msgid {
        tags.push(Tag::new("msgid", Some(id)));
    }
    if let Some(r) = reply_to {
        tags.push(Tag::new("+reply", Some(r)));
    }
    Message::new(command, vec![target.to_string()], Some(text.to_string()))
        .with_prefix(mask)
        .with_tags(tags)
}

/// `:<mask> JOIN <chan>`.
pub fn join(mask: &str, chan: &str) -> Message {
    Message::new("JOIN", vec![chan.to_string()], None).with_prefix(mask)
}

/// `:<mask> PART <chan>[ :<reason>]`.
pub fn part(mask: &str, chan: &str, reason: Option<&str>) -> Message {
    Message::new("PART", vec![chan.to_string()], reason.map(str::to_string)).with_prefix(mask)
}

/// `:<mask> QUIT :<reason>`.
pub fn quit(mask: &str, reason: &str) -> Message {
    Message::new("QUIT", vec![], Some(reason.to_string())).with_prefix(mask)
}

/// `PING :<token>` / `PONG :<token>`, sent from the server itself (no prefix needed
/// on output, mirroring what real servers send for keepalive).
pub fn ping(token: &str) -> Message {
    Message::new("PING", vec![], Some(token.to_string()))
}

pub fn pong(server_name: &str, token: &str) -> Message {
    Message::new("PONG", vec![server_name.to_string()], Some(token.to_string()))
}

/// `:<inviter-mask> INVITE <target-nick> <chan>`.
pub fn invite(inviter_mask: &str, target_nick: &str, chan: &str) -> Message {
    Message::new("INVITE", vec![target_nick.to_string(), chan.to_string()], None)
        .with_prefix(inviter_mask)
}

/// `:<kicker-mask> KICK <chan> <target> :<reason>`.
pub fn kick(kicker_mask: &str, chan: &str, target: &str, reason: &str) -> Message {
    Message::new(
        "KICK",
        vec![chan.to_string(), target.to_string()],
        Some(reason.to_string()),
    )
    .with_prefix(kicker_mask)
}

/// `:<mask> MODE <target> <modestring> [args...]`.
pub fn mode_change(mask: &str, target: &str, modestring: &str, args: Vec<String>) -> Message {
    let mut params = vec![target.to_string(), modestring.to_string()];
    params.extend(args);
    Message::new("MODE", params, None).with_prefix(mask)
}
