//! Error types returned by connection and channel handlers.
//!
//! Mirrors the teacher's split between a per-connection `HandlerError` and a
//! per-channel `ChannelError`, each able to render itself as the numeric
//! reply the client should see.

use malefirc_proto::response::{self, Response};
use malefirc_proto::Message;
use thiserror::Error;

/// Errors raised while handling a single client command.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("not enough parameters")]
    NeedMoreParams,
    #[error("nickname {0} is already in use")]
    NicknameInUse(String),
    #[error("erroneous nickname {0}")]
    ErroneousNickname(String),
    #[error("client not registered")]
    NotRegistered,
    #[error("already registered")]
    AlreadyRegistered,
    #[error("no such nick/channel {0}")]
    NoSuchNick(String),
    #[error("no such channel {0}")]
    NoSuchChannel(String),
    #[error("cannot send to channel {0}")]
    CannotSendToChan(String),
    #[error("unknown command {0}")]
    UnknownCommand(String),
    #[error("password mismatch")]
    PasswdMismatch,
    #[error("unknown mode flag {0}")]
    UModeUnknownFlag(char),
    #[error("cannot change mode for other users")]
    UsersDontMatch,
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
    #[error("send failed")]
    Send(#[from] tokio::sync::mpsc::error::SendError<Message>),
    #[error("client disconnected")]
    Quit(Option<String>),
    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// A short, stable label for structured log fields (`error_code`).
    pub fn error_code(&self) -> &'static str {
        match self {
            HandlerError::NeedMoreParams => "need_more_params",
            HandlerError::NicknameInUse(_) => "nickname_in_use",
            HandlerError::ErroneousNickname(_) => "erroneous_nickname",
            HandlerError::NotRegistered => "not_registered",
            HandlerError::AlreadyRegistered => "already_registered",
            HandlerError::NoSuchNick(_) => "no_such_nick",
            HandlerError::NoSuchChannel(_) => "no_such_channel",
            HandlerError::CannotSendToChan(_) => "cannot_send_to_chan",
            HandlerError::UnknownCommand(_) => "unknown_command",
            HandlerError::PasswdMismatch => "passwd_mismatch",
            HandlerError::UModeUnknownFlag(_) => "umode_unknown_flag",
            HandlerError::UsersDontMatch => "users_dont_match",
            HandlerError::Channel(e) => e.error_code(),
            HandlerError::Send(_) => "send_failed",
            HandlerError::Quit(_) => "quit",
            HandlerError::Internal(_) => "internal",
        }
    }

    /// Render as the numeric reply to send back to `nick`, if any (`Quit`
    /// and transport errors produce no reply; the caller tears the
    /// connection down instead).
    pub fn to_irc_reply(&self, server_name: &str, nick: &str) -> Option<Message> {
        let (reply, params, text): (Response, Vec<String>, String) = match self {
            HandlerError::NeedMoreParams => {
                (Response::ErrNeedMoreParams, vec![], "Not enough parameters".into())
            }
            HandlerError::NicknameInUse(n) => (
                Response::ErrNicknameInUse,
                vec![n.clone()],
                "Nickname is already in use".into(),
            ),
            HandlerError::ErroneousNickname(n) => (
                Response::ErrErroneousNickname,
                vec![n.clone()],
                "Erroneous nickname".into(),
            ),
            HandlerError::NotRegistered => {
                (Response::ErrNotRegistered, vec![], "You have not registered".into())
            }
            HandlerError::AlreadyRegistered => (
                Response::ErrAlreadyRegistered,
                vec![],
                "Unauthorized command (already registered)".into(),
            ),
            HandlerError::NoSuchNick(n) => {
                (Response::ErrNoSuchNick, vec![n.clone()], "No such nick/channel".into())
            }
            HandlerError::NoSuchChannel(c) => {
                (Response::ErrNoSuchChannel, vec![c.clone()], "No such channel".into())
            }
            HandlerError::CannotSendToChan(c) => (
                Response::ErrCannotSendToChan,
                vec![c.clone()],
                "Cannot send to channel".into(),
            ),
            HandlerError::UnknownCommand(c) => (
                Response::ErrUnknownCommand,
                vec![c.clone()],
                "Unknown command".into(),
            ),
            HandlerError::PasswdMismatch => {
                (Response::ErrPasswdMismatch, vec![], "Password incorrect".into())
            }
            HandlerError::UModeUnknownFlag(c) => (
                Response::ErrUModeUnknownFlag,
                vec![],
                format!("Unknown MODE flag '{c}'"),
            ),
            HandlerError::UsersDontMatch => (
                Response::ErrUsersDontMatch,
                vec![],
                "Cannot change mode for other users".into(),
            ),
            HandlerError::Channel(e) => return e.to_irc_reply(server_name, nick),
            HandlerError::Send(_) | HandlerError::Quit(_) | HandlerError::Internal(_) => return None,
        };
        Some(response::error_reply_with_params(server_name, nick, reply, params, text))
    }
}

/// Errors raised while applying a channel-scoped operation (JOIN/PART/MODE/
/// TOPIC/KICK/INVITE).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("not on channel")]
    NotOnChannel,
    #[error("channel operator privileges needed")]
    ChanOpPrivsNeeded,
    #[error("user {0} not in channel")]
    UserNotInChannel(String),
    #[error("user {0} already on channel")]
    UserOnChannel(String),
    #[error("banned from channel")]
    BannedFromChan,
    #[error("invite only channel")]
    InviteOnlyChan,
    #[error("channel is full")]
    ChannelIsFull,
    #[error("bad channel key")]
    BadChannelKey,
    #[error("unknown mode {0} ({1})")]
    UnknownMode(char, String),
}

impl ChannelError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ChannelError::NotOnChannel => "not_on_channel",
            ChannelError::ChanOpPrivsNeeded => "chan_op_privs_needed",
            ChannelError::UserNotInChannel(_) => "user_not_in_channel",
            ChannelError::UserOnChannel(_) => "user_on_channel",
            ChannelError::BannedFromChan => "banned_from_chan",
            ChannelError::InviteOnlyChan => "invite_only_chan",
            ChannelError::ChannelIsFull => "channel_is_full",
            ChannelError::BadChannelKey => "bad_channel_key",
            ChannelError::UnknownMode(..) => "unknown_mode",
        }
    }

    pub fn to_irc_reply(&self, server_name: &str, nick: &str) -> Option<Message> {
        let (reply, params, text): (Response, Vec<String>, String) = match self {
            ChannelError::NotOnChannel => {
                (Response::ErrNotOnChannel, vec![], "You're not on that channel".into())
            }
            ChannelError::ChanOpPrivsNeeded => (
                Response::ErrChanOPrivsNeeded,
                vec![],
                "You're not channel operator".into(),
            ),
            ChannelError::UserNotInChannel(n) => (
                Response::ErrUserNotInChannel,
                vec![n.clone()],
                "They aren't on that channel".into(),
            ),
            ChannelError::UserOnChannel(n) => (
                Response::ErrUserOnChannel,
                vec![n.clone()],
                "is already on channel".into(),
            ),
            ChannelError::BannedFromChan => {
                (Response::ErrBannedFromChan, vec![], "Cannot join channel (+b)".into())
            }
            ChannelError::InviteOnlyChan => {
                (Response::ErrInviteOnlyChan, vec![], "Cannot join channel (+i)".into())
            }
            ChannelError::ChannelIsFull => {
                (Response::ErrChannelIsFull, vec![], "Cannot join channel (+l)".into())
            }
            ChannelError::BadChannelKey => {
                (Response::ErrBadChannelKey, vec![], "Cannot join channel (+k)".into())
            }
            ChannelError::UnknownMode(c, chan) => (
                Response::ErrUnknownMode,
                vec![c.to_string(), chan.clone()],
                "is unknown mode char to me".into(),
            ),
        };
        Some(response::error_reply_with_params(server_name, nick, reply, params, text))
    }
}
