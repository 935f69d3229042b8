//! Command dispatcher and per-area handler modules (spec §4.F).
//!
//! Mirrors the teacher's `handlers/core/registry.rs` trait-object-per-command
//! shape in spirit, simplified to a single uppercase-command `match` since
//! this server's command surface is the ~30 names in §4.B rather than the
//! teacher's full S2S/service catalog.

pub mod channel;
pub mod connection;
pub mod messaging;
pub mod mode;
pub mod oper;
pub mod server_query;
pub mod user_query;

use std::sync::Arc;

use malefirc_proto::{command, Message};
use tracing::warn;

use crate::caps::CapState;
use crate::config::Config;
use crate::db::Store;
use crate::error::HandlerError;
use crate::state::{OutboundSender, World};
use malefirc_proto::sasl::PlainAssembler;

/// Shared, immutable dependencies every handler needs.
pub struct HandlerContext {
    pub world: Arc<World>,
    pub store: Arc<dyn Store>,
    pub config: Arc<Config>,
}

/// Per-connection, handler-owned state that isn't yet (or no longer) part of
/// `World` — everything tracked before a nickname is claimed, plus the
/// session's own outbound channel and capability set.
pub struct Session {
    pub uid: u64,
    pub host: String,
    pub nickname: Option<String>,
    pub username: Option<String>,
    pub realname: Option<String>,
    pub registered: bool,
    pub caps: CapState,
    pub sasl: Option<PlainAssembler>,
    pub pending_pass: Option<String>,
    pub authenticated: bool,
    pub account_name: Option<String>,
    pub sender: OutboundSender,
}

impl Session {
    pub fn new(uid: u64, host: String, sender: OutboundSender) -> Self {
        Session {
            uid,
            host,
            nickname: None,
            username: None,
            realname: None,
            registered: false,
            caps: CapState::new(),
            sasl: None,
            pending_pass: None,
            authenticated: false,
            account_name: None,
            sender,
        }
    }
}

/// Send one message to this session's own outbound queue.
pub async fn reply(session: &Session, msg: Message) {
    let _ = session.sender.send(Arc::new(msg)).await;
}

pub async fn reply_all(session: &Session, msgs: Vec<Message>) {
    for msg in msgs {
        reply(session, msg).await;
    }
}

/// Dispatch one parsed line. Registration-gate (spec invariant 5) is
/// enforced here: outside the handshake set, Unregistered clients are
/// silently dropped rather than erroring.
pub async fn dispatch(ctx: &HandlerContext, session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    let cmd = msg.command.as_str();

    const HANDSHAKE: &[&str] = &[
        command::PASS,
        command::CAP,
        command::AUTHENTICATE,
        command::NICK,
        command::USER,
        command::QUIT,
        command::PING,
    ];

    if !session.registered && !HANDSHAKE.contains(&cmd) {
        warn!(uid = session.uid, command = cmd, "dropped command before registration");
        return Ok(());
    }

    match cmd {
        command::PASS => connection::handle_pass(ctx, session, msg).await,
        command::CAP => connection::handle_cap(session, msg).await,
        command::AUTHENTICATE => connection::handle_authenticate(ctx, session, msg).await,
        command::NICK => connection::handle_nick(ctx, session, msg).await,
        command::USER => connection::handle_user(ctx, session, msg).await,
        command::PING => connection::handle_ping(ctx, session, msg).await,
        command::QUIT => Err(HandlerError::Quit(msg.trailing.clone())),

        command::JOIN => channel::handle_join(ctx, session, msg).await,
        command::PART => channel::handle_part(ctx, session, msg).await,
        command::TOPIC => channel::handle_topic(ctx, session, msg).await,
        command::NAMES => channel::handle_names(ctx, session, msg).await,
        command::LIST => channel::handle_list(ctx, session, msg).await,
        command::INVITE => channel::handle_invite(ctx, session, msg).await,
        command::KICK => channel::handle_kick(ctx, session, msg).await,

        command::MODE => mode::handle_mode(ctx, session, msg).await,

        command::PRIVMSG => messaging::handle_message(ctx, session, msg, true).await,
        command::NOTICE => messaging::handle_message(ctx, session, msg, false).await,

        command::WHO => user_query::handle_who(ctx, session, msg).await,
        command::WHOIS => user_query::handle_whois(ctx, session, msg).await,
        command::WHOWAS => user_query::handle_whowas(ctx, session, msg).await,
        command::USERHOST => user_query::handle_userhost(ctx, session, msg).await,
        command::ISON => user_query::handle_ison(ctx, session, msg).await,
        command::AWAY => user_query::handle_away(ctx, session, msg).await,

        command::OPER => oper::handle_oper(ctx, session, msg).await,

        command::VERSION => server_query::handle_version(ctx, session).await,
        command::ADMIN => server_query::handle_admin(ctx, session).await,
        command::TIME => server_query::handle_time(ctx, session).await,
        command::INFO => server_query::handle_info(ctx, session).await,
        command::MOTD => server_query::handle_motd(ctx, session).await,

        other => {
            if session.registered {
                Err(HandlerError::UnknownCommand(other.to_string()))
            } else {
                Ok(())
            }
        }
    }
}

/// The nickname this session currently owns, or `NotRegistered` if none.
pub(crate) fn require_nick(session: &Session) -> Result<&str, HandlerError> {
    session.nickname.as_deref().ok_or(HandlerError::NotRegistered)
}

/// Snapshot the connection handles a broadcast on `chan` should reach,
/// skipping `except_nick`. Takes `chan` already locked by the caller so a
/// handler can compute this in the same critical section as whatever
/// membership/mode change it just made (spec §5's per-channel ordering
/// guarantee: a channel's mutation and the recipient list for the broadcast
/// it triggers must be one atomic step, not two separate lock acquisitions
/// another handler's mutate-then-broadcast could interleave between).
pub fn channel_recipients(
    ctx: &HandlerContext,
    chan: &crate::state::Channel,
    except_nick: Option<&str>,
) -> Vec<Arc<crate::state::ConnectionHandle>> {
    chan.members
        .keys()
        .filter(|n| except_nick != Some(n.as_str()))
        .filter_map(|n| ctx.world.get(n))
        .collect()
}

/// Send `msg` once to every handle in `recipients`, wrapped in a single
/// `Arc` so the fan-out never clones the body per recipient (§4.G).
pub async fn send_to_recipients(recipients: Vec<Arc<crate::state::ConnectionHandle>>, msg: Message) {
    let arc_msg = Arc::new(msg);
    for handle in recipients {
        let _ = handle.sender.send(Arc::clone(&arc_msg)).await;
    }
}

/// Send `msg` once to every current member of `chan_name`. Locks `chan_name`
/// only for the recipient snapshot; prefer [`channel_recipients`] directly
/// when the broadcast follows a mutation on the same channel, so both steps
/// share one lock acquisition.
pub async fn broadcast_to_channel(ctx: &HandlerContext, chan_name: &str, msg: Message) {
    broadcast_to_channel_except(ctx, chan_name, msg, None).await;
}

/// Same as [`broadcast_to_channel`] but skips `except_nick` (e.g. the sender
/// of a PRIVMSG, which must not see its own message echoed back).
pub async fn broadcast_to_channel_except(
    ctx: &HandlerContext,
    chan_name: &str,
    msg: Message,
    except_nick: Option<&str>,
) {
    let Some(chan) = ctx.world.get_channel(chan_name) else {
        return;
    };
    let recipients = channel_recipients(ctx, &chan.lock(), except_nick);
    send_to_recipients(recipients, msg).await;
}
