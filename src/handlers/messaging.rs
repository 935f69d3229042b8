//! PRIVMSG / NOTICE: routing, history persistence, `@nick` mentions (spec §4.F).

use lazy_static::lazy_static;
use regex::Regex;

use malefirc_proto::response;
use malefirc_proto::Message;

use crate::error::HandlerError;

use super::{channel_recipients, require_nick, send_to_recipients, HandlerContext, Session};

lazy_static! {
    static ref MENTION_RE: Regex = Regex::new(r"@([A-Za-z0-9_\-\[\]\\{}^|]+)").unwrap();
}

/// Shared by PRIVMSG and NOTICE; `auto_reply` is false for NOTICE, which
/// never triggers mention notices (spec §4.F).
pub async fn handle_message(
    ctx: &HandlerContext,
    session: &mut Session,
    msg: &Message,
    auto_reply: bool,
) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    let target = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?.to_string();
    let body = msg.trailing.clone().ok_or(HandlerError::NeedMoreParams)?;
    let command = if auto_reply { "PRIVMSG" } else { "NOTICE" };
    let reply_to: Option<i64> = msg.tag("+reply").and_then(|v| v.parse().ok());

    let handle = ctx.world.get(&nick).ok_or(HandlerError::NotRegistered)?;
    let hostmask = handle.user.lock().hostmask();

    if target.starts_with('#') {
        let chan_arc = ctx
            .world
            .get_channel(&target)
            .ok_or_else(|| HandlerError::NoSuchChannel(target.clone()))?;
        let recipients = {
            let chan = chan_arc.lock();
            if chan.modes.no_external_messages && !chan.is_member(&nick) {
                return Err(HandlerError::CannotSendToChan(target.clone()));
            }
            if chan.modes.moderated && !chan.is_operator(&nick) && !chan.is_voiced(&nick) {
                return Err(HandlerError::CannotSendToChan(target.clone()));
            }
            // Recipients are snapshotted under the same lock as the
            // moderation checks so this broadcast can't be reordered around
            // another handler's mutate-then-broadcast on this channel
            // (spec §5).
            channel_recipients(ctx, &chan, Some(&nick))
        };

        let privacy = ctx.store.get_privacy(&nick).await;
        let msgid = if privacy.allow_logging {
            ctx.store
                .append_history(&nick, &target, &body, command, true, reply_to)
                .await
                .map(|id| id.to_string())
        } else {
            None
        };

        let outgoing = build_chat_message(auto_reply, &hostmask, &target, &body, msgid.as_deref(), reply_to);
        send_to_recipients(recipients, outgoing).await;

        if auto_reply {
            notify_mentions(ctx, &nick, &target, &body).await;
        }
        return Ok(());
    }

    let Some(target_handle) = ctx.world.get(&target) else {
        return Err(HandlerError::NoSuchNick(target));
    };

    let privacy = ctx.store.get_privacy(&nick).await;
    let msgid = if privacy.allow_logging {
        ctx.store
            .append_history(&nick, &target, &body, command, false, reply_to)
            .await
            .map(|id| id.to_string())
    } else {
        None
    };

    let outgoing = build_chat_message(auto_reply, &hostmask, &target, &body, msgid.as_deref(), reply_to);
    let _ = target_handle.sender.send(std::sync::Arc::new(outgoing)).await;
    Ok(())
}

fn build_chat_message(
    is_privmsg: bool,
    mask: &str,
    target: &str,
    body: &str,
    msgid: Option<&str>,
    reply_to: Option<i64>,
) -> Message {
    if is_privmsg {
        response::privmsg(mask, target, body, msgid, reply_to.map(|id| id.to_string()).as_deref())
    } else {
        response::notice(mask, target, body, msgid)
    }
}

/// Send a server NOTICE to every `@nick`-mentioned current channel member
/// other than the sender.
async fn notify_mentions(ctx: &HandlerContext, sender: &str, chan_name: &str, body: &str) {
    let Some(chan_arc) = ctx.world.get_channel(chan_name) else {
        return;
    };
    for candidate in MENTION_RE.captures_iter(body) {
        let mentioned = candidate.get(1).unwrap().as_str();
        if mentioned.eq_ignore_ascii_case(sender) {
            continue;
        }
        let is_member = chan_arc.lock().is_member(mentioned);
        if !is_member {
            continue;
        }
        let Some(target_handle) = ctx.world.get(mentioned) else {
            continue;
        };
        let notice = response::notice(
            &ctx.config.server_name,
            mentioned,
            &format!("{sender} mentioned you in {chan_name}: {body}"),
            None,
        );
        let _ = target_handle.sender.send(std::sync::Arc::new(notice)).await;
    }
}
