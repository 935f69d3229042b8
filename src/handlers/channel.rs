//! JOIN, PART, TOPIC, NAMES, LIST, INVITE, KICK (spec §4.F).

use std::sync::Arc;

use malefirc_proto::response::{self, Response};
use malefirc_proto::Message;

use crate::error::{ChannelError, HandlerError};
use crate::state::MemberModes;

use super::{channel_recipients, reply, reply_all, require_nick, send_to_recipients, HandlerContext, Session};

pub async fn handle_join(ctx: &HandlerContext, session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    let chans_arg = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
    let keys_arg = msg.arg(1).unwrap_or("");
    let keys: Vec<&str> = if keys_arg.is_empty() {
        Vec::new()
    } else {
        keys_arg.split(',').collect()
    };

    for (i, chan_name) in chans_arg.split(',').enumerate() {
        if !chan_name.starts_with('#') {
            continue;
        }
        join_one(ctx, session, chan_name, keys.get(i).copied()).await?;
    }
    Ok(())
}

async fn join_one(ctx: &HandlerContext, session: &Session, chan_name: &str, key: Option<&str>) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    let handle = ctx.world.get(&nick).ok_or(HandlerError::NotRegistered)?;
    let hostmask = handle.user.lock().hostmask();

    let chan_arc = ctx.world.get_or_create_channel(chan_name);
    let recipients = {
        let mut chan = chan_arc.lock();
        let first_joiner = chan.members.is_empty();

        // Fixed check order per spec: ban -> invite-only -> key -> limit.
        if chan.matches_ban(&hostmask) {
            return Err(ChannelError::BannedFromChan.into());
        }
        if chan.modes.invite_only && !chan.invited.contains(&nick) {
            return Err(ChannelError::InviteOnlyChan.into());
        }
        if let Some(expected) = &chan.modes.key {
            if key != Some(expected.as_str()) {
                return Err(ChannelError::BadChannelKey.into());
            }
        }
        if let Some(limit) = chan.modes.limit {
            if chan.members.len() >= limit {
                return Err(ChannelError::ChannelIsFull.into());
            }
        }

        chan.members.insert(
            nick.clone(),
            MemberModes {
                op: first_joiner,
                voice: false,
            },
        );
        chan.invited.remove(&nick);
        // Recipients are snapshotted in the same critical section as the
        // membership change so another handler's own mutate-then-broadcast
        // on this channel can't interleave between the two (spec §5).
        channel_recipients(ctx, &chan, None)
    };

    handle.user.lock().channels.insert(chan_name.to_string());

    send_to_recipients(recipients, response::join(&hostmask, chan_name)).await;

    let (topic, names) = {
        let chan = chan_arc.lock();
        (chan.topic.clone(), chan.name_tokens())
    };
    reply(
        session,
        response::topic_reply(&ctx.config.server_name, &nick, chan_name, topic.as_deref()),
    )
    .await;
    reply_all(
        session,
        response::names_reply(&ctx.config.server_name, &nick, chan_name, &names),
    )
    .await;
    Ok(())
}

pub async fn handle_part(ctx: &HandlerContext, session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    let chan_name = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
    let handle = ctx.world.get(&nick).ok_or(HandlerError::NotRegistered)?;
    let hostmask = handle.user.lock().hostmask();

    let chan_arc = ctx
        .world
        .get_channel(chan_name)
        .ok_or_else(|| HandlerError::NoSuchChannel(chan_name.to_string()))?;

    let recipients = {
        let mut chan = chan_arc.lock();
        if !chan.is_member(&nick) {
            return Err(ChannelError::NotOnChannel.into());
        }
        // Snapshot before removal so the parting nick still receives its
        // own PART echo, and so the check/snapshot/removal is one atomic
        // step with respect to any other handler mutating this channel.
        let recipients = channel_recipients(ctx, &chan, None);
        chan.members.shift_remove(&nick);
        recipients
    };

    send_to_recipients(recipients, response::part(&hostmask, chan_name, msg.trailing.as_deref())).await;

    handle.user.lock().channels.remove(chan_name);
    ctx.world.destroy_channel_if_empty(chan_name);
    Ok(())
}

pub async fn handle_topic(ctx: &HandlerContext, session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    let chan_name = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
    let chan_arc = ctx
        .world
        .get_channel(chan_name)
        .ok_or_else(|| HandlerError::NoSuchChannel(chan_name.to_string()))?;

    if msg.trailing.is_none() {
        let topic = chan_arc.lock().topic.clone();
        reply(
            session,
            response::topic_reply(&ctx.config.server_name, &nick, chan_name, topic.as_deref()),
        )
        .await;
        return Ok(());
    }

    let recipients = {
        let mut chan = chan_arc.lock();
        if chan.modes.topic_locked && !chan.is_operator(&nick) {
            return Err(ChannelError::ChanOpPrivsNeeded.into());
        }
        chan.topic = msg.trailing.clone();
        channel_recipients(ctx, &chan, None)
    };

    let handle = ctx.world.get(&nick).ok_or(HandlerError::NotRegistered)?;
    let hostmask = handle.user.lock().hostmask();
    send_to_recipients(
        recipients,
        Message::new("TOPIC", vec![chan_name.to_string()], msg.trailing.clone()).with_prefix(hostmask),
    )
    .await;
    Ok(())
}

pub async fn handle_names(ctx: &HandlerContext, session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    let chan_name = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
    let names = ctx
        .world
        .get_channel(chan_name)
        .map(|c| c.lock().name_tokens())
        .unwrap_or_default();
    reply_all(
        session,
        response::names_reply(&ctx.config.server_name, &nick, chan_name, &names),
    )
    .await;
    Ok(())
}

pub async fn handle_list(ctx: &HandlerContext, session: &mut Session, _msg: &Message) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    reply(
        session,
        response::numeric(
            &ctx.config.server_name,
            Response::RplListStart,
            &nick,
            vec![],
            Some("Channel :Users  Name".to_string()),
        ),
    )
    .await;

    for chan_name in ctx.world.channel_names() {
        let Some(chan_arc) = ctx.world.get_channel(&chan_name) else {
            continue;
        };
        let (secret, is_member, count, topic) = {
            let chan = chan_arc.lock();
            (chan.modes.secret, chan.is_member(&nick), chan.members.len(), chan.topic.clone())
        };
        if secret && !is_member {
            continue;
        }
        reply(
            session,
            response::numeric(
                &ctx.config.server_name,
                Response::RplList,
                &nick,
                vec![chan_name.clone(), count.to_string()],
                topic,
            ),
        )
        .await;
    }

    reply(
        session,
        response::numeric(
            &ctx.config.server_name,
            Response::RplListEnd,
            &nick,
            vec![],
            Some("End of /LIST".to_string()),
        ),
    )
    .await;
    Ok(())
}

pub async fn handle_invite(ctx: &HandlerContext, session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    let target = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?.to_string();
    let chan_name = msg.arg(1).ok_or(HandlerError::NeedMoreParams)?.to_string();

    let chan_arc = ctx
        .world
        .get_channel(&chan_name)
        .ok_or(ChannelError::NotOnChannel)?;
    {
        let chan = chan_arc.lock();
        if !chan.is_member(&nick) {
            return Err(ChannelError::NotOnChannel.into());
        }
        if chan.modes.invite_only && !chan.is_operator(&nick) {
            return Err(ChannelError::ChanOpPrivsNeeded.into());
        }
        if chan.is_member(&target) {
            return Err(ChannelError::UserOnChannel(target).into());
        }
    }
    if !ctx.world.contains_nick(&target) {
        return Err(HandlerError::NoSuchNick(target));
    }
    chan_arc.lock().invited.insert(target.clone());

    let handle = ctx.world.get(&nick).ok_or(HandlerError::NotRegistered)?;
    let hostmask = handle.user.lock().hostmask();
    if let Some(target_handle) = ctx.world.get(&target) {
        let _ = target_handle
            .sender
            .send(Arc::new(response::invite(&hostmask, &target, &chan_name)))
            .await;
    }
    reply(
        session,
        response::numeric(
            &ctx.config.server_name,
            Response::RplInviting,
            &nick,
            vec![target],
            Some(chan_name),
        ),
    )
    .await;
    Ok(())
}

pub async fn handle_kick(ctx: &HandlerContext, session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    let chan_name = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?.to_string();
    let target = msg.arg(1).ok_or(HandlerError::NeedMoreParams)?.to_string();
    let reason = msg.trailing.clone().unwrap_or_else(|| "Kicked".to_string());

    let chan_arc = ctx
        .world
        .get_channel(&chan_name)
        .ok_or_else(|| HandlerError::NoSuchChannel(chan_name.clone()))?;

    let recipients = {
        let mut chan = chan_arc.lock();
        if !chan.is_operator(&nick) {
            return Err(ChannelError::ChanOpPrivsNeeded.into());
        }
        if !chan.is_member(&target) {
            return Err(ChannelError::UserNotInChannel(target).into());
        }
        let recipients = channel_recipients(ctx, &chan, None);
        chan.members.shift_remove(&target);
        recipients
    };

    let handle = ctx.world.get(&nick).ok_or(HandlerError::NotRegistered)?;
    let hostmask = handle.user.lock().hostmask();
    send_to_recipients(recipients, response::kick(&hostmask, &chan_name, &target, &reason)).await;

    if let Some(target_handle) = ctx.world.get(&target) {
        target_handle.user.lock().channels.remove(&chan_name);
    }
    ctx.world.destroy_channel_if_empty(&chan_name);
    Ok(())
}
