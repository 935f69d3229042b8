//! WHO, WHOIS, WHOWAS, USERHOST, ISON, AWAY (spec §4.F).

use malefirc_proto::response::{self, Response};
use malefirc_proto::Message;

use crate::error::HandlerError;

use super::{reply, reply_all, require_nick, HandlerContext, Session};

pub async fn handle_who(ctx: &HandlerContext, session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    let chan_name = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;

    if let Some(chan_arc) = ctx.world.get_channel(chan_name) {
        let members: Vec<String> = chan_arc.lock().members.keys().cloned().collect();
        for member in members {
            let Some(handle) = ctx.world.get(&member) else { continue };
            let (username, host, realname, away) = {
                let u = handle.user.lock();
                (u.username.clone(), u.host.clone(), u.realname.clone(), u.is_away())
            };
            let status = if away { "G" } else { "H" };
            reply(
                session,
                response::numeric(
                    &ctx.config.server_name,
                    Response::RplWhoReply,
                    &nick,
                    vec![
                        chan_name.to_string(),
                        username,
                        host,
                        ctx.config.server_name.clone(),
                        member,
                        status.to_string(),
                    ],
                    Some(format!("0 {realname}")),
                ),
            )
            .await;
        }
    }

    reply(
        session,
        response::numeric(
            &ctx.config.server_name,
            Response::RplEndOfWho,
            &nick,
            vec![chan_name.to_string()],
            Some("End of /WHO list".to_string()),
        ),
    )
    .await;
    Ok(())
}

/// Uses the **first** target parameter, not the last (spec Open Question).
pub async fn handle_whois(ctx: &HandlerContext, session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    let target = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?.to_string();

    let Some(handle) = ctx.world.get(&target) else {
        return Err(HandlerError::NoSuchNick(target));
    };

    let (username, host, realname, channels, is_operator, authenticated, account_name, away_message) = {
        let u = handle.user.lock();
        (
            u.username.clone(),
            u.host.clone(),
            u.realname.clone(),
            u.channels.clone(),
            u.is_operator(),
            u.authenticated,
            u.account_name.clone(),
            u.away_message.clone(),
        )
    };

    let mut replies = vec![response::numeric(
        &ctx.config.server_name,
        Response::RplWhoisUser,
        &nick,
        vec![target.clone(), username, host, "*".to_string()],
        Some(realname),
    )];

    let channel_tokens: Vec<String> = channels
        .iter()
        .filter_map(|c| ctx.world.get_channel(c).map(|chan| (c, chan)))
        .map(|(c, chan)| {
            let chan = chan.lock();
            match chan.members.get(&target).and_then(|m| m.prefix_char()) {
                Some(prefix) => format!("{prefix}{c}"),
                None => c.clone(),
            }
        })
        .collect();
    if !channel_tokens.is_empty() {
        replies.push(response::numeric(
            &ctx.config.server_name,
            Response::RplWhoisChannels,
            &nick,
            vec![target.clone()],
            Some(channel_tokens.join(" ")),
        ));
    }

    replies.push(response::numeric(
        &ctx.config.server_name,
        Response::RplWhoisServer,
        &nick,
        vec![target.clone(), ctx.config.server_name.clone()],
        Some("malefircd".to_string()),
    ));

    if is_operator {
        replies.push(response::numeric(
            &ctx.config.server_name,
            Response::RplWhoisOperator,
            &nick,
            vec![target.clone()],
            Some("is an IRC operator".to_string()),
        ));
    }

    if authenticated {
        replies.push(response::numeric(
            &ctx.config.server_name,
            Response::RplWhoisAccount,
            &nick,
            vec![target.clone(), account_name.unwrap_or_default()],
            Some("is logged in as".to_string()),
        ));
    }

    if let Some(away) = away_message {
        replies.push(response::numeric(
            &ctx.config.server_name,
            Response::RplAway,
            &nick,
            vec![target.clone()],
            Some(away),
        ));
    }

    replies.push(response::numeric(
        &ctx.config.server_name,
        Response::RplEndOfWhois,
        &nick,
        vec![target],
        Some("End of /WHOIS list".to_string()),
    ));
    reply_all(session, replies).await;
    Ok(())
}

pub async fn handle_whowas(ctx: &HandlerContext, session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    let target = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?.to_string();
    let count: usize = msg.arg(1).and_then(|s| s.parse().ok()).unwrap_or(usize::MAX);

    let records = ctx.world.whowas(&target, count);
    if records.is_empty() {
        reply(
            session,
            response::error_reply_with_params(
                &ctx.config.server_name,
                &nick,
                Response::ErrWasNoSuchNick,
                vec![target.clone()],
                "There was no such nickname",
            ),
        )
        .await;
    } else {
        for record in &records {
            reply(
                session,
                response::numeric(
                    &ctx.config.server_name,
                    Response::RplWhowasUser,
                    &nick,
                    vec![record.nickname.clone(), record.username.clone(), record.host.clone(), "*".to_string()],
                    Some(record.realname.clone()),
                ),
            )
            .await;
        }
    }

    reply(
        session,
        response::numeric(
            &ctx.config.server_name,
            Response::RplEndOfWhowas,
            &nick,
            vec![target],
            Some("End of WHOWAS".to_string()),
        ),
    )
    .await;
    Ok(())
}


pub async fn handle_userhost(ctx: &HandlerContext, session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    let mut tokens = Vec::new();
    for requested in msg.args() {
        let Some(handle) = ctx.world.get(requested) else { continue };
        let u = handle.user.lock();
        let away_sign = if u.is_away() { '-' } else { '+' };
        let op_star = if u.is_operator() { "*" } else { "" };
        tokens.push(format!("{}{op_star}={away_sign}{}@{}", u.nickname, u.username, u.host));
    }
    reply(
        session,
        response::numeric(&ctx.config.server_name, Response::RplUserhost, &nick, vec![], Some(tokens.join(" "))),
    )
    .await;
    Ok(())
}

pub async fn handle_ison(ctx: &HandlerContext, session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    let online: Vec<String> = msg
        .args()
        .into_iter()
        .filter(|n| ctx.world.contains_nick(n))
        .map(str::to_string)
        .collect();
    reply(
        session,
        response::numeric(&ctx.config.server_name, Response::RplIson, &nick, vec![], Some(online.join(" "))),
    )
    .await;
    Ok(())
}

pub async fn handle_away(ctx: &HandlerContext, session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    let handle = ctx.world.get(&nick).ok_or(HandlerError::NotRegistered)?;

    if let Some(text) = &msg.trailing {
        handle.user.lock().away_message = Some(text.clone());
        reply(
            session,
            response::error_reply(&ctx.config.server_name, &nick, Response::RplNowAway, "You have been marked as being away"),
        )
        .await;
    } else {
        handle.user.lock().away_message = None;
        reply(
            session,
            response::error_reply(&ctx.config.server_name, &nick, Response::RplUnaway, "You are no longer marked as being away"),
        )
        .await;
    }
    Ok(())
}
