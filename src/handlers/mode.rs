//! MODE: user modes and channel modes share one command name (spec §4.F).

use malefirc_proto::response::{self, Response};
use malefirc_proto::Message;

use crate::error::{ChannelError, HandlerError};

use super::{channel_recipients, reply, require_nick, send_to_recipients, HandlerContext, Session};

pub async fn handle_mode(ctx: &HandlerContext, session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    let target = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?.to_string();
    if target.starts_with('#') {
        channel_mode(ctx, session, msg, &target).await
    } else {
        user_mode(ctx, session, msg, &target).await
    }
}

async fn user_mode(ctx: &HandlerContext, session: &mut Session, msg: &Message, target: &str) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    let caller_is_op = ctx
        .world
        .get(&nick)
        .is_some_and(|h| h.user.lock().is_operator());

    if target != nick && !caller_is_op {
        return Err(HandlerError::UsersDontMatch);
    }

    let handle = ctx
        .world
        .get(target)
        .ok_or_else(|| HandlerError::NoSuchNick(target.to_string()))?;

    let Some(modestring) = msg.arg(1) else {
        let current = handle.user.lock().modes.as_mode_string();
        reply(
            session,
            response::numeric(
                &ctx.config.server_name,
                Response::RplUModeIs,
                &nick,
                vec![if current.is_empty() { "+".to_string() } else { current }],
                None,
            ),
        )
        .await;
        return Ok(());
    };

    let mut sign = '+';
    for c in modestring.chars() {
        match c {
            '+' => sign = '+',
            '-' => sign = '-',
            // MODE never grants +o on its own — that's OPER's job. The only
            // effect it can have here is a server operator re-confirming (a
            // no-op) or clearing their own flag.
            'o' => {
                if sign == '-' {
                    handle.user.lock().modes.unset('o');
                } else if target == nick && caller_is_op {
                    handle.user.lock().modes.set('o');
                }
            }
            'i' => {
                if sign == '+' {
                    handle.user.lock().modes.set('i');
                } else {
                    handle.user.lock().modes.unset('i');
                }
            }
            other => return Err(HandlerError::UModeUnknownFlag(other)),
        }
    }

    let new_modes = handle.user.lock().modes.as_mode_string();
    let caller_mask = ctx
        .world
        .get(&nick)
        .map(|h| h.user.lock().hostmask())
        .unwrap_or_else(|| nick.clone());
    reply(
        session,
        response::mode_change(
            &caller_mask,
            target,
            if new_modes.is_empty() { "+" } else { &new_modes },
            vec![],
        ),
    )
    .await;
    Ok(())
}

async fn channel_mode(ctx: &HandlerContext, session: &mut Session, msg: &Message, chan_name: &str) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    let chan_arc = ctx
        .world
        .get_channel(chan_name)
        .ok_or_else(|| HandlerError::NoSuchChannel(chan_name.to_string()))?;

    if msg.arg(1).is_none() {
        let (flags, key, limit) = {
            let chan = chan_arc.lock();
            (chan.modes.flag_string(), chan.modes.key.clone(), chan.modes.limit)
        };
        let mut params = vec![chan_name.to_string(), flags];
        if let Some(k) = key {
            params.push(k);
        }
        if let Some(l) = limit {
            params.push(l.to_string());
        }
        reply(
            session,
            response::numeric(&ctx.config.server_name, Response::RplChannelModeIs, &nick, params, None),
        )
        .await;
        return Ok(());
    }

    let modestring = msg.arg(1).expect("checked above").to_string();
    let args: Vec<String> = msg.args()[2..].iter().map(|s| s.to_string()).collect();
    let mut arg_idx = 0;

    let mut applied = String::new();
    let mut applied_args: Vec<String> = Vec::new();
    let mut ban_list_to_show: Option<Vec<String>> = None;
    let mut sign = '+';

    let recipients = {
        let mut chan = chan_arc.lock();
        if !chan.is_operator(&nick) {
            return Err(ChannelError::ChanOpPrivsNeeded.into());
        }
        for c in modestring.chars() {
            match c {
                '+' => sign = '+',
                '-' => sign = '-',
                'o' | 'v' => {
                    let Some(target_nick) = args.get(arg_idx) else { continue };
                    arg_idx += 1;
                    if let Some(m) = chan.members.get_mut(target_nick) {
                        if c == 'o' {
                            m.op = sign == '+';
                        } else {
                            m.voice = sign == '+';
                        }
                        applied.push(sign);
                        applied.push(c);
                        applied_args.push(target_nick.clone());
                    }
                }
                'b' => {
                    if sign == '+' {
                        match args.get(arg_idx) {
                            Some(mask) => {
                                chan.modes.bans.push(mask.clone());
                                arg_idx += 1;
                                applied.push('+');
                                applied.push('b');
                                applied_args.push(mask.clone());
                            }
                            None => ban_list_to_show = Some(chan.modes.bans.clone()),
                        }
                    } else if let Some(mask) = args.get(arg_idx) {
                        chan.modes.bans.retain(|b| b != mask);
                        arg_idx += 1;
                        applied.push('-');
                        applied.push('b');
                        applied_args.push(mask.clone());
                    }
                }
                'k' => {
                    if sign == '+' {
                        if let Some(key) = args.get(arg_idx) {
                            chan.modes.key = Some(key.clone());
                            arg_idx += 1;
                            applied.push('+');
                            applied.push('k');
                            applied_args.push(key.clone());
                        }
                    } else {
                        chan.modes.key = None;
                        applied.push('-');
                        applied.push('k');
                    }
                }
                'l' => {
                    if sign == '+' {
                        if let Some(limit) = args.get(arg_idx).and_then(|s| s.parse::<usize>().ok()) {
                            chan.modes.limit = Some(limit);
                            arg_idx += 1;
                            applied.push('+');
                            applied.push('l');
                            applied_args.push(limit.to_string());
                        }
                    } else {
                        chan.modes.limit = None;
                        applied.push('-');
                        applied.push('l');
                    }
                }
                'n' => {
                    chan.modes.no_external_messages = sign == '+';
                    applied.push(sign);
                    applied.push('n');
                }
                's' => {
                    chan.modes.secret = sign == '+';
                    applied.push(sign);
                    applied.push('s');
                }
                'i' => {
                    chan.modes.invite_only = sign == '+';
                    applied.push(sign);
                    applied.push('i');
                }
                't' => {
                    chan.modes.topic_locked = sign == '+';
                    applied.push(sign);
                    applied.push('t');
                }
                'm' => {
                    chan.modes.moderated = sign == '+';
                    applied.push(sign);
                    applied.push('m');
                }
                other => return Err(ChannelError::UnknownMode(other, chan_name.to_string()).into()),
            }
        }
        // Snapshotted under the same lock as the mode mutations so this
        // broadcast can't be reordered around another handler's own
        // mutate-then-broadcast on this channel (spec §5).
        channel_recipients(ctx, &chan, None)
    };

    if let Some(bans) = ban_list_to_show {
        for mask in &bans {
            reply(
                session,
                response::numeric(
                    &ctx.config.server_name,
                    Response::RplBanList,
                    &nick,
                    vec![chan_name.to_string(), mask.clone()],
                    None,
                ),
            )
            .await;
        }
        reply(
            session,
            response::numeric(
                &ctx.config.server_name,
                Response::RplEndOfBanList,
                &nick,
                vec![chan_name.to_string()],
                Some("End of channel ban list".to_string()),
            ),
        )
        .await;
    }

    if !applied.is_empty() {
        let hostmask = ctx
            .world
            .get(&nick)
            .map(|h| h.user.lock().hostmask())
            .unwrap_or(nick.clone());
        send_to_recipients(
            recipients,
            response::mode_change(&hostmask, chan_name, &applied, applied_args),
        )
        .await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::memory::MemoryStore;
    use crate::state::{ConnectionHandle, MemberModes, User, World};
    use parking_lot::Mutex as PMutex;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn ctx() -> HandlerContext {
        HandlerContext {
            world: Arc::new(World::new()),
            store: Arc::new(MemoryStore::new()),
            config: Arc::new(Config {
                server_name: "irc.test".into(),
                port: 6667,
                tls_enabled: false,
                tls_port: 6697,
                tls_cert_path: None,
                tls_key_path: None,
                oper_name: "admin".into(),
                oper_password: "secret".into(),
                store: crate::config::StoreKind::Memory,
                store_connection: ":memory:".into(),
                log_format: crate::config::LogFormat::Pretty,
                motd: vec![],
            }),
        }
    }

    fn session_for(nick: &str) -> (Session, mpsc::Receiver<Arc<Message>>) {
        let (tx, rx) = mpsc::channel(32);
        let mut session = Session::new(1, "host.example.org".into(), tx);
        session.nickname = Some(nick.to_string());
        session.registered = true;
        (session, rx)
    }

    fn register(ctx: &HandlerContext, nick: &str, sender: crate::state::OutboundSender) {
        let user = User::new(nick.into(), "u".into(), "r".into(), "h".into(), 0);
        ctx.world
            .register_nick(Arc::new(ConnectionHandle {
                user: PMutex::new(user),
                sender,
            }))
            .unwrap();
    }

    #[tokio::test]
    async fn querying_own_user_modes_with_no_flags_replies_plus() {
        let ctx = ctx();
        let (mut session, mut rx) = session_for("alice");
        register(&ctx, "alice", session.sender.clone());

        handle_mode(&ctx, &mut session, &Message::new("MODE", vec!["alice".into()], None))
            .await
            .unwrap();
        let reply = rx.try_recv().unwrap();
        assert_eq!(reply.command, "221");
        assert_eq!(reply.params.last().unwrap(), "+");
    }

    #[tokio::test]
    async fn mode_cannot_change_other_users_without_oper() {
        let ctx = ctx();
        let (mut session, _rx) = session_for("alice");
        register(&ctx, "alice", session.sender.clone());
        let (tx2, _rx2) = mpsc::channel(32);
        register(&ctx, "bob", tx2);

        let err = handle_mode(&ctx, &mut session, &Message::new("MODE", vec!["bob".into(), "+i".into()], None))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::UsersDontMatch));
    }

    #[tokio::test]
    async fn mode_plus_o_is_a_no_op_without_already_holding_it() {
        let ctx = ctx();
        let (mut session, mut rx) = session_for("alice");
        register(&ctx, "alice", session.sender.clone());

        handle_mode(&ctx, &mut session, &Message::new("MODE", vec!["alice".into(), "+o".into()], None))
            .await
            .unwrap();
        let reply = rx.try_recv().unwrap();
        assert_eq!(reply.params[1], "+");
        assert!(!ctx.world.get("alice").unwrap().user.lock().is_operator());
    }

    #[tokio::test]
    async fn mode_minus_i_clears_invisible_flag() {
        let ctx = ctx();
        let (mut session, mut rx) = session_for("alice");
        register(&ctx, "alice", session.sender.clone());
        ctx.world.get("alice").unwrap().user.lock().modes.set('i');

        handle_mode(&ctx, &mut session, &Message::new("MODE", vec!["alice".into(), "-i".into()], None))
            .await
            .unwrap();
        let reply = rx.try_recv().unwrap();
        assert_eq!(reply.params[1], "+");
        assert!(!ctx.world.get("alice").unwrap().user.lock().modes.has('i'));
    }

    #[tokio::test]
    async fn channel_mode_requires_operator() {
        let ctx = ctx();
        let (mut session, _rx) = session_for("alice");
        register(&ctx, "alice", session.sender.clone());
        let chan = ctx.world.get_or_create_channel("#test");
        chan.lock().members.insert("alice".into(), MemberModes::default());

        let err = handle_mode(&ctx, &mut session, &Message::new("MODE", vec!["#test".into(), "+m".into()], None))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Channel(ChannelError::ChanOpPrivsNeeded)));
    }

    #[tokio::test]
    async fn channel_mode_applies_and_broadcasts_net_change() {
        let ctx = ctx();
        let (mut session, mut rx) = session_for("alice");
        register(&ctx, "alice", session.sender.clone());
        let chan = ctx.world.get_or_create_channel("#test");
        chan.lock().members.insert("alice".into(), MemberModes { op: true, voice: false });

        handle_mode(&ctx, &mut session, &Message::new("MODE", vec!["#test".into(), "+mt".into()], None))
            .await
            .unwrap();
        assert!(chan.lock().modes.moderated);
        assert!(chan.lock().modes.topic_locked);
        let broadcast = rx.try_recv().unwrap();
        assert_eq!(broadcast.command, "MODE");
        assert_eq!(broadcast.params[1], "+m+t");
    }

    #[tokio::test]
    async fn channel_mode_plus_b_with_no_mask_shows_ban_list() {
        let ctx = ctx();
        let (mut session, mut rx) = session_for("alice");
        register(&ctx, "alice", session.sender.clone());
        let chan = ctx.world.get_or_create_channel("#test");
        chan.lock().members.insert("alice".into(), MemberModes { op: true, voice: false });
        chan.lock().modes.bans.push("*!*@evil.example.org".into());

        handle_mode(&ctx, &mut session, &Message::new("MODE", vec!["#test".into(), "+b".into()], None))
            .await
            .unwrap();
        let ban_line = rx.try_recv().unwrap();
        assert_eq!(ban_line.command, "367");
        let end = rx.try_recv().unwrap();
        assert_eq!(end.command, "368");
    }

    #[tokio::test]
    async fn channel_mode_grants_voice_with_argument() {
        let ctx = ctx();
        let (mut session, mut rx) = session_for("alice");
        register(&ctx, "alice", session.sender.clone());
        let (tx2, _rx2) = mpsc::channel(32);
        register(&ctx, "bob", tx2);
        let chan = ctx.world.get_or_create_channel("#test");
        chan.lock().members.insert("alice".into(), MemberModes { op: true, voice: false });
        chan.lock().members.insert("bob".into(), MemberModes::default());

        handle_mode(&ctx, &mut session, &Message::new("MODE", vec!["#test".into(), "+v".into(), "bob".into()], None))
            .await
            .unwrap();
        assert!(chan.lock().members.get("bob").unwrap().voice);
        let broadcast = rx.try_recv().unwrap();
        assert_eq!(broadcast.params, vec!["#test".to_string(), "+v".to_string(), "bob".to_string()]);
    }
}
