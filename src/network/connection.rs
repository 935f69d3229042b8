//! Per-connection task: handshake-then-event-loop over one TCP (or TLS) stream (spec §4.G).

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use malefirc_proto::Message;

use crate::caps::MESSAGE_TAGS;
use crate::handlers::{self, HandlerContext, Session};
use crate::state::OUTBOUND_QUEUE_DEPTH;

/// Maximum accepted line length, matching spec §4.G's "at least 512 bytes".
const MAX_LINE_BYTES: usize = 8192;

static NEXT_UID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);

/// Drive one client connection to completion: read lines, dispatch them,
/// drain this session's own outbound queue, and write results back.
#[instrument(skip(ctx, stream), fields(%addr))]
pub async fn handle_connection<S>(ctx: Arc<HandlerContext>, stream: S, addr: SocketAddr)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let uid = NEXT_UID.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half).lines();

    let (tx, mut rx) = mpsc::channel::<Arc<Message>>(OUTBOUND_QUEUE_DEPTH);
    let mut session = Session::new(uid, addr.ip().to_string(), tx);

    loop {
        tokio::select! {
            line = reader.next_line() => {
                match line {
                    Ok(Some(raw)) => {
                        if raw.len() > MAX_LINE_BYTES {
                            continue;
                        }
                        let Ok(msg) = Message::from_str(&raw) else {
                            continue;
                        };
                        debug!(uid, command = %msg.command, "received");
                        if let Err(err) = handlers::dispatch(&ctx, &mut session, &msg).await {
                            if let Some(reply_msg) = err.to_irc_reply(
                                &ctx.config.server_name,
                                session.nickname.as_deref().unwrap_or("*"),
                            ) {
                                let _ = session.sender.send(Arc::new(reply_msg)).await;
                            }
                            if matches!(err, crate::error::HandlerError::Quit(_)) {
                                break;
                            }
                        }
                    }
                    Ok(None) => {
                        info!(uid, "client disconnected");
                        break;
                    }
                    Err(e) => {
                        warn!(uid, error = %e, "read error");
                        break;
                    }
                }
            }
            Some(msg) = rx.recv() => {
                let line = render(&msg, &session);
                if write_half.write_all(line.as_bytes()).await.is_err() {
                    warn!(uid, "write error");
                    break;
                }
            }
        }
    }

    cleanup(&ctx, &mut session).await;
}

/// Serialize `msg`, stripping its tags unless this session negotiated
/// `message-tags` (spec §4.G: capability-aware tag stripping is per
/// recipient, since one `Arc<Message>` fans out to many sessions).
fn render(msg: &Message, session: &Session) -> String {
    if session.caps.is_enabled(MESSAGE_TAGS) || msg.tags.is_none() {
        msg.to_string()
    } else {
        let mut stripped = msg.clone();
        stripped.tags = None;
        stripped.to_string()
    }
}

/// Tear the connection down as if QUIT "Connection closed" had been sent:
/// leave every channel the user was in, destroy empty channels, remove the
/// nickname from the registry (recording a WHOWAS entry).
async fn cleanup(ctx: &HandlerContext, session: &mut Session) {
    let Some(nick) = session.nickname.take() else {
        return;
    };
    if !session.registered {
        return;
    }

    let Some(handle) = ctx.world.get(&nick) else {
        return;
    };
    let channels: Vec<String> = handle.user.lock().channels.iter().cloned().collect();
    let hostmask = handle.user.lock().hostmask();
    let quit_msg = malefirc_proto::response::quit(&hostmask, "Connection closed");

    for chan_name in channels {
        handlers::broadcast_to_channel_except(ctx, &chan_name, quit_msg.clone(), Some(&nick)).await;
        if let Some(chan) = ctx.world.get_channel(&chan_name) {
            chan.lock().members.shift_remove(&nick);
        }
        ctx.world.destroy_channel_if_empty(&chan_name);
    }

    ctx.world.remove_nick(&nick);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::memory::MemoryStore;
    use crate::state::{ConnectionHandle, User, World};
    use malefirc_proto::Tag;
    use parking_lot::Mutex as PMutex;

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

    fn session_for(nick: &str) -> Session {
        let (tx, _rx) = mpsc::channel(32);
        let mut session = Session::new(1, "host.example.org".into(), tx);
        session.nickname = Some(nick.to_string());
        session.registered = true;
        session
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

    fn tagged_message() -> Message {
        Message::new("PRIVMSG", vec!["#test".to_string()], Some("hi".to_string()))
            .with_tags(vec![Tag::new("msgid", Some("1"))])
    }

    #[test]
    fn render_strips_tags_without_message_tags_cap() {
        let session = session_for("alice");
        let line = render(&tagged_message(), &session);
        assert!(!line.starts_with('@'));
    }

    #[test]
    fn render_keeps_tags_with_message_tags_cap() {
        let mut session = session_for("alice");
        session.caps.request(MESSAGE_TAGS);
        let line = render(&tagged_message(), &session);
        assert!(line.starts_with("@msgid=1"));
    }

    #[tokio::test]
    async fn cleanup_removes_from_channel_and_notifies_others() {
        let ctx = ctx();
        let mut alice = session_for("alice");
        let (bob_tx, mut bob_rx) = mpsc::channel(32);
        register(&ctx, "alice", alice.sender.clone());
        register(&ctx, "bob", bob_tx);

        let chan = ctx.world.get_or_create_channel("#test");
        chan.lock().members.insert("alice".into(), crate::state::MemberModes::default());
        chan.lock().members.insert("bob".into(), crate::state::MemberModes::default());
        ctx.world.get("alice").unwrap().user.lock().channels.insert("#test".into());
        ctx.world.get("bob").unwrap().user.lock().channels.insert("#test".into());

        cleanup(&ctx, &mut alice).await;

        assert!(!ctx.world.contains_nick("alice"));
        assert!(!ctx.world.get_channel("#test").unwrap().lock().is_member("alice"));
        assert_eq!(bob_rx.try_recv().unwrap().command, "QUIT");
    }

    #[tokio::test]
    async fn cleanup_is_noop_for_unregistered_session() {
        let ctx = ctx();
        let (tx, _rx) = mpsc::channel(32);
        let mut session = Session::new(1, "host.example.org".into(), tx);
        session.nickname = Some("alice".to_string());
        session.registered = false;

        cleanup(&ctx, &mut session).await;
        assert!(!ctx.world.contains_nick("alice"));
    }
}
