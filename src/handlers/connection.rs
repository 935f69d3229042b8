//! Registration handshake: PASS, NICK, USER, CAP, AUTHENTICATE, PING (spec §4.E/§4.F).

use malefirc_proto::response::{self, Response};
use malefirc_proto::Message;

use crate::error::HandlerError;
use crate::state::{now_ms, ConnectionHandle, User};
use malefirc_proto::sasl::{self, PlainAssembler};
use std::sync::Arc;

use super::{reply, reply_all, HandlerContext, Session};
use parking_lot::Mutex;

pub async fn handle_pass(ctx: &HandlerContext, session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    if session.registered {
        return Err(HandlerError::AlreadyRegistered);
    }
    let Some(password) = msg.arg(0) else {
        return Err(HandlerError::NeedMoreParams);
    };
    session.pending_pass = Some(password.to_string());
    let _ = ctx;
    Ok(())
}

pub async fn handle_cap(session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    let Some(sub) = msg.arg(0) else {
        return Err(HandlerError::NeedMoreParams);
    };
    match sub.to_uppercase().as_str() {
        "LS" => {
            let body = crate::caps::CapState::ls_reply();
            reply(
                session,
                Message::new("CAP", vec!["*".to_string(), "LS".to_string()], Some(body)),
            )
            .await;
        }
        "REQ" => {
            let requested = msg.trailing.clone().unwrap_or_default();
            let (ok, body) = session.caps.request(&requested);
            let ack = if ok { "ACK" } else { "NAK" };
            reply(
                session,
                Message::new("CAP", vec!["*".to_string(), ack.to_string()], Some(body)),
            )
            .await;
        }
        "END" => {}
        _ => {}
    }
    Ok(())
}

pub async fn handle_authenticate(
    ctx: &HandlerContext,
    session: &mut Session,
    msg: &Message,
) -> Result<(), HandlerError> {
    let chunk = msg.arg(0).unwrap_or("");

    if session.sasl.is_none() {
        if chunk.eq_ignore_ascii_case("PLAIN") {
            session.sasl = Some(PlainAssembler::new());
        }
        return Ok(());
    }

    if chunk == "*" {
        session.sasl = None;
        reply(
            session,
            response::error_reply(&ctx.config.server_name, "*", Response::ErrSaslAborted, "SASL authentication aborted"),
        )
        .await;
        return Ok(());
    }

    let assembler = session.sasl.as_mut().expect("checked above");
    let Some(complete) = assembler.feed(chunk) else {
        return Ok(());
    };
    session.sasl = None;

    let creds = match sasl::decode_plain(&complete) {
        Ok(c) => c,
        Err(_) => {
            reply(
                session,
                response::error_reply(&ctx.config.server_name, "*", Response::ErrSaslFail, "SASL authentication failed"),
            )
            .await;
            return Ok(());
        }
    };

    if ctx.store.authenticate(&creds.authcid, &creds.password).await {
        session.authenticated = true;
        session.account_name = Some(creds.authcid.clone());
        reply_all(
            session,
            vec![
                response::error_reply(&ctx.config.server_name, "*", Response::RplSaslSuccess, "SASL authentication successful"),
                response::error_reply(&ctx.config.server_name, "*", Response::RplLoggedIn, format!("You are now logged in as {}", creds.authcid)),
            ],
        )
        .await;
    } else {
        reply(
            session,
            response::error_reply(&ctx.config.server_name, "*", Response::ErrSaslFail, "SASL authentication failed"),
        )
        .await;
    }
    Ok(())
}

pub async fn handle_nick(ctx: &HandlerContext, session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    let Some(new_nick) = msg.arg(0) else {
        return Err(HandlerError::ErroneousNickname(String::new()));
    };
    let new_nick = new_nick.to_string();

    if !session.registered {
        if ctx.world.contains_nick(&new_nick) {
            return Err(HandlerError::NicknameInUse(new_nick));
        }
        session.nickname = Some(new_nick);
        maybe_complete_registration(ctx, session).await;
        return Ok(());
    }

    let old_nick = require_current_nick(session)?.to_string();
    if ctx.world.rename_nick(&old_nick, &new_nick).is_err() {
        return Err(HandlerError::NicknameInUse(new_nick));
    }
    session.nickname = Some(new_nick.clone());

    let Some(handle) = ctx.world.get(&new_nick) else {
        return Ok(());
    };
    let (username, host, member_of) = {
        let user = handle.user.lock();
        (user.username.clone(), user.host.clone(), user.channels.clone())
    };
    let nick_msg = Message::new("NICK", vec![], Some(new_nick.clone()))
        .with_prefix(format!("{old_nick}!{username}@{host}"));

    // Every channel the renamed user belongs to needs to see the change, not
    // just the user themselves — otherwise NAMES/WHO would disagree with
    // what the rest of the channel is told.
    for chan_name in &member_of {
        if let Some(chan) = ctx.world.get_channel(chan_name) {
            let recipients: Vec<Arc<ConnectionHandle>> = {
                let mut chan = chan.lock();
                if let Some(modes) = chan.members.shift_remove(&old_nick) {
                    chan.members.insert(new_nick.clone(), modes);
                }
                chan.members
                    .keys()
                    .filter_map(|n| ctx.world.get(n))
                    .collect()
            };
            for recipient in recipients {
                let _ = recipient.sender.send(Arc::new(nick_msg.clone())).await;
            }
        }
    }
    if member_of.is_empty() {
        reply(session, nick_msg).await;
    }
    Ok(())
}

fn require_current_nick(session: &Session) -> Result<&str, HandlerError> {
    session.nickname.as_deref().ok_or(HandlerError::NotRegistered)
}

pub async fn handle_user(ctx: &HandlerContext, session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    if session.registered {
        return Err(HandlerError::AlreadyRegistered);
    }
    if msg.params.len() < 3 {
        return Err(HandlerError::NeedMoreParams);
    }
    if session.username.is_some() {
        return Err(HandlerError::AlreadyRegistered);
    }
    session.username = Some(msg.params[0].clone());
    session.realname = Some(msg.trailing.clone().unwrap_or_default());
    maybe_complete_registration(ctx, session).await;
    Ok(())
}

pub async fn handle_ping(ctx: &HandlerContext, session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    let token = msg.arg(0).unwrap_or(&ctx.config.server_name).to_string();
    reply(session, response::pong(&ctx.config.server_name, &token)).await;
    Ok(())
}

/// Transition Unregistered → Registered once both NICK and USER are set
/// (spec §4.E). Idempotent: does nothing if either is still missing or
/// registration already happened.
async fn maybe_complete_registration(ctx: &HandlerContext, session: &mut Session) {
    if session.registered {
        return;
    }
    let (Some(nick), Some(username)) = (session.nickname.clone(), session.username.clone()) else {
        return;
    };

    if !session.authenticated {
        if let Some(password) = session.pending_pass.take() {
            if ctx.store.authenticate(&username, &password).await {
                session.authenticated = true;
                session.account_name = Some(username.clone());
            }
        }
    }

    let mut user = User::new(
        nick.clone(),
        username.clone(),
        session.realname.clone().unwrap_or_default(),
        session.host.clone(),
        now_ms(),
    );
    user.authenticated = session.authenticated;
    user.account_name = session.account_name.clone();

    let handle = Arc::new(ConnectionHandle {
        user: Mutex::new(user),
        sender: session.sender.clone(),
    });

    if ctx.world.register_nick(handle).is_err() {
        // Lost a race for this nickname between the earlier availability
        // check and now; report back and leave the session unregistered.
        reply(
            session,
            response::error_reply_with_params(
                &ctx.config.server_name,
                &nick,
                Response::ErrNicknameInUse,
                vec![nick.clone()],
                "Nickname is already in use",
            ),
        )
        .await;
        session.nickname = None;
        return;
    }

    session.registered = true;
    let mut burst = response::welcome_burst(&ctx.config.server_name, &nick, &username, &session.host);
    if session.authenticated {
        burst.push(response::error_reply(
            &ctx.config.server_name,
            &nick,
            Response::RplLoggedIn,
            format!("You are now logged in as {}", session.account_name.clone().unwrap_or_default()),
        ));
    }
    reply_all(session, burst).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::memory::MemoryStore;
    use crate::state::World;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn ctx() -> HandlerContext {
        HandlerContext {
            world: Arc::new(World::new()),
            store: Arc::new(MemoryStore::new()),
            config: Arc::new(test_config()),
        }
    }

    fn test_config() -> Config {
        Config {
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
        }
    }

    fn session() -> (Session, mpsc::Receiver<Arc<Message>>) {
        let (tx, rx) = mpsc::channel(32);
        (Session::new(1, "host.example.org".into(), tx), rx)
    }

    #[tokio::test]
    async fn nick_then_user_completes_registration() {
        let ctx = ctx();
        let (mut session, mut rx) = session();

        handle_nick(&ctx, &mut session, &Message::new("NICK", vec!["alice".into()], None))
            .await
            .unwrap();
        assert!(!session.registered);

        handle_user(
            &ctx,
            &mut session,
            &Message::new(
                "USER",
                vec!["alice".into(), "0".into(), "*".into()],
                Some("Alice Example".into()),
            ),
        )
        .await
        .unwrap();

        assert!(session.registered);
        assert!(ctx.world.contains_nick("alice"));
        let welcome = rx.try_recv().unwrap();
        assert_eq!(welcome.command, "001");
    }

    #[tokio::test]
    async fn nick_in_use_is_rejected() {
        let ctx = ctx();
        let (mut session1, _rx1) = session();
        handle_nick(&ctx, &mut session1, &Message::new("NICK", vec!["bob".into()], None))
            .await
            .unwrap();
        handle_user(
            &ctx,
            &mut session1,
            &Message::new("USER", vec!["bob".into(), "0".into(), "*".into()], Some("Bob".into())),
        )
        .await
        .unwrap();

        let (mut session2, _rx2) = session();
        let err = handle_nick(&ctx, &mut session2, &Message::new("NICK", vec!["bob".into()], None))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::NicknameInUse(_)));
    }

    #[tokio::test]
    async fn pass_before_registration_is_stored() {
        let ctx = ctx();
        let (mut session, _rx) = session();
        handle_pass(&ctx, &mut session, &Message::new("PASS", vec!["secret".into()], None))
            .await
            .unwrap();
        assert_eq!(session.pending_pass.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn pass_after_registration_is_rejected() {
        let ctx = ctx();
        let (mut session, _rx) = session();
        handle_nick(&ctx, &mut session, &Message::new("NICK", vec!["carol".into()], None))
            .await
            .unwrap();
        handle_user(
            &ctx,
            &mut session,
            &Message::new("USER", vec!["carol".into(), "0".into(), "*".into()], Some("Carol".into())),
        )
        .await
        .unwrap();
        let err = handle_pass(&ctx, &mut session, &Message::new("PASS", vec!["x".into()], None))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::AlreadyRegistered));
    }
}
