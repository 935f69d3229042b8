//! VERSION, ADMIN, TIME, INFO, MOTD (spec §4.F).

use chrono::Local;

use malefirc_proto::response::{self, Response};

use crate::error::HandlerError;

use super::{reply, reply_all, require_nick, HandlerContext, Session};

pub async fn handle_version(ctx: &HandlerContext, session: &mut Session) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    reply(
        session,
        response::numeric(
            &ctx.config.server_name,
            Response::RplVersion,
            &nick,
            vec!["malefircd-1.0".to_string(), ctx.config.server_name.clone()],
            Some("rfc2812/ircv3 server".to_string()),
        ),
    )
    .await;
    Ok(())
}

pub async fn handle_admin(ctx: &HandlerContext, session: &mut Session) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    reply_all(
        session,
        vec![
            response::numeric(
                &ctx.config.server_name,
                Response::RplAdminMe,
                &nick,
                vec![ctx.config.server_name.clone()],
                Some("Administrative info".to_string()),
            ),
            response::numeric(
                &ctx.config.server_name,
                Response::RplAdminLoc1,
                &nick,
                vec![],
                Some(ctx.config.server_name.clone()),
            ),
            response::numeric(
                &ctx.config.server_name,
                Response::RplAdminLoc2,
                &nick,
                vec![],
                Some("malefircd maintainers".to_string()),
            ),
            response::numeric(
                &ctx.config.server_name,
                Response::RplAdminEmail,
                &nick,
                vec![],
                Some("admin@example.org".to_string()),
            ),
        ],
    )
    .await;
    Ok(())
}

pub async fn handle_time(ctx: &HandlerContext, session: &mut Session) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    reply(
        session,
        response::numeric(
            &ctx.config.server_name,
            Response::RplTime,
            &nick,
            vec![ctx.config.server_name.clone()],
            Some(Local::now().format("%a %b %e %Y -- %H:%M %Z").to_string()),
        ),
    )
    .await;
    Ok(())
}

pub async fn handle_info(ctx: &HandlerContext, session: &mut Session) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    const LINES: &[&str] = &[
        "malefircd -- an RFC 1459/2812 IRC server with IRCv3 CAP/SASL/message-tags support.",
        "https://example.org/malefircd",
    ];
    for line in LINES {
        reply(
            session,
            response::numeric(&ctx.config.server_name, Response::RplInfo, &nick, vec![], Some(line.to_string())),
        )
        .await;
    }
    reply(
        session,
        response::numeric(
            &ctx.config.server_name,
            Response::RplEndOfInfo,
            &nick,
            vec![],
            Some("End of /INFO list".to_string()),
        ),
    )
    .await;
    Ok(())
}

pub async fn handle_motd(ctx: &HandlerContext, session: &mut Session) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    if ctx.config.motd.is_empty() {
        reply(
            session,
            response::error_reply(&ctx.config.server_name, &nick, Response::ErrNoMotd, "MOTD File is missing"),
        )
        .await;
        return Ok(());
    }

    reply(
        session,
        response::numeric(
            &ctx.config.server_name,
            Response::RplMotdStart,
            &nick,
            vec![],
            Some(format!("- {} Message of the day -", ctx.config.server_name)),
        ),
    )
    .await;
    for line in &ctx.config.motd {
        reply(
            session,
            response::numeric(&ctx.config.server_name, Response::RplMotd, &nick, vec![], Some(format!("- {line}"))),
        )
        .await;
    }
    reply(
        session,
        response::numeric(&ctx.config.server_name, Response::RplEndOfMotd, &nick, vec![], Some("End of /MOTD command".to_string())),
    )
    .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::memory::MemoryStore;
    use crate::handlers::HandlerContext;
    use crate::state::World;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn ctx_with_motd(motd: Vec<String>) -> HandlerContext {
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
                motd,
            }),
        }
    }

    fn session() -> (Session, mpsc::Receiver<Arc<Message>>) {
        let (tx, rx) = mpsc::channel(32);
        let mut session = Session::new(1, "host.example.org".into(), tx);
        session.nickname = Some("alice".to_string());
        session.registered = true;
        (session, rx)
    }

    #[tokio::test]
    async fn motd_replies_nomotd_when_unconfigured() {
        let ctx = ctx_with_motd(vec![]);
        let (mut session, mut rx) = session();
        handle_motd(&ctx, &mut session).await.unwrap();
        assert_eq!(rx.try_recv().unwrap().command, "422");
    }

    #[tokio::test]
    async fn motd_sends_start_body_and_end() {
        let ctx = ctx_with_motd(vec!["line one".into(), "line two".into()]);
        let (mut session, mut rx) = session();
        handle_motd(&ctx, &mut session).await.unwrap();
        assert_eq!(rx.try_recv().unwrap().command, "375");
        assert_eq!(rx.try_recv().unwrap().command, "372");
        assert_eq!(rx.try_recv().unwrap().command, "372");
        assert_eq!(rx.try_recv().unwrap().command, "376");
    }

    #[tokio::test]
    async fn version_and_time_and_admin_and_info_reply() {
        let ctx = ctx_with_motd(vec![]);
        let (mut session, mut rx) = session();

        handle_version(&ctx, &mut session).await.unwrap();
        assert_eq!(rx.try_recv().unwrap().command, "351");

        handle_time(&ctx, &mut session).await.unwrap();
        assert_eq!(rx.try_recv().unwrap().command, "391");

        handle_admin(&ctx, &mut session).await.unwrap();
        assert_eq!(rx.try_recv().unwrap().command, "256");
        assert_eq!(rx.try_recv().unwrap().command, "257");
        assert_eq!(rx.try_recv().unwrap().command, "258");
        assert_eq!(rx.try_recv().unwrap().command, "259");

        handle_info(&ctx, &mut session).await.unwrap();
        assert_eq!(rx.try_recv().unwrap().command, "371");
        assert_eq!(rx.try_recv().unwrap().command, "371");
        assert_eq!(rx.try_recv().unwrap().command, "374");
    }
}
