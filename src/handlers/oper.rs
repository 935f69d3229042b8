//! OPER: elevate to server operator (spec §4.F).

use malefirc_proto::response::{self, Response};
use malefirc_proto::Message;

use crate::error::HandlerError;

use super::{reply, require_nick, HandlerContext, Session};

pub async fn handle_oper(ctx: &HandlerContext, session: &mut Session, msg: &Message) -> Result<(), HandlerError> {
    let nick = require_nick(session)?.to_string();
    let name = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
    let password = msg.arg(1).ok_or(HandlerError::NeedMoreParams)?;

    if name != ctx.config.oper_name || password != ctx.config.oper_password {
        return Err(HandlerError::PasswdMismatch);
    }

    let handle = ctx.world.get(&nick).ok_or(HandlerError::NotRegistered)?;
    handle.user.lock().modes.set('o');

    reply(
        session,
        response::error_reply(&ctx.config.server_name, &nick, Response::RplYoureOper, "You are now an IRC operator"),
    )
    .await;
    Ok(())
}
