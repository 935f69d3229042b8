//! Wire codec and command/reply catalog for `malefirc`.
//!
//! This crate parses and serializes IRC protocol lines (RFC 1459/2812 framing
//! plus IRCv3 message-tags) and exposes the canonical command and numeric-reply
//! names the server dispatches on.

pub mod command;
pub mod message;
pub mod response;
pub mod sasl;

pub use command::Command;
pub use message::{Message, Tag};
pub use response::Response;
