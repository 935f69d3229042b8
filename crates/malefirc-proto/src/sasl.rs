//! SASL PLAIN chunk buffering and decoding (spec §4.E / RFC 4422 + IRCv3).
//!
//! `AUTHENTICATE` payloads are base64, split into 400-byte chunks; a chunk
//! shorter than 400 bytes ends the sequence (an exact multiple of 400 is
//! terminated by one further empty `AUTHENTICATE +`, which callers feed in
//! as an empty chunk).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

const CHUNK_LEN: usize = 400;

/// Accumulates `AUTHENTICATE <chunk>` lines until the PLAIN payload is complete.
#[derive(Debug, Default)]
pub struct PlainAssembler {
    buf: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SaslError {
    #[error("chunk is not valid base64")]
    InvalidBase64,
    #[error("decoded payload is not three NUL-separated fields")]
    MalformedPayload,
}

/// One decoded `AUTHENTICATE` attempt: authorization id, authentication id, password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainCredentials {
    pub authzid: String,
    pub authcid: String,
    pub password: String,
}

impl PlainAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one `AUTHENTICATE` chunk (the base64 text after the command name).
    /// Returns `Some(complete_base64)` once a short chunk ends the sequence.
    pub fn feed(&mut self, chunk: &str) -> Option<String> {
        let is_final = chunk.len() < CHUNK_LEN;
        self.buf.push_str(chunk);
        if is_final {
            Some(std::mem::take(&mut self.buf))
        } else {
            None
        }
    }
}

/// Decode a complete base64 PLAIN payload into its three NUL-separated fields.
pub fn decode_plain(base64_payload: &str) -> Result<PlainCredentials, SaslError> {
    let raw = STANDARD
        .decode(base64_payload.as_bytes())
        .map_err(|_| SaslError::InvalidBase64)?;
    let mut parts = raw.split(|&b| b == 0);
    let authzid = parts.next().ok_or(SaslError::MalformedPayload)?;
    let authcid = parts.next().ok_or(SaslError::MalformedPayload)?;
    let password = parts.next().ok_or(SaslError::MalformedPayload)?;
    if parts.next().is_some() {
        return Err(SaslError::MalformedPayload);
    }
    Ok(PlainCredentials {
        authzid: String::from_utf8_lossy(authzid).into_owned(),
        authcid: String::from_utf8_lossy(authcid).into_owned(),
        password: String::from_utf8_lossy(password).into_owned(),
    })
}

/// Split an already-encoded base64 string into the 400-char chunks a server
/// would emit, used by tests and by any future client-facing tooling.
pub fn chunk_base64(payload: &str) -> Vec<String> {
    let mut out: Vec<String> = payload
        .as_bytes()
        .chunks(CHUNK_LEN)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect();
    if out.is_empty() || out.last().map(String::len) == Some(CHUNK_LEN) {
        out.push(String::new());
    }
    out
}
