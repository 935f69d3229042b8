//! Server configuration, loaded from environment variables (spec §6).
//!
//! The teacher loads a TOML file into a `serde`-derived struct with a
//! `defaults` module of `default_*()` functions; this server's configuration
//! surface is the flat set of env vars §6 names, so the same "typed struct +
//! documented defaults" shape is kept but populated from `std::env` instead.

use std::env;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub server_name: String,
    pub port: u16,
    pub tls_enabled: bool,
    pub tls_port: u16,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
    pub oper_name: String,
    pub oper_password: String,
    pub store: StoreKind,
    pub store_connection: String,
    pub log_format: LogFormat,
    /// Lines shown by MOTD, read once at startup from `IRC_MOTD_FILE`. Empty
    /// means no MOTD is configured (`422 ERR_NOMOTD`).
    pub motd: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreKind {
    Memory,
    Sqlite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    Pretty,
    Json,
}

fn default_server_name() -> String {
    "irc.example.org".to_string()
}

fn default_port() -> u16 {
    6667
}

fn default_tls_port() -> u16 {
    6697
}

fn default_oper_name() -> String {
    "admin".to_string()
}

/// Mirrors the teacher's `default_cloak_secret`: generating a usable default
/// is friendlier than refusing to start, but it's not something to run in
/// production unconfigured, so it's logged loudly.
fn default_oper_password() -> String {
    tracing::warn!(
        "IRC_OPER_PASSWORD not set; using a generated default. Set IRC_OPER_PASSWORD in production."
    );
    "changeme".to_string()
}

fn default_store_connection() -> String {
    "malefirc.sqlite3".to_string()
}

impl Config {
    /// Load configuration from the process environment, applying the
    /// defaults documented in SPEC_FULL §6 for anything unset.
    pub fn from_env() -> Self {
        let tls_enabled = env_bool("IRC_TLS_ENABLED", false);
        let store = match env::var("IRC_STORE").as_deref() {
            Ok("sqlite") => StoreKind::Sqlite,
            _ => StoreKind::Memory,
        };
        let log_format = match env::var("IRC_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Config {
            server_name: env::var("IRC_SERVER_NAME").unwrap_or_else(|_| default_server_name()),
            port: env_u16("IRC_PORT", default_port()),
            tls_enabled,
            tls_port: env_u16("IRC_TLS_PORT", default_tls_port()),
            tls_cert_path: env::var("IRC_TLS_CERT_PATH").ok(),
            tls_key_path: env::var("IRC_TLS_KEY_PATH").ok(),
            oper_name: env::var("IRC_OPER_NAME").unwrap_or_else(|_| default_oper_name()),
            oper_password: env::var("IRC_OPER_PASSWORD").unwrap_or_else(|_| default_oper_password()),
            store,
            store_connection: env::var("IRC_STORE_CONNECTION")
                .unwrap_or_else(|_| default_store_connection()),
            log_format,
            motd: load_motd(),
        }
    }
}

fn load_motd() -> Vec<String> {
    let Ok(path) = env::var("IRC_MOTD_FILE") else {
        return Vec::new();
    };
    std::fs::read_to_string(path)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

fn env_u16(key: &str, default: u16) -> u16 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key).as_deref() {
        Ok("1") | Ok("true") | Ok("TRUE") => true,
        Ok("0") | Ok("false") | Ok("FALSE") => false,
        _ => default,
    }
}
