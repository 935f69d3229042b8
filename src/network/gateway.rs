//! Gateway: binds the plain and (optionally) TLS listeners and spawns a
//! connection task per accepted socket (spec §4.G).

use std::io::Cursor;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::handlers::HandlerContext;
use crate::network::connection::handle_connection;

/// Run the plain-TCP accept loop forever, spawning one task per connection.
#[instrument(skip(ctx))]
pub async fn run_plain(ctx: Arc<HandlerContext>, config: Arc<Config>) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "plain listener bound");

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    handle_connection(ctx, stream, peer).await;
                });
            }
            Err(e) => error!(error = %e, "accept failed"),
        }
    }
}

/// Run the TLS accept loop forever. The TLS handshake completes before the
/// connection task (and thus the World) ever sees the socket; a failed
/// handshake just closes it.
#[instrument(skip(ctx, config))]
pub async fn run_tls(ctx: Arc<HandlerContext>, config: Arc<Config>) -> anyhow::Result<()> {
    let acceptor = build_acceptor(&config).await?;
    let addr = format!("0.0.0.0:{}", config.tls_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "tls listener bound");

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let ctx = Arc::clone(&ctx);
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    match acceptor.accept(stream).await {
                        Ok(tls_stream) => handle_connection(ctx, tls_stream, peer).await,
                        Err(e) => warn!(%peer, error = %e, "tls handshake failed"),
                    }
                });
            }
            Err(e) => error!(error = %e, "accept failed"),
        }
    }
}

async fn build_acceptor(config: &Config) -> anyhow::Result<TlsAcceptor> {
    let cert_path = config
        .tls_cert_path
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("IRC_TLS_CERT_PATH is required when IRC_TLS_ENABLED=true"))?;
    let key_path = config
        .tls_key_path
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("IRC_TLS_KEY_PATH is required when IRC_TLS_ENABLED=true"))?;

    let cert_data = tokio::fs::read(cert_path).await?;
    let cert_chain: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut Cursor::new(&cert_data))
        .filter_map(|r| r.ok())
        .collect();
    if cert_chain.is_empty() {
        anyhow::bail!("no certificates found in {cert_path}");
    }

    let key_data = tokio::fs::read(key_path).await?;
    let key: PrivateKeyDer<'static> = rustls_pemfile::pkcs8_private_keys(&mut Cursor::new(&key_data))
        .filter_map(|r| r.ok())
        .map(PrivateKeyDer::Pkcs8)
        .next()
        .ok_or_else(|| anyhow::anyhow!("no private key found in {key_path}"))?;

    let tls_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)?;

    Ok(TlsAcceptor::from(Arc::new(tls_config)))
}
