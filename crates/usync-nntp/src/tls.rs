use std::sync::Arc;

use rustls_pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};

use crate::error::{NntpError, Result};

/// Opens a TCP connection to `host:port` and, when `ssl` is set, wraps it
/// in TLS using the platform's well-known root store.
/// Plaintext NNTP (`ssl = false`) is supported for talking to a local test
/// server, never recommended for a real feed.
pub async fn connect(host: &str, port: u16, ssl: bool) -> Result<Box<dyn AsyncReadWrite>> {
    let tcp = TcpStream::connect((host, port)).await?;
    tcp.set_nodelay(true).ok();

    if !ssl {
        return Ok(Box::new(tcp));
    }

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| NntpError::Transient(e.to_string()))?
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));

    let server_name = ServerName::try_from(host.to_string()).map_err(|_| NntpError::Transient(format!("invalid host name {host}")))?;
    let stream = connector.connect(server_name, tcp).await?;
    Ok(Box::new(stream))
}

/// Object-safe alias for the bidirectional byte stream a connection needs;
/// lets [`connect`] return either a raw `TcpStream` or a `TlsStream` behind
/// one trait object.
pub trait AsyncReadWrite: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send {}
impl AsyncReadWrite for TcpStream {}
impl AsyncReadWrite for TlsStream<TcpStream> {}
