//! Byte streams the conversation runs over

use crate::smtp::config::ResolvedSmtp;
use crate::smtp::error::SmtpError;

use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, warn};

/// Where and how to connect for one send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
    /// TLS from the first byte instead of a STARTTLS upgrade
    pub implicit_tls: bool,
    pub accept_invalid_certs: bool,
    pub timeout: Option<Duration>,
}

impl From<&ResolvedSmtp> for ConnectTarget {
    fn from(config: &ResolvedSmtp) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            implicit_tls: config.secure,
            accept_invalid_certs: config.accept_invalid_certs,
            timeout: config.timeout,
        }
    }
}

/// Opens connections and upgrades them to TLS.
///
/// The conversation only sees `Self::Stream`, so a plaintext and a TLS
/// connection are driven by the same code.
#[async_trait]
pub trait Transport: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Open a connection, already encrypted when `target.implicit_tls` is set
    async fn connect(&self, target: &ConnectTarget) -> Result<Self::Stream, SmtpError>;

    /// Wrap an open plaintext connection in TLS after STARTTLS was accepted.
    ///
    /// The stream is owned by the transport from here on: on failure it is
    /// shut down before the error is returned.
    async fn starttls(
        &self,
        stream: Self::Stream,
        target: &ConnectTarget,
    ) -> Result<Self::Stream, SmtpError>;
}

/// A TCP connection, plain or wrapped in TLS
#[derive(Debug)]
pub enum MailStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for MailStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MailStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            MailStream::Tls(s) => Pin::new(&mut **s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MailStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            MailStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            MailStream::Tls(s) => Pin::new(&mut **s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MailStream::Plain(s) => Pin::new(s).poll_flush(cx),
            MailStream::Tls(s) => Pin::new(&mut **s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MailStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            MailStream::Tls(s) => Pin::new(&mut **s).poll_shutdown(cx),
        }
    }
}

/// Real network transport: tokio TCP plus rustls
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

#[async_trait]
impl Transport for TcpTransport {
    type Stream = MailStream;

    async fn connect(&self, target: &ConnectTarget) -> Result<MailStream, SmtpError> {
        let addr = format!("{}:{}", target.host, target.port);
        debug!("Connecting to {addr}");
        let tcp = with_timeout(target.timeout, "connect", TcpStream::connect(&addr)).await??;

        if target.implicit_tls {
            let tls = tls_handshake(tcp, target).await?;
            Ok(MailStream::Tls(Box::new(tls)))
        } else {
            Ok(MailStream::Plain(tcp))
        }
    }

    async fn starttls(
        &self,
        stream: MailStream,
        target: &ConnectTarget,
    ) -> Result<MailStream, SmtpError> {
        match stream {
            MailStream::Plain(tcp) => {
                let tls = tls_handshake(tcp, target).await?;
                Ok(MailStream::Tls(Box::new(tls)))
            }
            MailStream::Tls(mut tls) => {
                if let Err(e) = tls.shutdown().await {
                    debug!("Error closing TLS stream: {e}");
                }
                Err(SmtpError::Tls("connection already uses TLS".into()))
            }
        }
    }
}

async fn with_timeout<F: Future>(
    limit: Option<Duration>,
    what: &'static str,
    fut: F,
) -> Result<F::Output, SmtpError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| SmtpError::Timeout(what)),
        None => Ok(fut.await),
    }
}

/// Run the client handshake. The socket is shut down if it fails; a
/// timed-out handshake drops it.
async fn tls_handshake(
    mut tcp: TcpStream,
    target: &ConnectTarget,
) -> Result<TlsStream<TcpStream>, SmtpError> {
    let (connector, server_name) = match tls_setup(target) {
        Ok(setup) => setup,
        Err(e) => {
            close_socket(&mut tcp).await;
            return Err(e);
        }
    };

    let handshake = connector.connect(server_name, tcp).into_fallible();
    match with_timeout(target.timeout, "TLS handshake", handshake).await? {
        Ok(tls) => Ok(tls),
        Err((e, mut tcp)) => {
            close_socket(&mut tcp).await;
            Err(SmtpError::Tls(format!("handshake failed: {e}")))
        }
    }
}

fn tls_setup(target: &ConnectTarget) -> Result<(TlsConnector, ServerName<'static>), SmtpError> {
    let connector = tls_connector(target.accept_invalid_certs)?;
    let server_name = ServerName::try_from(target.host.clone())
        .map_err(|e| SmtpError::Tls(format!("invalid server name: {e}")))?;
    Ok((connector, server_name))
}

async fn close_socket(tcp: &mut TcpStream) {
    if let Err(e) = tcp.shutdown().await {
        debug!("Error closing socket after failed handshake: {e}");
    }
}

fn tls_connector(accept_invalid_certs: bool) -> Result<TlsConnector, SmtpError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| SmtpError::Tls(e.to_string()))?;

    let config = if accept_invalid_certs {
        warn!("TLS certificate verification disabled");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoCertVerifier(provider)))
            .with_no_client_auth()
    } else {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(roots).with_no_client_auth()
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Accepts any certificate but still checks handshake signatures
#[derive(Debug)]
struct NoCertVerifier(Arc<CryptoProvider>);

impl ServerCertVerifier for NoCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
