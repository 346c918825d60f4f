//! In-process SMTP server and a spy transport for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use scholarmail::{ConnectTarget, SmtpError, SmtpResponse, SmtpSettings, Transport};
use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Replies the mock server gives, keyed by step name:
/// GREETING, EHLO, STARTTLS, AUTH, USER, PASS, MAIL, RCPT, DATA, BODY, QUIT
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub overrides: HashMap<&'static str, SmtpResponse>,
    /// Deliver the EHLO reply in two writes, split inside the first line
    pub split_ehlo: bool,
    /// Hang up right after the greeting
    pub close_after_greeting: bool,
    /// Reply to the EHLO that follows STARTTLS, when it differs from the first
    pub tls_ehlo: Option<SmtpResponse>,
    /// Bytes sent in the same write as the STARTTLS 220
    pub starttls_trailer: Option<&'static str>,
}

impl Script {
    pub fn with(mut self, step: &'static str, code: u16, text: &str) -> Self {
        self.overrides.insert(step, SmtpResponse::new(code, text));
        self
    }

    fn reply(&self, step: &'static str) -> SmtpResponse {
        if let Some(reply) = self.overrides.get(step) {
            return reply.clone();
        }
        match step {
            "GREETING" => SmtpResponse::new(220, "mock.local ESMTP ready"),
            "EHLO" => SmtpResponse::new_multiline(
                250,
                vec![
                    "mock.local greets you".to_owned(),
                    "AUTH LOGIN".to_owned(),
                    "STARTTLS".to_owned(),
                ],
            ),
            "STARTTLS" => SmtpResponse::new(220, "Ready to start TLS"),
            "AUTH" => SmtpResponse::new(334, "VXNlcm5hbWU6"),
            "USER" => SmtpResponse::new(334, "UGFzc3dvcmQ6"),
            "PASS" => SmtpResponse::new(235, "Authentication successful"),
            "DATA" => SmtpResponse::new(354, "End data with <CR><LF>.<CR><LF>"),
            "QUIT" => SmtpResponse::new(221, "Bye"),
            _ => SmtpResponse::new(250, "OK"),
        }
    }
}

/// What the server saw
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub commands: Vec<String>,
    pub data: String,
    pub upgrades: usize,
}

impl Transcript {
    pub fn count(&self, verb: &str) -> usize {
        self.commands.iter().filter(|c| c.starts_with(verb)).count()
    }
}

pub enum Outcome<S> {
    Closed,
    StartTls(S),
}

/// Run one server-side conversation until QUIT, hang-up or STARTTLS
pub async fn serve<S>(
    stream: S,
    script: &Script,
    transcript: &Mutex<Transcript>,
    greet: bool,
) -> io::Result<Outcome<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(stream);
    if greet {
        send(&mut reader, &script.reply("GREETING")).await?;
        if script.close_after_greeting {
            return Ok(Outcome::Closed);
        }
    }

    let mut auth_lines = 0;
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(Outcome::Closed);
        }
        let command = line.trim_end().to_owned();
        transcript.lock().unwrap().commands.push(command.clone());

        let step = if auth_lines > 0 {
            auth_lines -= 1;
            if auth_lines == 1 { "USER" } else { "PASS" }
        } else {
            match command.split_whitespace().next().unwrap_or_default() {
                "EHLO" => "EHLO",
                "STARTTLS" => "STARTTLS",
                "AUTH" => "AUTH",
                "MAIL" => "MAIL",
                "RCPT" => "RCPT",
                "DATA" => "DATA",
                "QUIT" => "QUIT",
                _ => "UNKNOWN",
            }
        };
        let reply = match (step, &script.tls_ehlo) {
            ("UNKNOWN", _) => SmtpResponse::new(500, "Command unrecognized"),
            ("EHLO", Some(reply)) if !greet => reply.clone(),
            _ => script.reply(step),
        };

        match step {
            "EHLO" if script.split_ehlo => {
                let wire = reply.format();
                let (head, tail) = wire.split_at(7);
                reader.get_mut().write_all(head.as_bytes()).await?;
                reader.get_mut().flush().await?;
                tokio::time::sleep(Duration::from_millis(20)).await;
                reader.get_mut().write_all(tail.as_bytes()).await?;
                reader.get_mut().flush().await?;
            }
            "STARTTLS" if reply.code == 220 => {
                let mut wire = reply.format();
                wire.push_str(script.starttls_trailer.unwrap_or_default());
                reader.get_mut().write_all(wire.as_bytes()).await?;
                reader.get_mut().flush().await?;
                return Ok(Outcome::StartTls(reader.into_inner()));
            }
            "AUTH" if reply.code == 334 => {
                auth_lines = 2;
                send(&mut reader, &reply).await?;
            }
            "DATA" if reply.code == 354 => {
                send(&mut reader, &reply).await?;
                read_message(&mut reader, transcript).await?;
                send(&mut reader, &script.reply("BODY")).await?;
            }
            "QUIT" => {
                send(&mut reader, &reply).await?;
                return Ok(Outcome::Closed);
            }
            _ => send(&mut reader, &reply).await?,
        }
    }
}

async fn read_message<S>(reader: &mut BufReader<S>, transcript: &Mutex<Transcript>) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        if line.trim_end_matches(['\r', '\n']) == "." {
            return Ok(());
        }
        transcript.lock().unwrap().data.push_str(&line);
    }
}

async fn send<S>(reader: &mut BufReader<S>, reply: &SmtpResponse) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let stream = reader.get_mut();
    stream.write_all(reply.format().as_bytes()).await?;
    stream.flush().await
}

/// Accept one plaintext connection. STARTTLS is acknowledged and the
/// conversation continues on the same socket.
pub async fn start_mock_server(script: Script) -> (u16, JoinHandle<Transcript>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let transcript = Mutex::new(Transcript::default());
        let (stream, _) = listener.accept().await.unwrap();

        let mut outcome = serve(stream, &script, &transcript, true).await;
        while let Ok(Outcome::StartTls(stream)) = outcome {
            transcript.lock().unwrap().upgrades += 1;
            outcome = serve(stream, &script, &transcript, false).await;
        }
        transcript.into_inner().unwrap()
    });

    (port, handle)
}

/// Settings pointing at the mock server
pub fn settings_for(port: u16, extra: &[(&str, &str)]) -> SmtpSettings {
    let mut vars = vec![
        ("SMTP_HOST".to_owned(), "127.0.0.1".to_owned()),
        ("SMTP_PORT".to_owned(), port.to_string()),
        ("SMTP_USER".to_owned(), "mailer@scholar.name".to_owned()),
        ("SMTP_PASS".to_owned(), "s3cret".to_owned()),
        ("SMTP_TIMEOUT_SECS".to_owned(), "5".to_owned()),
    ];
    vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    SmtpSettings::from_vars(vars).unwrap()
}

/// Plain TCP transport that records what the mailer asks of it.
/// The STARTTLS upgrade keeps the socket as it is.
#[derive(Debug, Default, Clone)]
pub struct SpyTransport {
    pub connects: Arc<AtomicUsize>,
    pub upgrades: Arc<AtomicUsize>,
    pub shutdowns: Arc<AtomicUsize>,
    /// Fail the upgrade the way a broken handshake does, closing the stream
    pub fail_starttls: bool,
}

impl SpyTransport {
    pub fn failing_starttls() -> Self {
        Self {
            fail_starttls: true,
            ..Default::default()
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn upgrades(&self) -> usize {
        self.upgrades.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for SpyTransport {
    type Stream = CountingStream;

    async fn connect(&self, target: &ConnectTarget) -> Result<CountingStream, SmtpError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let inner = TcpStream::connect((target.host.as_str(), target.port)).await?;
        Ok(CountingStream {
            inner,
            shutdowns: self.shutdowns.clone(),
        })
    }

    async fn starttls(
        &self,
        mut stream: CountingStream,
        _target: &ConnectTarget,
    ) -> Result<CountingStream, SmtpError> {
        if self.fail_starttls {
            let _ = stream.shutdown().await;
            return Err(SmtpError::Tls("handshake failed".into()));
        }
        self.upgrades.fetch_add(1, Ordering::SeqCst);
        Ok(stream)
    }
}

/// TCP stream that counts completed shutdowns
#[derive(Debug)]
pub struct CountingStream {
    inner: TcpStream,
    shutdowns: Arc<AtomicUsize>,
}

impl AsyncRead for CountingStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for CountingStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let result = Pin::new(&mut self.inner).poll_shutdown(cx);
        if result.is_ready() {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}
