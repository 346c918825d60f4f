//! Buffered reader that turns a byte stream into complete SMTP replies

use crate::smtp::error::{SmtpError, SmtpLimits};
use crate::smtp::response::{ReplyLine, SmtpResponse};

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

const READ_CHUNK: usize = 1024;

/// Owns the connection and the bytes received but not yet consumed.
///
/// Replies may arrive split across any number of reads; `read_response`
/// only resolves once a final line (code followed by a space) is seen.
#[derive(Debug)]
pub struct ResponseReader<S> {
    stream: S,
    buffer: Vec<u8>,
    timeout: Option<Duration>,
}

impl<S> ResponseReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: Vec::with_capacity(READ_CHUNK),
            timeout: None,
        }
    }

    /// Bound each wait for more reply bytes
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read the next complete reply, buffering partial lines across reads
    pub async fn read_response(&mut self) -> Result<SmtpResponse, SmtpError> {
        let mut lines = Vec::new();
        let mut reply_size = 0;

        loop {
            while let Some(line) = self.take_line() {
                debug!("S: {line}");
                reply_size += line.len() + 2;
                if reply_size > SmtpLimits::MAX_REPLY_SIZE {
                    return Err(SmtpError::ReplyTooLarge {
                        max: SmtpLimits::MAX_REPLY_SIZE,
                    });
                }

                let kind = ReplyLine::classify(&line)?;
                lines.push(line);
                if let ReplyLine::Final(_) = kind {
                    return SmtpResponse::from_raw_lines(&lines);
                }
            }

            if reply_size + self.buffer.len() > SmtpLimits::MAX_REPLY_SIZE {
                return Err(SmtpError::ReplyTooLarge {
                    max: SmtpLimits::MAX_REPLY_SIZE,
                });
            }
            self.fill().await?;
        }
    }

    /// Write raw bytes and flush them
    pub async fn write_all(&mut self, data: &[u8]) -> Result<(), SmtpError> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Close the write half of the connection
    pub async fn shutdown(&mut self) -> Result<(), SmtpError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Number of received bytes not yet consumed by a reply
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Give the stream back, e.g. to wrap it in TLS.
    ///
    /// Fails if the server already sent bytes beyond the last reply, since
    /// those would otherwise be mistaken for data received after the upgrade.
    pub fn into_inner(self) -> Result<S, SmtpError> {
        if !self.buffer.is_empty() {
            return Err(SmtpError::UnexpectedPlaintext);
        }
        Ok(self.stream)
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    async fn fill(&mut self) -> Result<(), SmtpError> {
        let mut chunk = [0u8; READ_CHUNK];
        let read = self.stream.read(&mut chunk);
        let n = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| SmtpError::Timeout("server reply"))??,
            None => read.await?,
        };

        if n == 0 {
            return Err(SmtpError::ConnectionClosed);
        }
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(())
    }
}
