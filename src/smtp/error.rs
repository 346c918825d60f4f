//! Error types for the contact mailer

use crate::smtp::session::SmtpState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("Email service not configured: {0}")]
    Config(#[from] ConfigError),

    #[error("Contact inquiry is missing required field `{0}`")]
    InvalidInquiry(&'static str),

    #[error("Unexpected reply to {state}: {code} ({line})")]
    Protocol {
        state: SmtpState,
        code: u16,
        line: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("Malformed reply line: {0:?}")]
    MalformedReply(String),

    #[error("Reply too large (max {max} bytes)")]
    ReplyTooLarge { max: usize },

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Server sent data before the TLS handshake")]
    UnexpectedPlaintext,
}

/// Configuration problems detected before any connection is attempted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing {0}")]
    Missing(&'static str),

    #[error("invalid SMTP_PORT {0:?}")]
    InvalidPort(String),

    #[error("invalid SMTP_TIMEOUT_SECS {0:?}")]
    InvalidTimeout(String),

    #[error("could not load settings: {0}")]
    Load(String),
}

impl SmtpError {
    /// The server answered with a code outside the expected set
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            SmtpError::Protocol { .. } | SmtpError::MalformedReply(_) | SmtpError::ReplyTooLarge { .. }
        )
    }

    /// Socket, TLS or timeout failure underneath the conversation
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SmtpError::Io(_)
                | SmtpError::Tls(_)
                | SmtpError::ConnectionClosed
                | SmtpError::Timeout(_)
                | SmtpError::UnexpectedPlaintext
        )
    }

    /// Rejected before any network I/O took place
    pub fn is_config(&self) -> bool {
        matches!(self, SmtpError::Config(_) | SmtpError::InvalidInquiry(_))
    }

    /// The reply code carried by a protocol error
    pub fn reply_code(&self) -> Option<u16> {
        match self {
            SmtpError::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Size limits applied while reading server replies
pub struct SmtpLimits;

impl SmtpLimits {
    /// Upper bound on a buffered multi-line reply. Servers routinely exceed
    /// the 512 byte per-line limit, so only the whole reply is capped.
    pub const MAX_REPLY_SIZE: usize = 64 * 1024;

    /// Default port for implicit TLS submission
    pub const SMTPS_PORT: u16 = 465;

    /// Default port for STARTTLS submission
    pub const SUBMISSION_PORT: u16 = 587;
}
