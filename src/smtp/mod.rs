//! SMTP client implementation

pub mod client;
pub mod commands;
pub mod config;
pub mod email;
pub mod error;
pub mod reader;
pub mod response;
pub mod session;
pub mod transport;

pub use client::{ContactMailer, SendReceipt};
pub use commands::SmtpCommand;
pub use config::{Addressing, ResolvedSmtp, SmtpSettings};
pub use email::{ContactInquiry, ContactMessage};
pub use error::{ConfigError, SmtpError, SmtpLimits};
pub use reader::ResponseReader;
pub use response::{ReplyLine, SmtpResponse};
pub use session::SmtpState;
pub use transport::{ConnectTarget, MailStream, TcpTransport, Transport};
