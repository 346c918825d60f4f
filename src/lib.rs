//! # ScholarMail
//!
//! ScholarMail delivers contact inquiries from the Scholar.name site to a
//! mailbox over SMTP.
//!
//! The SMTP conversation is implemented directly on top of a TCP or TLS
//! stream: one call opens one connection, sends one message and closes it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scholarmail::{ContactInquiry, ContactMailer};
//!
//! # async fn run() -> Result<(), scholarmail::SmtpError> {
//! // Reads SMTP_HOST, SMTP_USER, SMTP_PASS, ... from the environment
//! let mailer = ContactMailer::from_env()?;
//!
//! let inquiry = ContactInquiry::new("Jane Doe", "jane@uni.edu", "pro", "ML researcher");
//! let receipt = mailer.send_contact_email(&inquiry).await?;
//! println!("sent {}", receipt.id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Conversation
//!
//! - `220` greeting
//! - `EHLO` - `250`
//! - `STARTTLS` - `220`, TLS handshake, `EHLO` again (only when `SMTP_SECURE=false`)
//! - `AUTH LOGIN` - `334`, user name - `334`, password - `235`
//! - `MAIL FROM` - `250`
//! - `RCPT TO` - `250` or `251`
//! - `DATA` - `354`, message and `CRLF.CRLF` - `250`
//! - `QUIT`, reply not checked
//!
//! Any other reply code aborts the send with [`SmtpError::Protocol`], naming
//! the step, the code and the line the server sent.
//!
//! ## Configuration
//!
//! | Variable | Default |
//! |---|---|
//! | `SMTP_HOST` | required |
//! | `SMTP_PORT` | 465, or 587 when `SMTP_SECURE=false` |
//! | `SMTP_USER` | required |
//! | `SMTP_PASS` | required |
//! | `SMTP_SECURE` | implicit TLS unless `false` |
//! | `SMTP_EHLO_NAME` | `SMTP_HOST` |
//! | `SMTP_TIMEOUT_SECS` | no timeout |
//! | `SMTP_TLS_INSECURE` | `false` |
//! | `CONTACT_RECIPIENT` | `info@scholar.name` |
//! | `CONTACT_FROM_EMAIL` | `SMTP_USER`, else `CONTACT_RECIPIENT` |
//! | `CONTACT_FROM_NAME` | `ScholarSite` |
//!
//! Missing required values fail the send before any connection is made.
//! [`ContactMailer::prepare`] only needs the addressing variables.
//!
//! ## Notes
//!
//! - No queueing and no retries.
//! - Inquiry fields are copied into the message verbatim.
//! - The returned id is generated locally, not by the server.

mod smtp;

pub use smtp::{
    Addressing, ConfigError, ConnectTarget, ContactInquiry, ContactMailer, ContactMessage, MailStream,
    ReplyLine, ResolvedSmtp, ResponseReader, SendReceipt, SmtpCommand, SmtpError, SmtpLimits,
    SmtpResponse, SmtpSettings, SmtpState, TcpTransport, Transport,
};
