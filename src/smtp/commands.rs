//! Commands sent by the client

use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::fmt;

/// A single client command, in the order the conversation issues them
#[derive(Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Ehlo(String),
    StartTls,
    AuthLogin,
    /// One base64 line of the AUTH LOGIN exchange
    AuthCredential(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    Quit,
}

impl SmtpCommand {
    /// AUTH LOGIN user name line
    pub fn auth_user(username: &str) -> Self {
        SmtpCommand::AuthCredential(STANDARD.encode(username))
    }

    /// AUTH LOGIN password line
    pub fn auth_password(password: &str) -> Self {
        SmtpCommand::AuthCredential(STANDARD.encode(password))
    }

    /// The command line without the trailing CRLF
    pub fn line(&self) -> String {
        match self {
            SmtpCommand::Ehlo(domain) => format!("EHLO {domain}"),
            SmtpCommand::StartTls => "STARTTLS".to_owned(),
            SmtpCommand::AuthLogin => "AUTH LOGIN".to_owned(),
            SmtpCommand::AuthCredential(encoded) => encoded.clone(),
            SmtpCommand::MailFrom(addr) => format!("MAIL FROM:<{addr}>"),
            SmtpCommand::RcptTo(addr) => format!("RCPT TO:<{addr}>"),
            SmtpCommand::Data => "DATA".to_owned(),
            SmtpCommand::Quit => "QUIT".to_owned(),
        }
    }

    /// Bytes to put on the wire
    pub fn to_wire(&self) -> Vec<u8> {
        format!("{}\r\n", self.line()).into_bytes()
    }
}

/// Log-safe rendering: credential lines are never printed
impl fmt::Display for SmtpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmtpCommand::AuthCredential(_) => f.write_str("<credentials>"),
            other => f.write_str(&other.line()),
        }
    }
}

impl fmt::Debug for SmtpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SmtpCommand({self})")
    }
}
