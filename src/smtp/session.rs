//! SMTP conversation state

use std::fmt;

/// One step of the client conversation, in the order the steps are taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpState {
    /// Waiting for the server greeting after connect
    Greeting,
    /// First EHLO
    Ehlo,
    /// STARTTLS requested on a plaintext connection
    StartTls,
    /// EHLO re-issued over the upgraded connection
    TlsEhlo,
    /// AUTH LOGIN issued
    AuthLogin,
    /// Base64 user name sent
    AuthUser,
    /// Base64 password sent
    AuthPassword,
    /// MAIL FROM issued
    MailFrom,
    /// RCPT TO issued
    RcptTo,
    /// DATA issued, waiting for the go-ahead
    Data,
    /// Message content and terminator sent
    MessageBody,
    /// QUIT issued
    Quit,
}

impl SmtpState {
    /// Reply codes that let the conversation move past this step
    pub fn expected_codes(&self) -> &'static [u16] {
        match self {
            SmtpState::Greeting => &[220],
            SmtpState::Ehlo | SmtpState::TlsEhlo => &[250],
            SmtpState::StartTls => &[220],
            SmtpState::AuthLogin | SmtpState::AuthUser => &[334],
            SmtpState::AuthPassword => &[235],
            SmtpState::MailFrom => &[250],
            SmtpState::RcptTo => &[250, 251],
            SmtpState::Data => &[354],
            SmtpState::MessageBody => &[250],
            // The connection is closing regardless of what the server says
            SmtpState::Quit => &[],
        }
    }

    /// Check whether a reply code is acceptable for this step
    pub fn accepts(&self, code: u16) -> bool {
        let expected = self.expected_codes();
        expected.is_empty() || expected.contains(&code)
    }
}

impl fmt::Display for SmtpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SmtpState::Greeting => "greeting",
            SmtpState::Ehlo => "EHLO",
            SmtpState::StartTls => "STARTTLS",
            SmtpState::TlsEhlo => "EHLO after STARTTLS",
            SmtpState::AuthLogin => "AUTH LOGIN",
            SmtpState::AuthUser => "AUTH LOGIN username",
            SmtpState::AuthPassword => "AUTH LOGIN password",
            SmtpState::MailFrom => "MAIL FROM",
            SmtpState::RcptTo => "RCPT TO",
            SmtpState::Data => "DATA",
            SmtpState::MessageBody => "message body",
            SmtpState::Quit => "QUIT",
        };
        f.write_str(name)
    }
}
