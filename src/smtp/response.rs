//! SMTP reply handling

use crate::smtp::error::SmtpError;

/// How a single reply line relates to the rest of the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyLine {
    /// `250-...`: more lines follow
    Continuation(u16),
    /// `250 ...` or a bare `250`: the reply is complete
    Final(u16),
}

impl ReplyLine {
    /// Classify one reply line with its line terminator already removed
    pub fn classify(line: &str) -> Result<Self, SmtpError> {
        let bytes = line.as_bytes();
        if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
            return Err(SmtpError::MalformedReply(line.to_owned()));
        }

        let code = bytes[..3]
            .iter()
            .fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0'));

        match bytes.get(3) {
            None | Some(b' ') => Ok(ReplyLine::Final(code)),
            Some(b'-') => Ok(ReplyLine::Continuation(code)),
            Some(_) => Err(SmtpError::MalformedReply(line.to_owned())),
        }
    }

    /// The three-digit reply code, whichever kind of line it came from
    pub fn code(&self) -> u16 {
        match self {
            ReplyLine::Continuation(code) | ReplyLine::Final(code) => *code,
        }
    }
}

/// A complete, possibly multi-line, reply received from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpResponse {
    /// The reply code of the final line (e.g. 250, 354, 550)
    pub code: u16,
    /// Text of each line with the code and separator stripped
    pub lines: Vec<String>,
}

impl SmtpResponse {
    /// Create a single-line response
    pub fn new(code: u16, message: &str) -> Self {
        Self {
            code,
            lines: vec![message.to_owned()],
        }
    }

    /// Create a multiline response, first line first
    pub fn new_multiline(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Build a response from raw lines as they arrived on the wire
    pub fn from_raw_lines(raw: &[String]) -> Result<Self, SmtpError> {
        let mut code = None;
        let mut lines = Vec::with_capacity(raw.len());

        for line in raw {
            code = Some(ReplyLine::classify(line)?.code());
            lines.push(line.get(4..).unwrap_or_default().to_owned());
        }

        match code {
            Some(code) => Ok(Self { code, lines }),
            None => Err(SmtpError::MalformedReply(String::new())),
        }
    }

    /// The final line the way the server sent it, used in error messages
    pub fn last_line(&self) -> String {
        match self.lines.last() {
            Some(text) if !text.is_empty() => format!("{} {}", self.code, text),
            _ => self.code.to_string(),
        }
    }

    /// Format the response for sending over the wire
    pub fn format(&self) -> String {
        let mut result = String::new();
        let last = self.lines.len().saturating_sub(1);
        for (i, line) in self.lines.iter().enumerate() {
            let sep = if i == last { ' ' } else { '-' };
            result.push_str(&format!("{}{}{}\r\n", self.code, sep, line));
        }
        if self.lines.is_empty() {
            result.push_str(&format!("{}\r\n", self.code));
        }
        result
    }
}
