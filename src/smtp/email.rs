//! Contact inquiry and the message built from it

use crate::smtp::error::SmtpError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const OPENALEX_PROFILE_URL: &str = "https://openalex.org/";

/// A contact form submission, as posted by the web form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInquiry {
    pub full_name: String,
    pub email: String,
    pub plan_interest: String,
    pub biography: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openalex_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_profiles: Option<String>,
}

impl ContactInquiry {
    /// Create an inquiry with the required fields only
    pub fn new(full_name: &str, email: &str, plan_interest: &str, biography: &str) -> Self {
        Self {
            full_name: full_name.to_owned(),
            email: email.to_owned(),
            plan_interest: plan_interest.to_owned(),
            biography: biography.to_owned(),
            ..Default::default()
        }
    }

    /// Reject inquiries with a blank required field
    pub fn validate(&self) -> Result<(), SmtpError> {
        let required = [
            ("fullName", &self.full_name),
            ("email", &self.email),
            ("planInterest", &self.plan_interest),
            ("biography", &self.biography),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(SmtpError::InvalidInquiry(*field)),
            None => Ok(()),
        }
    }

    /// One `Label: value` line per field, absent optional fields omitted
    pub fn detail_lines(&self) -> Vec<String> {
        let optional = |label: &str, value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| format!("{label}: {v}"))
        };

        [
            Some(format!("Name: {}", self.full_name)),
            Some(format!("Email: {}", self.email)),
            optional("Institution", &self.institution),
            optional("Role", &self.role),
            Some(format!("Plan interest: {}", self.plan_interest)),
            optional("Research field", &self.research_field),
            optional("OpenAlex ID", &self.openalex_id),
            optional("Estimated profiles", &self.estimated_profiles),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Plain-text body, sections separated by blank lines
    pub fn text_body(&self) -> String {
        let mut sections = vec![
            "New contact inquiry received.".to_owned(),
            self.detail_lines().join("\n"),
        ];
        if let Some(id) = self.openalex_id.as_deref().filter(|v| !v.is_empty()) {
            sections.push(format!("OpenAlex: {OPENALEX_PROFILE_URL}{id}"));
        }
        sections.push("Biography / context:".to_owned());
        sections.push(self.biography.clone());
        sections.join("\n\n")
    }

    pub fn subject(&self) -> String {
        format!("New contact inquiry from {}", self.full_name)
    }
}

/// A plain-text message ready to go through DATA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMessage {
    pub from_name: String,
    pub from: String,
    pub to: String,
    pub reply_to: String,
    pub subject: String,
    pub body: String,
    pub date: DateTime<Utc>,
}

impl ContactMessage {
    /// Address the inquiry to `to`, with replies going back to the submitter
    pub fn from_inquiry(inquiry: &ContactInquiry, from_name: &str, from: &str, to: &str) -> Self {
        Self {
            from_name: from_name.to_owned(),
            from: from.to_owned(),
            to: to.to_owned(),
            reply_to: inquiry.email.clone(),
            subject: inquiry.subject(),
            body: inquiry.text_body(),
            date: Utc::now(),
        }
    }

    /// Headers, blank line and body, every line CRLF-terminated.
    ///
    /// Field values go in verbatim. A value containing CRLF, or a body line
    /// holding a single dot, is not escaped.
    pub fn render(&self) -> String {
        let headers = [
            format!("From: {} <{}>", self.from_name, self.from),
            format!("To: {}", self.to),
            format!("Reply-To: {}", self.reply_to),
            format!("Subject: {}", self.subject),
            format!("Date: {}", self.date.to_rfc2822()),
            "MIME-Version: 1.0".to_owned(),
            "Content-Type: text/plain; charset=utf-8".to_owned(),
            "Content-Transfer-Encoding: 8bit".to_owned(),
        ];

        let mut out = String::with_capacity(self.body.len() + 512);
        for header in &headers {
            out.push_str(header);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        for line in self.body.lines() {
            out.push_str(line);
            out.push_str("\r\n");
        }
        out
    }

    /// The DATA payload including the `CRLF.CRLF` terminator
    pub fn data_payload(&self) -> String {
        let mut payload = self.render();
        payload.push_str(".\r\n");
        payload
    }
}
