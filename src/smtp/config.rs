//! Mailer settings

use crate::smtp::error::{ConfigError, SmtpLimits};

use config::{Config as ConfigBuilder, Environment};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_RECIPIENT: &str = "info@scholar.name";
pub const DEFAULT_FROM_NAME: &str = "ScholarSite";

/// Raw settings as found in the environment. Nothing is validated until
/// [`SmtpSettings::resolve`] is called at send time.
#[derive(Clone, Default, Deserialize)]
pub struct SmtpSettings {
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_port: Option<String>,
    #[serde(default)]
    pub smtp_user: Option<String>,
    #[serde(default)]
    pub smtp_pass: Option<String>,
    #[serde(default)]
    pub smtp_secure: Option<String>,
    #[serde(default)]
    pub smtp_ehlo_name: Option<String>,
    #[serde(default)]
    pub smtp_timeout_secs: Option<String>,
    #[serde(default)]
    pub smtp_tls_insecure: Option<String>,
    #[serde(default)]
    pub contact_recipient: Option<String>,
    #[serde(default)]
    pub contact_from_email: Option<String>,
    #[serde(default)]
    pub contact_from_name: Option<String>,
}

/// Settings with defaults applied and required values present
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedSmtp {
    pub host: String,
    pub port: u16,
    /// Implicit TLS when true, STARTTLS upgrade when false
    pub secure: bool,
    pub username: String,
    pub password: String,
    pub ehlo_name: String,
    pub from_email: String,
    pub from_name: String,
    pub recipient: String,
    pub timeout: Option<Duration>,
    pub accept_invalid_certs: bool,
}

/// Who the message is from and to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addressing {
    pub from_name: String,
    pub from_email: String,
    pub recipient: String,
}

impl SmtpSettings {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::default())
    }

    /// Load from an explicit set of `NAME=value` pairs
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: config::Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::load(Environment::default().source(Some(map)))
    }

    fn load(source: Environment) -> Result<Self, ConfigError> {
        ConfigBuilder::builder()
            .add_source(source)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Apply defaults and check that host and credentials are present
    pub fn resolve(&self) -> Result<ResolvedSmtp, ConfigError> {
        let host = present(&self.smtp_host).ok_or(ConfigError::Missing("SMTP_HOST"))?;
        let username = present(&self.smtp_user).ok_or(ConfigError::Missing("SMTP_USER"))?;
        let password = present(&self.smtp_pass).ok_or(ConfigError::Missing("SMTP_PASS"))?;

        let secure = !present(&self.smtp_secure).is_some_and(|v| v.eq_ignore_ascii_case("false"));

        let port = match present(&self.smtp_port) {
            Some(raw) => raw
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| ConfigError::InvalidPort(raw.to_owned()))?,
            None if secure => SmtpLimits::SMTPS_PORT,
            None => SmtpLimits::SUBMISSION_PORT,
        };

        let timeout = match present(&self.smtp_timeout_secs) {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .ok()
                    .filter(|s| *s > 0)
                    .map(Duration::from_secs)
                    .ok_or_else(|| ConfigError::InvalidTimeout(raw.to_owned()))?,
            ),
            None => None,
        };

        let Addressing {
            from_name,
            from_email,
            recipient,
        } = self.addressing();

        Ok(ResolvedSmtp {
            host: host.to_owned(),
            port,
            secure,
            username: username.to_owned(),
            password: password.to_owned(),
            ehlo_name: present(&self.smtp_ehlo_name).unwrap_or(host).to_owned(),
            from_email,
            from_name,
            recipient,
            timeout,
            accept_invalid_certs: present(&self.smtp_tls_insecure)
                .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1"),
        })
    }

    /// Resolve only sender and recipient. Needs no relay settings, so a
    /// message can be built without SMTP credentials.
    ///
    /// From is `CONTACT_FROM_EMAIL`, else `SMTP_USER`, else the recipient.
    pub fn addressing(&self) -> Addressing {
        let recipient = present(&self.contact_recipient).unwrap_or(DEFAULT_RECIPIENT);
        let from_email = present(&self.contact_from_email)
            .or_else(|| present(&self.smtp_user))
            .unwrap_or(recipient);

        Addressing {
            from_name: present(&self.contact_from_name)
                .unwrap_or(DEFAULT_FROM_NAME)
                .to_owned(),
            from_email: from_email.to_owned(),
            recipient: recipient.to_owned(),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_user", &self.smtp_user)
            .field("smtp_pass", &self.smtp_pass.as_ref().map(|_| "<redacted>"))
            .field("smtp_secure", &self.smtp_secure)
            .field("contact_recipient", &self.contact_recipient)
            .field("contact_from_email", &self.contact_from_email)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for ResolvedSmtp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSmtp")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from_email", &self.from_email)
            .field("recipient", &self.recipient)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
