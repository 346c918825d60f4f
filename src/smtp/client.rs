//! Contact mailer: one inquiry, one connection, one message

use crate::smtp::commands::SmtpCommand;
use crate::smtp::config::{ResolvedSmtp, SmtpSettings};
use crate::smtp::email::{ContactInquiry, ContactMessage};
use crate::smtp::error::SmtpError;
use crate::smtp::reader::ResponseReader;
use crate::smtp::response::SmtpResponse;
use crate::smtp::session::SmtpState;
use crate::smtp::transport::{ConnectTarget, TcpTransport, Transport};

use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// Local correlation id for a delivered message.
///
/// Generated by the client, not assigned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReceipt {
    pub id: String,
}

impl SendReceipt {
    fn new() -> Self {
        Self {
            id: format!("smtp-{}", Utc::now().timestamp_millis()),
        }
    }
}

/// Sends contact inquiries through an SMTP relay
#[derive(Debug, Clone)]
pub struct ContactMailer<T = TcpTransport> {
    settings: SmtpSettings,
    transport: T,
}

impl ContactMailer<TcpTransport> {
    /// Create a mailer that connects over the network
    pub fn new(settings: SmtpSettings) -> Self {
        Self::with_transport(settings, TcpTransport)
    }

    /// Create a mailer from the process environment
    pub fn from_env() -> Result<Self, SmtpError> {
        Ok(Self::new(SmtpSettings::from_env()?))
    }
}

impl<T: Transport> ContactMailer<T> {
    /// Create a mailer with a custom transport
    pub fn with_transport(settings: SmtpSettings, transport: T) -> Self {
        Self {
            settings,
            transport,
        }
    }

    pub fn settings(&self) -> &SmtpSettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Build the message that `send_contact_email` would deliver.
    ///
    /// Only the inquiry is validated; host and credentials may be missing.
    pub fn prepare(&self, inquiry: &ContactInquiry) -> Result<ContactMessage, SmtpError> {
        inquiry.validate()?;
        let addressing = self.settings.addressing();
        Ok(ContactMessage::from_inquiry(
            inquiry,
            &addressing.from_name,
            &addressing.from_email,
            &addressing.recipient,
        ))
    }

    /// Deliver one inquiry.
    ///
    /// Settings and inquiry are checked before connecting. Once connected,
    /// the connection is shut down exactly once whatever the outcome.
    pub async fn send_contact_email(
        &self,
        inquiry: &ContactInquiry,
    ) -> Result<SendReceipt, SmtpError> {
        let config = self.settings.resolve()?;
        inquiry.validate()?;
        let message = message_for(inquiry, &config);
        let target = ConnectTarget::from(&config);

        info!(
            host = %target.host,
            port = target.port,
            implicit_tls = target.implicit_tls,
            "Connecting to SMTP server"
        );
        let stream = self.transport.connect(&target).await?;

        let mut conversation = Conversation {
            transport: &self.transport,
            target: &target,
            reader: Some(ResponseReader::new(stream).with_timeout(config.timeout)),
        };
        let result = conversation.run(&config, &message).await;
        conversation.close().await;
        result?;

        let receipt = SendReceipt::new();
        info!(id = %receipt.id, to = %config.recipient, "Contact inquiry sent");
        Ok(receipt)
    }
}

fn message_for(inquiry: &ContactInquiry, config: &ResolvedSmtp) -> ContactMessage {
    ContactMessage::from_inquiry(
        inquiry,
        &config.from_name,
        &config.from_email,
        &config.recipient,
    )
}

/// State of one connection while the commands are exchanged
struct Conversation<'a, T: Transport> {
    transport: &'a T,
    target: &'a ConnectTarget,
    /// Empty only while the stream is handed to the TLS upgrade
    reader: Option<ResponseReader<T::Stream>>,
}

impl<T: Transport> Conversation<'_, T> {
    async fn run(
        &mut self,
        config: &ResolvedSmtp,
        message: &ContactMessage,
    ) -> Result<(), SmtpError> {
        self.expect(SmtpState::Greeting).await?;
        self.command(SmtpCommand::Ehlo(config.ehlo_name.clone()), SmtpState::Ehlo)
            .await?;

        if !self.target.implicit_tls {
            self.command(SmtpCommand::StartTls, SmtpState::StartTls)
                .await?;
            self.upgrade(config.timeout).await?;
            self.command(SmtpCommand::Ehlo(config.ehlo_name.clone()), SmtpState::TlsEhlo)
                .await?;
        }

        self.command(SmtpCommand::AuthLogin, SmtpState::AuthLogin)
            .await?;
        self.command(SmtpCommand::auth_user(&config.username), SmtpState::AuthUser)
            .await?;
        self.command(
            SmtpCommand::auth_password(&config.password),
            SmtpState::AuthPassword,
        )
        .await?;

        self.command(
            SmtpCommand::MailFrom(config.from_email.clone()),
            SmtpState::MailFrom,
        )
        .await?;
        self.command(
            SmtpCommand::RcptTo(config.recipient.clone()),
            SmtpState::RcptTo,
        )
        .await?;
        self.command(SmtpCommand::Data, SmtpState::Data).await?;

        let payload = message.data_payload();
        debug!("C: <message, {} bytes>", payload.len());
        self.reader()?.write_all(payload.as_bytes()).await?;
        self.expect(SmtpState::MessageBody).await?;

        // The message is accepted at this point; a failed QUIT changes nothing
        if let Err(e) = self.command(SmtpCommand::Quit, SmtpState::Quit).await {
            debug!("QUIT failed: {e}");
        }
        Ok(())
    }

    async fn command(
        &mut self,
        command: SmtpCommand,
        state: SmtpState,
    ) -> Result<SmtpResponse, SmtpError> {
        debug!("C: {command}");
        self.reader()?.write_all(&command.to_wire()).await?;
        self.expect(state).await
    }

    async fn expect(&mut self, state: SmtpState) -> Result<SmtpResponse, SmtpError> {
        let response = self.reader()?.read_response().await?;
        if !state.accepts(response.code) {
            return Err(SmtpError::Protocol {
                state,
                code: response.code,
                line: response.last_line(),
            });
        }
        Ok(response)
    }

    async fn upgrade(&mut self, timeout: Option<Duration>) -> Result<(), SmtpError> {
        if self.reader()?.buffered() > 0 {
            return Err(SmtpError::UnexpectedPlaintext);
        }
        let stream = match self.reader.take() {
            Some(reader) => reader.into_inner()?,
            None => return Err(SmtpError::ConnectionClosed),
        };

        // On failure the transport has already closed the stream
        let stream = self.transport.starttls(stream, self.target).await?;
        info!("STARTTLS upgrade successful");
        self.reader = Some(ResponseReader::new(stream).with_timeout(timeout));
        Ok(())
    }

    fn reader(&mut self) -> Result<&mut ResponseReader<T::Stream>, SmtpError> {
        self.reader.as_mut().ok_or(SmtpError::ConnectionClosed)
    }

    async fn close(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            if let Err(e) = reader.shutdown().await {
                debug!("Error closing SMTP connection: {e}");
            }
        }
    }
}
