//! Send emails to user for important account updates.

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::Smtp;
use crate::error::{Result, ServerError};

const DEFAULT_SMTP_PORT: u16 = 587;

fn mail_error(details: &str, err: impl std::error::Error + 'static) -> ServerError {
    ServerError::Internal {
        details: details.to_owned(),
        source: Some(Box::new(err)),
    }
}

/// SMTP mail sender.
///
/// Without an `smtp` configuration entry the manager is a no-op: account
/// operations proceed and the skipped mail is logged.
#[derive(Clone, Default)]
pub struct MailManager {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
}

impl MailManager {
    /// Create a new [`MailManager`].
    pub fn new(config: &Smtp) -> Result<Self> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|err| mail_error("invalid `from` mailbox", err))?;

        let credentials = Credentials::new(
            config.username.clone(),
            config.password.clone(),
        );
        let transport =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.address)
                .map_err(|err| mail_error("smtp relay setup failed", err))?
                .port(config.port.unwrap_or(DEFAULT_SMTP_PORT))
                .credentials(credentials)
                .build();

        tracing::info!(address = config.address, "smtp relay configured");

        Ok(Self {
            transport: Some(transport),
            from: Some(from),
        })
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> Result<()> {
        let (Some(transport), Some(from)) = (&self.transport, &self.from)
        else {
            tracing::debug!(subject, "mail sending disabled, mail skipped");
            return Ok(());
        };

        let message = Message::builder()
            .from(from.clone())
            .to(to
                .parse()
                .map_err(|err| mail_error("invalid recipient address", err))?)
            .subject(subject)
            .body(body)
            .map_err(|err| mail_error("mail could not be built", err))?;

        transport
            .send(message)
            .await
            .map_err(|err| mail_error("smtp send failed", err))?;

        tracing::trace!(subject, "mail sent");

        Ok(())
    }

    /// Send the account confirmation link.
    pub async fn send_confirmation(
        &self,
        to: &str,
        names: &str,
        link: &str,
    ) -> Result<()> {
        let body = format!(
            "Hello {names},\n\n\
             Welcome! Confirm your account by opening this link:\n{link}\n\n\
             The link expires in 24 hours."
        );
        self.send(to, "Confirm your account", body).await
    }

    /// Send the password reset link.
    pub async fn send_reset(
        &self,
        to: &str,
        names: &str,
        link: &str,
    ) -> Result<()> {
        let body = format!(
            "Hello {names},\n\n\
             A password reset was requested for your account. Choose a new \
             password here:\n{link}\n\n\
             If you did not request this, you can ignore this mail."
        );
        self.send(to, "Reset your password", body).await
    }
}
