//! Email Service
//!
//! SMTP-based delivery of club invitation emails.

use anyhow::{Context, Result};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::Config;
use crate::permissions::ClubRole;

/// Email service for sending transactional emails via SMTP.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: Mailbox,
}

impl EmailService {
    /// Create a new email service from server configuration.
    ///
    /// Requires SMTP to be fully configured (`config.has_smtp()` must be true).
    pub fn new(config: &Config) -> Result<Self> {
        let host = config.smtp_host.as_ref().context("SMTP_HOST is required")?;
        let username = config
            .smtp_username
            .as_ref()
            .context("SMTP_USERNAME is required")?;
        let password = config
            .smtp_password
            .as_ref()
            .context("SMTP_PASSWORD is required")?;
        let from = config.smtp_from.as_ref().context("SMTP_FROM is required")?;

        let from_address: Mailbox = from
            .parse()
            .context("SMTP_FROM is not a valid email address")?;

        let creds = Credentials::new(username.clone(), password.clone());

        let mailer = match config.smtp_tls.as_str() {
            "tls" => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .context("Failed to create SMTP TLS transport")?
                .port(config.smtp_port)
                .credentials(creds)
                .build(),
            "none" => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                .port(config.smtp_port)
                .credentials(creds)
                .build(),
            // Default: STARTTLS
            _ => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .context("Failed to create SMTP STARTTLS transport")?
                .port(config.smtp_port)
                .credentials(creds)
                .build(),
        };

        Ok(Self {
            mailer,
            from_address,
        })
    }

    /// Test the SMTP connection by sending a NOOP command.
    pub async fn test_connection(&self) -> Result<()> {
        let ok = self
            .mailer
            .test_connection()
            .await
            .context("SMTP connection test failed")?;
        if !ok {
            anyhow::bail!("SMTP server did not respond positively to connection test");
        }
        Ok(())
    }

    /// Send an invitation email.
    pub async fn send_invite(&self, to_email: &str, invite: &InviteEmail<'_>) -> Result<()> {
        let to_mailbox: Mailbox = to_email
            .parse()
            .context("Invalid recipient email address")?;

        let (subject, body) = invite.compose();

        let email = Message::builder()
            .from(self.from_address.clone())
            .to(to_mailbox)
            .subject(subject)
            .body(body)
            .context("Failed to build email message")?;

        self.mailer
            .send(email)
            .await
            .context("Failed to send invitation email via SMTP")?;

        Ok(())
    }
}

/// Which invitation message to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteTemplate {
    /// Standard invitation to join a club.
    Invite,
    /// Invitation to take ownership of a club that has no members yet.
    OwnerInvite,
}

/// Context rendered into an invitation email.
#[derive(Debug, Clone)]
pub struct InviteEmail<'a> {
    pub template: InviteTemplate,
    pub club_name: &'a str,
    pub role: ClubRole,
    pub title: &'a str,
    /// Full link the recipient follows to accept.
    pub url: String,
    /// Display name of the person who sent the invite, if any.
    pub sender: Option<&'a str>,
}

impl InviteEmail<'_> {
    /// Render subject and plain-text body.
    #[must_use]
    pub fn compose(&self) -> (String, String) {
        match self.template {
            InviteTemplate::Invite => {
                let sender = self
                    .sender
                    .map(|name| format!("{name} has invited you"))
                    .unwrap_or_else(|| "You have been invited".to_string());
                (
                    format!("Invitation to join {}", self.club_name),
                    format!(
                        "Hello,\n\
                         \n\
                         {sender} to join {club} as {role} ({title}).\n\
                         \n\
                         Accept the invitation here:\n\
                         {url}\n\
                         \n\
                         If you were not expecting this, you can ignore this email.\n",
                        club = self.club_name,
                        role = self.role.label(),
                        title = self.title,
                        url = self.url,
                    ),
                )
            }
            InviteTemplate::OwnerInvite => (
                format!("Take ownership of {}", self.club_name),
                format!(
                    "Hello,\n\
                     \n\
                     {club} has been set up in the club directory and you have been \
                     named its owner.\n\
                     \n\
                     Claim the club and start managing its page here:\n\
                     {url}\n\
                     \n\
                     Once claimed you can invite officers and members yourself.\n",
                    club = self.club_name,
                    url = self.url,
                ),
            ),
        }
    }
}

/// Send an invitation if mail is configured.
///
/// Delivery is fire-and-forget: a missing SMTP setup or a failed send is
/// logged and never surfaces to the caller.
pub async fn dispatch_invite(mailer: Option<&EmailService>, to_email: &str, invite: &InviteEmail<'_>) {
    let Some(mailer) = mailer else {
        tracing::info!(
            to = %to_email,
            template = ?invite.template,
            "SMTP not configured, skipping invitation email"
        );
        return;
    };

    if let Err(e) = mailer.send_invite(to_email, invite).await {
        tracing::warn!(to = %to_email, error = %e, "Failed to send invitation email");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: create a Config with all SMTP fields populated (using `smtp_tls: "none"`
    /// to avoid DNS resolution / TLS handshake in tests).
    fn smtp_test_config() -> Config {
        let mut config = Config::default_for_test();
        config.smtp_host = Some("localhost".into());
        config.smtp_username = Some("testuser".into());
        config.smtp_password = Some("testpass".into());
        config.smtp_from = Some("noreply@example.com".into());
        config.smtp_tls = "none".into();
        config
    }

    /// Extract the error from a Result<EmailService>, panicking if Ok.
    fn expect_err(result: Result<EmailService>) -> anyhow::Error {
        match result {
            Err(e) => e,
            Ok(_) => panic!("Expected error, got Ok"),
        }
    }

    #[test]
    fn test_new_success() {
        let config = smtp_test_config();
        let result = EmailService::new(&config);
        assert!(
            result.is_ok(),
            "EmailService::new should succeed with valid SMTP config"
        );
    }

    #[test]
    fn test_new_missing_host() {
        let mut config = smtp_test_config();
        config.smtp_host = None;
        let err = expect_err(EmailService::new(&config));
        assert!(
            err.to_string().contains("SMTP_HOST"),
            "Error should mention SMTP_HOST: {err}"
        );
    }

    #[test]
    fn test_new_missing_username() {
        let mut config = smtp_test_config();
        config.smtp_username = None;
        let err = expect_err(EmailService::new(&config));
        assert!(
            err.to_string().contains("SMTP_USERNAME"),
            "Error should mention SMTP_USERNAME: {err}"
        );
    }

    #[test]
    fn test_new_missing_password() {
        let mut config = smtp_test_config();
        config.smtp_password = None;
        let err = expect_err(EmailService::new(&config));
        assert!(
            err.to_string().contains("SMTP_PASSWORD"),
            "Error should mention SMTP_PASSWORD: {err}"
        );
    }

    #[test]
    fn test_new_missing_from() {
        let mut config = smtp_test_config();
        config.smtp_from = None;
        let err = expect_err(EmailService::new(&config));
        assert!(
            err.to_string().contains("SMTP_FROM"),
            "Error should mention SMTP_FROM: {err}"
        );
    }

    #[test]
    fn test_new_invalid_from_address() {
        let mut config = smtp_test_config();
        config.smtp_from = Some("not-an-email".into());
        let err = expect_err(EmailService::new(&config));
        assert!(
            err.to_string().contains("valid email"),
            "Error should mention invalid email: {err}"
        );
    }

    fn invite(template: InviteTemplate) -> InviteEmail<'static> {
        InviteEmail {
            template,
            club_name: "Penn Labs",
            role: ClubRole::Officer,
            title: "Treasurer",
            url: "http://localhost:3000/invite/penn-labs/1/abc".into(),
            sender: Some("Alice"),
        }
    }

    #[test]
    fn test_compose_standard_invite() {
        let (subject, body) = invite(InviteTemplate::Invite).compose();
        assert_eq!(subject, "Invitation to join Penn Labs");
        assert!(body.contains("Alice has invited you to join Penn Labs as Officer (Treasurer)"));
        assert!(body.contains("http://localhost:3000/invite/penn-labs/1/abc"));
    }

    #[test]
    fn test_compose_owner_invite() {
        let (subject, body) = invite(InviteTemplate::OwnerInvite).compose();
        assert_eq!(subject, "Take ownership of Penn Labs");
        assert!(body.contains("named its owner"));
        assert!(body.contains("/invite/penn-labs/1/abc"));
    }

    #[tokio::test]
    async fn test_dispatch_without_mailer_is_noop() {
        dispatch_invite(None, "bob@example.com", &invite(InviteTemplate::Invite)).await;
    }
}
