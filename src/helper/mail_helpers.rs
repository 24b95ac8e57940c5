use crate::config::Config;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("SMTP is not configured; mail was not sent")]
    NotConfigured,
    #[error("Invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("Mail build error: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Mails a freshly generated temporary password. Blocking; call from inside
/// `web::block`. A missing SMTP configuration is an error the caller is
/// expected to log and swallow, never a reason to undo the reset itself.
pub fn send_temporary_password(config: &Config, to: &str, temporary: &str) -> Result<(), MailError> {
    let host = config.smtp_host.as_deref().ok_or(MailError::NotConfigured)?;
    let from = config.mail_from.as_deref().ok_or(MailError::NotConfigured)?;

    let message = Message::builder()
        .from(from.parse::<Mailbox>()?)
        .to(to.parse::<Mailbox>()?)
        .subject("ONG Connect : mot de passe temporaire")
        .body(format!(
            "Bonjour,\n\n\
             Votre mot de passe temporaire est : {}\n\n\
             Il devra être changé lors de votre prochaine connexion.\n",
            temporary
        ))?;

    let mut builder = SmtpTransport::relay(host)?;
    if let Some(port) = config.smtp_port {
        builder = builder.port(port);
    }
    if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
        builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
    }
    let transport = builder.build();

    transport.send(&message)?;
    log::info!("Temporary password mail sent to {}.", to);
    Ok(())
}
