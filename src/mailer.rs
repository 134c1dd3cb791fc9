//! Notification seam: one message per address, sender equals recipient,
//! delivered through a plain SMTP relay.

use anyhow::{Context, Result};
use lettre::{Message, SmtpTransport, Transport};

pub trait Notifier {
    fn send(&self, address: &str, subject: &str, body: &str) -> Result<()>;
}

pub struct SmtpNotifier {
    transport: SmtpTransport,
}

impl SmtpNotifier {
    /// Unencrypted transport to a local/trusted relay, matching the
    /// deployment where the relay runs on the same host.
    pub fn new(host: &str) -> Self {
        Self {
            transport: SmtpTransport::builder_dangerous(host).build(),
        }
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, address: &str, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(
                address
                    .parse()
                    .with_context(|| format!("invalid address {address}"))?,
            )
            .to(address
                .parse()
                .with_context(|| format!("invalid address {address}"))?)
            .subject(subject)
            .body(body.to_string())
            .context("build notification message")?;

        self.transport
            .send(&message)
            .with_context(|| format!("send notification to {address}"))?;
        Ok(())
    }
}
