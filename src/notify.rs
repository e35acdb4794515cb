//! 完了通知
//!
//! SMTP 設定があればメールで送り、なければ内容をログに出す。

use std::fs;
use std::path::Path;
use std::sync::Arc;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

use crate::config::{ArchiveConfig, SmtpSettings, DEFAULT_NOTIFY_SENDER};
use crate::error::ArchiveError;
use crate::traits::Notifier;

/// 設定に応じた Notifier
pub fn notifier_for(config: &ArchiveConfig) -> Arc<dyn Notifier> {
    match &config.smtp {
        Some(smtp) => Arc::new(SmtpNotifier::new(smtp.clone())),
        None => Arc::new(TracingNotifier::new(DEFAULT_NOTIFY_SENDER)),
    }
}

fn check_delivery(recipients: &[String], attachments: &[&Path]) -> Result<(), ArchiveError> {
    if recipients.is_empty() {
        return Err(ArchiveError::Notify("no recipients".into()));
    }
    if let Some(missing) = attachments.iter().find(|path| !path.is_file()) {
        return Err(ArchiveError::Notify(format!(
            "attachment not found: {}",
            missing.display()
        )));
    }
    Ok(())
}

/// 通知内容をログに出す Notifier
#[derive(Debug, Clone)]
pub struct TracingNotifier {
    sender: String,
}

impl TracingNotifier {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }
}

impl Notifier for TracingNotifier {
    fn send(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
        attachments: &[&Path],
    ) -> Result<(), ArchiveError> {
        check_delivery(recipients, attachments)?;

        info!(
            target: "notify",
            from = %self.sender,
            to = %recipients.join(", "),
            attachments = attachments.len(),
            "{}: {}",
            subject,
            body
        );
        Ok(())
    }
}

/// SMTP でメールを送る Notifier
#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    settings: SmtpSettings,
}

impl SmtpNotifier {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    /// 本文 + 添付ファイルのメッセージを組み立てる
    fn message(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
        attachments: &[&Path],
    ) -> Result<Message, ArchiveError> {
        let from: Mailbox = parse_mailbox(&self.settings.sender)?;
        let mut builder = Message::builder().from(from).subject(subject);
        for recipient in recipients {
            builder = builder.to(parse_mailbox(recipient)?);
        }

        let csv = ContentType::parse("text/csv")
            .map_err(|e| ArchiveError::Notify(format!("content type: {e}")))?;
        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(body.to_string()));
        for path in attachments {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let content = fs::read(path).map_err(|e| {
                ArchiveError::Notify(format!("attachment {}: {e}", path.display()))
            })?;
            parts = parts.singlepart(Attachment::new(name).body(content, csv.clone()));
        }

        builder
            .multipart(parts)
            .map_err(|e| ArchiveError::Notify(format!("message: {e}")))
    }

    /// 認証情報があれば STARTTLS、なければ平文で接続する
    fn transport(&self) -> Result<SmtpTransport, ArchiveError> {
        let settings = &self.settings;
        let mut builder = match (&settings.username, &settings.password) {
            (Some(username), Some(password)) => SmtpTransport::starttls_relay(&settings.server)
                .map_err(|e| ArchiveError::Notify(format!("{}: {e}", settings.server)))?
                .credentials(Credentials::new(username.clone(), password.clone())),
            _ => SmtpTransport::builder_dangerous(settings.server.as_str()),
        };
        if let Some(port) = settings.port {
            builder = builder.port(port);
        }
        Ok(builder.build())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, ArchiveError> {
    address
        .parse()
        .map_err(|e| ArchiveError::Notify(format!("invalid address '{address}': {e}")))
}

impl Notifier for SmtpNotifier {
    fn send(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
        attachments: &[&Path],
    ) -> Result<(), ArchiveError> {
        check_delivery(recipients, attachments)?;

        let message = self.message(recipients, subject, body, attachments)?;
        self.transport()?
            .send(&message)
            .map_err(|e| ArchiveError::Notify(format!("{}: {e}", self.settings.server)))?;

        info!(
            "Sent completion notice to {} via {}",
            recipients.join(", "),
            self.settings.server
        );
        Ok(())
    }
}
