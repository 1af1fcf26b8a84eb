use crate::config::{SmtpConfig, SmtpSecurity};
use crate::models::CheckOutcome;
use crate::plugins::traits::{NotifierPlugin, NotificationMessage, NotificationResult};
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use lettre::message::{header, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use std::time::Duration;

/// Authenticated SMTP submission shared by the email and SMS gateway channels.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        let sender = config
            .sender_address()
            .ok_or_else(|| AppError::Email("missing sender address".to_string()))?;
        let from: Mailbox = format!("{} <{}>", config.from_name, sender).parse()?;

        let builder = match config.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?,
            SmtpSecurity::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?,
            SmtpSecurity::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
        }
        .port(config.port)
        .timeout(Some(Duration::from_secs(config.timeout_seconds)));

        let transport = match (&config.username, &config.password) {
            (Some(username), Some(password)) => builder
                .credentials(Credentials::new(username.clone(), password.clone()))
                .build(),
            _ => builder.build(),
        };

        Ok(Self { transport, from })
    }

    pub fn from_mailbox(&self) -> &Mailbox {
        &self.from
    }

    pub fn plain_message(&self, to: &str, subject: &str, body: String) -> Result<Message> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body)?;
        Ok(message)
    }

    pub fn alternative_message(&self, to: &str, subject: &str, text: String, html: String) -> Result<Message> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html),
                    ),
            )?;
        Ok(message)
    }

    /// Send and return the server's reply code.
    pub async fn send(&self, message: Message) -> Result<String> {
        let response = self.transport.send(message).await?;
        Ok(response.code().to_string())
    }
}

/// Sends each recipient one message. Partial delivery is reported through
/// `NotificationResult::error`; an `Err` means no recipient got the alert.
pub(crate) async fn send_to_each<F>(
    mailer: &SmtpMailer,
    channel: &str,
    recipients: &[String],
    build: F,
) -> Result<NotificationResult>
where
    F: Fn(&str) -> Result<Message>,
{
    let mut delivered = 0;
    let mut failures = Vec::new();
    let mut last_code = None;

    for recipient in recipients {
        let outcome = match build(recipient.as_str()) {
            Ok(message) => mailer.send(message).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(code) => {
                tracing::debug!(channel, recipient = %recipient, code = %code, "Message accepted");
                delivered += 1;
                last_code = Some(code);
            }
            Err(e) => {
                tracing::warn!(channel, recipient = %recipient, error = %e, "Message rejected");
                failures.push(format!("{}: {}", recipient, e));
            }
        }
    }

    if delivered == 0 {
        return Err(AppError::notification(channel, failures.join("; ")));
    }

    Ok(NotificationResult {
        success: failures.is_empty(),
        message_id: last_code.map(|code| format!("{}-{}", channel, code)),
        delivered,
        error: (!failures.is_empty()).then(|| failures.join("; ")),
    })
}

pub struct EmailNotifier {
    mailer: Arc<SmtpMailer>,
    recipients: Vec<String>,
}

impl EmailNotifier {
    pub fn new(mailer: Arc<SmtpMailer>, recipients: Vec<String>) -> Self {
        EmailNotifier { mailer, recipients }
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    fn format_subject(&self, message: &NotificationMessage) -> String {
        match message.outcome {
            CheckOutcome::SelectorAbsent => format!("{}: element not found", message.subject),
            _ => format!("{}: text changed", message.subject),
        }
    }

    fn format_html_body(&self, message: &NotificationMessage) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; }}
        .change {{ margin: 15px 0; padding: 10px; border-left: 4px solid #ff9800; background: #fff3cd; }}
    </style>
</head>
<body>
    <p>{}</p>
    <div class="change">
        <strong>Expected:</strong> {}<br>
        <strong>Found:</strong> {}
    </div>
    <p><strong>URL:</strong> <a href="{}">{}</a></p>
</body>
</html>
"#,
            escape_html(message.headline()),
            escape_html(&message.expected),
            escape_html(&message.found_description()),
            escape_html(&message.url),
            escape_html(&message.url),
        )
    }

    fn format_text_body(&self, message: &NotificationMessage) -> String {
        let mut text = String::new();

        text.push_str(message.headline());
        text.push_str("\n\n");
        text.push_str(&format!("Expected: {}\n", message.expected));
        text.push_str(&format!("Found: {}\n", message.found_description()));
        text.push_str(&format!("URL: {}\n", message.url));

        text
    }
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
impl NotifierPlugin for EmailNotifier {
    fn name(&self) -> &str {
        "Email Notifier"
    }

    fn plugin_type(&self) -> &str {
        "email"
    }

    fn description(&self) -> &str {
        "Sends alerts via authenticated SMTP with text and HTML parts"
    }

    async fn notify(&self, message: &NotificationMessage) -> Result<NotificationResult> {
        let subject = self.format_subject(message);
        let text_body = self.format_text_body(message);
        let html_body = self.format_html_body(message);

        send_to_each(&self.mailer, self.plugin_type(), &self.recipients, |to| {
            self.mailer
                .alternative_message(to, &subject, text_body.clone(), html_body.clone())
        })
        .await
    }
}
