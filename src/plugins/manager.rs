use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use super::notifiers::{EmailNotifier, SmsGatewayNotifier, SmsRecipient, SmtpMailer, TelegramNotifier, TelegramSettings};
use super::traits::{NotifierPlugin, NotificationMessage, NotificationResult};
use crate::config::NotificationsConfig;
use crate::utils::error::{AppError, Result};

pub type NotifierPluginBox = Box<dyn NotifierPlugin>;

/// Outcome of one channel's send attempt.
#[derive(Debug)]
pub struct ChannelReport {
    pub channel: String,
    pub result: std::result::Result<NotificationResult, AppError>,
    pub elapsed_ms: u64,
}

impl ChannelReport {
    pub fn succeeded(&self) -> bool {
        matches!(&self.result, Ok(result) if result.success)
    }
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    pub channels: Vec<ChannelReport>,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.channels.len()
    }

    pub fn succeeded(&self) -> usize {
        self.channels.iter().filter(|c| c.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    pub fn channel(&self, plugin_type: &str) -> Option<&ChannelReport> {
        self.channels.iter().find(|c| c.channel == plugin_type)
    }
}

/// Holds the configured notification channels and fans one alert out to all
/// of them.
#[derive(Default)]
pub struct PluginManager {
    notifiers: Vec<NotifierPluginBox>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self { notifiers: Vec::new() }
    }

    /// Build every channel that has enough configuration to send.
    pub fn from_config(config: &NotificationsConfig) -> Result<Self> {
        let mut manager = Self::new();

        let sms_recipients = config
            .sms
            .recipients
            .iter()
            .map(|r| r.parse::<SmsRecipient>())
            .collect::<Result<Vec<_>>>()?;
        let email_recipients = config.email.recipients.clone();

        if !sms_recipients.is_empty() || !email_recipients.is_empty() {
            let mailer = Arc::new(SmtpMailer::from_config(&config.smtp)?);

            if !sms_recipients.is_empty() {
                manager.register_notifier(Box::new(SmsGatewayNotifier::new(mailer.clone(), sms_recipients)));
            }
            if !email_recipients.is_empty() {
                manager.register_notifier(Box::new(EmailNotifier::new(mailer, email_recipients)));
            }
        }

        if let Some(settings) = TelegramSettings::from_config(&config.telegram) {
            manager.register_notifier(Box::new(TelegramNotifier::new(settings)?));
        }

        Ok(manager)
    }

    /// Register a notifier plugin
    pub fn register_notifier(&mut self, plugin: NotifierPluginBox) {
        tracing::debug!(channel = plugin.plugin_type(), "Registered notifier: {}", plugin.name());
        self.notifiers.push(plugin);
    }

    /// Check if a notifier plugin exists
    pub fn has_notifier(&self, plugin_type: &str) -> bool {
        self.notifiers.iter().any(|n| n.plugin_type() == plugin_type)
    }

    /// List all registered notifier types, in registration order
    pub fn list_notifier_types(&self) -> Vec<String> {
        self.notifiers.iter().map(|n| n.plugin_type().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Send the alert on every channel concurrently. Each attempt is isolated:
    /// an error or panic in one channel never stops the others, and the call
    /// returns only once all of them have finished.
    pub async fn dispatch(&self, message: &NotificationMessage) -> DispatchReport {
        let attempts = self.notifiers.iter().map(|notifier| async move {
            let channel = notifier.plugin_type().to_string();
            let start = Instant::now();

            tracing::info!(channel = %channel, "Sending notification");

            // Call inside the future so a panic while building it is caught too.
            let attempt = AssertUnwindSafe(async { notifier.notify(message).await });
            let result = match attempt.catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(AppError::notification(&channel, "notifier panicked")),
            };
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(sent) if sent.success => {
                    tracing::info!(channel = %channel, delivered = sent.delivered, elapsed_ms, "Notification sent")
                }
                Ok(sent) => tracing::warn!(
                    channel = %channel,
                    delivered = sent.delivered,
                    error = sent.error.as_deref().unwrap_or(""),
                    "Notification partially sent"
                ),
                Err(e) => tracing::error!(channel = %channel, error = %e, "Notification failed"),
            }

            ChannelReport { channel, result, elapsed_ms }
        });

        DispatchReport {
            channels: join_all(attempts).await,
        }
    }
}
