use crate::plugins::notifiers::email::{send_to_each, SmtpMailer};
use crate::plugins::traits::{NotifierPlugin, NotificationMessage, NotificationResult};
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

/// Carrier name to email-to-SMS gateway domain.
pub const CARRIER_GATEWAYS: &[(&str, &str)] = &[
    ("att", "txt.att.net"),
    ("boost", "sms.myboostmobile.com"),
    ("cricket", "sms.cricketwireless.net"),
    ("googlefi", "msg.fi.google.com"),
    ("metropcs", "mymetropcs.com"),
    ("sprint", "messaging.sprintpcs.com"),
    ("tmobile", "tmomail.net"),
    ("t-mobile", "tmomail.net"),
    ("uscellular", "email.uscc.net"),
    ("verizon", "vtext.com"),
    ("virgin", "vmobl.com"),
];

/// Gateway domain for a carrier name, case-insensitive.
pub fn carrier_gateway(carrier: &str) -> Option<&'static str> {
    let carrier = carrier.trim().to_ascii_lowercase();
    CARRIER_GATEWAYS
        .iter()
        .find(|(name, _)| *name == carrier)
        .map(|(_, domain)| *domain)
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{7,15}$").expect("valid phone regex"))
}

fn domain_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9-]*[a-z0-9])?)+$")
            .expect("valid domain regex")
    })
}

/// A phone number bound to its carrier's email gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsRecipient {
    pub number: String,
    pub gateway: String,
}

impl SmsRecipient {
    pub fn address(&self) -> String {
        format!("{}@{}", self.number, self.gateway)
    }
}

impl fmt::Display for SmsRecipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}

impl FromStr for SmsRecipient {
    type Err = AppError;

    /// Accepts `number:gateway-domain`, `number:carrier` or `number@gateway-domain`.
    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        let (number, target) = value
            .split_once(':')
            .or_else(|| value.split_once('@'))
            .ok_or_else(|| {
                AppError::Validation(format!("SMS recipient '{}' must look like number:gateway", value))
            })?;

        let number: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
        if !phone_regex().is_match(&number) {
            return Err(AppError::Validation(format!(
                "SMS recipient '{}' has an invalid phone number",
                value
            )));
        }

        let target = target.trim().to_ascii_lowercase();
        let gateway = if target.contains('.') {
            target
        } else {
            carrier_gateway(&target)
                .ok_or_else(|| AppError::Validation(format!("Unknown carrier '{}'", target)))?
                .to_string()
        };

        if !domain_regex().is_match(&gateway) {
            return Err(AppError::Validation(format!("Invalid gateway domain '{}'", gateway)));
        }

        Ok(Self { number, gateway })
    }
}

pub struct SmsGatewayNotifier {
    mailer: Arc<SmtpMailer>,
    recipients: Vec<SmsRecipient>,
}

impl SmsGatewayNotifier {
    pub fn new(mailer: Arc<SmtpMailer>, recipients: Vec<SmsRecipient>) -> Self {
        SmsGatewayNotifier { mailer, recipients }
    }

    pub fn recipients(&self) -> &[SmsRecipient] {
        &self.recipients
    }
}

#[async_trait]
impl NotifierPlugin for SmsGatewayNotifier {
    fn name(&self) -> &str {
        "SMS Gateway Notifier"
    }

    fn plugin_type(&self) -> &str {
        "sms"
    }

    fn description(&self) -> &str {
        "Sends plain-text alerts to phones through carrier email-to-SMS gateways"
    }

    async fn notify(&self, message: &NotificationMessage) -> Result<NotificationResult> {
        let addresses: Vec<String> = self.recipients.iter().map(SmsRecipient::address).collect();
        // Gateways drop HTML and truncate long bodies; the one-line summary is enough.
        let body = message.summary();

        send_to_each(&self.mailer, self.plugin_type(), &addresses, |to| {
            self.mailer.plain_message(to, &message.subject, body.clone())
        })
        .await
    }
}
