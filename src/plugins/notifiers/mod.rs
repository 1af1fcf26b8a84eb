// Notifier plugin implementations
pub mod email;
pub mod sms;
pub mod telegram;

pub use email::{EmailNotifier, SmtpMailer};
pub use sms::{SmsGatewayNotifier, SmsRecipient};
pub use telegram::{TelegramNotifier, TelegramSettings};
