use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Browser launch error: {message}")]
    BrowserLaunch { message: String },

    #[error("Navigation error for {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("Fetch timed out after {timeout_seconds}s: {url}")]
    FetchTimeout { url: String, timeout_seconds: u64 },

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Email error: {0}")]
    Email(String),

    #[error("Notification error: {channel}: {message}")]
    Notification { channel: String, message: String },
}

impl AppError {
    /// Whether this error aborts a check run. Notification failures are
    /// isolated per channel and never fail the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AppError::Notification { .. })
    }

    pub fn notification(channel: impl Into<String>, message: impl ToString) -> Self {
        AppError::Notification {
            channel: channel.into(),
            message: message.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::Email(err.to_string())
    }
}

impl From<lettre::address::AddressError> for AppError {
    fn from(err: lettre::address::AddressError) -> Self {
        AppError::Email(format!("invalid address: {}", err))
    }
}

impl From<lettre::transport::smtp::Error> for AppError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        AppError::Email(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
