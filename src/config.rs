use config::{Config, ConfigError, Environment, File, Map};
use serde::{Deserialize, Deserializer, Serialize};
use std::env;
use std::path::Path;
use url::Url;

pub const ENV_PREFIX: &str = "PAGE_CHECKER";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub browser: BrowserConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrowserConfig {
    /// Page load budget used when the caller does not pass one.
    pub timeout_seconds: u64,
    /// Extra wait after the load event for late JavaScript.
    pub settle_ms: u64,
    /// Time allowed for Chrome to start, on top of the page load budget.
    pub launch_timeout_seconds: u64,
    pub user_agent: String,
    pub accept_language: String,
    pub window_width: u32,
    pub window_height: u32,
    pub chrome_path: Option<String>,
    pub sandbox: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotificationsConfig {
    pub smtp: SmtpConfig,
    pub email: EmailConfig,
    pub sms: SmsConfig,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Implicit TLS, usually port 465.
    Tls,
    /// Plain connection upgraded with STARTTLS, usually port 587.
    StartTls,
    /// No encryption. Only for local relays and tests.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub security: SmtpSecurity,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
    pub from_name: String,
    pub subject: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct EmailConfig {
    #[serde(deserialize_with = "comma_list")]
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SmsConfig {
    /// `number:gateway` or `number:carrier` pairs.
    #[serde(deserialize_with = "comma_list")]
    pub recipients: Vec<String>,
}

/// Accepts a list from a file or one comma-separated string from the
/// environment.
fn comma_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Joined(String),
        List(Vec<String>),
    }

    let items = match Raw::deserialize(deserializer)? {
        Raw::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        Raw::List(items) => items,
    };

    Ok(items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: Option<String>,
    pub level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            browser: BrowserConfig::default(),
            notifications: NotificationsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: crate::models::DEFAULT_TIMEOUT_SECONDS,
            settle_ms: 2000,
            launch_timeout_seconds: 20,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "en-US".to_string(),
            window_width: 1280,
            window_height: 720,
            chrome_path: None,
            sandbox: false,
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 465,
            security: SmtpSecurity::Tls,
            username: None,
            password: None,
            from_address: None,
            from_name: "Page Checker".to_string(),
            subject: "Website check alert".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base_url: "https://api.telegram.org".to_string(),
            timeout_seconds: 15,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: Some("check-website.log".to_string()),
            level: "info".to_string(),
        }
    }
}

impl SmtpConfig {
    pub fn has_credentials(&self) -> bool {
        matches!((&self.username, &self.password), (Some(u), Some(p)) if !u.is_empty() && !p.is_empty())
    }

    /// Sender address, falling back to the login name as Gmail expects.
    pub fn sender_address(&self) -> Option<&str> {
        self.from_address
            .as_deref()
            .or(self.username.as_deref())
            .filter(|address| !address.is_empty())
    }
}

impl TelegramConfig {
    pub fn is_configured(&self) -> bool {
        self.bot_token.as_deref().is_some_and(|t| !t.is_empty())
            && self.chat_id.as_deref().is_some_and(|c| !c.is_empty())
    }
}

impl AppConfig {
    /// Layered load: built-in defaults, `config/default.*`, `config/local.*`,
    /// an optional explicit file, then `PAGE_CHECKER__*` variables from the
    /// environment and `.env`. Callers validate after applying overrides.
    pub fn load(explicit_file: Option<&Path>) -> Result<Self, ConfigError> {
        // A missing .env is the normal case in production.
        let dotenv = dotenvy::dotenv_iter()
            .map(|entries| entries.flatten().collect::<Vec<_>>())
            .unwrap_or_default();
        let process = env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)));

        Self::from_sources(explicit_file, merge_env(dotenv, process))
    }

    fn from_sources(explicit_file: Option<&Path>, vars: Map<String, String>) -> Result<Self, ConfigError> {
        let chrome_path = vars.get("CHROME_PATH").cloned();

        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = explicit_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        // Values stay strings: secrets such as `0012345` must not be read as numbers.
        let s = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .source(Some(vars)),
            )
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        if config.browser.chrome_path.is_none() {
            config.browser.chrome_path = chrome_path;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.browser.timeout_seconds == 0 {
            return Err(ConfigError::Message("Browser timeout_seconds must be greater than 0".into()));
        }

        if self.browser.launch_timeout_seconds == 0 {
            return Err(ConfigError::Message("Browser launch_timeout_seconds must be greater than 0".into()));
        }

        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            return Err(ConfigError::Message("Browser window dimensions must be greater than 0".into()));
        }

        let smtp = &self.notifications.smtp;
        if smtp.port == 0 {
            return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
        }

        let wants_smtp = !self.notifications.email.recipients.is_empty()
            || !self.notifications.sms.recipients.is_empty();
        if wants_smtp {
            if !smtp.has_credentials() {
                return Err(ConfigError::Message(
                    "SMTP username and password are required when email or SMS recipients are set".into(),
                ));
            }
            if smtp.sender_address().is_none() {
                return Err(ConfigError::Message("SMTP from_address or username is required".into()));
            }
        }

        let telegram = &self.notifications.telegram;
        if telegram.bot_token.is_some() != telegram.chat_id.is_some() {
            return Err(ConfigError::Message(
                "Telegram bot_token and chat_id must be set together".into(),
            ));
        }

        if Url::parse(&telegram.api_base_url).is_err() {
            return Err(ConfigError::Message("Invalid Telegram api_base_url".into()));
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::Message(format!(
                "Invalid logging level '{}'",
                self.logging.level
            )));
        }

        Ok(())
    }
}

/// `.env` entries overlaid by the process environment, which wins as it
/// does with `dotenvy::dotenv`.
fn merge_env(
    dotenv: impl IntoIterator<Item = (String, String)>,
    process: impl IntoIterator<Item = (String, String)>,
) -> Map<String, String> {
    let mut vars: Map<String, String> = dotenv.into_iter().collect();
    vars.extend(process);
    vars
}
