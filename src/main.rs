use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use page_checker::checker::exit_status;
use page_checker::config::{AppConfig, LoggingConfig};
use page_checker::plugins::PluginManager;
use page_checker::{ChromeFetcher, CheckRequest, PageChecker};

/// Load a page in headless Chrome and alert when an element's text is not
/// what you expect.
#[derive(Debug, Parser)]
#[command(name = "page-checker", version, about)]
struct Cli {
    /// Page to load (http or https)
    url: String,

    /// CSS selector of the watched element
    selector: String,

    /// Text the element should contain
    expected: String,

    /// Page load timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Log file path, appended to on every run
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Do not write a log file
    #[arg(long, conflicts_with = "log_file")]
    no_log_file: bool,

    /// Extra configuration file (toml, yaml or json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SMS recipients as number:gateway or number:carrier
    #[arg(long, value_delimiter = ',')]
    sms: Vec<String>,

    /// Email recipients
    #[arg(long, value_delimiter = ',')]
    email: Vec<String>,

    /// Telegram chat id (the bot token comes from configuration)
    #[arg(long, allow_hyphen_values = true)]
    telegram_chat_id: Option<String>,

    /// Wait after page load for late scripts, in milliseconds
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Chrome or Chromium binary
    #[arg(long)]
    chrome_path: Option<PathBuf>,
}

impl Cli {
    /// Command-line values win over configuration files and environment.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(timeout) = self.timeout {
            config.browser.timeout_seconds = timeout;
        }
        if let Some(settle_ms) = self.settle_ms {
            config.browser.settle_ms = settle_ms;
        }
        if let Some(path) = &self.chrome_path {
            config.browser.chrome_path = Some(path.to_string_lossy().into_owned());
        }
        if !self.sms.is_empty() {
            config.notifications.sms.recipients = self.sms.clone();
        }
        if !self.email.is_empty() {
            config.notifications.email.recipients = self.email.clone();
        }
        if let Some(chat_id) = &self.telegram_chat_id {
            config.notifications.telegram.chat_id = Some(chat_id.clone());
        }
        if let Some(path) = &self.log_file {
            config.logging.file = Some(path.to_string_lossy().into_owned());
        }
        if self.no_log_file {
            config.logging.file = None;
        }
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("page_checker={}", logging.level)))?;

    let (file_layer, guard) = match &logging.file {
        Some(path) => {
            let path = PathBuf::from(path);
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("log file '{}' has no file name", path.display()))?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

async fn run(cli: Cli) -> Result<u8> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    // Keep the guard alive until exit so buffered log lines are flushed.
    let _guard = init_tracing(&config.logging)?;

    let request = CheckRequest::new(
        cli.url,
        cli.selector,
        cli.expected,
        Some(config.browser.timeout_seconds),
    )?;

    let notifiers = PluginManager::from_config(&config.notifications)?;
    info!(channels = ?notifiers.list_notifier_types(), "Starting page check");

    let checker = PageChecker::new(Box::new(ChromeFetcher::new(config.browser.clone())), notifiers)
        .with_subject(config.notifications.smtp.subject.clone());

    let run = checker.run(&request).await;
    if let Ok(report) = &run {
        info!(
            outcome = %report.result.outcome,
            checked_at = %report.checked_at.to_rfc3339(),
            elapsed_ms = report.elapsed_ms,
            "Page check finished"
        );
    }

    Ok(exit_status(&run))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            // Tracing may not be up yet when configuration fails.
            eprintln!("page-checker: {:#}", e);
            ExitCode::from(2)
        }
    }
}
