// Shared doubles for the end-to-end check tests

pub mod check_scenarios;
pub mod notification_tests;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use page_checker::fetcher::{PageFetcher, RenderedDocument};
use page_checker::plugins::{NotificationMessage, NotificationResult, NotifierPlugin, PluginManager};
use page_checker::{AppError, CheckRequest, PageChecker};

pub const STOCK_PAGE: &str = r#"<html>
  <head><title>Widget</title></head>
  <body>
    <div class="product">
      <h1>Widget</h1>
      <span id="stock-status">In stock</span>
    </div>
  </body>
</html>"#;

pub enum StubResponse {
    Html(String),
    Fail(fn(&CheckRequest) -> AppError),
    /// Never finishes within the request timeout.
    Hang,
}

/// Serves canned documents and counts how often it was asked.
pub struct StubFetcher {
    response: StubResponse,
    calls: Arc<AtomicUsize>,
}

impl StubFetcher {
    pub fn html(html: impl Into<String>) -> Self {
        Self::new(StubResponse::Html(html.into()))
    }

    pub fn new(response: StubResponse) -> Self {
        Self {
            response,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, request: &CheckRequest) -> page_checker::Result<RenderedDocument> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.response {
            StubResponse::Html(html) => Ok(RenderedDocument::from_html(request.url(), html.clone())),
            StubResponse::Fail(make_error) => Err(make_error(request)),
            StubResponse::Hang => {
                let never = tokio::time::sleep(request.timeout() + Duration::from_secs(60));
                match tokio::time::timeout(request.timeout(), never).await {
                    Ok(()) => unreachable!("sleep outlived its timeout"),
                    Err(_) => Err(AppError::FetchTimeout {
                        url: request.url().to_string(),
                        timeout_seconds: request.timeout_seconds(),
                    }),
                }
            }
        }
    }
}

/// Records every alert it is handed; optionally fails after recording.
#[derive(Clone)]
pub struct RecordingNotifier {
    channel: &'static str,
    fail: bool,
    received: Arc<Mutex<Vec<NotificationMessage>>>,
}

impl RecordingNotifier {
    pub fn new(channel: &'static str) -> Self {
        Self {
            channel,
            fail: false,
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(channel: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(channel)
        }
    }

    pub fn received(&self) -> Vec<NotificationMessage> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotifierPlugin for RecordingNotifier {
    fn name(&self) -> &str {
        "Recording Notifier"
    }

    fn plugin_type(&self) -> &str {
        self.channel
    }

    fn description(&self) -> &str {
        "Keeps alerts in memory"
    }

    async fn notify(&self, message: &NotificationMessage) -> page_checker::Result<NotificationResult> {
        self.received.lock().unwrap().push(message.clone());

        if self.fail {
            return Err(AppError::notification(self.channel, "535 authentication failed"));
        }
        Ok(NotificationResult::delivered(Some(format!("{}-1", self.channel)), 1))
    }
}

/// The three production channels, each recording what it was sent.
pub struct Channels {
    pub sms: RecordingNotifier,
    pub email: RecordingNotifier,
    pub telegram: RecordingNotifier,
}

impl Channels {
    pub fn healthy() -> Self {
        Self {
            sms: RecordingNotifier::new("sms"),
            email: RecordingNotifier::new("email"),
            telegram: RecordingNotifier::new("telegram"),
        }
    }

    pub fn manager(&self) -> PluginManager {
        let mut manager = PluginManager::new();
        manager.register_notifier(Box::new(self.sms.clone()));
        manager.register_notifier(Box::new(self.email.clone()));
        manager.register_notifier(Box::new(self.telegram.clone()));
        manager
    }

    pub fn total_received(&self) -> usize {
        self.sms.received().len() + self.email.received().len() + self.telegram.received().len()
    }
}

pub fn checker(fetcher: StubFetcher, channels: &Channels) -> PageChecker {
    PageChecker::new(Box::new(fetcher), channels.manager())
}

pub fn stock_request(selector: &str, expected: &str) -> CheckRequest {
    CheckRequest::new("https://shop.example.com/widget", selector, expected, Some(5)).unwrap()
}
