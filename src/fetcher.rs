use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use scraper::Html;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::config::BrowserConfig;
use crate::models::CheckRequest;
use crate::utils::error::{AppError, Result};

/// DOM snapshot of a page as the browser rendered it.
///
/// The snapshot is serialized while the tab is still alive and the browser is
/// shut down before the value is returned, so nothing downstream can reach a
/// live page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    requested_url: String,
    final_url: String,
    html: String,
    load_time_ms: u64,
}

impl RenderedDocument {
    pub fn new(
        requested_url: impl Into<String>,
        final_url: impl Into<String>,
        html: impl Into<String>,
        load_time_ms: u64,
    ) -> Self {
        Self {
            requested_url: requested_url.into(),
            final_url: final_url.into(),
            html: html.into(),
            load_time_ms,
        }
    }

    /// Document that was never loaded through a browser. Used by stub fetchers.
    pub fn from_html(url: impl Into<String>, html: impl Into<String>) -> Self {
        let url = url.into();
        Self::new(url.clone(), url, html, 0)
    }

    pub fn requested_url(&self) -> &str {
        &self.requested_url
    }

    /// URL after redirects.
    pub fn final_url(&self) -> &str {
        &self.final_url
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn load_time_ms(&self) -> u64 {
        self.load_time_ms
    }

    pub fn parse(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

/// Loads a page and hands back its rendered DOM.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, request: &CheckRequest) -> Result<RenderedDocument>;
}

/// Fetcher backed by a real headless Chrome. Every call launches its own
/// browser process and kills it before returning.
pub struct ChromeFetcher {
    config: BrowserConfig,
}

impl ChromeFetcher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    /// Hard ceiling for one fetch: browser start, page load and settle delay.
    fn deadline(&self, request: &CheckRequest) -> Duration {
        Duration::from_secs(self.config.launch_timeout_seconds)
            + request.timeout()
            + Duration::from_millis(self.config.settle_ms)
    }
}

#[async_trait]
impl PageFetcher for ChromeFetcher {
    async fn fetch(&self, request: &CheckRequest) -> Result<RenderedDocument> {
        let config = self.config.clone();
        let url = request.url().to_string();
        let timeout = request.timeout();

        run_with_deadline(
            self.deadline(request),
            || AppError::FetchTimeout {
                url: request.url().to_string(),
                timeout_seconds: request.timeout_seconds(),
            },
            move |slot| fetch_blocking(&config, &url, timeout, slot),
        )
        .await
    }
}

/// Resource shared between blocking work and its deadline. Whichever side
/// gets there first decides: once the deadline releases the slot, anything
/// parked later is dropped on the spot.
pub(crate) struct ReleaseSlot<T> {
    state: Arc<Mutex<SlotState<T>>>,
}

struct SlotState<T> {
    value: Option<T>,
    released: bool,
}

impl<T> Clone for ReleaseSlot<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Clone> ReleaseSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SlotState {
                value: None,
                released: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Park `value`. Returns `false`, dropping it, if the slot was already released.
    pub(crate) fn hold(&self, value: T) -> bool {
        let mut state = self.lock();
        if state.released {
            return false;
        }
        state.value = Some(value);
        true
    }

    /// Clone of the parked value, or `None` after release.
    pub(crate) fn get(&self) -> Option<T> {
        self.lock().value.clone()
    }

    /// Take the value back and refuse any later `hold`.
    pub(crate) fn release(&self) -> Option<T> {
        let mut state = self.lock();
        state.released = true;
        state.value.take()
    }
}

/// Run blocking work on the blocking pool with a hard deadline. On expiry the
/// slot is released and its value dropped off the async workers, then
/// `timeout_error` is returned without waiting for the work to notice.
pub(crate) async fn run_with_deadline<T, R, F>(
    deadline: Duration,
    timeout_error: impl FnOnce() -> AppError,
    work: F,
) -> Result<R>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
    F: FnOnce(&ReleaseSlot<T>) -> Result<R> + Send + 'static,
{
    let slot = ReleaseSlot::new();
    let worker_slot = slot.clone();
    let task = tokio::task::spawn_blocking(move || work(&worker_slot));

    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(AppError::BrowserLaunch {
            message: format!("Browser task failed: {}", join_err),
        }),
        Err(_) => {
            if let Some(resource) = slot.release() {
                tracing::warn!(deadline_ms = deadline.as_millis() as u64, "Deadline passed, releasing browser");
                // Dropping a browser closes it over CDP and kills the process.
                if let Err(e) = tokio::task::spawn_blocking(move || drop(resource)).await {
                    tracing::error!("Failed to release browser: {}", e);
                }
            }
            Err(timeout_error())
        }
    }
}

fn launch_options(config: &BrowserConfig, timeout: Duration) -> Result<LaunchOptions<'static>> {
    let mut launch_options = LaunchOptions::default_builder()
        .headless(true)
        .sandbox(config.sandbox)
        .window_size(Some((config.window_width, config.window_height)))
        // Bounds every CDP call, navigate_to included.
        .idle_browser_timeout(timeout + Duration::from_millis(config.settle_ms))
        .args(vec![
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-extensions"),
            OsStr::new("--disable-background-timer-throttling"),
            OsStr::new("--disable-backgrounding-occluded-windows"),
            OsStr::new("--disable-renderer-backgrounding"),
        ])
        .build()
        .map_err(|e| AppError::BrowserLaunch {
            message: format!("Failed to create launch options: {}", e),
        })?;

    if let Some(chrome_path) = &config.chrome_path {
        launch_options.path = Some(PathBuf::from(chrome_path));
    }

    Ok(launch_options)
}

fn fetch_blocking(
    config: &BrowserConfig,
    url: &str,
    timeout: Duration,
    slot: &ReleaseSlot<Browser>,
) -> Result<RenderedDocument> {
    let start_time = Instant::now();
    let released = || AppError::FetchTimeout {
        url: url.to_string(),
        timeout_seconds: timeout.as_secs(),
    };

    let browser = Browser::new(launch_options(config, timeout)?).map_err(|e| AppError::BrowserLaunch {
        message: format!("Failed to launch browser: {}", e),
    })?;
    tracing::debug!(pid = ?browser.get_process_id(), "Browser launched");

    // The slot owns the browser from here; only a short-lived clone is kept
    // while the tab is created, so a release kills the process.
    if !slot.hold(browser) {
        return Err(released());
    }
    let tab = {
        let browser = slot.get().ok_or_else(released)?;
        // Fresh incognito-style context: no cookies or storage from earlier runs.
        let context = browser.new_context().map_err(|e| AppError::BrowserLaunch {
            message: format!("Failed to create browser context: {}", e),
        })?;
        context.new_tab().map_err(|e| AppError::BrowserLaunch {
            message: format!("Failed to create tab: {}", e),
        })?
    };

    let result = load_page(&tab, config, url, timeout).map(|(final_url, html)| {
        RenderedDocument::new(url, final_url, html, start_time.elapsed().as_millis() as u64)
    });

    if let Err(e) = tab.close(true) {
        tracing::debug!("Failed to close tab cleanly: {}", e);
    }
    // Dropping the last browser handle kills the Chrome process.
    drop(slot.release());

    result
}

fn load_page(tab: &Tab, config: &BrowserConfig, url: &str, timeout: Duration) -> Result<(String, String)> {
    tab.set_default_timeout(timeout);

    tab.set_user_agent(&config.user_agent, Some(&config.accept_language), None)
        .map_err(|e| AppError::BrowserLaunch {
            message: format!("Failed to set user agent: {}", e),
        })?;

    tab.navigate_to(url)
        .map_err(|e| classify_navigation_error(url, timeout, e))?;
    tab.wait_until_navigated()
        .map_err(|e| classify_navigation_error(url, timeout, e))?;

    if config.settle_ms > 0 {
        std::thread::sleep(Duration::from_millis(config.settle_ms));
    }

    let final_url = {
        let current = tab.get_url();
        if current.is_empty() {
            url.to_string()
        } else {
            current
        }
    };

    let html = tab.get_content().map_err(|e| AppError::Navigation {
        url: url.to_string(),
        message: format!("Failed to get page content: {}", e),
    })?;

    Ok((final_url, html))
}

fn classify_navigation_error(url: &str, timeout: Duration, err: anyhow::Error) -> AppError {
    if err.downcast_ref::<headless_chrome::util::Timeout>().is_some() {
        AppError::FetchTimeout {
            url: url.to_string(),
            timeout_seconds: timeout.as_secs(),
        }
    } else {
        AppError::Navigation {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
