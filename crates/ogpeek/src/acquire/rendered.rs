// ABOUTME: Rendered acquisition strategy: headless Chromium via chromiumoxide.
// ABOUTME: One browser per acquirer (relaunched when it dies), one page per URL, closed on every exit path.

//! Chromium-backed acquisition.
//!
//! The browser is launched lazily on the first acquisition and shared by all
//! pipelines. A browser that stops answering is closed and relaunched once
//! before the failure counts as an internal fault. Each URL gets its own page,
//! wrapped in a [`PageGuard`] so the page is closed whether rendering
//! succeeds, fails, or the pipeline future is dropped.
//!
//! Rendering stops at `DOMContentLoaded`. Images, fonts and late scripts are
//! not waited for.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EventResponseReceived, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::{EventDomContentEventFired, FrameId};
use chromiumoxide::page::Page;
use futures::{FutureExt, StreamExt};
use tokio::sync::Mutex;
use url::Url;

use crate::acquire::{AcquiredPage, Acquirer, Strategy};
use crate::error::PreviewError;
use crate::options::Options;
use crate::resource::guard_private_host;

/// Environment variable overriding the Chromium binary location.
pub const CHROME_PATH_ENV: &str = "OGPEEK_CHROME_PATH";

/// Time allowed past the acquisition timeout to close a timed-out page.
pub const PAGE_CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CHROME_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Starts browsers and opens and closes their pages.
#[async_trait]
pub(crate) trait Launcher: Send + Sync + 'static {
    type Browser: Send + Sync + 'static;
    type Page: Send + Sync + 'static;

    async fn launch(&self) -> Result<Self::Browser, PreviewError>;

    async fn open_page(&self, browser: &Self::Browser) -> Result<Self::Page, PreviewError>;

    async fn close_page(&self, page: Self::Page);

    async fn close_browser(&self, browser: Self::Browser);
}

/// Launches headless Chromium.
pub(crate) struct ChromiumLauncher {
    chrome_executable: Option<PathBuf>,
    user_agent: String,
}

#[async_trait]
impl Launcher for ChromiumLauncher {
    type Browser = Browser;
    type Page = Page;

    async fn launch(&self) -> Result<Browser, PreviewError> {
        let chrome_path = self
            .chrome_executable
            .clone()
            .or_else(find_chromium)
            .ok_or_else(|| {
                PreviewError::internal(
                    "",
                    "LaunchBrowser",
                    Some(anyhow::anyhow!(
                        "Chromium not found; install it or set {}",
                        CHROME_PATH_ENV
                    )),
                )
            })?;

        let config = BrowserConfig::builder()
            .chrome_executable(&chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg(format!("--user-agent={}", self.user_agent))
            .build()
            .map_err(|e| {
                PreviewError::internal(
                    "",
                    "LaunchBrowser",
                    Some(anyhow::anyhow!("failed to build browser config: {}", e)),
                )
            })?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            PreviewError::internal(
                "",
                "LaunchBrowser",
                Some(anyhow::anyhow!("failed to launch Chromium: {}", e)),
            )
        })?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "browser handler event error");
                }
            }
            tracing::debug!("browser handler stopped");
        });

        tracing::info!(path = %chrome_path.display(), "launched headless Chromium");
        Ok(browser)
    }

    async fn open_page(&self, browser: &Browser) -> Result<Page, PreviewError> {
        browser.new_page("about:blank").await.map_err(|e| {
            PreviewError::internal(
                "",
                "OpenPage",
                Some(anyhow::anyhow!("failed to create page: {}", e)),
            )
        })
    }

    async fn close_page(&self, page: Page) {
        if let Err(e) = page.close().await {
            tracing::warn!(error = %e, "failed to close browser page");
        }
    }

    async fn close_browser(&self, mut browser: Browser) {
        if let Err(e) = browser.close().await {
            tracing::warn!(error = %e, "failed to close Chromium");
        }
        let _ = browser.wait().await;
    }
}

/// A page that is closed when dropped, unless it was closed explicitly first.
///
/// The open-page counter drops only once the close has completed.
pub(crate) struct PageGuard<L: Launcher> {
    page: Option<L::Page>,
    launcher: Arc<L>,
    active: Arc<AtomicUsize>,
}

impl<L: Launcher> PageGuard<L> {
    fn page(&self) -> Option<&L::Page> {
        self.page.as_ref()
    }

    async fn close(mut self) {
        if let Some(page) = self.page.take() {
            self.launcher.close_page(page).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl<L: Launcher> Drop for PageGuard<L> {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        let launcher = Arc::clone(&self.launcher);
        let active = Arc::clone(&self.active);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    launcher.close_page(page).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                });
            }
            Err(_) => tracing::warn!("browser page dropped outside a runtime; left to browser shutdown"),
        }
    }
}

/// The shared browser plus bookkeeping of the pages opened on it.
pub(crate) struct BrowserPool<L: Launcher> {
    launcher: Arc<L>,
    browser: Mutex<Option<L::Browser>>,
    active: Arc<AtomicUsize>,
}

impl<L: Launcher> BrowserPool<L> {
    pub(crate) fn new(launcher: L) -> Self {
        Self {
            launcher: Arc::new(launcher),
            browser: Mutex::new(None),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn active_pages(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn guard(&self, page: L::Page) -> PageGuard<L> {
        self.active.fetch_add(1, Ordering::SeqCst);
        PageGuard {
            page: Some(page),
            launcher: Arc::clone(&self.launcher),
            active: Arc::clone(&self.active),
        }
    }

    /// Opens a page, launching the browser first if needed.
    ///
    /// When the current browser cannot open a page it is closed and a fresh
    /// one launched; only a failure on the fresh browser is returned.
    pub(crate) async fn open(&self) -> Result<PageGuard<L>, PreviewError> {
        let mut slot = self.browser.lock().await;

        let attempt = match slot.as_ref() {
            Some(browser) => Some(self.launcher.open_page(browser).await),
            None => None,
        };
        match attempt {
            Some(Ok(page)) => return Ok(self.guard(page)),
            Some(Err(err)) => {
                tracing::warn!(error = %err, "browser stopped responding, relaunching");
                if let Some(stale) = slot.take() {
                    self.launcher.close_browser(stale).await;
                }
            }
            None => {}
        }

        let browser = self.launcher.launch().await?;
        let page = self.launcher.open_page(&browser).await;
        *slot = Some(browser);
        Ok(self.guard(page?))
    }

    pub(crate) async fn shutdown(&self) {
        if let Some(browser) = self.browser.lock().await.take() {
            self.launcher.close_browser(browser).await;
        }
    }
}

/// Acquires pages by rendering them in headless Chromium.
pub struct RenderedAcquirer {
    pool: BrowserPool<ChromiumLauncher>,
    allow_private_networks: bool,
    render_timeout: Duration,
}

impl RenderedAcquirer {
    /// Creates an acquirer. The browser starts on first use.
    pub fn new(opts: &Options) -> Self {
        Self {
            pool: BrowserPool::new(ChromiumLauncher {
                chrome_executable: opts.chrome_executable.clone(),
                user_agent: opts.user_agent.clone(),
            }),
            allow_private_networks: opts.allow_private_networks,
            render_timeout: opts.acquire_timeout,
        }
    }

    /// Number of pages currently open.
    pub fn active_pages(&self) -> usize {
        self.pool.active_pages()
    }
}

fn is_main_document(event: &EventResponseReceived, main_frame: Option<&FrameId>) -> bool {
    if event.r#type != ResourceType::Document {
        return false;
    }
    match (main_frame, event.frame_id.as_ref()) {
        (Some(main), Some(frame)) => main == frame,
        _ => true,
    }
}

/// Navigates `page` to `url` and snapshots it once the DOM is parsed.
async fn render(page: &Page, url: &Url) -> Result<AcquiredPage, PreviewError> {
    let fetch_err = |msg: String| PreviewError::fetch(url.as_str(), "Render", Some(anyhow::anyhow!(msg)));

    let main_frame = page.mainframe().await.ok().flatten();
    let mut dom_ready = page
        .event_listener::<EventDomContentEventFired>()
        .await
        .map_err(|e| fetch_err(format!("page unavailable: {}", e)))?;
    let mut responses = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(|e| fetch_err(format!("page unavailable: {}", e)))?;

    // goto() resolves on the load event; DOMContentLoaded usually wins the race.
    let mut status: Option<i64> = None;
    {
        let navigation = page.goto(url.as_str());
        tokio::pin!(navigation);
        loop {
            tokio::select! {
                outcome = &mut navigation => {
                    outcome.map_err(|e| fetch_err(format!("navigation failed: {}", e)))?;
                    break;
                }
                _ = dom_ready.next() => break,
                Some(event) = responses.next(), if status.is_none() => {
                    if is_main_document(&event, main_frame.as_ref()) {
                        status = Some(event.response.status);
                    }
                }
            }
        }
    }
    while status.is_none() {
        match responses.next().now_or_never() {
            Some(Some(event)) => {
                if is_main_document(&event, main_frame.as_ref()) {
                    status = Some(event.response.status);
                }
            }
            _ => break,
        }
    }

    match status {
        Some(s) if !(200..300).contains(&s) => {
            return Err(fetch_err(format!("HTTP status {}", s)));
        }
        None if matches!(url.scheme(), "http" | "https") => {
            return Err(fetch_err("no document response".to_string()));
        }
        _ => {}
    }

    let html = page
        .content()
        .await
        .map_err(|e| fetch_err(format!("failed to read rendered HTML: {}", e)))?;

    let final_url = page
        .url()
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| url.to_string());

    Ok(AcquiredPage {
        url: url.to_string(),
        final_url,
        status: status.and_then(|s| u16::try_from(s).ok()).unwrap_or(200),
        html,
    })
}

#[async_trait]
impl Acquirer for RenderedAcquirer {
    async fn acquire(&self, url: &Url) -> Result<AcquiredPage, PreviewError> {
        // Only the navigation target is checked; the browser resolves redirects and subresources itself.
        if !self.allow_private_networks {
            guard_private_host(url.as_str(), url, "navigation target").await?;
        }

        let guard = self.pool.open().await?;
        let result = match guard.page() {
            Some(page) => match tokio::time::timeout(self.render_timeout, render(page, url)).await {
                Ok(result) => result,
                Err(_) => Err(PreviewError::timeout(
                    url.as_str(),
                    "Render",
                    Some(anyhow::anyhow!(
                        "DOM not ready within {}ms",
                        self.render_timeout.as_millis()
                    )),
                )),
            },
            None => Err(PreviewError::internal(url.as_str(), "Render", None)),
        };
        guard.close().await;
        result
    }

    async fn shutdown(&self) -> Result<(), PreviewError> {
        self.pool.shutdown().await;
        Ok(())
    }

    fn strategy(&self) -> Strategy {
        Strategy::Rendered
    }

    fn cleanup_grace(&self) -> Duration {
        PAGE_CLOSE_GRACE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    /// Browsers are generation numbers; pages are numbered per launcher.
    #[derive(Default)]
    struct FakeLauncher {
        launches: AtomicUsize,
        pages: AtomicUsize,
        /// Browsers of a generation below this cannot open pages
        dead_below: AtomicUsize,
        refuse_launch: AtomicBool,
        close_delay: Duration,
        closed_pages: AtomicUsize,
        closed_browsers: std::sync::Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Launcher for FakeLauncher {
        type Browser = usize;
        type Page = usize;

        async fn launch(&self) -> Result<usize, PreviewError> {
            if self.refuse_launch.load(Ordering::SeqCst) {
                return Err(PreviewError::internal("", "LaunchBrowser", None));
            }
            Ok(self.launches.fetch_add(1, Ordering::SeqCst) + 1)
        }

        async fn open_page(&self, browser: &usize) -> Result<usize, PreviewError> {
            if *browser < self.dead_below.load(Ordering::SeqCst) {
                return Err(PreviewError::internal("", "OpenPage", None));
            }
            Ok(self.pages.fetch_add(1, Ordering::SeqCst))
        }

        async fn close_page(&self, _page: usize) {
            tokio::time::sleep(self.close_delay).await;
            self.closed_pages.fetch_add(1, Ordering::SeqCst);
        }

        async fn close_browser(&self, browser: usize) {
            self.closed_browsers.lock().unwrap().push(browser);
        }
    }

    #[tokio::test]
    async fn browser_is_launched_once_and_reused() {
        let pool = BrowserPool::new(FakeLauncher::default());

        pool.open().await.unwrap().close().await;
        pool.open().await.unwrap().close().await;

        assert_eq!(pool.launcher.launches.load(Ordering::SeqCst), 1);
        assert_eq!(pool.launcher.closed_pages.load(Ordering::SeqCst), 2);
        assert_eq!(pool.active_pages(), 0);
    }

    #[tokio::test]
    async fn dead_browser_is_replaced() {
        let pool = BrowserPool::new(FakeLauncher::default());
        pool.open().await.unwrap().close().await;

        pool.launcher.dead_below.store(2, Ordering::SeqCst);
        let guard = pool.open().await.expect("relaunched browser should open a page");
        guard.close().await;

        assert_eq!(pool.launcher.launches.load(Ordering::SeqCst), 2);
        assert_eq!(*pool.launcher.closed_browsers.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn failing_relaunch_is_an_internal_fault_and_retried_next_time() {
        let pool = BrowserPool::new(FakeLauncher::default());
        pool.open().await.unwrap().close().await;

        pool.launcher.dead_below.store(usize::MAX, Ordering::SeqCst);
        let err = pool.open().await.err().expect("no browser can open pages");
        assert!(err.is_internal());
        assert_eq!(pool.launcher.launches.load(Ordering::SeqCst), 2);

        pool.launcher.dead_below.store(0, Ordering::SeqCst);
        assert!(pool.open().await.is_ok());
        assert_eq!(pool.launcher.launches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn launch_failure_is_reported() {
        let launcher = FakeLauncher::default();
        launcher.refuse_launch.store(true, Ordering::SeqCst);
        let pool = BrowserPool::new(launcher);

        assert!(pool.open().await.err().expect("launch refused").is_internal());
        assert_eq!(pool.active_pages(), 0);
    }

    #[tokio::test]
    async fn dropped_page_counts_as_open_until_closed() {
        let pool = BrowserPool::new(FakeLauncher {
            close_delay: Duration::from_millis(50),
            ..FakeLauncher::default()
        });

        let guard = pool.open().await.unwrap();
        assert_eq!(pool.active_pages(), 1);
        drop(guard);
        assert_eq!(pool.active_pages(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(pool.active_pages(), 0);
        assert_eq!(pool.launcher.closed_pages.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_closes_the_browser() {
        let pool = BrowserPool::new(FakeLauncher::default());
        pool.open().await.unwrap().close().await;

        pool.shutdown().await;
        pool.shutdown().await;
        assert_eq!(*pool.launcher.closed_browsers.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn missing_chromium_is_an_internal_fault() {
        let opts = Options {
            chrome_executable: Some(PathBuf::from("/nonexistent/chrome")),
            allow_private_networks: true,
            ..Default::default()
        };
        let acquirer = RenderedAcquirer::new(&opts);
        let url = Url::parse("https://example.com/").unwrap();

        let err = acquirer.acquire(&url).await.expect_err("launch must fail");
        assert!(err.is_internal());
        assert_eq!(acquirer.active_pages(), 0);
        assert!(acquirer.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn private_targets_are_blocked_before_launch() {
        let opts = Options {
            chrome_executable: Some(PathBuf::from("/nonexistent/chrome")),
            ..Default::default()
        };
        let acquirer = RenderedAcquirer::new(&opts);

        for target in ["http://127.0.0.1:8080/", "http://169.254.169.254/latest/meta-data/"] {
            let err = acquirer
                .acquire(&Url::parse(target).unwrap())
                .await
                .expect_err("private target");
            assert!(err.is_ssrf(), "{} gave {}", target, err);
        }
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn renders_script_populated_price() {
        let acquirer = RenderedAcquirer::new(&Options::default());
        let url = Url::parse(
            "data:text/html,<title>Item</title><div id=p></div>\
             <script>document.getElementById('p').innerHTML='<span class=a-price-whole>1,980</span>'</script>",
        )
        .unwrap();

        let page = acquirer.acquire(&url).await.expect("render should succeed");
        let doc = page.document();
        assert_eq!(doc.first_text("title"), Some("Item".to_string()));
        assert_eq!(doc.first_text_by_class("a-price-whole"), Some("1,980".to_string()));
        assert_eq!(acquirer.active_pages(), 0);

        acquirer.shutdown().await.expect("shutdown failed");
    }
}
