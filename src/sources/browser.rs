//! Browser sessions for sources that only render in a real browser.
//!
//! [`GoogleScholarSource`](super::GoogleScholarSource) talks to the browser
//! through the [`BrowserLauncher`], [`BrowserSession`] and [`BrowserTab`]
//! traits. [`ChromeLauncher`] implements them on top of a local Chrome
//! driven over the DevTools protocol.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, BringToFrontParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures_util::StreamExt;
use rand::seq::SliceRandom;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::ScholarConfig;
use crate::sources::SourceError;

/// Desktop user agents; one is picked per session
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36 Edg/123.0.0.0",
];

/// Hides `navigator.webdriver` before any page script runs
const HIDE_WEBDRIVER: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

/// Starts browser sessions
#[async_trait]
pub trait BrowserLauncher: Send + Sync + std::fmt::Debug {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, SourceError>;
}

/// A running browser with one main tab.
///
/// Callers must finish with [`close`](BrowserSession::close) on every path.
#[async_trait]
pub trait BrowserSession: Send {
    /// Load `url` in the main tab
    async fn navigate(&mut self, url: &str) -> Result<(), SourceError>;

    /// Rendered HTML of the main tab
    async fn content(&mut self) -> Result<String, SourceError>;

    /// Open `url` in a secondary tab
    async fn open_tab(&mut self, url: &str) -> Result<Box<dyn BrowserTab>, SourceError>;

    /// Bring the main tab back to the foreground
    async fn focus_main(&mut self) -> Result<(), SourceError>;

    /// Shut the browser down
    async fn close(self: Box<Self>) -> Result<(), SourceError>;
}

/// A secondary tab opened by a [`BrowserSession`]
#[async_trait]
pub trait BrowserTab: Send {
    async fn content(&mut self) -> Result<String, SourceError>;

    async fn close(self: Box<Self>) -> Result<(), SourceError>;
}

impl From<CdpError> for SourceError {
    fn from(err: CdpError) -> Self {
        SourceError::Browser(err.to_string())
    }
}

/// Launches a local Chrome with a reduced automation fingerprint
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    headless: bool,
    navigation_timeout: Duration,
}

impl ChromeLauncher {
    pub fn new(config: &ScholarConfig) -> Self {
        Self {
            headless: config.headless,
            navigation_timeout: config.navigation_timeout(),
        }
    }

    fn browser_config(&self, user_agent: &str) -> Result<BrowserConfig, SourceError> {
        let mut builder = BrowserConfig::builder()
            .window_size(1366, 768)
            .request_timeout(self.navigation_timeout)
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={}", user_agent))
            .arg("--lang=en-US");

        if !self.headless {
            builder = builder.with_head();
        }

        builder.build().map_err(SourceError::Browser)
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, SourceError> {
        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);

        let (mut browser, mut handler) = Browser::launch(self.browser_config(user_agent)?).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("Browser handler stopped: {}", e);
                    break;
                }
            }
        });

        let main = match open_page(&browser).await {
            Ok(page) => page,
            Err(e) => {
                shutdown(&mut browser, handler).await;
                return Err(e);
            }
        };

        tracing::debug!(user_agent, headless = self.headless, "Launched Chrome");

        Ok(Box::new(ChromeSession {
            browser,
            handler,
            main,
            navigation_timeout: self.navigation_timeout,
        }))
    }
}

async fn open_page(browser: &Browser) -> Result<Page, SourceError> {
    let page = browser.new_page("about:blank").await?;
    page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(HIDE_WEBDRIVER))
        .await?;
    Ok(page)
}

async fn goto(page: &Page, url: &str, limit: Duration) -> Result<(), SourceError> {
    match tokio::time::timeout(limit, page.goto(url)).await {
        Ok(result) => result.map(|_| ()).map_err(SourceError::from),
        Err(_) => Err(SourceError::Browser(format!(
            "Navigation to {} timed out after {:?}",
            url, limit
        ))),
    }
}

async fn shutdown(browser: &mut Browser, handler: JoinHandle<()>) {
    if let Err(e) = browser.close().await {
        tracing::debug!("Failed to close browser: {}", e);
    }
    if let Err(e) = browser.wait().await {
        tracing::debug!("Failed to wait for browser exit: {}", e);
    }
    handler.abort();
}

struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    main: Page,
    navigation_timeout: Duration,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SourceError> {
        goto(&self.main, url, self.navigation_timeout).await
    }

    async fn content(&mut self) -> Result<String, SourceError> {
        Ok(self.main.content().await?)
    }

    async fn open_tab(&mut self, url: &str) -> Result<Box<dyn BrowserTab>, SourceError> {
        let page = open_page(&self.browser).await?;
        if let Err(e) = goto(&page, url, self.navigation_timeout).await {
            if let Err(close_err) = page.close().await {
                tracing::debug!(%url, "Failed to close tab after navigation error: {}", close_err);
            }
            return Err(e);
        }
        Ok(Box::new(ChromeTab { page }))
    }

    async fn focus_main(&mut self) -> Result<(), SourceError> {
        self.main.execute(BringToFrontParams::default()).await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), SourceError> {
        let ChromeSession {
            mut browser,
            handler,
            ..
        } = *self;
        shutdown(&mut browser, handler).await;
        Ok(())
    }
}

struct ChromeTab {
    page: Page,
}

#[async_trait]
impl BrowserTab for ChromeTab {
    async fn content(&mut self) -> Result<String, SourceError> {
        Ok(self.page.content().await?)
    }

    async fn close(self: Box<Self>) -> Result<(), SourceError> {
        self.page.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launcher_reads_config() {
        let config = ScholarConfig {
            headless: true,
            navigation_timeout_secs: 5,
            ..ScholarConfig::default()
        };
        let launcher = ChromeLauncher::new(&config);
        assert!(launcher.headless);
        assert_eq!(launcher.navigation_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_user_agents_look_like_chrome() {
        assert!(USER_AGENTS.iter().all(|ua| ua.contains("Chrome/")));
    }
}
