//! chromiumoxide-backed browser session.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserSession, ProbePage, SessionFactory};
use crate::config::Config;

/// Desktop user agent applied to every new page; booking widgets tend to
/// serve stripped-down markup to headless defaults.
const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Launches a headless Chromium session per run.
#[derive(Clone, Debug, Default)]
pub struct ChromiumLauncher {
    chrome_executable: Option<String>,
}

impl ChromiumLauncher {
    pub fn new(config: &Config) -> Self {
        Self {
            chrome_executable: config.chrome_executable.clone(),
        }
    }
}

#[async_trait]
impl SessionFactory for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let browser = launch_headless_browser(self.chrome_executable.as_deref()).await?;
        Ok(Box::new(ChromiumSession {
            browser: Mutex::new(browser),
        }))
    }
}

/// Starts a headless browser with no pages checked out.
async fn launch_headless_browser(chrome_executable: Option<&str>) -> Result<Browser> {
    info!("launching headless browser...");

    let mut builder = BrowserConfig::builder().new_headless_mode().args(vec![
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
        "--disable-web-security",
        "--memory-pressure-off",
    ]);
    if let Some(path) = chrome_executable {
        debug!("using chrome executable at {}", path);
        builder = builder.chrome_executable(Path::new(path));
    }
    let config = builder.build().map_err(|e| {
        error!("failed to configure headless browser: {}", e);
        anyhow::anyhow!("failed to configure headless browser: {}", e)
    })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("failed to launch headless browser: {}", e);
        anyhow::anyhow!("failed to launch headless browser: {}", e)
    })?;
    debug!("headless browser launched");

    // Drive browser events in the background.
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // Short pause so the browser state settles before the first page.
    sleep(tokio::time::Duration::from_millis(300)).await;

    Ok(browser)
}

struct ChromiumSession {
    browser: Mutex<Browser>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_page(&self) -> Result<Box<dyn ProbePage>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| {
                error!("failed to create page: {}", e);
                anyhow::anyhow!("failed to create page: {}", e)
            })?;
        page.set_user_agent(USER_AGENT).await?;
        debug!("created new browser page");
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!("browser close reported: {}", e);
        }
        let _ = browser.wait().await;
        info!("browser session terminated");
        Ok(())
    }
}

struct ChromiumPage {
    page: Page,
}

#[async_trait]
impl ProbePage for ChromiumPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page.goto(url).await.map_err(|e| {
            anyhow::anyhow!("failed to navigate to {}: {}", url, e)
        })?;
        Ok(())
    }

    async fn body_text(&self) -> Result<String> {
        let value = self
            .page
            .evaluate("document.body ? document.body.innerText : ''".to_owned())
            .await?
            .into_value()?;
        Ok(value)
    }

    async fn eval(&self, js: &str) -> Result<JsonValue> {
        let value = self.page.evaluate(js.to_owned()).await?.into_value()?;
        Ok(value)
    }

    async fn reset(&self) -> Result<()> {
        self.page.goto("about:blank").await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.page.clone().close().await?;
        Ok(())
    }
}
