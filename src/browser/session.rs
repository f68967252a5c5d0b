use std::collections::HashMap;
use std::time::Duration;

use chromiumoxide::browser::Browser;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::launch::LaunchOptions;
use crate::error::KeeperError;
use crate::remote::{ElementRef, Locator, RemoteError, RemoteSession};

const CLICKABLE_POLL: Duration = Duration::from_millis(250);

/// [`RemoteSession`] backed by one Chrome tab.
///
/// The daemon drives the browser from a plain worker thread, so the CDP
/// client runs on a private runtime and every call blocks. Element handles
/// are kept here and handed out as opaque [`ElementRef`]s; navigating drops
/// them all.
pub struct BrowserSession {
    runtime: Runtime,
    browser: Option<Browser>,
    handler: JoinHandle<()>,
    page: Page,
    elements: HashMap<String, Element>,
    next_element: u64,
}

impl BrowserSession {
    /// Start Chrome and open a blank tab.
    pub fn launch(options: &LaunchOptions) -> Result<Self, KeeperError> {
        let config = options.browser_config()?;
        // The CDP handler must keep running between calls.
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("browser-cdp")
            .enable_all()
            .build()?;

        let (browser, handler, page) = runtime.block_on(async {
            let (browser, mut events) = Browser::launch(config).await?;
            let handler = tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    if let Err(e) = event {
                        warn!("browser event error: {e}");
                    }
                }
            });
            let page = browser.new_page("about:blank").await?;
            Ok::<_, CdpError>((browser, handler, page))
        })?;
        info!(headless = options.headless, "browser session opened");

        Ok(Self {
            runtime,
            browser: Some(browser),
            handler,
            page,
            elements: HashMap::new(),
            next_element: 0,
        })
    }

    fn ensure_open(&self) -> Result<(), RemoteError> {
        if self.browser.is_none() {
            return Err(RemoteError::Transport("browser session already closed".into()));
        }
        Ok(())
    }

    fn remember(&mut self, element: Element) -> ElementRef {
        self.next_element += 1;
        let id = format!("el-{}", self.next_element);
        self.elements.insert(id.clone(), element);
        ElementRef(id)
    }

    fn element(&self, element: &ElementRef) -> Result<&Element, RemoteError> {
        self.ensure_open()?;
        self.elements
            .get(&element.0)
            .ok_or_else(|| RemoteError::NotFound(format!("stale element {}", element.0)))
    }
}

async fn locate(page: &Page, locator: &Locator) -> Result<Element, CdpError> {
    match locator {
        Locator::Css(selector) => page.find_element(selector.as_str()).await,
        Locator::XPath(expr) => page.find_xpath(expr.as_str()).await,
    }
}

// Enabled and with a point on screen that a click would land on.
async fn is_clickable(element: &Element) -> bool {
    matches!(element.attribute("disabled").await, Ok(None))
        && element.clickable_point().await.is_ok()
}

impl RemoteSession for BrowserSession {
    fn navigate(&mut self, url: &str) -> Result<(), RemoteError> {
        self.ensure_open()?;
        debug!(url, "navigate");
        self.elements.clear();
        self.runtime.block_on(self.page.goto(url))?;
        Ok(())
    }

    fn current_document(&mut self) -> Result<String, RemoteError> {
        self.ensure_open()?;
        Ok(self.runtime.block_on(self.page.content())?)
    }

    fn find_element(&mut self, locator: &Locator) -> Result<ElementRef, RemoteError> {
        self.ensure_open()?;
        let element = self
            .runtime
            .block_on(locate(&self.page, locator))
            .map_err(|e| match RemoteError::from(e) {
                RemoteError::NotFound(_) => RemoteError::NotFound(locator.to_string()),
                other => other,
            })?;
        Ok(self.remember(element))
    }

    fn click(&mut self, element: &ElementRef) -> Result<(), RemoteError> {
        let element = self.element(element)?;
        self.runtime.block_on(element.click())?;
        Ok(())
    }

    fn send_keys(&mut self, element: &ElementRef, text: &str) -> Result<(), RemoteError> {
        let element = self.element(element)?;
        self.runtime.block_on(element.type_str(text))?;
        Ok(())
    }

    fn attribute(
        &mut self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, RemoteError> {
        let element = self.element(element)?;
        Ok(self.runtime.block_on(element.attribute(name))?)
    }

    fn wait_until_clickable(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementRef, RemoteError> {
        self.ensure_open()?;
        let page = &self.page;
        let waited = self.runtime.block_on(tokio::time::timeout(timeout, async {
            loop {
                match locate(page, locator).await {
                    Ok(element) if is_clickable(&element).await => return Ok(element),
                    Ok(_) => {}
                    Err(e) => {
                        let e = RemoteError::from(e);
                        if !e.is_absent() {
                            return Err(e);
                        }
                    }
                }
                tokio::time::sleep(CLICKABLE_POLL).await;
            }
        }));

        match waited {
            Ok(Ok(element)) => Ok(self.remember(element)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RemoteError::Timeout(format!(
                "{locator} not clickable within {timeout:?}"
            ))),
        }
    }

    fn close(&mut self) -> Result<(), RemoteError> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };
        self.elements.clear();
        let closed = self.runtime.block_on(async {
            browser.close().await?;
            browser
                .wait()
                .await
                .map_err(|e| RemoteError::Transport(format!("waiting for chrome to exit: {e}")))?;
            Ok::<_, RemoteError>(())
        });
        self.handler.abort();
        closed?;
        info!("browser session closed");
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.browser.is_some()
            && let Err(e) = self.close()
        {
            warn!("failed to close browser session on drop: {e}");
        }
    }
}
