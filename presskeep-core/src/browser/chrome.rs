use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureSnapshotFormat, CaptureSnapshotParams, NavigateParams,
};
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BrowserSection;

use super::error::{BrowserError, BrowserResult};
use super::session::{ElementHandle, PageSession};

/// Owns the Chromium instance shared by every capture in a batch.
pub struct ChromeBrowser {
    browser: Browser,
    handler_task: Option<JoinHandle<()>>,
}

impl ChromeBrowser {
    pub async fn launch(config: &BrowserSection) -> BrowserResult<Self> {
        let chromium_config = build_chromium_config(config)?;
        info!(
            headless = config.headless,
            width = config.window_width,
            height = config.window_height,
            "launching chromium instance"
        );
        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "chromium handler reported error");
                }
            }
        });

        Ok(Self {
            browser,
            handler_task: Some(handler_task),
        })
    }

    pub async fn new_session(&self) -> BrowserResult<ChromeSession> {
        let page = self
            .browser
            .new_page(CreateTargetParams::new("about:blank"))
            .await?;
        Ok(ChromeSession {
            page,
            found: Vec::new(),
        })
    }

    pub async fn shutdown(mut self) -> BrowserResult<()> {
        info!("shutting down chromium instance");
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "failed to close browser gracefully");
        }
        if let Some(handle) = self.handler_task.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "browser handler join error");
            }
        }
        Ok(())
    }
}

fn build_chromium_config(config: &BrowserSection) -> BrowserResult<ChromiumConfig> {
    let mut builder = ChromiumConfig::builder().viewport(Viewport {
        width: config.window_width,
        height: config.window_height,
        device_scale_factor: None,
        emulating_mobile: false,
        is_landscape: config.window_width >= config.window_height,
        has_touch: false,
    });

    if let Some(path) = &config.executable_path {
        builder = builder.chrome_executable(path);
    }
    if !config.headless {
        builder = builder.with_head();
    }
    if !config.sandbox {
        builder = builder.no_sandbox();
    }
    if let Some(timeout) = config.navigation_timeout_seconds {
        builder = builder.request_timeout(Duration::from_secs(timeout));
    }
    builder = builder.args(vec![format!(
        "--window-size={},{}",
        config.window_width, config.window_height
    )]);

    builder.build().map_err(BrowserError::Configuration)
}

/// [`PageSession`] backed by one CDP page.
pub struct ChromeSession {
    page: Page,
    found: Vec<Element>,
}

#[async_trait(?Send)]
impl PageSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        self.found.clear();
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(BrowserError::Configuration)?;
        self.page.goto(params).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    async fn current_url(&mut self) -> BrowserResult<String> {
        self.page.url().await?.ok_or(BrowserError::MissingUrl)
    }

    async fn page_source(&mut self) -> BrowserResult<String> {
        Ok(self.page.content().await?)
    }

    async fn query(&mut self, selector: &str) -> BrowserResult<Vec<ElementHandle>> {
        self.found = match self.page.find_elements(selector).await {
            Ok(elements) => elements,
            Err(CdpError::NotFound) => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        Ok((0..self.found.len()).map(ElementHandle).collect())
    }

    async fn click(&mut self, element: ElementHandle) -> BrowserResult<()> {
        let element = self
            .found
            .get(element.0)
            .ok_or(BrowserError::StaleElement(element.0))?;
        element.click().await?;
        Ok(())
    }

    async fn run_script(&mut self, script: &str) -> BrowserResult<()> {
        self.page
            .evaluate(script)
            .await
            .map_err(|err| BrowserError::Script(err.to_string()))?;
        Ok(())
    }

    async fn query_in_frame(
        &mut self,
        frame_selector: &str,
        selector: &str,
    ) -> BrowserResult<usize> {
        let script = frame_count_script(frame_selector, selector);
        let count = self
            .page
            .evaluate(script.as_str())
            .await?
            .into_value::<u64>()
            .map_err(|err| BrowserError::Script(format!("frame query result: {err}")))?;
        Ok(count as usize)
    }

    async fn click_in_frame(&mut self, frame_selector: &str, selector: &str) -> BrowserResult<()> {
        let script = frame_click_script(frame_selector, selector);
        let clicked = self
            .page
            .evaluate(script.as_str())
            .await?
            .into_value::<bool>()
            .map_err(|err| BrowserError::Script(format!("frame click result: {err}")))?;
        if clicked {
            Ok(())
        } else {
            Err(BrowserError::Script(format!(
                "frame element {selector} vanished before click"
            )))
        }
    }

    async fn screenshot(&mut self) -> BrowserResult<Vec<u8>> {
        let params = ScreenshotParams::builder().build();
        Ok(self.page.screenshot(params).await?)
    }

    async fn page_archive(&mut self) -> BrowserResult<String> {
        let mut params = CaptureSnapshotParams::default();
        params.format = Some(CaptureSnapshotFormat::Mhtml);
        let response = self.page.execute(params).await?;
        Ok(response.result.data)
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).expect("string encodes to JSON")
}

fn frame_count_script(frame_selector: &str, selector: &str) -> String {
    format!(
        "(() => {{ const frame = document.querySelector({frame}); \
         if (!frame || !frame.contentDocument) return 0; \
         return frame.contentDocument.querySelectorAll({sel}).length; }})()",
        frame = js_string(frame_selector),
        sel = js_string(selector),
    )
}

fn frame_click_script(frame_selector: &str, selector: &str) -> String {
    format!(
        "(() => {{ const frame = document.querySelector({frame}); \
         if (!frame || !frame.contentDocument) return false; \
         const matches = frame.contentDocument.querySelectorAll({sel}); \
         if (matches.length !== 1) return false; \
         matches[0].click(); return true; }})()",
        frame = js_string(frame_selector),
        sel = js_string(selector),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_string_escapes_quotes() {
        assert_eq!(js_string("iframe[id^='sp']"), r#""iframe[id^='sp']""#);
        assert_eq!(js_string(r#"a"b"#), r#""a\"b""#);
    }

    #[test]
    fn frame_scripts_embed_both_selectors() {
        let script = frame_count_script("iframe[id^='sp_message_iframe']", "button[title='OK']");
        assert!(script.contains("sp_message_iframe"));
        assert!(script.contains("button[title='OK']"));
        assert!(script.contains("querySelectorAll"));

        let script = frame_click_script("iframe", "button");
        assert!(script.contains("matches.length !== 1"));
    }
}
