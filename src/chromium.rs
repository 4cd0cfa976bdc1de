//! Chromiumoxide-backed driver and launcher.
//!
//! Element operations run through page-context scripts built around the
//! embedded `find_element` helper, so the synthesized selector forms
//! (including `tag:has-text("...")`) resolve uniformly. Scripts report a
//! `{ ok, error }` object instead of throwing, keeping failures on the
//! value path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, ReloadParams};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures_util::StreamExt;
use serde_json::Value as JsonValue;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};

use crate::dom_scripts;
use crate::driver::{BrowserDriver, DriverError, EngineChoice, LaunchOptions, Launcher};
use crate::logging::PilotLogger;
use crate::types::page::Viewport;

/// Poll interval for element-visibility and navigation waits.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

struct ChromiumState {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Page,
}

/// CDP driver for one browser instance with one active page.
pub struct ChromiumDriver {
    state: tokio::sync::Mutex<Option<ChromiumState>>,
    viewport: Viewport,
    navigation_timeout: Duration,
}

impl std::fmt::Debug for ChromiumDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumDriver")
            .field("viewport", &self.viewport)
            .field("navigation_timeout", &self.navigation_timeout)
            .finish_non_exhaustive()
    }
}

impl ChromiumDriver {
    async fn page(&self) -> Result<Page, DriverError> {
        let guard = self.state.lock().await;
        guard
            .as_ref()
            .map(|state| state.page.clone())
            .ok_or(DriverError::NotInitialized)
    }

    /// Run an element-scoped script; `body` sees `el` bound to the
    /// resolved element and must return `{ ok, error? }`.
    async fn run_element_script(&self, selector: &str, body: &str) -> Result<(), DriverError> {
        let script = build_element_script(selector, body)?;
        let value = self.evaluate(&script).await?;
        match value.get("ok").and_then(JsonValue::as_bool) {
            Some(true) => Ok(()),
            Some(false) => {
                let message = value
                    .get("error")
                    .and_then(JsonValue::as_str)
                    .unwrap_or("element script failed");
                if message.starts_with("Element not found") {
                    Err(DriverError::ElementNotFound(selector.to_string()))
                } else {
                    Err(DriverError::Message(message.to_string()))
                }
            }
            None => Err(DriverError::Evaluation(
                "element script returned an unexpected value".to_string(),
            )),
        }
    }

    /// Poll `document.readyState` until the page settles.
    async fn wait_until_settled(&self) -> Result<(), DriverError> {
        let deadline = Instant::now() + self.navigation_timeout;
        loop {
            let ready = self
                .evaluate("document.readyState")
                .await
                .ok()
                .and_then(|value| value.as_str().map(|s| s == "complete"))
                .unwrap_or(false);
            if ready {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Navigation(format!(
                    "navigation did not settle within {}ms",
                    self.navigation_timeout.as_millis()
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let page = self.page().await?;
        page.goto(url)
            .await
            .map_err(|err| DriverError::Navigation(err.to_string()))?;
        self.wait_until_settled().await
    }

    async fn wait_for_navigation(&self) -> Result<(), DriverError> {
        self.wait_until_settled().await
    }

    async fn wait_for_visible(&self, selector: &str, timeout_ms: u64) -> Result<(), DriverError> {
        let script = build_visibility_script(selector)?;
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            let visible = self
                .evaluate(&script)
                .await?
                .as_bool()
                .unwrap_or(false);
            if visible {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::WaitTimeout {
                    selector: selector.to_string(),
                    timeout_ms,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        self.run_element_script(selector, "el.click(); return { ok: true };")
            .await
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        let value_json = serde_json::to_string(value)?;
        let body = format!(
            "const value = {value_json};\n\
             el.focus();\n\
             if ('value' in el) {{ el.value = value; }}\n\
             el.dispatchEvent(new Event('input', {{ bubbles: true }}));\n\
             el.dispatchEvent(new Event('change', {{ bubbles: true }}));\n\
             return {{ ok: true }};"
        );
        self.run_element_script(selector, &body).await
    }

    async fn select(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        let value_json = serde_json::to_string(value)?;
        let body = format!(
            "const desired = {value_json};\n\
             if (el.tagName.toLowerCase() !== 'select') {{\n\
               return {{ ok: false, error: 'Target is not a <select> element' }};\n\
             }}\n\
             const match = Array.from(el.options).find(\n\
               (opt) => opt.value === desired || opt.text === desired\n\
             );\n\
             if (!match) {{\n\
               return {{ ok: false, error: 'No matching option for value ' + desired }};\n\
             }}\n\
             el.value = match.value;\n\
             el.dispatchEvent(new Event('input', {{ bubbles: true }}));\n\
             el.dispatchEvent(new Event('change', {{ bubbles: true }}));\n\
             return {{ ok: true }};"
        );
        self.run_element_script(selector, &body).await
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<(), DriverError> {
        self.run_element_script(
            selector,
            "el.scrollIntoView({ behavior: 'smooth', block: 'center', inline: 'center' });\n\
             return { ok: true };",
        )
        .await
    }

    async fn evaluate(&self, expression: &str) -> Result<JsonValue, DriverError> {
        let page = self.page().await?;
        let result = page
            .evaluate(expression)
            .await
            .map_err(|err| DriverError::Evaluation(err.to_string()))?;
        Ok(result.value().cloned().unwrap_or(JsonValue::Null))
    }

    async fn back(&self) -> Result<(), DriverError> {
        self.evaluate("history.back()").await?;
        sleep(POLL_INTERVAL).await;
        self.wait_until_settled().await
    }

    async fn forward(&self) -> Result<(), DriverError> {
        self.evaluate("history.forward()").await?;
        sleep(POLL_INTERVAL).await;
        self.wait_until_settled().await
    }

    async fn reload(&self) -> Result<(), DriverError> {
        let page = self.page().await?;
        page.execute(ReloadParams::default())
            .await
            .map_err(|err| DriverError::Navigation(err.to_string()))?;
        sleep(POLL_INTERVAL).await;
        self.wait_until_settled().await
    }

    async fn screenshot(&self, path: &str) -> Result<(), DriverError> {
        let page = self.page().await?;
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        page.save_screenshot(params, path)
            .await
            .map_err(|err| DriverError::Message(format!("screenshot failed: {err}")))?;
        Ok(())
    }

    async fn url(&self) -> Result<String, DriverError> {
        let page = self.page().await?;
        let url = page
            .url()
            .await
            .map_err(|err| DriverError::Message(err.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    async fn title(&self) -> Result<String, DriverError> {
        let page = self.page().await?;
        let title = page
            .get_title()
            .await
            .map_err(|err| DriverError::Message(err.to_string()))?;
        Ok(title.unwrap_or_default())
    }

    async fn viewport(&self) -> Result<Viewport, DriverError> {
        Ok(self.viewport)
    }

    async fn close(&self) -> Result<(), DriverError> {
        let state = { self.state.lock().await.take() };
        let Some(state) = state else {
            return Ok(());
        };

        let ChromiumState {
            mut browser,
            handler_task,
            page,
        } = state;

        // Reverse acquisition order: page handle, browser process, handler.
        drop(page);
        let close_result = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|err| DriverError::Message(err.to_string()));
        let _ = timeout(Duration::from_secs(5), browser.wait()).await;
        handler_task.abort();
        let _ = handler_task.await;

        close_result
    }
}

/// Launches a local Chromium instance over CDP.
pub struct ChromiumLauncher {
    logger: Arc<PilotLogger>,
}

impl ChromiumLauncher {
    pub fn new(logger: Arc<PilotLogger>) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl Launcher for ChromiumLauncher {
    type Driver = ChromiumDriver;

    async fn launch(&self, options: &LaunchOptions) -> Result<ChromiumDriver, DriverError> {
        if options.engine != EngineChoice::Chromium {
            return Err(DriverError::UnsupportedEngine(
                options.engine.as_str().to_string(),
            ));
        }

        let config = build_config(options)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| DriverError::Message(format!("failed to launch browser: {err}")))?;

        let handler_logger = Arc::clone(&self.logger);
        let handler_task = tokio::spawn(async move {
            while let Some(result) = handler.next().await {
                if let Err(err) = result {
                    handler_logger.debug(format!("cdp handler error: {err}"), Some("session"));
                }
            }
        });

        let mut browser = browser;
        match browser.new_page("about:blank").await {
            Ok(page) => Ok(ChromiumDriver {
                state: tokio::sync::Mutex::new(Some(ChromiumState {
                    browser,
                    handler_task,
                    page,
                })),
                viewport: options.viewport,
                navigation_timeout: Duration::from_millis(options.navigation_timeout_ms),
            }),
            Err(err) => {
                // Tear down the partially acquired browser before failing.
                let _ = browser.close().await;
                let _ = timeout(Duration::from_secs(5), browser.wait()).await;
                handler_task.abort();
                let _ = handler_task.await;
                Err(DriverError::Message(format!(
                    "failed to open initial page: {err}"
                )))
            }
        }
    }
}

fn build_config(options: &LaunchOptions) -> Result<BrowserConfig, DriverError> {
    let viewport = chromiumoxide::handler::viewport::Viewport {
        width: options.viewport.width,
        height: options.viewport.height,
        device_scale_factor: None,
        emulating_mobile: false,
        is_landscape: options.viewport.width >= options.viewport.height,
        has_touch: false,
    };

    let mut builder = BrowserConfig::builder();

    if let Some(path) = &options.chrome_executable {
        builder = builder.chrome_executable(path);
    }

    let builder = builder.viewport(viewport).args(options.args.clone());

    let builder = if options.headless {
        builder
    } else {
        builder.with_head()
    };

    let builder = match &options.user_data_dir {
        Some(dir) => builder.user_data_dir(dir),
        None => builder,
    };

    builder.build().map_err(DriverError::Message)
}

fn build_element_script(selector: &str, body: &str) -> Result<String, DriverError> {
    let selector_json = serde_json::to_string(selector)?;
    Ok(format!(
        "(function() {{\n\
           const find = ({finder});\n\
           const el = find({selector});\n\
           if (!el) {{\n\
             return {{ ok: false, error: 'Element not found for selector ' + {selector} }};\n\
           }}\n\
           {body}\n\
         }})()",
        finder = dom_scripts::FIND_ELEMENT_FN,
        selector = selector_json,
        body = body
    ))
}

fn build_visibility_script(selector: &str) -> Result<String, DriverError> {
    let selector_json = serde_json::to_string(selector)?;
    Ok(format!(
        "(function() {{\n\
           const find = ({finder});\n\
           const el = find({selector});\n\
           if (!el) return false;\n\
           const rect = el.getBoundingClientRect();\n\
           const style = window.getComputedStyle(el);\n\
           return rect.width > 0 && rect.height > 0 &&\n\
             style.visibility !== 'hidden' && style.display !== 'none';\n\
         }})()",
        finder = dom_scripts::FIND_ELEMENT_FN,
        selector = selector_json
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_script_embeds_the_finder_and_selector() {
        let script = build_element_script("#go", "el.click(); return { ok: true };").unwrap();
        assert!(script.contains("pilot:find-element"));
        assert!(script.contains("\"#go\""));
        assert!(script.contains("el.click()"));
    }

    #[test]
    fn selector_json_escaping_survives_quotes() {
        let script =
            build_visibility_script("button:has-text(\"Sign in\")").unwrap();
        assert!(script.contains("button:has-text(\\\"Sign in\\\")"));
    }

    #[tokio::test]
    async fn non_chromium_engines_are_rejected_before_launching() {
        let launcher = ChromiumLauncher::new(Arc::new(PilotLogger::default()));
        let options = LaunchOptions {
            engine: EngineChoice::Firefox,
            ..Default::default()
        };
        let err = launcher.launch(&options).await.expect_err("should reject");
        assert!(matches!(err, DriverError::UnsupportedEngine(_)));
        assert!(err.to_string().contains("firefox"));
    }
}
