//! Action executor: one function per action kind.
//!
//! Each function validates its parameters, waits for the preconditions it
//! needs within a bounded timeout, performs the primitive, and reports the
//! outcome. Driver failures become opaque human-readable strings; the
//! fallback machinery one layer up treats them as such. No retries happen
//! here.

use tokio::time::{sleep, Duration};

use crate::driver::BrowserDriver;
use crate::types::action::{Action, ActionType, ScrollDirection, WaitKind};

/// Default wait applied by `wait` actions when no value is given.
const DEFAULT_WAIT_MS: u64 = 5_000;

/// Default output path for `screenshot` actions.
const DEFAULT_SCREENSHOT_PATH: &str = "screenshot.png";

/// Outcome of a single action attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl ActionOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Execute one action against the driver.
pub async fn execute<D: BrowserDriver + ?Sized>(
    driver: &D,
    action: &Action,
    element_wait_timeout_ms: u64,
) -> ActionOutcome {
    match action.action_type {
        ActionType::Navigate => navigate(driver, action).await,
        ActionType::Click => click(driver, action, element_wait_timeout_ms).await,
        ActionType::Fill => fill(driver, action, element_wait_timeout_ms).await,
        ActionType::Wait => wait(driver, action).await,
        ActionType::Scroll => scroll(driver, action).await,
        ActionType::Back => back(driver).await,
        ActionType::Forward => forward(driver).await,
        ActionType::Reload => reload(driver).await,
        ActionType::Screenshot => screenshot(driver, action).await,
        ActionType::Select => select(driver, action, element_wait_timeout_ms).await,
    }
}

async fn navigate<D: BrowserDriver + ?Sized>(driver: &D, action: &Action) -> ActionOutcome {
    let Some(url) = action.value_str() else {
        return ActionOutcome::fail("No url provided for navigate action");
    };

    let url = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    };

    match driver.navigate(&url).await {
        Ok(()) => ActionOutcome::ok(),
        Err(err) => ActionOutcome::fail(format!("Navigation failed: {err}")),
    }
}

async fn click<D: BrowserDriver + ?Sized>(
    driver: &D,
    action: &Action,
    timeout_ms: u64,
) -> ActionOutcome {
    let Some(selector) = action.selector() else {
        return ActionOutcome::fail("No selector provided for click action");
    };

    if let Err(err) = driver.wait_for_visible(selector, timeout_ms).await {
        return ActionOutcome::fail(format!("Click failed: {err}"));
    }
    match driver.click(selector).await {
        Ok(()) => ActionOutcome::ok(),
        Err(err) => ActionOutcome::fail(format!("Click failed: {err}")),
    }
}

async fn fill<D: BrowserDriver + ?Sized>(
    driver: &D,
    action: &Action,
    timeout_ms: u64,
) -> ActionOutcome {
    let Some(selector) = action.selector() else {
        return ActionOutcome::fail("No selector provided for fill action");
    };
    let value = action
        .value
        .as_ref()
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    if let Err(err) = driver.wait_for_visible(selector, timeout_ms).await {
        return ActionOutcome::fail(format!("Fill failed: {err}"));
    }
    match driver.fill(selector, value).await {
        Ok(()) => ActionOutcome::ok(),
        Err(err) => ActionOutcome::fail(format!("Fill failed: {err}")),
    }
}

async fn wait<D: BrowserDriver + ?Sized>(driver: &D, action: &Action) -> ActionOutcome {
    let kind = action.wait_type.clone().unwrap_or(WaitKind::Time);
    match kind {
        WaitKind::Time => {
            let ms = action.value_ms(DEFAULT_WAIT_MS);
            sleep(Duration::from_millis(ms)).await;
            ActionOutcome::ok()
        }
        WaitKind::Selector => {
            let Some(selector) = action.selector() else {
                return ActionOutcome::fail("No selector provided for element wait");
            };
            let timeout_ms = action.value_ms(DEFAULT_WAIT_MS);
            match driver.wait_for_visible(selector, timeout_ms).await {
                Ok(()) => ActionOutcome::ok(),
                Err(err) => ActionOutcome::fail(format!("Wait failed: {err}")),
            }
        }
        WaitKind::Navigation => match driver.wait_for_navigation().await {
            Ok(()) => ActionOutcome::ok(),
            Err(err) => ActionOutcome::fail(format!("Wait failed: {err}")),
        },
        WaitKind::Unknown(kind) => ActionOutcome::fail(format!("Unknown wait type: {kind}")),
    }
}

async fn scroll<D: BrowserDriver + ?Sized>(driver: &D, action: &Action) -> ActionOutcome {
    if let Some(selector) = action.selector() {
        return match driver.scroll_into_view(selector).await {
            Ok(()) => ActionOutcome::ok(),
            Err(err) => ActionOutcome::fail(format!("Scroll failed: {err}")),
        };
    }

    let direction = action.direction.clone().unwrap_or(ScrollDirection::Down);
    let script = match direction {
        ScrollDirection::Down => "window.scrollBy(0, window.innerHeight)",
        ScrollDirection::Up => "window.scrollBy(0, -window.innerHeight)",
        ScrollDirection::Top => "window.scrollTo(0, 0)",
        ScrollDirection::Bottom => "window.scrollTo(0, document.body.scrollHeight)",
        ScrollDirection::Unknown(direction) => {
            return ActionOutcome::fail(format!("Unknown scroll direction: {direction}"));
        }
    };

    match driver.evaluate(script).await {
        Ok(_) => ActionOutcome::ok(),
        Err(err) => ActionOutcome::fail(format!("Scroll failed: {err}")),
    }
}

async fn back<D: BrowserDriver + ?Sized>(driver: &D) -> ActionOutcome {
    match driver.back().await {
        Ok(()) => ActionOutcome::ok(),
        Err(err) => ActionOutcome::fail(format!("Back navigation failed: {err}")),
    }
}

async fn forward<D: BrowserDriver + ?Sized>(driver: &D) -> ActionOutcome {
    match driver.forward().await {
        Ok(()) => ActionOutcome::ok(),
        Err(err) => ActionOutcome::fail(format!("Forward navigation failed: {err}")),
    }
}

async fn reload<D: BrowserDriver + ?Sized>(driver: &D) -> ActionOutcome {
    match driver.reload().await {
        Ok(()) => ActionOutcome::ok(),
        Err(err) => ActionOutcome::fail(format!("Page reload failed: {err}")),
    }
}

async fn screenshot<D: BrowserDriver + ?Sized>(driver: &D, action: &Action) -> ActionOutcome {
    let path = action.value_str().unwrap_or(DEFAULT_SCREENSHOT_PATH);
    match driver.screenshot(path).await {
        Ok(()) => ActionOutcome::ok(),
        Err(err) => ActionOutcome::fail(format!("Screenshot failed: {err}")),
    }
}

async fn select<D: BrowserDriver + ?Sized>(
    driver: &D,
    action: &Action,
    timeout_ms: u64,
) -> ActionOutcome {
    let Some(selector) = action.selector() else {
        return ActionOutcome::fail("No selector provided for select action");
    };
    let Some(value) = action.value_str() else {
        return ActionOutcome::fail("No value provided for select action");
    };

    if let Err(err) = driver.wait_for_visible(selector, timeout_ms).await {
        return ActionOutcome::fail(format!("Select failed: {err}"));
    }
    match driver.select(selector, value).await {
        Ok(()) => ActionOutcome::ok(),
        Err(err) => ActionOutcome::fail(format!("Select failed: {err}")),
    }
}
