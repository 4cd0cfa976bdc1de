//! End-to-end protocol tests over in-process mocks: a scripted driver
//! behind the real session/engine/worker stack, and a scripted translator
//! standing in for the language model.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use browser_pilot::config::Verbosity;
use browser_pilot::driver::{BrowserDriver, DriverError, LaunchOptions, Launcher};
use browser_pilot::engine::ExecutionEngine;
use browser_pilot::interpreter::{CommandTranslator, TranslationContext, TranslationError};
use browser_pilot::logging::PilotLogger;
use browser_pilot::session::BrowserSession;
use browser_pilot::types::action::{Action, ActionPlan, ActionType};
use browser_pilot::types::page::Viewport;
use browser_pilot::types::worker::WorkerStatus;
use browser_pilot::worker::{WorkerManager, WorkerTimeouts};
use serde_json::{json, Value as JsonValue};

fn logger() -> Arc<PilotLogger> {
    Arc::new(PilotLogger::new(Verbosity::Minimal))
}

fn timeouts() -> WorkerTimeouts {
    WorkerTimeouts {
        startup: Duration::from_secs(5),
        execute: Duration::from_secs(5),
        status: Duration::from_secs(1),
        snapshot: Duration::from_secs(1),
        inspect: Duration::from_secs(1),
        stop: Duration::from_secs(1),
    }
}

/// A page with one button that exists under two selectors; the flaky id
/// selector fails until `failures_remaining` runs out.
#[derive(Default)]
struct ScriptedDriver {
    clicks: Mutex<Vec<String>>,
    failing_selectors: Mutex<Vec<String>>,
}

impl ScriptedDriver {
    fn fail_selector(&self, selector: &str) {
        self.failing_selectors
            .lock()
            .unwrap()
            .push(selector.to_string());
    }

    fn should_fail(&self, selector: &str) -> bool {
        self.failing_selectors
            .lock()
            .unwrap()
            .iter()
            .any(|s| s == selector)
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn navigate(&self, _url: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn wait_for_navigation(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn wait_for_visible(&self, selector: &str, timeout_ms: u64) -> Result<(), DriverError> {
        if self.should_fail(selector) {
            return Err(DriverError::WaitTimeout {
                selector: selector.to_string(),
                timeout_ms,
            });
        }
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        self.clicks.lock().unwrap().push(selector.to_string());
        Ok(())
    }

    async fn fill(&self, _selector: &str, _value: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn select(&self, _selector: &str, _value: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn scroll_into_view(&self, _selector: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<JsonValue, DriverError> {
        if expression.contains("pilot:interactive-elements") {
            return Ok(json!([
                {
                    "tagName": "button",
                    "type": "submit",
                    "text": "Log in",
                    "id": "login",
                    "dataAttributes": [{ "name": "data-testid", "value": "login" }],
                    "rect": { "x": 10.0, "y": 120.0, "width": 80.0, "height": 30.0 }
                }
            ]));
        }
        if expression.contains("pilot:form-elements")
            || expression.contains("pilot:content-areas")
            || expression.contains("pilot:navigation")
        {
            return Ok(json!([]));
        }
        if expression.contains("pilot:metadata") {
            return Ok(json!({ "title": "Login", "url": "https://example.com/login" }));
        }
        if expression.contains("pilot:text-preview") {
            return Ok(json!("Welcome back. Log in to continue."));
        }
        if expression.contains("pilot:inspect-element") {
            if expression.contains("#missing") {
                return Ok(JsonValue::Null);
            }
            return Ok(json!({
                "tagName": "button",
                "id": "login",
                "className": "btn",
                "innerText": "Log in",
                "isVisible": true,
                "rect": { "x": 10.0, "y": 120.0, "width": 80.0, "height": 30.0 }
            }));
        }
        Ok(JsonValue::Bool(true))
    }

    async fn back(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn forward(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn reload(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn screenshot(&self, _path: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn url(&self) -> Result<String, DriverError> {
        Ok("https://example.com/login".to_string())
    }

    async fn title(&self) -> Result<String, DriverError> {
        Ok("Login".to_string())
    }

    async fn viewport(&self) -> Result<Viewport, DriverError> {
        Ok(Viewport::default())
    }

    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

/// Shared handle returned by the launcher: delegates every driver
/// primitive to the `Arc<ScriptedDriver>` the test retains for inspection.
struct SharedDriver(Arc<ScriptedDriver>);

#[async_trait]
impl BrowserDriver for SharedDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.0.navigate(url).await
    }

    async fn wait_for_navigation(&self) -> Result<(), DriverError> {
        self.0.wait_for_navigation().await
    }

    async fn wait_for_visible(&self, selector: &str, timeout_ms: u64) -> Result<(), DriverError> {
        self.0.wait_for_visible(selector, timeout_ms).await
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        self.0.click(selector).await
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        self.0.fill(selector, value).await
    }

    async fn select(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        self.0.select(selector, value).await
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<(), DriverError> {
        self.0.scroll_into_view(selector).await
    }

    async fn evaluate(&self, expression: &str) -> Result<JsonValue, DriverError> {
        self.0.evaluate(expression).await
    }

    async fn back(&self) -> Result<(), DriverError> {
        self.0.back().await
    }

    async fn forward(&self) -> Result<(), DriverError> {
        self.0.forward().await
    }

    async fn reload(&self) -> Result<(), DriverError> {
        self.0.reload().await
    }

    async fn screenshot(&self, path: &str) -> Result<(), DriverError> {
        self.0.screenshot(path).await
    }

    async fn url(&self) -> Result<String, DriverError> {
        self.0.url().await
    }

    async fn title(&self) -> Result<String, DriverError> {
        self.0.title().await
    }

    async fn viewport(&self) -> Result<Viewport, DriverError> {
        self.0.viewport().await
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.0.close().await
    }
}

struct SharedLauncher {
    driver: Arc<ScriptedDriver>,
}

#[async_trait]
impl Launcher for SharedLauncher {
    type Driver = SharedDriver;

    async fn launch(&self, _options: &LaunchOptions) -> Result<SharedDriver, DriverError> {
        Ok(SharedDriver(Arc::clone(&self.driver)))
    }
}

/// Maps known commands to canned plans, like the real translator would.
struct ScriptedTranslator {
    plans: HashMap<String, ActionPlan>,
}

impl ScriptedTranslator {
    fn new() -> Self {
        let mut plans = HashMap::new();
        plans.insert(
            "Click the login button".to_string(),
            ActionPlan::Single(
                Action::new(ActionType::Click)
                    .with_selector("#login")
                    .with_fallbacks(vec![Action::new(ActionType::Click)
                        .with_selector("[data-testid=\"login\"]")]),
            ),
        );
        plans.insert(
            "Open the site and log in".to_string(),
            ActionPlan::Sequence(vec![
                Action::new(ActionType::Navigate).with_value("example.com/login"),
                Action::new(ActionType::Click).with_selector("#login"),
            ]),
        );
        Self { plans }
    }
}

#[async_trait]
impl CommandTranslator for ScriptedTranslator {
    async fn translate(
        &self,
        command: &str,
        context: &TranslationContext<'_>,
    ) -> Result<ActionPlan, TranslationError> {
        // The engine must hand us a bounded-context-ready snapshot.
        assert!(context.dom_snapshot.is_some(), "snapshot missing for {command}");
        self.plans
            .get(command)
            .cloned()
            .ok_or_else(|| TranslationError::MalformedResponse(format!("no plan for {command}")))
    }

    async fn fallback_strategies(
        &self,
        _action: &Action,
        _error: &str,
    ) -> Result<Vec<Action>, TranslationError> {
        Ok(Vec::new())
    }
}

fn build_stack(
    driver: Arc<ScriptedDriver>,
) -> (
    BrowserSession<SharedLauncher>,
    ExecutionEngine<ScriptedTranslator>,
) {
    let session = BrowserSession::new(
        SharedLauncher { driver },
        LaunchOptions::default(),
        logger(),
    );
    let engine = ExecutionEngine::new(ScriptedTranslator::new(), logger());
    (session, engine)
}

#[tokio::test]
async fn a_command_runs_end_to_end_through_the_worker() {
    let driver = Arc::new(ScriptedDriver::default());
    let (session, engine) = build_stack(Arc::clone(&driver));

    let mut manager = WorkerManager::new(logger());
    manager.start(session, engine, timeouts()).await.unwrap();

    let result = manager.execute("Click the login button").await;
    assert!(result.success);
    assert_eq!(result.action, Some(ActionType::Click));
    assert_eq!(result.used_fallback, None);
    let page = result.page_state.expect("page state attached");
    assert_eq!(page.url, "https://example.com/login");
    assert_eq!(driver.clicks.lock().unwrap().as_slice(), ["#login"]);

    manager.stop().await.unwrap();
}

#[tokio::test]
async fn a_failing_primary_selector_recovers_through_its_fallback() {
    let driver = Arc::new(ScriptedDriver::default());
    driver.fail_selector("#login");
    let (session, engine) = build_stack(Arc::clone(&driver));

    let mut manager = WorkerManager::new(logger());
    manager.start(session, engine, timeouts()).await.unwrap();

    let result = manager.execute("Click the login button").await;
    assert!(result.success);
    assert_eq!(result.used_fallback, Some(true));
    assert_eq!(result.fallback_index, Some(0));
    assert_eq!(
        driver.clicks.lock().unwrap().as_slice(),
        ["[data-testid=\"login\"]"]
    );

    manager.stop().await.unwrap();
}

#[tokio::test]
async fn multi_step_commands_report_per_step_results() {
    let driver = Arc::new(ScriptedDriver::default());
    let (session, engine) = build_stack(Arc::clone(&driver));

    let mut manager = WorkerManager::new(logger());
    manager.start(session, engine, timeouts()).await.unwrap();

    let result = manager.execute("Open the site and log in").await;
    assert!(result.success);
    let steps = result.results.expect("per-step results");
    assert_eq!(steps.len(), 2);
    assert!(steps.iter().all(|step| step.success));
    assert_eq!(steps[0].command, "Open the site and log in (step 1)");

    manager.stop().await.unwrap();
}

#[tokio::test]
async fn untranslatable_commands_fail_without_raising() {
    let driver = Arc::new(ScriptedDriver::default());
    let (session, engine) = build_stack(driver);

    let mut manager = WorkerManager::new(logger());
    manager.start(session, engine, timeouts()).await.unwrap();

    let result = manager.execute("Sing a sea shanty").await;
    assert!(!result.success);
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .contains("no plan for Sing a sea shanty"));

    manager.stop().await.unwrap();
}

#[tokio::test]
async fn snapshot_inspect_and_status_flow_through_the_protocol() {
    let driver = Arc::new(ScriptedDriver::default());
    let (session, engine) = build_stack(driver);

    let mut manager = WorkerManager::new(logger());
    manager.start(session, engine, timeouts()).await.unwrap();

    let snapshot = manager.dom_snapshot().await.unwrap();
    assert_eq!(snapshot.url, "https://example.com/login");
    assert_eq!(snapshot.interactive_elements.len(), 1);
    // The extracted element got its selector synthesized from its id,
    // even though a data attribute was also available.
    assert_eq!(snapshot.interactive_elements[0].selector, "#login");

    let element = manager.inspect_element("#login").await.unwrap();
    assert_eq!(element.inner_text, "Log in");

    let missing = manager.inspect_element("#missing").await;
    assert!(missing
        .expect_err("missing element should error")
        .to_string()
        .contains("not found"));

    let status = manager.get_status().await;
    assert_eq!(status.status, WorkerStatus::Active);

    manager.stop().await.unwrap();
    let status = manager.get_status().await;
    assert_eq!(status.status, WorkerStatus::Inactive);
}
