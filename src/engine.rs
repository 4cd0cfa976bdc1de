//! Command execution engine.
//!
//! Orchestrates a single command: interpret, execute, and on failure walk
//! the fallback ladder until one alternative succeeds or all are
//! exhausted. Every attempt lands in the append-only action history —
//! the sole audit trail. There are no retry loops beyond the explicit
//! fallback list; a command resolves within its fallback budget or fails
//! deterministically.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::dom::{self, DomError};
use crate::driver::BrowserDriver;
use crate::executor;
use crate::interpreter::{CommandTranslator, TranslationContext};
use crate::logging::PilotLogger;
use crate::types::action::{
    Action, ActionHistoryEntry, ActionPlan, ExecutionResult,
};
use crate::types::page::DomSnapshot;

/// Default bound on element-visibility waits.
const DEFAULT_ELEMENT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Default DOM snapshot staleness window.
const DEFAULT_SNAPSHOT_STALENESS: Duration = Duration::from_secs(2);

/// Errors surfaced when exporting the action history.
#[derive(Debug, Error)]
pub enum HistoryExportError {
    #[error("failed to write action history: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize action history: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Executes natural-language commands against a borrowed driver.
pub struct ExecutionEngine<T: CommandTranslator> {
    translator: T,
    history: Vec<ActionHistoryEntry>,
    snapshot: Option<DomSnapshot>,
    snapshot_taken: Option<Instant>,
    snapshot_staleness: Duration,
    element_wait_timeout_ms: u64,
    logger: Arc<PilotLogger>,
}

impl<T: CommandTranslator> ExecutionEngine<T> {
    pub fn new(translator: T, logger: Arc<PilotLogger>) -> Self {
        Self {
            translator,
            history: Vec::new(),
            snapshot: None,
            snapshot_taken: None,
            snapshot_staleness: DEFAULT_SNAPSHOT_STALENESS,
            element_wait_timeout_ms: DEFAULT_ELEMENT_WAIT_TIMEOUT_MS,
            logger,
        }
    }

    pub fn with_snapshot_staleness(mut self, window: Duration) -> Self {
        self.snapshot_staleness = window;
        self
    }

    pub fn with_element_wait_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.element_wait_timeout_ms = timeout_ms;
        self
    }

    pub fn translator(&self) -> &T {
        &self.translator
    }

    /// The append-only action history, oldest first.
    pub fn history(&self) -> &[ActionHistoryEntry] {
        &self.history
    }

    /// The currently cached DOM snapshot, if any.
    pub fn snapshot(&self) -> Option<&DomSnapshot> {
        self.snapshot.as_ref()
    }

    /// Serialize the action history to a JSON file for audit export.
    pub fn save_history(&self, path: impl AsRef<Path>) -> Result<(), HistoryExportError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.history)?;
        Ok(())
    }

    /// Execute one natural-language command end to end.
    pub async fn execute<D: BrowserDriver + ?Sized>(
        &mut self,
        driver: &D,
        command: &str,
    ) -> ExecutionResult {
        self.refresh_snapshot_if_stale(driver).await;

        let page_state = dom::read_page_state(driver).await.ok();
        let context = TranslationContext {
            page_state: page_state.as_ref(),
            dom_snapshot: self.snapshot.as_ref(),
        };

        let plan = match self.translator.translate(command, &context).await {
            Ok(plan) => plan,
            Err(err) => {
                self.logger
                    .error(format!("Command translation failed: {err}"), Some("engine"));
                return ExecutionResult::failure(command, err.to_string());
            }
        };

        match plan {
            ActionPlan::Single(action) => self.execute_single(driver, action, command).await,
            ActionPlan::Sequence(actions) => {
                self.execute_sequence(driver, actions, command).await
            }
        }
    }

    /// Force a snapshot refresh and return the new snapshot. Used by the
    /// worker's `dom_snapshot` command.
    pub async fn refresh_snapshot<D: BrowserDriver + ?Sized>(
        &mut self,
        driver: &D,
    ) -> Result<DomSnapshot, DomError> {
        let snapshot = dom::capture_snapshot(driver).await?;
        self.snapshot = Some(snapshot.clone());
        self.snapshot_taken = Some(Instant::now());
        Ok(snapshot)
    }

    async fn refresh_snapshot_if_stale<D: BrowserDriver + ?Sized>(&mut self, driver: &D) {
        let fresh = self
            .snapshot_taken
            .map(|taken| taken.elapsed() <= self.snapshot_staleness)
            .unwrap_or(false);
        if fresh && self.snapshot.is_some() {
            return;
        }

        match dom::capture_snapshot(driver).await {
            Ok(snapshot) => {
                self.snapshot = Some(snapshot);
                self.snapshot_taken = Some(Instant::now());
            }
            Err(err) => {
                // Keep whatever snapshot we had; interpretation degrades
                // to page-state-only context.
                self.logger
                    .error(format!("Snapshot refresh failed: {err}"), Some("engine"));
            }
        }
    }

    async fn execute_single<D: BrowserDriver + ?Sized>(
        &mut self,
        driver: &D,
        action: Action,
        command: &str,
    ) -> ExecutionResult {
        self.logger.info(
            format!("Executing action: {}", action.action_type),
            Some("engine"),
        );

        let outcome = executor::execute(driver, &action, self.element_wait_timeout_ms).await;
        self.history.push(ActionHistoryEntry {
            command: command.to_string(),
            action: action.clone(),
            success: outcome.success,
            error: outcome.error.clone(),
        });

        if !outcome.success {
            let error = outcome
                .error
                .unwrap_or_else(|| "unknown error".to_string());
            self.logger
                .info(format!("Action failed: {error}"), Some("engine"));
            return self.try_fallbacks(driver, &action, command, &error).await;
        }

        let page_state = dom::read_page_state(driver).await.ok();
        ExecutionResult::success(command, action.action_type, page_state)
    }

    async fn execute_sequence<D: BrowserDriver + ?Sized>(
        &mut self,
        driver: &D,
        actions: Vec<Action>,
        command: &str,
    ) -> ExecutionResult {
        let total = actions.len();
        let mut results: Vec<ExecutionResult> = Vec::with_capacity(total);

        for (index, action) in actions.into_iter().enumerate() {
            self.logger.info(
                format!("Executing step {} of {total}", index + 1),
                Some("engine"),
            );
            let step_command = format!("{command} (step {})", index + 1);
            let result = self.execute_single(driver, action, &step_command).await;
            let failed = !result.success;
            results.push(result);
            if failed {
                break;
            }
        }

        let success = results.iter().all(|result| result.success);
        let error = if success {
            None
        } else {
            results.last().and_then(|result| result.error.clone())
        };
        let page_state = dom::read_page_state(driver).await.ok();

        ExecutionResult {
            success,
            command: command.to_string(),
            action: None,
            error,
            page_state,
            used_fallback: None,
            fallback_index: None,
            tried_fallbacks: None,
            results: Some(results),
        }
    }

    async fn try_fallbacks<D: BrowserDriver + ?Sized>(
        &mut self,
        driver: &D,
        failed: &Action,
        command: &str,
        error: &str,
    ) -> ExecutionResult {
        // Prefer strategies attached to the failed action; only ask the
        // translator for alternatives when none were supplied.
        let fallbacks = if !failed.fallback_strategies.is_empty() {
            failed.fallback_strategies.clone()
        } else {
            match self.translator.fallback_strategies(failed, error).await {
                Ok(list) => list,
                Err(err) => {
                    self.logger.error(
                        format!("Fallback generation failed: {err}"),
                        Some("engine"),
                    );
                    Vec::new()
                }
            }
        };

        let total = fallbacks.len();
        for (index, fallback) in fallbacks.iter().enumerate() {
            self.logger.info(
                format!("Trying fallback strategy {} of {total}", index + 1),
                Some("engine"),
            );

            let outcome =
                executor::execute(driver, fallback, self.element_wait_timeout_ms).await;
            self.history.push(ActionHistoryEntry {
                command: format!("{command} (fallback {})", index + 1),
                action: fallback.clone(),
                success: outcome.success,
                error: outcome.error.clone(),
            });

            if outcome.success {
                let page_state = dom::read_page_state(driver).await.ok();
                let mut result =
                    ExecutionResult::success(command, fallback.action_type, page_state);
                result.used_fallback = Some(true);
                result.fallback_index = Some(index);
                return result;
            }
        }

        let mut result = ExecutionResult::failure(
            command,
            format!("All strategies failed. Original error: {error}"),
        );
        result.tried_fallbacks = Some(total);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Verbosity;
    use crate::driver::DriverError;
    use crate::interpreter::TranslationError;
    use crate::types::action::{ActionType, WaitKind};
    use crate::types::page::Viewport;
    use async_trait::async_trait;
    use serde_json::{json, Value as JsonValue};
    use std::sync::Mutex;

    fn quiet_logger() -> Arc<PilotLogger> {
        Arc::new(PilotLogger::new(Verbosity::Minimal))
    }

    /// Translator returning a canned plan and canned fallback list.
    #[derive(Default)]
    struct StubTranslator {
        plan: Option<ActionPlan>,
        error: Option<String>,
        fallbacks: Vec<Action>,
        translate_calls: Mutex<usize>,
        fallback_calls: Mutex<usize>,
    }

    impl StubTranslator {
        fn with_plan(plan: ActionPlan) -> Self {
            Self {
                plan: Some(plan),
                ..Default::default()
            }
        }

        fn with_error(message: &str) -> Self {
            Self {
                error: Some(message.to_string()),
                ..Default::default()
            }
        }

        fn with_generated_fallbacks(plan: ActionPlan, fallbacks: Vec<Action>) -> Self {
            Self {
                plan: Some(plan),
                fallbacks,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl CommandTranslator for StubTranslator {
        async fn translate(
            &self,
            _command: &str,
            _context: &TranslationContext<'_>,
        ) -> Result<ActionPlan, TranslationError> {
            *self.translate_calls.lock().unwrap() += 1;
            if let Some(message) = &self.error {
                return Err(TranslationError::MalformedResponse(message.clone()));
            }
            Ok(self.plan.clone().expect("stub plan"))
        }

        async fn fallback_strategies(
            &self,
            _action: &Action,
            _error: &str,
        ) -> Result<Vec<Action>, TranslationError> {
            *self.fallback_calls.lock().unwrap() += 1;
            Ok(self.fallbacks.clone())
        }
    }

    /// Driver serving canned snapshot scripts and failing listed selectors.
    #[derive(Default)]
    struct MockDriver {
        calls: Mutex<Vec<String>>,
        failing_selectors: Vec<String>,
        snapshot_extractions: Mutex<usize>,
    }

    impl MockDriver {
        fn failing(selectors: &[&str]) -> Self {
            Self {
                failing_selectors: selectors.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn extractions(&self) -> usize {
            *self.snapshot_extractions.lock().unwrap()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn should_fail(&self, selector: &str) -> bool {
            self.failing_selectors.iter().any(|s| s == selector)
        }
    }

    #[async_trait]
    impl BrowserDriver for MockDriver {
        async fn navigate(&self, url: &str) -> Result<(), DriverError> {
            self.record(format!("navigate:{url}"));
            Ok(())
        }

        async fn wait_for_navigation(&self) -> Result<(), DriverError> {
            Ok(())
        }

        async fn wait_for_visible(
            &self,
            selector: &str,
            timeout_ms: u64,
        ) -> Result<(), DriverError> {
            if self.should_fail(selector) {
                return Err(DriverError::WaitTimeout {
                    selector: selector.to_string(),
                    timeout_ms,
                });
            }
            Ok(())
        }

        async fn click(&self, selector: &str) -> Result<(), DriverError> {
            self.record(format!("click:{selector}"));
            Ok(())
        }

        async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
            self.record(format!("fill:{selector}:{value}"));
            Ok(())
        }

        async fn select(&self, selector: &str, value: &str) -> Result<(), DriverError> {
            self.record(format!("select:{selector}:{value}"));
            Ok(())
        }

        async fn scroll_into_view(&self, selector: &str) -> Result<(), DriverError> {
            self.record(format!("scroll_into_view:{selector}"));
            Ok(())
        }

        async fn evaluate(&self, expression: &str) -> Result<JsonValue, DriverError> {
            if expression.contains("pilot:interactive-elements") {
                *self.snapshot_extractions.lock().unwrap() += 1;
                return Ok(json!([]));
            }
            if expression.contains("pilot:form-elements")
                || expression.contains("pilot:content-areas")
                || expression.contains("pilot:navigation")
            {
                return Ok(json!([]));
            }
            if expression.contains("pilot:metadata") {
                return Ok(json!({ "title": "Example", "url": "https://example.com" }));
            }
            if expression.contains("pilot:text-preview") {
                return Ok(json!("Example Domain"));
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
            self.record("reload");
            Ok(())
        }

        async fn screenshot(&self, path: &str) -> Result<(), DriverError> {
            self.record(format!("screenshot:{path}"));
            Ok(())
        }

        async fn url(&self) -> Result<String, DriverError> {
            Ok("https://example.com".to_string())
        }

        async fn title(&self) -> Result<String, DriverError> {
            Ok("Example".to_string())
        }

        async fn viewport(&self) -> Result<Viewport, DriverError> {
            Ok(Viewport::default())
        }

        async fn close(&self) -> Result<(), DriverError> {
            Ok(())
        }
    }

    fn click(selector: &str) -> Action {
        Action::new(ActionType::Click).with_selector(selector)
    }

    #[tokio::test]
    async fn single_action_success_reports_fresh_page_state() {
        let translator = StubTranslator::with_plan(ActionPlan::Single(click("#go")));
        let driver = MockDriver::default();
        let mut engine = ExecutionEngine::new(translator, quiet_logger());

        let result = engine.execute(&driver, "Click go").await;
        assert!(result.success);
        assert_eq!(result.action, Some(ActionType::Click));
        assert_eq!(
            result.page_state.as_ref().map(|p| p.url.as_str()),
            Some("https://example.com")
        );
        assert_eq!(engine.history().len(), 1);
        assert!(engine.history()[0].success);
    }

    #[tokio::test]
    async fn translation_error_becomes_failed_result() {
        let translator = StubTranslator::with_error("gibberish");
        let driver = MockDriver::default();
        let mut engine = ExecutionEngine::new(translator, quiet_logger());

        let result = engine.execute(&driver, "Do something odd").await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("gibberish"));
        assert!(engine.history().is_empty());
    }

    #[tokio::test]
    async fn multi_step_aborts_at_first_failure() {
        let plan = ActionPlan::Sequence(vec![click("#a"), click("#bad"), click("#c")]);
        let translator = StubTranslator::with_plan(plan);
        let driver = MockDriver::failing(&["#bad"]);
        let mut engine = ExecutionEngine::new(translator, quiet_logger());

        let result = engine.execute(&driver, "Three steps").await;
        assert!(!result.success);
        let results = result.results.as_ref().unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert_eq!(results[0].command, "Three steps (step 1)");
        assert_eq!(results[1].command, "Three steps (step 2)");
        assert!(result.error.is_some());

        // The third step never ran.
        assert!(driver.calls().iter().all(|c| !c.contains("#c")));
    }

    #[tokio::test]
    async fn attached_fallbacks_win_over_generated_ones() {
        let action = click("#bad").with_fallbacks(vec![click("#alt")]);
        let translator = StubTranslator::with_plan(ActionPlan::Single(action));
        let driver = MockDriver::failing(&["#bad"]);
        let mut engine = ExecutionEngine::new(translator, quiet_logger());

        let result = engine.execute(&driver, "Click it").await;
        assert!(result.success);
        assert_eq!(result.used_fallback, Some(true));
        assert_eq!(result.fallback_index, Some(0));
        assert_eq!(*engine.translator().fallback_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn generated_fallbacks_are_requested_when_none_attached() {
        let translator = StubTranslator::with_generated_fallbacks(
            ActionPlan::Single(click("#bad")),
            vec![click("#alt")],
        );
        let driver = MockDriver::failing(&["#bad"]);
        let mut engine = ExecutionEngine::new(translator, quiet_logger());

        let result = engine.execute(&driver, "Click it").await;
        assert!(result.success);
        assert_eq!(result.fallback_index, Some(0));
        assert_eq!(*engine.translator().fallback_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn fallback_success_stops_the_ladder() {
        let action = click("#bad").with_fallbacks(vec![
            click("#also-bad"),
            click("#works"),
            click("#never"),
        ]);
        let translator = StubTranslator::with_plan(ActionPlan::Single(action));
        let driver = MockDriver::failing(&["#bad", "#also-bad"]);
        let mut engine = ExecutionEngine::new(translator, quiet_logger());

        let result = engine.execute(&driver, "Click it").await;
        assert!(result.success);
        assert_eq!(result.used_fallback, Some(true));
        assert_eq!(result.fallback_index, Some(1));
        assert!(driver.calls().iter().all(|c| !c.contains("#never")));

        // primary + two fallback attempts recorded
        assert_eq!(engine.history().len(), 3);
        assert_eq!(engine.history()[1].command, "Click it (fallback 1)");
        assert_eq!(engine.history()[2].command, "Click it (fallback 2)");
    }

    #[tokio::test]
    async fn fallback_exhaustion_reports_the_count_tried() {
        let action = click("#bad").with_fallbacks(vec![click("#bad2"), click("#bad3")]);
        let translator = StubTranslator::with_plan(ActionPlan::Single(action));
        let driver = MockDriver::failing(&["#bad", "#bad2", "#bad3"]);
        let mut engine = ExecutionEngine::new(translator, quiet_logger());

        let result = engine.execute(&driver, "Click it").await;
        assert!(!result.success);
        assert_eq!(result.tried_fallbacks, Some(2));
        let error = result.error.unwrap();
        assert!(error.starts_with("All strategies failed. Original error: "));
        assert_eq!(engine.history().len(), 3);
    }

    #[tokio::test]
    async fn snapshot_is_reused_within_the_staleness_window() {
        let translator = StubTranslator::with_plan(ActionPlan::Single(
            Action::new(ActionType::Wait).with_wait_type(WaitKind::Time).with_value(0),
        ));
        let driver = MockDriver::default();
        let mut engine = ExecutionEngine::new(translator, quiet_logger())
            .with_snapshot_staleness(Duration::from_secs(60));

        engine.execute(&driver, "wait a moment").await;
        engine.execute(&driver, "wait a moment").await;
        assert_eq!(driver.extractions(), 1);
    }

    #[tokio::test]
    async fn snapshot_is_refreshed_after_the_window() {
        let translator = StubTranslator::with_plan(ActionPlan::Single(
            Action::new(ActionType::Wait).with_wait_type(WaitKind::Time).with_value(0),
        ));
        let driver = MockDriver::default();
        let mut engine = ExecutionEngine::new(translator, quiet_logger())
            .with_snapshot_staleness(Duration::ZERO);

        engine.execute(&driver, "wait a moment").await;
        engine.execute(&driver, "wait a moment").await;
        assert_eq!(driver.extractions(), 2);
    }

    #[tokio::test]
    async fn history_export_round_trips() {
        let translator = StubTranslator::with_plan(ActionPlan::Single(click("#go")));
        let driver = MockDriver::default();
        let mut engine = ExecutionEngine::new(translator, quiet_logger());
        engine.execute(&driver, "Click go").await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        engine.save_history(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let entries: Vec<ActionHistoryEntry> = serde_json::from_str(&raw).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].command, "Click go");
        assert!(entries[0].success);
    }
}
