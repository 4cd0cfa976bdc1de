//! Prompt builders for command translation and fallback generation.

use serde_json::Value as JsonValue;

use crate::types::action::ActionType;

fn supported_kinds() -> String {
    ActionType::ALL
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// System prompt instructing the model to translate a command into one
/// action or an ordered `actions` array.
pub fn build_translate_system_prompt() -> String {
    format!(
        "You are a browser automation assistant that converts natural language commands into precise browser actions.\n\n\
You have DOM information from the current page that you should use to generate accurate selectors and actions.\n\n\
Return JSON with these fields:\n\
- action_type: one of {kinds}\n\
- selector: CSS selector when applicable (make it as specific and reliable as possible)\n\
- value: any value needed (URL, text input, wait milliseconds, screenshot path, option value)\n\
- wait_type: for wait actions, one of time, selector, navigation\n\
- direction: for scroll actions, one of up, down, top, bottom\n\
- fallback_strategies: array of alternative actions if the primary method fails\n\n\
When generating selectors:\n\
1. Prefer IDs (#element-id) when available\n\
2. Use data attributes for stability ([data-testid=\"search-input\"])\n\
3. Use exact-text selectors for buttons and links (button:has-text(\"Login\"))\n\
4. For forms, use the form field information in the DOM snapshot\n\
5. When clicking, make sure you target clickable elements (a, button, [role=\"button\"], etc.)\n\
6. For navigation targets, look at the navigation info in the DOM snapshot\n\n\
For complex operations, return an \"actions\" array with multiple steps.\n\n\
Always check the DOM snapshot for accurate element information before generating selectors.\n\n\
Return ONLY valid JSON with no additional text.",
        kinds = supported_kinds()
    )
}

/// User message for translation: the command plus the bounded context.
pub fn build_translate_user_message(command: &str, context: Option<&JsonValue>) -> String {
    match context {
        Some(context) => format!("{command}\n\nCurrent browser context: {context}"),
        None => command.to_string(),
    }
}

/// System prompt for generating alternative actions after a failure.
pub fn build_fallback_system_prompt() -> String {
    format!(
        "You are a browser automation troubleshooter. Given a failed browser action and an error message, \
suggest 2-3 alternative approaches to accomplish the same task.\n\n\
Consider these common failure patterns:\n\
1. Selector not found - Try different selector strategies (ID, text, data attributes)\n\
2. Element not visible - Try waiting longer or scrolling to make the element visible\n\
3. Timing issues - Add explicit waits before the action\n\
4. Dynamic IDs - Use more stable attributes like data-* attributes or text content\n\
5. Popup/overlay interference - Look for and dismiss any popups first\n\n\
For each alternative, provide:\n\
- action_type: one of {kinds}\n\
- selector: a different selector strategy than the original\n\
- value: any value needed (same as original or modified if needed)\n\n\
Return a JSON object with an \"alternatives\" array of these actions.\n\
Return ONLY valid JSON with no additional text.",
        kinds = supported_kinds()
    )
}

/// User message for fallback generation: the failed action and its error.
pub fn build_fallback_user_message(action: &JsonValue, error: &str) -> String {
    format!("Failed action: {action}\nError message: {error}\n\nSuggest alternative approaches.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn translate_prompt_lists_every_supported_kind() {
        let prompt = build_translate_system_prompt();
        for kind in ActionType::ALL {
            assert!(
                prompt.contains(kind.as_str()),
                "prompt should mention {kind}"
            );
        }
    }

    #[test]
    fn user_message_appends_context_only_when_present() {
        let bare = build_translate_user_message("Click login", None);
        assert_eq!(bare, "Click login");

        let context = json!({ "page_info": { "url": "https://example.com" } });
        let with_context = build_translate_user_message("Click login", Some(&context));
        assert!(with_context.starts_with("Click login\n\nCurrent browser context: "));
        assert!(with_context.contains("example.com"));
    }

    #[test]
    fn fallback_user_message_embeds_action_and_error() {
        let action = json!({ "action_type": "click", "selector": "#go" });
        let message = build_fallback_user_message(&action, "Click failed: timeout");
        assert!(message.contains("\"action_type\":\"click\""));
        assert!(message.contains("Click failed: timeout"));
    }
}
