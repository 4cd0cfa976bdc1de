//! Page-state reading and DOM snapshot extraction.
//!
//! The extraction scripts report raw element descriptors; selector
//! synthesis happens here so the priority ordering is a checked contract
//! rather than buried in page-context JS. Snapshot extraction degrades to
//! an error value on any page failure instead of propagating.

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::dom_scripts;
use crate::driver::{BrowserDriver, DriverError};
use crate::types::page::{
    ContentArea, DomSnapshot, ElementInfo, FormElement, InteractiveElement, NavigationRegion,
    PageMetadata, PageState, SelectorSource,
};

/// Upper bound on synthesized class-list and text selectors.
const MAX_SHORT_SELECTOR_LEN: usize = 50;

/// Errors surfaced by snapshot extraction and element inspection.
#[derive(Debug, Error)]
pub enum DomError {
    #[error("DOM snapshot failed: {0}")]
    Snapshot(String),
    #[error("Element with selector '{0}' not found")]
    NotFound(String),
    #[error("Element with selector '{0}' is not visible")]
    NotVisible(String),
    #[error("Element inspection failed: {0}")]
    Inspection(String),
}

/// Read a fresh [`PageState`] from the live page.
pub async fn read_page_state<D: BrowserDriver + ?Sized>(
    driver: &D,
) -> Result<PageState, DriverError> {
    let url = driver.url().await?;
    let title = driver.title().await?;
    let viewport = driver.viewport().await?;
    let preview = driver.evaluate(dom_scripts::TEXT_PREVIEW).await?;

    Ok(PageState {
        url,
        title,
        viewport: Some(viewport),
        text_preview: preview.as_str().map(|s| s.to_string()),
    })
}

/// Capture a structured snapshot of the current page.
pub async fn capture_snapshot<D: BrowserDriver + ?Sized>(
    driver: &D,
) -> Result<DomSnapshot, DomError> {
    let snapshot_err = |err: DriverError| DomError::Snapshot(err.to_string());

    let raw_elements = driver
        .evaluate(dom_scripts::INTERACTIVE_ELEMENTS)
        .await
        .map_err(snapshot_err)?;
    let raw_forms = driver
        .evaluate(dom_scripts::FORM_ELEMENTS)
        .await
        .map_err(snapshot_err)?;
    let raw_content = driver
        .evaluate(dom_scripts::CONTENT_AREAS)
        .await
        .map_err(snapshot_err)?;
    let raw_navigation = driver
        .evaluate(dom_scripts::NAVIGATION)
        .await
        .map_err(snapshot_err)?;
    let raw_metadata = driver
        .evaluate(dom_scripts::METADATA)
        .await
        .map_err(snapshot_err)?;
    let url = driver.url().await.map_err(snapshot_err)?;
    let title = driver.title().await.map_err(snapshot_err)?;

    let mut interactive_elements: Vec<InteractiveElement> =
        parse_list(raw_elements, "interactive elements")?;
    for element in &mut interactive_elements {
        let (selector, source) = synthesize_selector(element);
        element.selector = selector;
        element.selector_source = Some(source);
    }

    Ok(DomSnapshot {
        interactive_elements,
        form_elements: parse_list::<FormElement>(raw_forms, "form elements")?,
        content_areas: parse_list::<ContentArea>(raw_content, "content areas")?,
        navigation: parse_list::<NavigationRegion>(raw_navigation, "navigation")?,
        metadata: serde_json::from_value::<PageMetadata>(raw_metadata)
            .map_err(|err| DomError::Snapshot(format!("metadata: {err}")))?,
        url,
        title,
    })
}

fn parse_list<T: serde::de::DeserializeOwned>(
    value: JsonValue,
    what: &str,
) -> Result<Vec<T>, DomError> {
    serde_json::from_value(value).map_err(|err| DomError::Snapshot(format!("{what}: {err}")))
}

/// Build the most reliable selector available for an extracted element.
///
/// Priority order is a contract: id, first data-* attribute, short
/// non-dynamic class list, short exact text, bare tag name. Callers that
/// pick between candidate selectors for the same element must prefer the
/// earlier-ranked source.
pub fn synthesize_selector(element: &InteractiveElement) -> (String, SelectorSource) {
    if !element.id.is_empty() {
        return (format!("#{}", element.id), SelectorSource::Id);
    }

    if let Some(attr) = element.data_attributes.iter().find(|a| !a.value.is_empty()) {
        return (
            format!("[{}=\"{}\"]", attr.name, attr.value),
            SelectorSource::DataAttribute,
        );
    }

    let joined_len: usize = element.class_list.iter().map(|c| c.len() + 1).sum();
    if !element.class_list.is_empty() && joined_len < MAX_SHORT_SELECTOR_LEN {
        let classes: Vec<&str> = element
            .class_list
            .iter()
            .map(String::as_str)
            .filter(|c| !c.contains("--") && c.len() > 2 && !c.starts_with(|ch: char| ch.is_ascii_digit()))
            .collect();
        if !classes.is_empty() {
            return (
                format!("{}.{}", element.tag_name, classes.join(".")),
                SelectorSource::ClassList,
            );
        }
    }

    let text = element.text.trim();
    if !text.is_empty() && text.len() < MAX_SHORT_SELECTOR_LEN {
        return (
            format!("{}:has-text(\"{}\")", element.tag_name, text.replace('"', "\\\"")),
            SelectorSource::Text,
        );
    }

    (element.tag_name.clone(), SelectorSource::TagName)
}

/// Inspect one element by CSS selector.
pub async fn inspect_element<D: BrowserDriver + ?Sized>(
    driver: &D,
    selector: &str,
) -> Result<ElementInfo, DomError> {
    let selector_json = serde_json::to_string(selector)
        .map_err(|err| DomError::Inspection(err.to_string()))?;
    let script = format!(
        "({inspect})({selector})",
        inspect = dom_scripts::INSPECT_ELEMENT_FN,
        selector = selector_json
    );

    let value = driver
        .evaluate(&script)
        .await
        .map_err(|err| DomError::Inspection(err.to_string()))?;

    if value.is_null() {
        return Err(DomError::NotFound(selector.to_string()));
    }

    let info: ElementInfo = serde_json::from_value(value)
        .map_err(|err| DomError::Inspection(err.to_string()))?;

    if !info.is_visible {
        return Err(DomError::NotVisible(selector.to_string()));
    }

    Ok(info)
}
