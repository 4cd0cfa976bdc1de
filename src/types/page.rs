//! Page-state and DOM snapshot shapes.
//!
//! These mirror what the extraction scripts in `scripts/` produce: the JS
//! side reports raw element descriptors (camelCase keys), and the Rust side
//! attaches synthesized selectors before the snapshot is handed to the
//! interpreter.

use serde::{Deserialize, Serialize};

/// Browser viewport dimensions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

/// Lightweight page summary used as interpretation context and attached to
/// successful execution results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PageState {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_preview: Option<String>,
}

/// Element bounding box, in CSS pixels relative to the viewport.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ElementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A single `name="value"` attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttributePair {
    pub name: String,
    pub value: String,
}

/// Which synthesis strategy produced an element's selector. Earlier
/// variants are strictly more reliable; fallback generation should prefer
/// them when several are available for the same element.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SelectorSource {
    Id,
    DataAttribute,
    ClassList,
    Text,
    TagName,
}

/// A visible interactive element extracted from the page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct InteractiveElement {
    pub tag_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub placeholder: String,
    pub name: String,
    pub id: String,
    pub href: String,
    pub value: String,
    pub aria_label: String,
    pub aria_expanded: String,
    pub class_list: Vec<String>,
    pub data_attributes: Vec<AttributePair>,
    pub rect: ElementRect,
    /// Filled in by selector synthesis; empty in the raw script output.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub selector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector_source: Option<SelectorSource>,
}

/// One input inside a form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FormField {
    pub tag_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub id: String,
    pub placeholder: String,
    pub value: String,
    pub required: bool,
    pub label: String,
}

/// A form and its fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FormElement {
    pub id: String,
    pub name: String,
    pub action: String,
    pub method: String,
    pub elements: Vec<FormField>,
}

/// A substantial content container on the page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentArea {
    pub selector: String,
    pub id: String,
    pub class_list: Vec<String>,
    pub text_length: u64,
    pub children_count: u64,
    pub width: f64,
    pub height: f64,
}

/// A link found inside a navigation region.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NavLink {
    pub text: String,
    pub href: String,
    pub aria_label: String,
}

/// A navigation region (nav/header) and its links.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigationRegion {
    pub selector: String,
    pub id: String,
    pub class_list: Vec<String>,
    pub links: Vec<NavLink>,
}

/// Page-level metadata extracted alongside the element lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PageMetadata {
    pub title: String,
    pub url: String,
    pub meta_description: String,
    pub h1: Vec<String>,
    pub h2: Vec<String>,
}

/// Structured extraction of the page used for element targeting and as
/// interpretation context.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DomSnapshot {
    pub interactive_elements: Vec<InteractiveElement>,
    pub form_elements: Vec<FormElement>,
    pub content_areas: Vec<ContentArea>,
    pub navigation: Vec<NavigationRegion>,
    pub metadata: PageMetadata,
    pub url: String,
    pub title: String,
}

/// Detailed view of one element, produced by `inspect_element`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementInfo {
    pub tag_name: String,
    pub id: String,
    pub class_name: String,
    pub inner_text: String,
    pub text_content: String,
    pub href: String,
    pub src: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    pub placeholder: String,
    pub attributes: Vec<AttributePair>,
    pub rect: ElementRect,
    pub is_visible: bool,
}
