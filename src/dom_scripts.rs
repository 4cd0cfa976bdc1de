//! Page-context helper script embedding.
//!
//! Each extraction concern lives in its own `.js` file under `scripts/` so
//! editors offer proper highlighting; the files are bundled as string
//! constants at compile time. The first line of every script is a
//! `// pilot:<name>` marker, which driver mocks match on in tests.

/// Returns the visible-text preview (≤ 1000 chars, ellipsis-terminated).
pub const TEXT_PREVIEW: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/scripts/text_preview.js"
));

/// Returns raw descriptors for all visible interactive elements.
pub const INTERACTIVE_ELEMENTS: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/scripts/interactive_elements.js"
));

/// Returns all forms and their fields.
pub const FORM_ELEMENTS: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/scripts/form_elements.js"
));

/// Returns substantial content containers.
pub const CONTENT_AREAS: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/scripts/content_areas.js"
));

/// Returns navigation regions and their links.
pub const NAVIGATION: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/scripts/navigation.js"
));

/// Returns page metadata (title, url, meta description, headings).
pub const METADATA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/scripts/metadata.js"
));

/// Arrow function `(selector) => Element | null` understanding CSS and
/// `tag:has-text("...")` selector forms.
pub const FIND_ELEMENT_FN: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/scripts/find_element.js"
));

/// Arrow function `(selector) => ElementInfo | null`.
pub const INSPECT_ELEMENT_FN: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/scripts/inspect_element.js"
));
