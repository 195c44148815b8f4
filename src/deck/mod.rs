//! Button state of the attached decks.
//!
//! The persisted document is owned by the desktop deck application, so every level keeps the
//! fields it doesn't understand in an `extra` map and writes them back verbatim. Maps are ordered
//! so that serializing the same state always yields the same bytes.

pub mod merge;
pub mod pagination;
pub mod status;
pub mod store;

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Grid of a device as `(rows, cols)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Layout(pub usize, pub usize);

impl Layout {
    pub fn rows(&self) -> usize {
        self.0
    }

    pub fn cols(&self) -> usize {
        self.1
    }

    /// Number of buttons on one page.
    pub fn capacity(&self) -> usize {
        self.0 * self.1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ButtonConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Path of the image shown on the button.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What pressing a button means, derived from its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PressAction<'a> {
    Toggle(&'a str),
    Stop,
}

/// Status button text is the running project's code behind this marker.
pub const ACTIVE_MARKER: char = '@';

impl ButtonConfig {
    pub fn press_action(&self) -> PressAction<'_> {
        match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() && !text.starts_with(ACTIVE_MARKER) => {
                PressAction::Toggle(text)
            }
            _ => PressAction::Stop,
        }
    }
}

pub type PageButtons = BTreeMap<usize, ButtonConfig>;

const PAGE_FIELD: &str = "page";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Layout>,
    #[serde(default, deserialize_with = "deserialize_indexed_pages")]
    pub buttons: BTreeMap<usize, PageButtons>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceState {
    pub fn button(&self, page: usize, key: usize) -> Option<&ButtonConfig> {
        self.buttons.get(&page).and_then(|buttons| buttons.get(&key))
    }

    pub fn button_mut(&mut self, page: usize, key: usize) -> &mut ButtonConfig {
        self.buttons.entry(page).or_default().entry(key).or_default()
    }

    /// Page currently shown on the device.
    pub fn page(&self) -> usize {
        self.extra
            .get(PAGE_FIELD)
            .and_then(Value::as_u64)
            .map_or(0, |page| page as usize)
    }

    pub fn set_page(&mut self, page: usize) {
        if self.page() != page {
            self.extra.insert(PAGE_FIELD.into(), Value::from(page));
        }
    }

    /// Resolves how many buttons a page of this device holds. An explicit layout in the document
    /// wins, then the configured layout for the device, then the size of the first stored page,
    /// then the fallback.
    pub fn capacity(&self, configured: Option<Layout>, fallback: Layout) -> usize {
        self.layout
            .or(configured)
            .map(|layout| layout.capacity())
            .or_else(|| self.stored_capacity())
            .unwrap_or_else(|| fallback.capacity())
    }

    /// Highest button index of the first stored page plus one. Merges only write below the status
    /// button, so they never change this value.
    fn stored_capacity(&self) -> Option<usize> {
        self.buttons
            .values()
            .next()
            .and_then(|page| page.keys().next_back())
            .map(|last| last + 1)
            .filter(|count| *count > 1)
    }

    /// Writes the fallback layout into a device whose size can't be resolved any other way, so
    /// the buttons laid out with it keep their places on the next load.
    pub fn pin_layout(&mut self, configured: Option<Layout>, fallback: Layout) {
        if self.layout.is_none() && configured.is_none() && self.stored_capacity().is_none() {
            self.layout = Some(fallback);
        }
    }
}

/// Index of the status button on page 0.
pub fn status_key(capacity: usize) -> usize {
    capacity.saturating_sub(1)
}

pub const STATUS_PAGE: usize = 0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeckDocument {
    #[serde(default)]
    pub state: BTreeMap<String, DeviceState>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Page and button indices are stored as JSON object keys. Flattened structs buffer their input,
/// which loses serde_json's string-to-integer key coercion, so the keys are parsed here.
fn deserialize_indexed_pages<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<usize, PageButtons>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let raw = BTreeMap::<String, BTreeMap<String, ButtonConfig>>::deserialize(deserializer)?;
    let parse = |key: &str| {
        key.trim()
            .parse::<usize>()
            .map_err(|_| D::Error::custom(format!("expected a numeric index, got {key:?}")))
    };

    let mut pages = BTreeMap::new();
    for (page, buttons) in raw {
        let mut parsed = PageButtons::new();
        for (key, button) in buttons {
            parsed.insert(parse(&key)?, button);
        }
        pages.insert(parse(&page)?, parsed);
    }
    Ok(pages)
}
