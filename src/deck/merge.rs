use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::registry::ProjectRegistry;

use super::{
    pagination::{paginate, PageEntries, PaginationError},
    DeckDocument, DeviceState, Layout,
};

/// Writes paginated projects into device button state.
///
/// Only the buttons that receive a project are touched, and only their `text` and `icon`. Pages
/// past the generated range, free slots on the last generated page and the status button keep
/// whatever they had, so applying the same merge twice changes nothing the second time.
pub struct StateMerger<'a> {
    registry: &'a ProjectRegistry,
}

impl<'a> StateMerger<'a> {
    pub fn new(registry: &'a ProjectRegistry) -> Self {
        Self { registry }
    }

    pub fn merge(&self, mut state: DeviceState, pages: &[PageEntries<'_>]) -> DeviceState {
        for (page, entries) in pages.iter().enumerate() {
            for (key, code) in entries.iter().enumerate() {
                let button = state.button_mut(page, key);
                button.text = Some(code.clone());
                button.icon = self
                    .registry
                    .get(code)
                    .and_then(|project| project.image.clone());
            }
        }
        state
    }

    /// Paginates the registry for a device of the given size and merges the result.
    pub fn merge_device(
        &self,
        state: DeviceState,
        capacity: usize,
    ) -> Result<DeviceState, PaginationError> {
        let pages = paginate(self.registry.entries(), capacity)?;
        debug!("Merging {} pages for capacity {capacity}", pages.len());
        Ok(self.merge(state, &pages))
    }

    /// Merges every device of the document plus the `attached` ones it doesn't know yet. Each
    /// device is paginated with its own capacity. On error the document is left as it was.
    pub fn merge_document(
        &self,
        document: &mut DeckDocument,
        attached: &BTreeMap<String, Layout>,
        fallback: Layout,
    ) -> Result<(), PaginationError> {
        let mut merged = document.clone();
        for device_id in attached.keys() {
            if !merged.state.contains_key(device_id) {
                info!("Adding device {device_id}");
                merged
                    .state
                    .insert(device_id.clone(), DeviceState::default());
            }
        }

        for (device_id, state) in merged.state.iter_mut() {
            let configured = attached.get(device_id).copied();
            state.pin_layout(configured, fallback);
            let capacity = state.capacity(configured, fallback);
            *state = self.merge_device(std::mem::take(state), capacity)?;
            info!("Laid out {} projects on device {device_id}", self.registry.entries().len());
        }

        *document = merged;
        Ok(())
    }
}
