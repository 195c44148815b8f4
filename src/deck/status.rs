use std::collections::VecDeque;

use anyhow::Result;
use tracing::{debug, trace};

use crate::{
    render::{ClockFace, IconRenderer},
    tracking::toggle::Elapsed,
};

use super::{status_key, DeviceState, ACTIVE_MARKER, STATUS_PAGE};

const CLOCK_CACHE_SIZE: usize = 8;

/// Remembers the last few rendered clock faces. A face only changes once a minute, while the
/// status button is refreshed every tick.
#[derive(Debug, Default)]
pub struct ClockIconCache {
    entries: VecDeque<(ClockFace, String)>,
}

impl ClockIconCache {
    pub fn get_or_render(
        &mut self,
        face: ClockFace,
        renderer: &mut dyn IconRenderer,
    ) -> Result<String> {
        if let Some((_, icon)) = self.entries.iter().find(|(cached, _)| *cached == face) {
            trace!("Clock icon cache hit for {face:?}");
            return Ok(icon.clone());
        }

        let icon = renderer.render_clock(face)?;
        if self.entries.len() == CLOCK_CACHE_SIZE {
            self.entries.pop_front();
        }
        self.entries.push_back((face, icon.clone()));
        Ok(icon)
    }
}

/// What [ElapsedTimeEngine::update] changed on the status button.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    pub text_changed: bool,
    pub icon_changed: bool,
}

impl StatusUpdate {
    pub fn changed(&self) -> bool {
        self.text_changed || self.icon_changed
    }
}

/// Keeps the status button of a device showing what is running and for how long.
pub struct ElapsedTimeEngine {
    renderer: Box<dyn IconRenderer>,
    cache: ClockIconCache,
    neutral_label: String,
    default_icon: Option<String>,
}

impl ElapsedTimeEngine {
    pub fn new(
        renderer: Box<dyn IconRenderer>,
        neutral_label: String,
        default_icon: Option<String>,
    ) -> Self {
        Self {
            renderer,
            cache: ClockIconCache::default(),
            neutral_label,
            default_icon,
        }
    }

    pub fn neutral_label(&self) -> &str {
        &self.neutral_label
    }

    pub fn update(
        &mut self,
        elapsed: Option<&Elapsed>,
        state: &mut DeviceState,
        capacity: usize,
    ) -> Result<StatusUpdate> {
        let running = elapsed.and_then(|e| e.project.as_deref().map(|p| (p, e.duration)));

        let (text, icon) = match running {
            Some((project, duration)) => {
                let face = ClockFace::from_elapsed(duration);
                let icon = self.cache.get_or_render(face, self.renderer.as_mut())?;
                (format!("{ACTIVE_MARKER}{project}"), Some(icon))
            }
            None => (self.neutral_label.clone(), self.default_icon.clone()),
        };

        let button = state.button_mut(STATUS_PAGE, status_key(capacity));
        let mut update = StatusUpdate::default();
        if button.text.as_deref() != Some(text.as_str()) {
            debug!("Status button now reads {text}");
            button.text = Some(text);
            update.text_changed = true;
        }
        if button.icon != icon {
            button.icon = icon;
            update.icon_changed = true;
        }
        Ok(update)
    }
}
