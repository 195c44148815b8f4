use std::{collections::BTreeMap, sync::Arc, time::Duration};

use anyhow::Result;
use tokio::{sync::mpsc, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

use crate::{
    config::AppConfig,
    deck::{
        merge::StateMerger, status::ElapsedTimeEngine, status_key, store::DeckStore, DeckDocument,
        Layout, PressAction, STATUS_PAGE,
    },
    registry::ProjectRegistry,
    tracking::toggle::{ActiveSession, ToggleOutcome, ToggleStateMachine},
};

use super::keys::KeyPress;

/// Owns everything the `ui` loop mutates. Ticks and key presses are handled one at a time on the
/// same task, so a press that arrives during a refresh waits for it to finish.
pub struct DeckSession<S: DeckStore> {
    machine: ToggleStateMachine,
    engine: ElapsedTimeEngine,
    registry: Arc<ProjectRegistry>,
    store: S,
    document: DeckDocument,
    /// Last document handed to the store.
    persisted: DeckDocument,
    devices: BTreeMap<String, Layout>,
    fallback: Layout,
    sync_rate: Duration,
    presses: mpsc::Receiver<KeyPress>,
    shutdown: CancellationToken,
}

impl<S: DeckStore> DeckSession<S> {
    pub fn new(
        machine: ToggleStateMachine,
        engine: ElapsedTimeEngine,
        registry: Arc<ProjectRegistry>,
        store: S,
        config: &AppConfig,
        presses: mpsc::Receiver<KeyPress>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            machine,
            engine,
            registry,
            store,
            document: DeckDocument::default(),
            persisted: DeckDocument::default(),
            devices: config.devices.clone(),
            fallback: config.default_layout,
            sync_rate: Duration::from_millis(config.sync_rate.max(1)),
            presses,
            shutdown,
        }
    }

    /// Runs until shutdown is requested. Only a failing start is fatal; later errors are logged
    /// and the loop carries on with the next event.
    pub async fn run(mut self) -> Result<()> {
        self.start().await?;

        let mut interval = tokio::time::interval(self.sync_rate);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut presses_open = true;

        loop {
            let result = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Stopping deck session");
                    return Ok(());
                }
                _ = interval.tick() => {
                    self.tick().instrument(info_span!("Sync tick")).await
                }
                press = self.presses.recv(), if presses_open => match press {
                    Some(press) => {
                        let span = info_span!("Key press", device = %press.device_id, key = press.key);
                        self.handle_press(press).instrument(span).await
                    }
                    None => {
                        info!("Key press source closed, only syncing from now on");
                        presses_open = false;
                        Ok(())
                    }
                },
            };

            if let Err(e) = result {
                error!("Deck session event failed {e:?}");
            }
        }
    }

    /// Lays out the registry on every known device, shows what is running and saves the result.
    async fn start(&mut self) -> Result<()> {
        self.document = self.store.load().await?;
        self.persisted = self.document.clone();

        StateMerger::new(&self.registry).merge_document(
            &mut self.document,
            &self.devices,
            self.fallback,
        )?;
        if let Err(e) = self.machine.refresh().await {
            warn!("Couldn't fetch the running entry, starting from idle: {e:#}");
        }
        self.update_statuses();
        self.persist().await
    }

    async fn tick(&mut self) -> Result<()> {
        if let Err(e) = self.machine.refresh().await {
            warn!("Refresh failed, keeping previous state: {e:#}");
        }
        let text_changed = self.update_statuses();
        if text_changed && self.machine.session().project().is_some() {
            for state in self.document.state.values_mut() {
                state.set_page(STATUS_PAGE);
            }
        }
        self.persist().await
    }

    async fn handle_press(&mut self, press: KeyPress) -> Result<()> {
        let Some(state) = self.document.state.get(&press.device_id) else {
            warn!("Key press from unmanaged device {}", press.device_id);
            return Ok(());
        };
        let capacity = self.capacity_of(&press.device_id);
        let page = state.page();
        let on_status = page == STATUS_PAGE && press.key == status_key(capacity);

        let target = match state.button(page, press.key).map(|b| b.press_action()) {
            Some(PressAction::Toggle(code)) if !on_status => Some(code.to_string()),
            _ => None,
        };

        match target {
            Some(code) => match self.machine.toggle(&code).await {
                ToggleOutcome::Started(code) => {
                    debug!("Showing {code} on {}", press.device_id);
                    self.set_page(&press.device_id, STATUS_PAGE);
                }
                outcome => warn!("Pressing {code} did not start it: {outcome:?}"),
            },
            None => {
                if *self.machine.session() != ActiveSession::Idle {
                    let outcome = self.machine.stop().await;
                    if !outcome.is_success() {
                        warn!("Stop from deck failed: {outcome:?}");
                    }
                }
                let pages = page_count(self.registry.entries().len(), capacity);
                self.set_page(&press.device_id, (page + 1) % pages);
            }
        }

        self.update_statuses();
        self.persist().await
    }

    fn capacity_of(&self, device_id: &str) -> usize {
        self.document.state.get(device_id).map_or_else(
            || self.fallback.capacity(),
            |state| state.capacity(self.devices.get(device_id).copied(), self.fallback),
        )
    }

    fn set_page(&mut self, device_id: &str, page: usize) {
        if let Some(state) = self.document.state.get_mut(device_id) {
            state.set_page(page);
        }
    }

    /// Returns whether any status button changed its text.
    fn update_statuses(&mut self) -> bool {
        let elapsed = self.machine.elapsed();
        let mut text_changed = false;
        for (device_id, state) in self.document.state.iter_mut() {
            let capacity = state.capacity(self.devices.get(device_id).copied(), self.fallback);
            match self.engine.update(elapsed.as_ref(), state, capacity) {
                Ok(update) => text_changed |= update.text_changed,
                Err(e) => warn!("Couldn't update status button of {device_id}: {e:?}"),
            }
        }
        text_changed
    }

    async fn persist(&mut self) -> Result<()> {
        if self.document == self.persisted {
            trace!("Deck state unchanged");
            return Ok(());
        }
        self.store.save(&self.document).await?;
        self.persisted = self.document.clone();
        debug!("Saved deck state");
        Ok(())
    }
}

/// Number of pages the registry occupies on a device. Never zero, so an empty registry still has
/// page 0 to cycle back to.
fn page_count(entries: usize, capacity: usize) -> usize {
    entries.div_ceil(capacity.saturating_sub(1).max(1)).max(1)
}
