//! Selection capture: debounced read of the page selection on pointer
//! release, a translate affordance under the selection, and outside-click
//! dismissal. Host event listeners call the `on_*` methods.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{Labels, Timings};
use crate::debounce::Debouncer;
use crate::page::{NodeId, Page};
use crate::presentation::{self, FloatingPanel};
use crate::state_machine::{PendingSelection, SelectionMachine, SelectionState};
use crate::translate::TranslationClient;

#[derive(Debug, Default)]
struct Slot {
    pending: Option<PendingSelection>,
    affordance: Option<NodeId>,
    /// Outside clicks before this instant are ignored.
    dismiss_after: Option<Instant>,
}

struct Shared {
    page: Arc<dyn Page>,
    labels: Labels,
    timings: Timings,
    machine: SelectionMachine,
    slot: Mutex<Slot>,
}

impl Shared {
    /// Debounce expired: read the selection and arm the affordance.
    fn settle(&self, suppressed: bool) {
        let selection = self.page.selection();
        let text = selection
            .as_ref()
            .map(|s| s.text.trim().to_string())
            .unwrap_or_default();

        let Some(selection) = selection.filter(|_| !text.is_empty()) else {
            debug!("selection_empty");
            self.machine.reset();
            return;
        };

        let mut slot = self.slot.lock();
        slot.pending = Some(PendingSelection {
            text: text.clone(),
            suppressed,
        });

        if suppressed {
            debug!(len = text.len(), "selection_captured_suppressed");
            self.machine.reset();
            return;
        }

        if let Some(old) = slot.affordance.take() {
            self.page.remove(old);
        }
        let button = presentation::selection_button(&self.labels, selection.rect);
        let id = self.page.append_to_body(button);
        slot.affordance = Some(id);
        slot.dismiss_after = Some(Instant::now() + self.timings.dismiss_arm_delay);
        drop(slot);

        let _ = self.machine.transition(SelectionState::Armed);
        info!(len = text.len(), affordance = %id, "selection_armed");
    }

    fn remove_affordance(&self) -> bool {
        let mut slot = self.slot.lock();
        slot.dismiss_after = None;
        match slot.affordance.take() {
            Some(id) => {
                self.page.remove(id);
                true
            }
            None => false,
        }
    }
}

/// One selection-capture instance per page.
pub struct SelectionCapture {
    shared: Arc<Shared>,
    debouncer: Debouncer<bool>,
    client: Arc<TranslationClient>,
    panel: Arc<FloatingPanel>,
}

impl SelectionCapture {
    pub fn new(
        page: Arc<dyn Page>,
        client: Arc<TranslationClient>,
        panel: Arc<FloatingPanel>,
        labels: Labels,
        timings: Timings,
    ) -> Self {
        let shared = Arc::new(Shared {
            page,
            labels,
            timings,
            machine: SelectionMachine::new(),
            slot: Mutex::new(Slot::default()),
        });
        let settle_target = Arc::clone(&shared);
        let debouncer = Debouncer::new(timings.selection_delay, move |suppressed: bool| {
            settle_target.settle(suppressed)
        });
        Self {
            shared,
            debouncer,
            client,
            panel,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.shared.machine.current()
    }

    /// Last captured selection, if still live.
    pub fn pending(&self) -> Option<PendingSelection> {
        self.shared.slot.lock().pending.clone()
    }

    pub fn affordance(&self) -> Option<NodeId> {
        self.shared.slot.lock().affordance
    }

    /// Whether `target` is the translate affordance.
    pub fn owns(&self, target: Option<NodeId>) -> bool {
        target.is_some() && target == self.affordance()
    }

    /// Pointer pressed anywhere but the affordance: drop the pending timer
    /// and any visible affordance.
    pub fn on_pointer_down(&self, target: Option<NodeId>) {
        if self.owns(target) {
            return;
        }
        self.debouncer.cancel();
        self.shared.remove_affordance();
        self.shared.machine.reset();
    }

    /// Pointer released: read the selection after the debounce delay.
    /// `modifier` (Shift) captures without showing the affordance.
    pub fn on_pointer_up(&self, target: Option<NodeId>, modifier: bool) {
        if self.owns(target) {
            return;
        }
        let _ = self.shared.machine.transition(SelectionState::Pending);
        self.debouncer.trigger(modifier);
    }

    /// Document click: remove the affordance when the click lands outside
    /// it, once dismissal is armed. Returns whether it was removed.
    pub fn on_document_click(&self, target: Option<NodeId>) -> bool {
        {
            let slot = self.shared.slot.lock();
            let Some(affordance) = slot.affordance else {
                return false;
            };
            if target == Some(affordance) {
                return false;
            }
            match slot.dismiss_after {
                Some(at) if Instant::now() >= at => {}
                _ => return false,
            }
        }
        self.dismiss();
        true
    }

    /// Remove the affordance and forget the captured selection.
    pub fn dismiss(&self) {
        if self.shared.remove_affordance() {
            debug!("selection_affordance_dismissed");
        }
        self.shared.slot.lock().pending = None;
        self.shared.machine.reset();
    }

    /// Affordance clicked: translate the captured text and show the result
    /// panel, or alert on failure.
    pub async fn on_affordance_click(&self) {
        let Some(text) = self.pending().map(|p| p.text) else {
            return;
        };
        self.dismiss();

        match self.client.translate(&text).await {
            Some(translation) => {
                self.panel.show(&translation);
            }
            None => self.shared.page.alert(&self.shared.labels.failure_notice),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::{ClientConfig, MemorySettings, Settings};
    use crate::page::{MemoryPage, Rect, SelectionSnapshot};
    use crate::presentation::{FLOATING_PANEL_ID, SELECTION_BUTTON_ID};
    use crate::translate::cache::TranslationCache;
    use crate::translate::http::HttpReply;
    use crate::translate::testing::ScriptedTransport;

    struct Fixture {
        page: Arc<MemoryPage>,
        transport: Arc<ScriptedTransport>,
        capture: SelectionCapture,
        panel: Arc<FloatingPanel>,
    }

    fn fixture(transport: ScriptedTransport) -> Fixture {
        let page = Arc::new(MemoryPage::new("example.com"));
        let transport = Arc::new(transport);
        let client = Arc::new(TranslationClient::new(
            transport.clone(),
            Arc::new(MemorySettings::new(Settings::new("key"))),
            Arc::new(TranslationCache::new()),
            ClientConfig::default(),
        ));
        let panel = Arc::new(FloatingPanel::new(
            page.clone(),
            Labels::default(),
            Timings::default(),
        ));
        let capture = SelectionCapture::new(
            page.clone(),
            client,
            panel.clone(),
            Labels::default(),
            Timings::default(),
        );
        Fixture {
            page,
            transport,
            capture,
            panel,
        }
    }

    fn select(page: &MemoryPage, text: &str) {
        page.set_selection(Some(SelectionSnapshot {
            text: text.into(),
            rect: Rect {
                left: 40.0,
                top: 100.0,
                right: 240.0,
                bottom: 120.0,
            },
        }));
    }

    async fn wait_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn release_arms_affordance_after_debounce() {
        let f = fixture(ScriptedTransport::always("x"));
        select(&f.page, "  Hello there \n");

        f.capture.on_pointer_up(None, false);
        assert_eq!(f.capture.state(), SelectionState::Pending);
        wait_ms(100).await;
        assert!(f.capture.affordance().is_none());

        wait_ms(250).await;
        assert_eq!(f.capture.state(), SelectionState::Armed);
        let button = f.page.element_by_id(SELECTION_BUTTON_ID).unwrap();
        assert_eq!(f.capture.affordance(), Some(button));
        assert_eq!(f.page.style(button, "left").as_deref(), Some("40px"));
        assert_eq!(f.page.style(button, "top").as_deref(), Some("120px"));
        assert_eq!(f.capture.pending().unwrap().text, "Hello there");
    }

    #[tokio::test(start_paused = true)]
    async fn modifier_suppresses_affordance() {
        let f = fixture(ScriptedTransport::always("x"));
        select(&f.page, "Hello");

        f.capture.on_pointer_up(None, true);
        wait_ms(400).await;

        assert!(f.capture.affordance().is_none());
        assert_eq!(f.capture.state(), SelectionState::Idle);
        let pending = f.capture.pending().unwrap();
        assert!(pending.suppressed);
        assert_eq!(pending.text, "Hello");
    }

    #[tokio::test(start_paused = true)]
    async fn blank_selection_stays_idle() {
        let f = fixture(ScriptedTransport::always("x"));
        select(&f.page, "   ");
        f.capture.on_pointer_up(None, false);
        wait_ms(400).await;
        assert!(f.capture.affordance().is_none());
        assert_eq!(f.capture.state(), SelectionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn pointer_down_cancels_pending_display() {
        let f = fixture(ScriptedTransport::always("x"));
        select(&f.page, "Hello");
        f.capture.on_pointer_up(None, false);
        wait_ms(100).await;
        f.capture.on_pointer_down(None);
        wait_ms(400).await;
        assert!(f.capture.affordance().is_none());
        assert_eq!(f.capture.state(), SelectionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn new_selection_replaces_affordance() {
        let f = fixture(ScriptedTransport::always("x"));
        select(&f.page, "first");
        f.capture.on_pointer_up(None, false);
        wait_ms(400).await;
        let first = f.capture.affordance().unwrap();

        f.capture.on_pointer_down(None);
        assert!(!f.page.is_connected(first));
        select(&f.page, "second");
        f.capture.on_pointer_up(None, false);
        wait_ms(400).await;

        assert_eq!(f.capture.pending().unwrap().text, "second");
        let second = f.capture.affordance().unwrap();
        assert_ne!(first, second);
        assert_eq!(f.page.element_by_id(SELECTION_BUTTON_ID), Some(second));
    }

    #[tokio::test(start_paused = true)]
    async fn affordance_click_translates_captured_text() {
        let f = fixture(ScriptedTransport::always("سلام"));
        select(&f.page, "Hello");
        f.capture.on_pointer_up(None, false);
        wait_ms(400).await;
        let button = f.capture.affordance().unwrap();

        // Later selection changes do not alter the captured text.
        select(&f.page, "Something else");
        f.capture.on_pointer_down(Some(button));
        f.capture.on_pointer_up(Some(button), false);
        f.capture.on_affordance_click().await;

        let body = f.transport.last_body.lock().clone().unwrap();
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap().to_string();
        assert!(prompt.contains("Hello"));
        assert!(!prompt.contains("Something else"));

        assert!(!f.page.is_connected(button));
        assert!(f.panel.is_open());
        assert!(f.page.element_by_id(FLOATING_PANEL_ID).is_some());
        assert_eq!(f.capture.state(), SelectionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_translation_alerts_without_panel() {
        let f = fixture(ScriptedTransport::new(Vec::new(), Ok(HttpReply::new(500, ""))));
        select(&f.page, "Hello");
        f.capture.on_pointer_up(None, false);
        wait_ms(400).await;

        f.capture.on_affordance_click().await;

        assert_eq!(f.page.alerts(), vec!["Translation failed.".to_string()]);
        assert!(!f.panel.is_open());
        assert!(f.page.element_by_id(FLOATING_PANEL_ID).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn outside_click_dismisses_after_arming() {
        let f = fixture(ScriptedTransport::always("x"));
        select(&f.page, "Hello");
        f.capture.on_pointer_up(None, false);
        wait_ms(310).await;
        let button = f.capture.affordance().unwrap();
        let elsewhere = f.page.add_host_element(f.page.body(), "p", &[], None);

        // Same gesture that created the affordance.
        assert!(!f.capture.on_document_click(Some(elsewhere)));
        wait_ms(150).await;
        assert!(!f.capture.on_document_click(Some(button)));
        assert!(f.capture.on_document_click(Some(elsewhere)));

        assert!(!f.page.is_connected(button));
        assert!(f.capture.pending().is_none());
        assert_eq!(f.capture.state(), SelectionState::Idle);
    }
}
