//! Inline translator: on-demand LLM translation of selected text and social
//! feed items, rendered into the host page.
//! Main library: component wiring, host event dispatch, tracing setup.

pub mod capture;
pub mod config;
pub mod debounce;
pub mod feed;
pub mod page;
pub mod presentation;
pub mod state_machine;
pub mod translate;

use std::sync::Arc;

use tracing::{debug, info};

use capture::SelectionCapture;
use config::{ContentConfig, SettingsStore};
use feed::FeedObserver;
use page::{NodeId, Page};
use presentation::FloatingPanel;
use translate::cache::TranslationCache;
use translate::http::{ReqwestTransport, Transport};
use translate::{TranslateError, TranslationClient};

/// Log output format for `init_tracing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
/// Later calls are no-ops.
pub fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("inline_translator=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let _ = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// DOM events forwarded by the host glue. `target` is the event target
/// when it is a node the page can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    PointerDown { target: Option<NodeId> },
    PointerUp { target: Option<NodeId>, shift: bool },
    Click { target: Option<NodeId> },
    PointerEnter { target: NodeId },
    PointerLeave { target: NodeId },
    /// Child list of the observed subtree changed.
    Mutations,
}

/// Everything the content script runs on one page.
pub struct ContentScript {
    client: Arc<TranslationClient>,
    panel: Arc<FloatingPanel>,
    selection: SelectionCapture,
    feed: Option<FeedObserver>,
}

impl ContentScript {
    pub fn new(
        page: Arc<dyn Page>,
        settings: Arc<dyn SettingsStore>,
        transport: Arc<dyn Transport>,
        config: ContentConfig,
    ) -> Self {
        let cache = Arc::new(TranslationCache::new());
        let client = Arc::new(TranslationClient::new(
            transport,
            settings,
            cache,
            config.client.clone(),
        ));
        let panel = Arc::new(FloatingPanel::new(
            Arc::clone(&page),
            config.labels.clone(),
            config.timings,
        ));
        let selection = SelectionCapture::new(
            Arc::clone(&page),
            Arc::clone(&client),
            Arc::clone(&panel),
            config.labels.clone(),
            config.timings,
        );
        let feed = FeedObserver::attach(
            Arc::clone(&page),
            Arc::clone(&client),
            config.labels,
            config.feed,
        );
        info!(host = %page.hostname(), feed = feed.is_some(), "content_script_ready");

        Self {
            client,
            panel,
            selection,
            feed,
        }
    }

    /// Same as `new`, talking to the real endpoint over reqwest.
    pub fn with_http(
        page: Arc<dyn Page>,
        settings: Arc<dyn SettingsStore>,
        config: ContentConfig,
    ) -> Result<Self, TranslateError> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Ok(Self::new(page, settings, transport, config))
    }

    /// Decorate feed items already on the page.
    pub fn start(&self) {
        if let Some(feed) = &self.feed {
            feed.scan();
        }
    }

    pub fn client(&self) -> &Arc<TranslationClient> {
        &self.client
    }

    pub fn panel(&self) -> &Arc<FloatingPanel> {
        &self.panel
    }

    pub fn selection(&self) -> &SelectionCapture {
        &self.selection
    }

    pub fn feed(&self) -> Option<&FeedObserver> {
        self.feed.as_ref()
    }

    /// Route one host event. Clicks on injected controls are consumed by
    /// their owner; any other click reaches the outside-click handlers.
    pub async fn dispatch(&self, event: PageEvent) {
        debug!(?event, "page_event");
        match event {
            PageEvent::PointerDown { target } => self.selection.on_pointer_down(target),
            PageEvent::PointerUp { target, shift } => self.selection.on_pointer_up(target, shift),
            PageEvent::Click { target } => self.on_click(target).await,
            PageEvent::PointerEnter { target } => {
                if let Some(feed) = self.feed.as_ref().filter(|f| f.is_item(target)) {
                    feed.on_pointer_enter(target);
                }
            }
            PageEvent::PointerLeave { target } => {
                if let Some(feed) = self.feed.as_ref().filter(|f| f.is_item(target)) {
                    feed.on_pointer_leave(target);
                }
            }
            PageEvent::Mutations => {
                if let Some(feed) = &self.feed {
                    feed.on_mutations();
                }
            }
        }
    }

    async fn on_click(&self, target: Option<NodeId>) {
        if self.selection.owns(target) {
            self.selection.on_affordance_click().await;
            return;
        }
        if target.is_some() && target == self.panel.close_control() {
            self.panel.close().await;
            self.selection.dismiss();
            return;
        }
        if let (Some(feed), Some(node)) = (&self.feed, target) {
            if let Some(item) = feed.item_for_affordance(node) {
                feed.on_affordance_click(item).await;
                return;
            }
            if let Some(item) = feed.item_for_retranslate(node) {
                feed.on_retranslate_click(item).await;
                return;
            }
        }

        self.selection.on_document_click(target);
        if self.panel.on_document_click(target).await {
            self.selection.dismiss();
        }
    }
}
