//! Feed observer: on recognized feed sites, attach a hover-gated translate
//! button to every feed item exactly once, and render results inline.
//! Host mutation notifications are debounced into full-document scans.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::{FeedConfig, Labels};
use crate::debounce::Debouncer;
use crate::page::{NodeId, Page};
use crate::presentation::{self, ROLE_INLINE_BODY, ROLE_RETRANSLATE};
use crate::translate::TranslationClient;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static whitespace pattern"));

/// Collapse whitespace runs to single spaces and trim.
pub fn flatten_text(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

#[derive(Debug, Clone, Copy)]
struct InlinePanel {
    root: NodeId,
    body: NodeId,
    retranslate: NodeId,
}

#[derive(Debug, Clone, Default)]
struct FeedItem {
    affordance: Option<NodeId>,
    panel: Option<InlinePanel>,
    /// Flattened text sent for translation; the cache key for re-translate.
    source_text: Option<String>,
    busy: bool,
}

struct FeedShared {
    page: Arc<dyn Page>,
    labels: Labels,
    config: FeedConfig,
    items: Mutex<HashMap<NodeId, FeedItem>>,
}

impl FeedShared {
    /// Full-document scan. Returns the number of newly decorated items.
    fn scan(&self) -> usize {
        let page = self.page.as_ref();
        let mut items = self.items.lock();
        items.retain(|id, _| page.is_connected(*id));

        let mut attached = 0;
        for item in page.query_all(&self.config.selector) {
            if page.has_flag(item, &self.config.marker) {
                continue;
            }
            page.set_flag(item, &self.config.marker);
            page.set_style(item, "position", "relative");
            let button = page.append_child(item, presentation::feed_button(&self.labels));
            items.insert(
                item,
                FeedItem {
                    affordance: Some(button),
                    ..FeedItem::default()
                },
            );
            attached += 1;
        }
        debug!(attached, tracked = items.len(), "feed_scan");
        attached
    }

    fn affordance(&self, item: NodeId) -> Option<NodeId> {
        self.items.lock().get(&item).and_then(|i| i.affordance)
    }
}

pub struct FeedObserver {
    shared: Arc<FeedShared>,
    debouncer: Debouncer<()>,
    client: Arc<TranslationClient>,
}

impl FeedObserver {
    /// Returns `None` unless the page is a recognized feed site.
    pub fn attach(
        page: Arc<dyn Page>,
        client: Arc<TranslationClient>,
        labels: Labels,
        config: FeedConfig,
    ) -> Option<Self> {
        let host = page.hostname();
        if !config.matches_host(&host) {
            debug!(%host, "feed_observer_skipped");
            return None;
        }

        let delay = config.debounce;
        let shared = Arc::new(FeedShared {
            page,
            labels,
            config,
            items: Mutex::new(HashMap::new()),
        });
        let scan_target = Arc::clone(&shared);
        let debouncer = Debouncer::new(delay, move |()| {
            scan_target.scan();
        });
        info!(%host, selector = %shared.config.selector.css(), "feed_observer_attached");
        Some(Self {
            shared,
            debouncer,
            client,
        })
    }

    /// Scan now, bypassing the debounce.
    pub fn scan(&self) -> usize {
        self.shared.scan()
    }

    /// Subtree changed (nodes added or removed). Coalesced into one scan.
    pub fn on_mutations(&self) {
        self.debouncer.trigger(());
    }

    pub fn affordance(&self, item: NodeId) -> Option<NodeId> {
        self.shared.affordance(item)
    }

    /// Mounted inline panel root for `item`.
    pub fn panel(&self, item: NodeId) -> Option<NodeId> {
        self.shared.items.lock().get(&item).and_then(|i| i.panel).map(|p| p.root)
    }

    /// Item whose translate button is `target`.
    pub fn item_for_affordance(&self, target: NodeId) -> Option<NodeId> {
        self.shared
            .items
            .lock()
            .iter()
            .find(|(_, i)| i.affordance == Some(target))
            .map(|(id, _)| *id)
    }

    /// Item whose re-translate control is `target`.
    pub fn item_for_retranslate(&self, target: NodeId) -> Option<NodeId> {
        self.shared
            .items
            .lock()
            .iter()
            .find(|(_, i)| i.panel.is_some_and(|p| p.retranslate == target))
            .map(|(id, _)| *id)
    }

    fn forget(&self, item: NodeId) {
        self.shared.items.lock().remove(&item);
    }

    /// Whether `node` is a tracked feed item.
    pub fn is_item(&self, node: NodeId) -> bool {
        self.shared.items.lock().contains_key(&node)
    }

    pub fn on_pointer_enter(&self, item: NodeId) {
        if let Some(button) = self.affordance(item) {
            self.shared.page.set_style(button, "display", "block");
        }
    }

    pub fn on_pointer_leave(&self, item: NodeId) {
        if let Some(button) = self.affordance(item) {
            self.shared.page.set_style(button, "display", "none");
        }
    }

    /// Translate the item's text. Success replaces the button with an
    /// inline panel after the item; failure alerts and restores the button.
    /// A result for an item that left the page meanwhile is dropped.
    pub async fn on_affordance_click(&self, item: NodeId) {
        let page = Arc::clone(&self.shared.page);
        let labels = &self.shared.labels;

        let button = {
            let mut items = self.shared.items.lock();
            let Some(entry) = items.get_mut(&item) else {
                return;
            };
            let Some(button) = entry.affordance.filter(|_| !entry.busy) else {
                return;
            };
            entry.busy = true;
            button
        };

        page.set_disabled(button, true);
        page.set_text(button, &labels.busy);

        let text = flatten_text(&page.text_content(item));
        let translation = if text.is_empty() {
            warn!(%item, "feed item has no text");
            None
        } else {
            self.client.translate(&text).await
        };

        if !page.is_connected(item) {
            self.forget(item);
            debug!(%item, "feed item left the page, result dropped");
            return;
        }

        let Some(translation) = translation else {
            page.alert(&labels.failure_notice);
            page.set_text(button, &labels.feed_button);
            page.set_disabled(button, false);
            if let Some(entry) = self.shared.items.lock().get_mut(&item) {
                entry.busy = false;
            }
            return;
        };

        page.remove(button);
        let Some(root) = page.insert_after(item, presentation::inline_panel(labels, &translation))
        else {
            self.forget(item);
            return;
        };
        let panel = InlinePanel {
            root,
            body: page.find_role(root, ROLE_INLINE_BODY).unwrap_or(root),
            retranslate: page.find_role(root, ROLE_RETRANSLATE).unwrap_or(root),
        };

        if let Some(entry) = self.shared.items.lock().get_mut(&item) {
            entry.affordance = None;
            entry.panel = Some(panel);
            entry.source_text = Some(text);
            entry.busy = false;
        }
        info!(%item, panel = %root, "feed_item_translated");
    }

    /// Evict the cached translation and translate again. The control's
    /// idle label is restored whatever the outcome.
    pub async fn on_retranslate_click(&self, item: NodeId) {
        let page = Arc::clone(&self.shared.page);
        let labels = &self.shared.labels;

        let (panel, text) = {
            let mut items = self.shared.items.lock();
            let Some(entry) = items.get_mut(&item) else {
                return;
            };
            if entry.busy {
                return;
            }
            let (Some(panel), Some(text)) = (entry.panel, entry.source_text.clone()) else {
                return;
            };
            entry.busy = true;
            (panel, text)
        };

        page.set_disabled(panel.retranslate, true);
        page.set_text(panel.retranslate, &labels.retranslate_busy);

        self.client.evict(&text);
        let translation = self.client.translate(&text).await;
        if !page.is_connected(panel.root) {
            self.forget(item);
            return;
        }
        match translation {
            Some(translation) => {
                page.set_text(panel.body, &translation);
                presentation::apply_direction(page.as_ref(), panel.body, &translation);
            }
            None => page.set_text(panel.body, &labels.retranslate_failed),
        }

        page.set_text(panel.retranslate, &labels.retranslate_icon);
        page.set_disabled(panel.retranslate, false);
        if let Some(entry) = self.shared.items.lock().get_mut(&item) {
            entry.busy = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::{ClientConfig, MemorySettings, Settings};
    use crate::page::MemoryPage;
    use crate::translate::cache::TranslationCache;
    use crate::translate::http::HttpReply;
    use crate::translate::testing::{ok_reply, ScriptedTransport};
    use crate::translate::TranslateError;

    struct Fixture {
        page: Arc<MemoryPage>,
        transport: Arc<ScriptedTransport>,
        client: Arc<TranslationClient>,
        article: NodeId,
    }

    impl Fixture {
        fn new(host: &str, transport: ScriptedTransport) -> Self {
            let page = Arc::new(MemoryPage::new(host));
            let transport = Arc::new(transport);
            let client = Arc::new(TranslationClient::new(
                transport.clone(),
                Arc::new(MemorySettings::new(Settings::new("key"))),
                Arc::new(TranslationCache::new()),
                ClientConfig::default(),
            ));
            let article = page.add_host_element(page.body(), "article", &[], None);
            Self {
                page,
                transport,
                client,
                article,
            }
        }

        fn observer(&self) -> Option<FeedObserver> {
            FeedObserver::attach(
                self.page.clone(),
                self.client.clone(),
                Labels::default(),
                FeedConfig::default(),
            )
        }

        fn post(&self, lang: &str, text: &str) -> NodeId {
            self.page.add_host_element(
                self.article,
                "div",
                &[("dir", "auto"), ("lang", lang)],
                Some(text),
            )
        }
    }

    #[test]
    fn flattens_whitespace() {
        assert_eq!(flatten_text("  Hello \n\n  big\tworld  "), "Hello big world");
    }

    #[test]
    fn only_feed_sites_are_observed() {
        let f = Fixture::new("example.com", ScriptedTransport::always("x"));
        assert!(f.observer().is_none());
        let f = Fixture::new("x.com", ScriptedTransport::always("x"));
        assert!(f.observer().is_some());
    }

    #[test]
    fn rescanning_attaches_once() {
        let f = Fixture::new("twitter.com", ScriptedTransport::always("x"));
        let en = f.post("en", "Hello");
        let fa = f.post("fa", "سلام");
        let observer = f.observer().unwrap();

        assert_eq!(observer.scan(), 1);
        assert_eq!(observer.scan(), 0);

        let buttons: Vec<_> = f
            .page
            .children(en)
            .into_iter()
            .filter(|c| f.page.text(*c).as_deref() == Some("Translate"))
            .collect();
        assert_eq!(buttons.len(), 1);
        assert!(f.page.has_flag(en, "buttonAdded"));
        assert_eq!(f.page.style(en, "position").as_deref(), Some("relative"));
        assert!(observer.affordance(fa).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn mutation_bursts_are_debounced() {
        let f = Fixture::new("x.com", ScriptedTransport::always("x"));
        let observer = f.observer().unwrap();
        let first = f.post("en", "one");

        observer.on_mutations();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = f.post("de", "zwei");
        observer.on_mutations();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(observer.affordance(first).is_none());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(observer.affordance(first).is_some());
        assert!(observer.affordance(second).is_some());
    }

    #[test]
    fn hover_toggles_affordance() {
        let f = Fixture::new("x.com", ScriptedTransport::always("x"));
        let item = f.post("en", "Hello");
        let observer = f.observer().unwrap();
        observer.scan();
        let button = observer.affordance(item).unwrap();

        assert_eq!(f.page.style(button, "display").as_deref(), Some("none"));
        observer.on_pointer_enter(item);
        assert_eq!(f.page.style(button, "display").as_deref(), Some("block"));
        observer.on_pointer_leave(item);
        assert_eq!(f.page.style(button, "display").as_deref(), Some("none"));
    }

    #[tokio::test]
    async fn click_inserts_inline_panel() {
        let f = Fixture::new("x.com", ScriptedTransport::always("سلام دنیا"));
        let item = f.post("en", "Hello\n   world");
        let observer = f.observer().unwrap();
        observer.scan();
        let button = observer.affordance(item).unwrap();
        assert_eq!(observer.item_for_affordance(button), Some(item));

        observer.on_affordance_click(item).await;

        let body = f.transport.last_body.lock().clone().unwrap();
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap().to_string();
        assert!(prompt.contains("Original Text:\nHello world\n"));

        assert!(!f.page.is_connected(button));
        let panel = observer.panel(item).unwrap();
        assert_eq!(f.page.next_sibling(item), Some(panel));
        let text = f.page.find_role(panel, ROLE_INLINE_BODY).unwrap();
        assert_eq!(f.page.text(text).as_deref(), Some("سلام دنیا"));
        assert_eq!(f.page.style(text, "direction").as_deref(), Some("rtl"));
        assert_eq!(f.page.style(text, "text-align").as_deref(), Some("right"));
    }

    #[tokio::test]
    async fn failed_click_restores_button() {
        let f = Fixture::new(
            "x.com",
            ScriptedTransport::new(Vec::new(), Err(TranslateError::Transport("down".into()))),
        );
        let item = f.post("en", "Hello");
        let observer = f.observer().unwrap();
        observer.scan();
        let button = observer.affordance(item).unwrap();

        observer.on_affordance_click(item).await;

        assert_eq!(f.page.alerts(), vec!["Translation failed.".to_string()]);
        assert!(f.page.is_connected(button));
        assert!(!f.page.is_disabled(button));
        assert_eq!(f.page.text(button).as_deref(), Some("Translate"));
        assert!(observer.panel(item).is_none());
    }

    #[tokio::test]
    async fn retranslate_evicts_and_refreshes() {
        let f = Fixture::new(
            "x.com",
            ScriptedTransport::new(vec![Ok(ok_reply("first"))], Ok(ok_reply("second"))),
        );
        let item = f.post("en", "Hello");
        let observer = f.observer().unwrap();
        observer.scan();
        observer.on_affordance_click(item).await;

        let panel = observer.panel(item).unwrap();
        let control = f.page.find_role(panel, ROLE_RETRANSLATE).unwrap();
        let body = f.page.find_role(panel, ROLE_INLINE_BODY).unwrap();
        assert_eq!(observer.item_for_retranslate(control), Some(item));

        observer.on_retranslate_click(item).await;

        assert_eq!(f.transport.calls(), 2);
        assert_eq!(f.page.text(body).as_deref(), Some("second"));
        assert_eq!(f.page.style(body, "direction").as_deref(), Some("ltr"));
        assert_eq!(f.page.text(control).as_deref(), Some("\u{21bb}"));
        assert!(!f.page.is_disabled(control));
    }

    #[tokio::test]
    async fn retranslate_failure_is_inline() {
        let f = Fixture::new(
            "x.com",
            ScriptedTransport::new(vec![Ok(ok_reply("first"))], Ok(HttpReply::new(503, ""))),
        );
        let item = f.post("en", "Hello");
        let observer = f.observer().unwrap();
        observer.scan();
        observer.on_affordance_click(item).await;
        let panel = observer.panel(item).unwrap();

        observer.on_retranslate_click(item).await;

        let body = f.page.find_role(panel, ROLE_INLINE_BODY).unwrap();
        let control = f.page.find_role(panel, ROLE_RETRANSLATE).unwrap();
        assert_eq!(
            f.page.text(body).as_deref(),
            Some("Re-translation failed. Please try again.")
        );
        assert_eq!(f.page.text(control).as_deref(), Some("\u{21bb}"));
        assert!(!f.page.is_disabled(control));
        assert!(f.page.alerts().is_empty());
        assert!(!f.client.cache().contains("Hello"));
    }

    #[tokio::test(start_paused = true)]
    async fn affordance_is_busy_while_translating() {
        let f = Fixture::new(
            "x.com",
            ScriptedTransport::always("Bonjour").with_delay(Duration::from_secs(2)),
        );
        let item = f.post("en", "Hello");
        let observer = f.observer().unwrap();
        observer.scan();
        let button = observer.affordance(item).unwrap();

        tokio::join!(observer.on_affordance_click(item), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert!(f.page.is_disabled(button));
            assert_eq!(f.page.text(button).as_deref(), Some("Translating..."));
            assert!(observer.panel(item).is_none());
        });

        assert!(!f.page.is_connected(button));
        assert!(observer.panel(item).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn retranslate_control_is_busy_while_translating() {
        let f = Fixture::new(
            "x.com",
            ScriptedTransport::new(vec![Ok(ok_reply("first"))], Ok(ok_reply("second")))
                .with_delay(Duration::from_secs(2)),
        );
        let item = f.post("en", "Hello");
        let observer = f.observer().unwrap();
        observer.scan();
        observer.on_affordance_click(item).await;
        let panel = observer.panel(item).unwrap();
        let control = f.page.find_role(panel, ROLE_RETRANSLATE).unwrap();
        let body = f.page.find_role(panel, ROLE_INLINE_BODY).unwrap();

        tokio::join!(observer.on_retranslate_click(item), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert!(f.page.is_disabled(control));
            assert_eq!(f.page.text(control).as_deref(), Some("Translating again..."));
            assert_eq!(f.page.text(body).as_deref(), Some("first"));
        });

        assert!(!f.page.is_disabled(control));
        assert_eq!(f.page.text(control).as_deref(), Some("\u{21bb}"));
        assert_eq!(f.page.text(body).as_deref(), Some("second"));
    }

    #[tokio::test(start_paused = true)]
    async fn item_removed_mid_request_drops_result() {
        let f = Fixture::new(
            "x.com",
            ScriptedTransport::always("سلام").with_delay(Duration::from_secs(2)),
        );
        let item = f.post("en", "Hello");
        let observer = f.observer().unwrap();
        observer.scan();

        tokio::join!(observer.on_affordance_click(item), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            f.page.remove(f.article);
        });

        assert_eq!(f.transport.calls(), 1);
        assert!(f.page.children(f.page.body()).is_empty());
        assert!(f.page.nodes_with_role(ROLE_INLINE_BODY).is_empty());
        assert!(observer.panel(item).is_none());
        assert!(!observer.is_item(item));
        assert!(f.page.alerts().is_empty());
    }
}
