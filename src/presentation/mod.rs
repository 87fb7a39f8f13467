//! Injected UI: affordance buttons, the floating result panel (selection
//! flow) and the inline result panel (feed flow). All styling is inline.

pub mod direction;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{Labels, Timings};
use crate::page::{Element, NodeId, Page, Rect};
pub use direction::TextDirection;

pub const SELECTION_BUTTON_ID: &str = "translate-selected-text";
pub const FLOATING_PANEL_ID: &str = "translation-box";

pub const ROLE_PANEL_BODY: &str = "panel-body";
pub const ROLE_PANEL_CLOSE: &str = "panel-close";
pub const ROLE_INLINE_BODY: &str = "inline-body";
pub const ROLE_RETRANSLATE: &str = "retranslate";

/// Apply `direction`/`text-align` for `text` to an already mounted node.
pub fn apply_direction(page: &dyn Page, node: NodeId, text: &str) -> TextDirection {
    let dir = TextDirection::detect(text);
    page.set_style(node, "direction", dir.css());
    page.set_style(node, "text-align", dir.align());
    dir
}

/// Fixed-position button anchored at the selection's bottom-left corner.
pub fn selection_button(labels: &Labels, anchor: Rect) -> Element {
    Element::new("button")
        .id(SELECTION_BUTTON_ID)
        .text(labels.selection_button.as_str())
        .style("position", "fixed")
        .style("top", format!("{}px", anchor.bottom))
        .style("left", format!("{}px", anchor.left))
        .styles(&[
            ("z-index", "1000"),
            ("background-color", "#4CAF50"),
            ("color", "white"),
            ("padding", "5px 10px"),
            ("border", "none"),
            ("border-radius", "5px"),
            ("cursor", "pointer"),
        ])
}

/// Hover-gated button placed in the item's top-right corner. Starts hidden.
pub fn feed_button(labels: &Labels) -> Element {
    Element::new("button")
        .text(labels.feed_button.as_str())
        .styles(&[
            ("position", "absolute"),
            ("top", "5px"),
            ("right", "5px"),
            ("padding", "2px 4px"),
            ("font-size", "10px"),
            ("background-color", "#749e00"),
            ("color", "white"),
            ("border", "none"),
            ("border-radius", "3px"),
            ("cursor", "pointer"),
            ("display", "none"),
        ])
}

/// Bordered panel inserted after a feed item: header label, re-translate
/// control and the translated text.
pub fn inline_panel(labels: &Labels, translation: &str) -> Element {
    let dir = TextDirection::detect(translation);

    let header = Element::new("div")
        .styles(&[
            ("position", "absolute"),
            ("top", "0"),
            ("right", "10px"),
            ("background-color", "#daffa3"),
            ("padding", "0 8px"),
            ("font-weight", "bold"),
            ("display", "flex"),
            ("align-items", "center"),
        ])
        .child(Element::new("span").text(labels.panel_header.as_str()))
        .child(
            Element::new("span")
                .role(ROLE_RETRANSLATE)
                .text(labels.retranslate_icon.as_str())
                .styles(&[("cursor", "pointer"), ("font-size", "18px"), ("margin-left", "8px")]),
        );

    let content = Element::new("div")
        .style("padding", "12px")
        .child(
            Element::new("div")
                .role(ROLE_INLINE_BODY)
                .text(translation)
                .style("direction", dir.css())
                .style("text-align", dir.align())
                .styles(&[
                    ("white-space", "pre-wrap"),
                    ("word-break", "break-word"),
                    ("margin", "0"),
                ]),
        );

    Element::new("div")
        .styles(&[
            ("position", "relative"),
            ("margin-top", "10px"),
            ("border", "2px solid #69b611"),
            ("border-radius", "8px"),
            ("background-color", "#daffa3"),
            ("color", "#145b01"),
            ("font-family", "Tahoma, sans-serif"),
            ("font-size", "16px"),
            ("line-height", "1.5"),
            ("width", "100%"),
            ("box-sizing", "border-box"),
            ("padding-top", "24px"),
        ])
        .child(header)
        .child(content)
}

fn floating_panel(labels: &Labels, translation: &str, dark: bool) -> Element {
    let (bg, fg) = if dark { ("#333", "#fff") } else { ("#fff", "#333") };
    let dir = TextDirection::detect(translation);

    let close = Element::new("button")
        .role(ROLE_PANEL_CLOSE)
        .text(labels.close.as_str())
        .styles(&[
            ("position", "absolute"),
            ("top", "10px"),
            ("right", "10px"),
            ("background", "transparent"),
            ("border", "none"),
            ("font-size", "24px"),
            ("cursor", "pointer"),
        ])
        .style("color", fg);

    let body = Element::new("pre")
        .role(ROLE_PANEL_BODY)
        .text(translation)
        .styles(&[
            ("white-space", "pre-wrap"),
            ("font-family", "inherit"),
            ("font-size", "16px"),
            ("line-height", "1.5"),
            ("margin-top", "40px"),
        ])
        .style("direction", dir.css())
        .style("text-align", dir.align());

    Element::new("div")
        .id(FLOATING_PANEL_ID)
        .styles(&[
            ("position", "fixed"),
            ("top", "50%"),
            ("left", "50%"),
            ("transform", "translate(-50%, -50%)"),
            ("border-radius", "8px"),
            ("box-shadow", "0 4px 20px rgba(0,0,0,0.2)"),
            ("padding", "20px"),
            ("max-width", "80%"),
            ("max-height", "80vh"),
            ("overflow-y", "auto"),
            ("z-index", "1000"),
            ("opacity", "0"),
            ("transition", "opacity 0.3s ease-in-out"),
        ])
        .style("background-color", bg)
        .style("color", fg)
        .child(close)
        .child(body)
}

#[derive(Debug, Clone, Copy)]
struct OpenPanel {
    root: NodeId,
    body: NodeId,
    close: NodeId,
    /// Outside clicks before this instant are ignored.
    dismiss_after: Instant,
}

/// The single centered result panel of the selection flow.
pub struct FloatingPanel {
    page: Arc<dyn Page>,
    labels: Labels,
    timings: Timings,
    open: Mutex<Option<OpenPanel>>,
}

impl FloatingPanel {
    pub fn new(page: Arc<dyn Page>, labels: Labels, timings: Timings) -> Self {
        Self {
            page,
            labels,
            timings,
            open: Mutex::new(None),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.lock().is_some()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.open.lock().as_ref().map(|p| p.root)
    }

    pub fn close_control(&self) -> Option<NodeId> {
        self.open.lock().as_ref().map(|p| p.close)
    }

    /// Show `translation`. An open panel gets its text and direction
    /// replaced instead of a second panel being mounted.
    pub fn show(&self, translation: &str) -> NodeId {
        let mut open = self.open.lock();
        if let Some(panel) = *open {
            if self.page.is_connected(panel.root) {
                self.page.set_text(panel.body, translation);
                apply_direction(self.page.as_ref(), panel.body, translation);
                debug!(root = %panel.root, "floating_panel_updated");
                return panel.root;
            }
        }

        let element = floating_panel(&self.labels, translation, self.page.prefers_dark_scheme());
        let root = self.page.append_to_body(element);
        let body = self.page.find_role(root, ROLE_PANEL_BODY).unwrap_or(root);
        let close = self.page.find_role(root, ROLE_PANEL_CLOSE).unwrap_or(root);
        // Fade in.
        self.page.set_style(root, "opacity", "1");

        *open = Some(OpenPanel {
            root,
            body,
            close,
            dismiss_after: Instant::now() + self.timings.dismiss_arm_delay,
        });
        info!(%root, "floating_panel_shown");
        root
    }

    /// Close on a click outside the panel, once dismissal is armed.
    /// Returns whether the panel closed.
    pub async fn on_document_click(&self, target: Option<NodeId>) -> bool {
        let Some(panel) = *self.open.lock() else {
            return false;
        };
        if Instant::now() < panel.dismiss_after {
            return false;
        }
        if target.is_some_and(|t| self.page.contains(panel.root, t)) {
            return false;
        }
        self.close().await;
        true
    }

    /// Fade out, then remove the panel and clear the page selection.
    pub async fn close(&self) {
        let Some(panel) = self.open.lock().take() else {
            return;
        };
        self.page.set_style(panel.root, "opacity", "0");
        tokio::time::sleep(self.timings.fade).await;
        if self.page.is_connected(panel.root) {
            self.page.remove(panel.root);
        }
        self.page.clear_selection();
        info!(root = %panel.root, "floating_panel_closed");
    }
}
