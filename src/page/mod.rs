//! Host page seam. The content script never touches the DOM directly: it
//! builds `Element` descriptions and mutates nodes through `Page`.

pub mod element;
pub mod memory;

use serde::Serialize;

pub use element::Element;
pub use memory::MemoryPage;

/// Opaque handle to a node in the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Viewport-relative bounding box, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

/// Text and bounds of the current document selection, copied out of the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionSnapshot {
    pub text: String,
    pub rect: Rect,
}

/// Matches feed items: a `tag` element with `attr=value`, inside an
/// `ancestor` element, whose `lang` is not `excluded_lang`.
/// Default: `article div[dir="auto"]:not([lang="fa"])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSelector {
    pub ancestor: String,
    pub tag: String,
    pub attr: (String, String),
    pub excluded_lang: Option<String>,
}

impl Default for FeedSelector {
    fn default() -> Self {
        Self {
            ancestor: "article".into(),
            tag: "div".into(),
            attr: ("dir".into(), "auto".into()),
            excluded_lang: Some("fa".into()),
        }
    }
}

impl FeedSelector {
    /// CSS form, for hosts that evaluate selectors natively.
    pub fn css(&self) -> String {
        let mut css = format!(
            "{} {}[{}=\"{}\"]",
            self.ancestor, self.tag, self.attr.0, self.attr.1
        );
        if let Some(lang) = &self.excluded_lang {
            css.push_str(&format!(":not([lang=\"{lang}\"])"));
        }
        css
    }

    /// Evaluate against a node's tag, attribute lookup and ancestor tags.
    pub fn matches<'a>(
        &self,
        tag: &str,
        attr: impl Fn(&str) -> Option<&'a str>,
        mut ancestor_tags: impl Iterator<Item = &'a str>,
    ) -> bool {
        if !tag.eq_ignore_ascii_case(&self.tag) {
            return false;
        }
        if attr(&self.attr.0) != Some(self.attr.1.as_str()) {
            return false;
        }
        if let Some(lang) = &self.excluded_lang {
            if attr("lang") == Some(lang.as_str()) {
                return false;
            }
        }
        ancestor_tags.any(|t| t.eq_ignore_ascii_case(&self.ancestor))
    }
}

/// Operations the content script needs from the host document.
/// All calls happen on the page's single UI thread.
pub trait Page: Send + Sync {
    fn hostname(&self) -> String;

    fn prefers_dark_scheme(&self) -> bool;

    /// Current selection, or `None` when nothing is selected.
    fn selection(&self) -> Option<SelectionSnapshot>;

    fn clear_selection(&self);

    /// Blocking user-visible notice (`window.alert`).
    fn alert(&self, message: &str);

    fn append_to_body(&self, element: Element) -> NodeId;

    fn append_child(&self, parent: NodeId, element: Element) -> NodeId;

    /// Insert as the next sibling of `sibling`. `None` when `sibling` has
    /// no parent (`afterend` inserts nothing).
    fn insert_after(&self, sibling: NodeId, element: Element) -> Option<NodeId>;

    /// Detach a node and its subtree. Unknown nodes are ignored.
    fn remove(&self, node: NodeId);

    /// Whether the node is still attached to the document.
    fn is_connected(&self, node: NodeId) -> bool;

    /// `ancestor.contains(node)`, inclusive.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool;

    /// First descendant (inclusive) built with `Element::role(role)`.
    fn find_role(&self, root: NodeId, role: &str) -> Option<NodeId>;

    /// Replace the node's text content.
    fn set_text(&self, node: NodeId, text: &str);

    fn set_style(&self, node: NodeId, property: &str, value: &str);

    fn set_disabled(&self, node: NodeId, disabled: bool);

    /// All connected nodes matching `selector`, in document order.
    fn query_all(&self, selector: &FeedSelector) -> Vec<NodeId>;

    /// `dataset[flag]` is set.
    fn has_flag(&self, node: NodeId, flag: &str) -> bool;

    fn set_flag(&self, node: NodeId, flag: &str);

    /// Concatenated text of the subtree, skipping injected elements.
    fn text_content(&self, node: NodeId) -> String;
}
