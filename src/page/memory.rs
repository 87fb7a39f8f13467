//! In-memory document implementing `Page`. Used for headless runs and tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::Mutex;

use super::{Element, FeedSelector, NodeId, Page, SelectionSnapshot};

#[derive(Debug, Clone, Default)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    flags: BTreeSet<String>,
    text: Option<String>,
    role: Option<&'static str>,
    disabled: bool,
    injected: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct Document {
    nodes: HashMap<NodeId, Node>,
    body: NodeId,
    next_id: u64,
    selection: Option<SelectionSnapshot>,
    alerts: Vec<String>,
}

impl Document {
    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    /// Create the tree for `element` (detached) and return its root.
    fn build(&mut self, element: Element) -> NodeId {
        let mut attrs = BTreeMap::new();
        if let Some(id) = element.id {
            attrs.insert("id".to_string(), id);
        }
        let node = Node {
            tag: element.tag,
            attrs,
            styles: element.styles.into_iter().collect(),
            text: element.text,
            role: element.role,
            disabled: element.disabled,
            injected: true,
            ..Node::default()
        };
        let id = self.alloc(node);
        for child in element.children {
            let child_id = self.build(child);
            self.link(id, child_id, None);
        }
        id
    }

    /// Attach `child` under `parent`, at `index` or at the end.
    fn link(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) {
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            match index {
                Some(i) if i <= node.children.len() => node.children.insert(i, child),
                _ => node.children.push(child),
            }
        }
    }

    fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes.get(&node).and_then(|n| n.parent), move |id| {
            self.nodes.get(id).and_then(|n| n.parent)
        })
    }

    fn is_connected(&self, node: NodeId) -> bool {
        node == self.body || self.ancestors(node).any(|a| a == self.body)
    }

    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    fn collect_text(&self, id: NodeId, skip_injected: bool, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if skip_injected && node.injected {
            return;
        }
        if let Some(text) = &node.text {
            out.push_str(text);
        }
        for child in &node.children {
            self.collect_text(*child, skip_injected, out);
        }
    }
}

/// Single-document in-memory page.
pub struct MemoryPage {
    hostname: String,
    dark: bool,
    doc: Mutex<Document>,
}

impl MemoryPage {
    pub fn new(hostname: &str) -> Self {
        let body = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            body,
            Node {
                tag: "body".into(),
                ..Node::default()
            },
        );
        Self {
            hostname: hostname.to_string(),
            dark: false,
            doc: Mutex::new(Document {
                nodes,
                body,
                next_id: 1,
                selection: None,
                alerts: Vec::new(),
            }),
        }
    }

    pub fn with_dark_scheme(mut self, dark: bool) -> Self {
        self.dark = dark;
        self
    }

    pub fn body(&self) -> NodeId {
        self.doc.lock().body
    }

    /// Add a host-owned element (not injected) under `parent`.
    pub fn add_host_element(
        &self,
        parent: NodeId,
        tag: &str,
        attrs: &[(&str, &str)],
        text: Option<&str>,
    ) -> NodeId {
        let mut doc = self.doc.lock();
        let node = Node {
            tag: tag.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            text: text.map(str::to_string),
            ..Node::default()
        };
        let id = doc.alloc(node);
        doc.link(parent, id, None);
        id
    }

    pub fn set_selection(&self, selection: Option<SelectionSnapshot>) {
        self.doc.lock().selection = selection;
    }

    pub fn alerts(&self) -> Vec<String> {
        self.doc.lock().alerts.clone()
    }

    pub fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.doc
            .lock()
            .nodes
            .get(&node)
            .and_then(|n| n.styles.get(property).cloned())
    }

    /// Own text of a node (not its subtree).
    pub fn text(&self, node: NodeId) -> Option<String> {
        self.doc.lock().nodes.get(&node).and_then(|n| n.text.clone())
    }

    pub fn is_disabled(&self, node: NodeId) -> bool {
        self.doc
            .lock()
            .nodes
            .get(&node)
            .map(|n| n.disabled)
            .unwrap_or(false)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.doc
            .lock()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let doc = self.doc.lock();
        let parent = doc.nodes.get(&node)?.parent?;
        let siblings = &doc.nodes.get(&parent)?.children;
        let pos = siblings.iter().position(|c| *c == node)?;
        siblings.get(pos + 1).copied()
    }

    /// Connected element with the given `id` attribute.
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        let doc = self.doc.lock();
        doc.descendants(doc.body).into_iter().find(|n| {
            doc.nodes
                .get(n)
                .and_then(|node| node.attrs.get("id"))
                .is_some_and(|v| v == id)
        })
    }

    /// Connected nodes built with `role`.
    pub fn nodes_with_role(&self, role: &str) -> Vec<NodeId> {
        let doc = self.doc.lock();
        doc.descendants(doc.body)
            .into_iter()
            .filter(|n| doc.nodes.get(n).and_then(|node| node.role) == Some(role))
            .collect()
    }
}

impl Page for MemoryPage {
    fn hostname(&self) -> String {
        self.hostname.clone()
    }

    fn prefers_dark_scheme(&self) -> bool {
        self.dark
    }

    fn selection(&self) -> Option<SelectionSnapshot> {
        self.doc.lock().selection.clone()
    }

    fn clear_selection(&self) {
        self.doc.lock().selection = None;
    }

    fn alert(&self, message: &str) {
        self.doc.lock().alerts.push(message.to_string());
    }

    fn append_to_body(&self, element: Element) -> NodeId {
        let body = self.body();
        self.append_child(body, element)
    }

    fn append_child(&self, parent: NodeId, element: Element) -> NodeId {
        let mut doc = self.doc.lock();
        let id = doc.build(element);
        doc.link(parent, id, None);
        id
    }

    fn insert_after(&self, sibling: NodeId, element: Element) -> Option<NodeId> {
        let mut doc = self.doc.lock();
        let parent = doc.nodes.get(&sibling)?.parent?;
        let index = doc
            .nodes
            .get(&parent)?
            .children
            .iter()
            .position(|c| *c == sibling)
            .map(|i| i + 1);
        let id = doc.build(element);
        doc.link(parent, id, index);
        Some(id)
    }

    fn remove(&self, node: NodeId) {
        let mut doc = self.doc.lock();
        if node == doc.body {
            return;
        }
        let parent = doc.nodes.get(&node).and_then(|n| n.parent);
        if let Some(parent) = parent {
            if let Some(p) = doc.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != node);
            }
        }
        for id in doc.descendants(node) {
            doc.nodes.remove(&id);
        }
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.doc.lock().is_connected(node)
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let doc = self.doc.lock();
        ancestor == node || doc.ancestors(node).any(|a| a == ancestor)
    }

    fn find_role(&self, root: NodeId, role: &str) -> Option<NodeId> {
        let doc = self.doc.lock();
        doc.descendants(root)
            .into_iter()
            .find(|n| doc.nodes.get(n).and_then(|node| node.role) == Some(role))
    }

    fn set_text(&self, node: NodeId, text: &str) {
        let mut doc = self.doc.lock();
        let children = match doc.nodes.get_mut(&node) {
            Some(n) => {
                n.text = Some(text.to_string());
                std::mem::take(&mut n.children)
            }
            None => return,
        };
        for child in children {
            for id in doc.descendants(child) {
                doc.nodes.remove(&id);
            }
        }
    }

    fn set_style(&self, node: NodeId, property: &str, value: &str) {
        if let Some(n) = self.doc.lock().nodes.get_mut(&node) {
            n.styles.insert(property.to_string(), value.to_string());
        }
    }

    fn set_disabled(&self, node: NodeId, disabled: bool) {
        if let Some(n) = self.doc.lock().nodes.get_mut(&node) {
            n.disabled = disabled;
        }
    }

    fn query_all(&self, selector: &FeedSelector) -> Vec<NodeId> {
        let doc = self.doc.lock();
        doc.descendants(doc.body)
            .into_iter()
            .filter(|id| {
                let Some(node) = doc.nodes.get(id) else {
                    return false;
                };
                let ancestor_tags = doc
                    .ancestors(*id)
                    .filter_map(|a| doc.nodes.get(&a))
                    .map(|n| n.tag.as_str());
                selector.matches(
                    &node.tag,
                    |name| node.attrs.get(name).map(String::as_str),
                    ancestor_tags,
                )
            })
            .collect()
    }

    fn has_flag(&self, node: NodeId, flag: &str) -> bool {
        self.doc
            .lock()
            .nodes
            .get(&node)
            .is_some_and(|n| n.flags.contains(flag))
    }

    fn set_flag(&self, node: NodeId, flag: &str) {
        if let Some(n) = self.doc.lock().nodes.get_mut(&node) {
            n.flags.insert(flag.to_string());
        }
    }

    fn text_content(&self, node: NodeId) -> String {
        let doc = self.doc.lock();
        let mut out = String::new();
        doc.collect_text(node, true, &mut out);
        out
    }
}
