//! Description of an element tree to inject, with inline styles.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Element {
    pub tag: String,
    pub id: Option<String>,
    /// Stable handle for locating sub-elements after mounting.
    pub role: Option<&'static str>,
    pub text: Option<String>,
    pub styles: Vec<(String, String)>,
    pub disabled: bool,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn role(mut self, role: &'static str) -> Self {
        self.role = Some(role);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set one style property, replacing an earlier value.
    pub fn style(mut self, property: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.styles.iter_mut().find(|(p, _)| p == property) {
            Some(slot) => slot.1 = value,
            None => self.styles.push((property.to_string(), value)),
        }
        self
    }

    pub fn styles(self, pairs: &[(&str, &str)]) -> Self {
        pairs.iter().fold(self, |el, (p, v)| el.style(p, *v))
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }
}
