//! ---
//! km_section: "02-document-model"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Ordered element tree shared by every keymint stage."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
use indexmap::IndexMap;

/// A single XML element: tag, ordered attributes, optional text, and ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    tag: String,
    attributes: IndexMap<String, String>,
    text: Option<String>,
    children: Vec<Element>,
}

impl Element {
    /// Create an empty element with the given tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Builder-style text setter.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Builder-style bulk child append.
    pub fn with_children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    /// Element tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attribute value by name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// All attributes in document order.
    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    /// Insert or replace an attribute.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Text content, if any.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Replace the text content.
    pub fn set_text(&mut self, text: Option<String>) {
        self.text = text;
    }

    /// Ordered children.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Consume the element and return its children.
    pub fn into_children(self) -> Vec<Element> {
        self.children
    }

    /// Append a child.
    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Insert a child at `index`; indices past the end append.
    pub fn insert(&mut self, index: usize, child: Element) {
        let index = index.min(self.children.len());
        self.children.insert(index, child);
    }

    /// Append several children in order.
    pub fn extend(&mut self, children: impl IntoIterator<Item = Element>) {
        self.children.extend(children);
    }

    /// First direct child with the given tag.
    pub fn find(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// All direct children with the given tag, in order.
    pub fn find_all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.tag == tag)
    }

    /// Number of direct children carrying `tag`.
    pub fn count(&self, tag: &str) -> usize {
        self.find_all(tag).count()
    }

    /// Text of the first direct child with the given tag.
    pub fn child_text(&self, tag: &str) -> Option<&str> {
        self.find(tag).and_then(Element::text)
    }

    /// Follow a `/`-separated path of tags, taking the first match at each step.
    pub fn find_path(&self, path: &str) -> Option<&Element> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| node.find(segment))
    }

    /// Depth-first search (excluding `self`) for the first element with `tag`.
    pub fn find_descendant(&self, tag: &str) -> Option<&Element> {
        for child in &self.children {
            if child.tag == tag {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(tag) {
                return Some(found);
            }
        }
        None
    }

    /// Resolve a path of child indices starting at `self`.
    pub fn get(&self, indices: &[usize]) -> Option<&Element> {
        indices
            .iter()
            .try_fold(self, |node, index| node.children.get(*index))
    }

    /// Mutable variant of [`Element::get`].
    pub fn get_mut(&mut self, indices: &[usize]) -> Option<&mut Element> {
        let mut node = self;
        for index in indices {
            node = node.children.get_mut(*index)?;
        }
        Some(node)
    }

    /// Tags along an index path, starting with `self`'s tag.
    pub fn tag_path(&self, indices: &[usize]) -> Option<Vec<&str>> {
        let mut tags = vec![self.tag.as_str()];
        let mut node = self;
        for index in indices {
            node = node.children.get(*index)?;
            tags.push(node.tag.as_str());
        }
        Some(tags)
    }

    /// Human readable location of an index path, e.g. `/permissions/grant[1]/validity`.
    pub fn location(&self, indices: &[usize]) -> String {
        let mut location = format!("/{}", self.tag);
        let mut node = self;
        for index in indices {
            match node.children.get(*index) {
                Some(child) => {
                    let position = node.children[..*index]
                        .iter()
                        .filter(|sibling| sibling.tag == child.tag)
                        .count();
                    location.push_str(&format!("/{}[{}]", child.tag, position));
                    node = child;
                }
                None => {
                    location.push_str(&format!("/#{index}"));
                    break;
                }
            }
        }
        location
    }

    /// Strip surrounding whitespace from all text content; whitespace-only text is dropped.
    pub fn tidy(mut self) -> Self {
        self.text = self
            .text
            .take()
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty());
        self.children = self.children.into_iter().map(Element::tidy).collect();
        self
    }
}
