//! ---
//! km_section: "03-schema-defaults"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Schema validation capability and defaults repair."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
//! Ordered content-model validator.
//!
//! A [`ContentSchema`] maps element tags to declarations. Each declaration is
//! either a typed leaf, an empty element, an unconstrained subtree or an
//! ordered sequence of particles. Tags without a declaration are accepted
//! as-is, which keeps extension elements out of the way of validation.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use keymint_xml::Element;

use crate::validator::{IssueKind, SchemaValidator, ValidationIssue};

const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Type constraint applied to leaf text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextType {
    /// Any non-empty text.
    String,
    Integer,
    /// `true`, `false`, `1` or `0`.
    Boolean,
    /// `YYYY-MM-DDTHH:MM:SS`, without fractional seconds or offset.
    DateTime,
    Enumeration(Vec<String>),
}

impl TextType {
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TextType::Enumeration(values.into_iter().map(Into::into).collect())
    }

    fn check(&self, text: Option<&str>) -> Result<(), String> {
        let value = text.map(str::trim).unwrap_or_default();
        if value.is_empty() {
            return Err("value must not be empty".into());
        }
        match self {
            TextType::String => Ok(()),
            TextType::Integer => value
                .parse::<i64>()
                .map(|_| ())
                .map_err(|_| format!("'{value}' is not an integer")),
            TextType::Boolean => match value {
                "true" | "false" | "1" | "0" => Ok(()),
                other => Err(format!("'{other}' is not a boolean")),
            },
            TextType::DateTime => {
                if value.len() == 19 && NaiveDateTime::parse_from_str(value, DATE_TIME_FORMAT).is_ok()
                {
                    Ok(())
                } else {
                    Err(format!("'{value}' is not a YYYY-MM-DDTHH:MM:SS timestamp"))
                }
            }
            TextType::Enumeration(allowed) => {
                if allowed.iter().any(|candidate| candidate == value) {
                    Ok(())
                } else {
                    Err(format!("'{value}' is not one of {}", allowed.join(", ")))
                }
            }
        }
    }
}

/// One slot in an ordered sequence: a set of accepted tags with occurrence bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Particle {
    tags: Vec<String>,
    min_occurs: usize,
    max_occurs: Option<usize>,
}

impl Particle {
    pub fn new<I, S>(tags: I, min_occurs: usize, max_occurs: Option<usize>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            min_occurs,
            max_occurs,
        }
    }

    pub fn required(tag: &str) -> Self {
        Self::new([tag], 1, Some(1))
    }

    pub fn optional(tag: &str) -> Self {
        Self::new([tag], 0, Some(1))
    }

    pub fn one_or_more(tag: &str) -> Self {
        Self::new([tag], 1, None)
    }

    /// Any number of children drawn from `tags`, in any interleaving.
    pub fn any_of(tags: &[&str]) -> Self {
        Self::new(tags.iter().copied(), 0, None)
    }

    /// Exactly one child drawn from `tags`.
    pub fn one_of(tags: &[&str]) -> Self {
        Self::new(tags.iter().copied(), 1, Some(1))
    }

    fn accepts(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }

    fn has_room(&self, count: usize) -> bool {
        self.max_occurs.map_or(true, |max| count < max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentModel {
    /// No children and no text constraint.
    Empty,
    Text(TextType),
    Sequence(Vec<Particle>),
    /// Subtree is not inspected.
    Any,
}

impl ContentModel {
    pub fn sequence(particles: impl IntoIterator<Item = Particle>) -> Self {
        ContentModel::Sequence(particles.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ElementDecl {
    content: ContentModel,
    required_attributes: Vec<String>,
}

/// Validator driven by per-tag content declarations.
#[derive(Debug, Clone)]
pub struct ContentSchema {
    name: String,
    root: String,
    elements: HashMap<String, ElementDecl>,
}

/// Builder for [`ContentSchema`].
#[derive(Debug, Clone)]
pub struct ContentSchemaBuilder {
    name: String,
    root: String,
    elements: HashMap<String, ElementDecl>,
}

impl ContentSchemaBuilder {
    pub fn element(self, tag: &str, content: ContentModel) -> Self {
        self.element_with_attributes(tag, &[], content)
    }

    pub fn element_with_attributes(
        mut self,
        tag: &str,
        attributes: &[&str],
        content: ContentModel,
    ) -> Self {
        self.elements.insert(
            tag.to_owned(),
            ElementDecl {
                content,
                required_attributes: attributes.iter().map(|name| (*name).to_owned()).collect(),
            },
        );
        self
    }

    pub fn text(self, tag: &str, text_type: TextType) -> Self {
        self.element(tag, ContentModel::Text(text_type))
    }

    /// Declare several leaves sharing a text type.
    pub fn texts(mut self, tags: &[&str], text_type: TextType) -> Self {
        for tag in tags {
            self = self.text(tag, text_type.clone());
        }
        self
    }

    pub fn build(self) -> ContentSchema {
        ContentSchema {
            name: self.name,
            root: self.root,
            elements: self.elements,
        }
    }
}

impl ContentSchema {
    pub fn builder(name: impl Into<String>, root: impl Into<String>) -> ContentSchemaBuilder {
        ContentSchemaBuilder {
            name: name.into(),
            root: root.into(),
            elements: HashMap::new(),
        }
    }

    /// Tag the document root must carry.
    pub fn root(&self) -> &str {
        &self.root
    }

    fn issue(&self, document: &Element, path: &[usize], kind: IssueKind) -> ValidationIssue {
        ValidationIssue {
            path: path.to_vec(),
            location: document.location(path),
            kind,
        }
    }

    fn validate_element(
        &self,
        document: &Element,
        element: &Element,
        path: &mut Vec<usize>,
    ) -> Result<(), ValidationIssue> {
        let Some(decl) = self.elements.get(element.tag()) else {
            return Ok(());
        };

        for name in &decl.required_attributes {
            if element.attribute(name).is_none() {
                return Err(self.issue(
                    document,
                    path,
                    IssueKind::MissingAttribute { name: name.clone() },
                ));
            }
        }

        match &decl.content {
            ContentModel::Any => Ok(()),
            ContentModel::Empty => match element.children().first() {
                Some(child) => {
                    path.push(0);
                    Err(self.issue(
                        document,
                        path,
                        IssueKind::UnexpectedElement {
                            found: child.tag().to_owned(),
                            expected: Vec::new(),
                        },
                    ))
                }
                None => Ok(()),
            },
            ContentModel::Text(text_type) => {
                if let Some(child) = element.children().first() {
                    path.push(0);
                    return Err(self.issue(
                        document,
                        path,
                        IssueKind::UnexpectedElement {
                            found: child.tag().to_owned(),
                            expected: Vec::new(),
                        },
                    ));
                }
                text_type.check(element.text()).map_err(|reason| {
                    self.issue(
                        document,
                        path,
                        IssueKind::InvalidValue {
                            tag: element.tag().to_owned(),
                            reason,
                        },
                    )
                })
            }
            ContentModel::Sequence(particles) => {
                self.validate_sequence(document, element, particles, path)
            }
        }
    }

    fn validate_sequence(
        &self,
        document: &Element,
        element: &Element,
        particles: &[Particle],
        path: &mut Vec<usize>,
    ) -> Result<(), ValidationIssue> {
        let children = element.children();
        let mut index = 0;

        for particle in particles {
            let mut count = 0;
            while index < children.len()
                && particle.accepts(children[index].tag())
                && particle.has_room(count)
            {
                path.push(index);
                self.validate_element(document, &children[index], path)?;
                path.pop();
                count += 1;
                index += 1;
            }
            if count < particle.min_occurs {
                return Err(self.issue(
                    document,
                    path,
                    IssueKind::MissingElement {
                        expected: particle.tags.clone(),
                        index,
                    },
                ));
            }
        }

        if let Some(extra) = children.get(index) {
            path.push(index);
            return Err(self.issue(
                document,
                path,
                IssueKind::UnexpectedElement {
                    found: extra.tag().to_owned(),
                    expected: particles
                        .iter()
                        .flat_map(|particle| particle.tags.iter().cloned())
                        .collect(),
                },
            ));
        }
        Ok(())
    }
}

impl SchemaValidator for ContentSchema {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, document: &Element) -> Result<(), ValidationIssue> {
        if document.tag() != self.root {
            return Err(self.issue(
                document,
                &[],
                IssueKind::UnexpectedRoot {
                    found: document.tag().to_owned(),
                    expected: self.root.clone(),
                },
            ));
        }
        let mut path = Vec::new();
        self.validate_element(document, document, &mut path)
    }
}
