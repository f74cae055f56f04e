//! ---
//! km_section: "03-schema-defaults"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Schema validation capability and defaults repair."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
use std::fmt;

use keymint_xml::Element;

use crate::{SchemaError, SchemaResult};

/// Validation capability consumed by the defaults filler and the pipeline.
pub trait SchemaValidator {
    /// Schema identifier used in diagnostics.
    fn name(&self) -> &str;

    /// Validate `document`, returning the first issue in document order.
    fn validate(&self, document: &Element) -> Result<(), ValidationIssue>;

    /// Convenience wrapper around [`SchemaValidator::validate`].
    fn is_valid(&self, document: &Element) -> bool {
        self.validate(document).is_ok()
    }
}

/// First problem found while validating a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Child-index path from the root. For [`IssueKind::MissingElement`] this
    /// is the parent that lacks the element; otherwise the offending element.
    pub path: Vec<usize>,
    /// Human readable rendering of `path`.
    pub location: String,
    pub kind: IssueKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// A required child is absent; `index` is where it should be inserted.
    MissingElement { expected: Vec<String>, index: usize },
    /// A leaf element's text does not satisfy its type.
    InvalidValue { tag: String, reason: String },
    /// A child appears where the content model does not allow it.
    UnexpectedElement { found: String, expected: Vec<String> },
    MissingAttribute { name: String },
    UnexpectedRoot { found: String, expected: String },
}

impl IssueKind {
    /// Tags the validator expected at the issue location.
    pub fn expected(&self) -> Vec<String> {
        match self {
            IssueKind::MissingElement { expected, .. } => expected.clone(),
            IssueKind::InvalidValue { tag, .. } => vec![tag.clone()],
            IssueKind::UnexpectedElement { expected, .. } => expected.clone(),
            IssueKind::MissingAttribute { name } => vec![format!("@{name}")],
            IssueKind::UnexpectedRoot { expected, .. } => vec![expected.clone()],
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::MissingElement { expected, .. } => {
                write!(f, "tag '{}' expected", expected.join("' or '"))
            }
            IssueKind::InvalidValue { tag, reason } => {
                write!(f, "invalid value for '{tag}': {reason}")
            }
            IssueKind::UnexpectedElement { found, .. } => write!(f, "unexpected element '{found}'"),
            IssueKind::MissingAttribute { name } => write!(f, "missing attribute '{name}'"),
            IssueKind::UnexpectedRoot { found, expected } => {
                write!(f, "root element '{found}' found, '{expected}' expected")
            }
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.location)
    }
}

/// Validate `document` and convert the first issue into a [`SchemaError`]
/// naming the document (file name or artifact name) it came from.
pub fn check_schema(
    validator: &dyn SchemaValidator,
    document: &Element,
    document_name: Option<&str>,
) -> SchemaResult<()> {
    validator
        .validate(document)
        .map_err(|issue| SchemaError::ValidationFailed {
            schema: validator.name().to_owned(),
            document: document_name.unwrap_or("<in-memory>").to_owned(),
            location: issue.location.clone(),
            expected: issue.kind.expected(),
            reason: issue.kind.to_string(),
        })
}
