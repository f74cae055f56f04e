//! ---
//! km_section: "02-document-model"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Ordered element tree shared by every keymint stage."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
//! Ordered, labelled element tree used by the schema, policy, and identity
//! stages of keymint.
//!
//! Every stage consumes an [`Element`] and produces a new one; none of them
//! mutate a tree owned by another stage.
#![warn(missing_docs)]

pub mod codec;
pub mod element;

pub use element::Element;

/// Shared result type for XML parsing and serialization.
pub type XmlResult<T> = Result<T, XmlError>;

/// Errors raised while reading or writing XML text.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// The underlying reader rejected the input.
    #[error("malformed XML at byte {position}: {reason}")]
    Parse {
        /// Byte offset reported by the reader.
        position: u64,
        /// Reader diagnostic.
        reason: String,
    },
    /// The input contained no root element.
    #[error("XML document has no root element")]
    EmptyDocument,
    /// A second top-level element followed the root.
    #[error("XML document has more than one root element (found '{0}')")]
    MultipleRoots(String),
    /// End of input was reached while an element was still open.
    #[error("element '{0}' is not closed")]
    UnclosedElement(String),
    /// Tag, attribute, or text bytes were not valid UTF-8.
    #[error("invalid UTF-8 in XML: {0}")]
    Encoding(String),
    /// The writer failed to emit an event.
    #[error("failed to serialise XML: {0}")]
    Serialize(String),
}
