//! ---
//! km_section: "03-schema-defaults"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Schema validation capability and defaults repair."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
//! Schema validation and defaults repair for keymint manifest fragments.
//!
//! The [`SchemaValidator`] trait is the validation capability the rest of the
//! workspace relies on: it reports the first issue in document order together
//! with the path of the offending element and the tags it expected there.
//! [`ContentSchema`] implements that capability for ordered content models,
//! and [`builtin`] declares the keyage input schemas and the DDS artifact
//! schemas. [`DefaultsFiller`] completes partial fragments from a defaults
//! document.

pub mod builtin;
pub mod content;
pub mod defaults;
pub mod validator;

pub use content::{ContentModel, ContentSchema, ContentSchemaBuilder, Particle, TextType};
pub use defaults::DefaultsFiller;
pub use validator::{check_schema, IssueKind, SchemaValidator, ValidationIssue};

/// Shared result type for schema validation routines.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while validating or repairing a document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The document does not conform to the schema.
    #[error("the document '{document}' contains invalid XML for schema '{schema}': {reason} at {location} (expected: {})", .expected.join(", "))]
    ValidationFailed {
        schema: String,
        document: String,
        location: String,
        expected: Vec<String>,
        reason: String,
    },
    /// A validation issue could not be matched to anything in the defaults document.
    #[error("cannot repair {location} against schema '{schema}': {reason}")]
    UnrepairableDocument {
        schema: String,
        location: String,
        reason: String,
    },
    /// A repair left the document unchanged, or the iteration cap was reached.
    #[error("defaults filling for schema '{schema}' made no progress at {location} after {iterations} iteration(s)")]
    DefaultsFillLoopDetected {
        schema: String,
        location: String,
        iterations: usize,
    },
}
