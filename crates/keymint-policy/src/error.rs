//! ---
//! km_section: "04-policy-compilation"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Policy compilation errors."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

/// Errors raised while compiling permissions or governance trees.
///
/// `grant` fields carry the grant name; `context` fields describe the element
/// being compiled, e.g. `grant 'talker'` or `domain_rule[1]`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("grant '{grant}': unsupported criteria kind '{tag}'")]
    UnsupportedCriteriaKind { grant: String, tag: String },
    #[error("{domain_rule}: unsupported access rule kind '{tag}'")]
    UnsupportedAccessRuleKind { domain_rule: String, tag: String },
    #[error("grant '{grant}': unsupported expression kind '{tag}'")]
    UnsupportedExpressionKind { grant: String, tag: String },
    #[error("grant '{grant}': unsupported rule kind '{tag}'")]
    UnsupportedRuleKind { grant: String, tag: String },
    #[error("grant '{0}' is declared more than once")]
    DuplicateGrant(String),
    #[error("{context}: element '{tag}' appears more than once")]
    DuplicateElement { context: String, tag: String },
    #[error("{context}: missing element '{tag}'")]
    MissingElement { context: String, tag: String },
    #[error("{context}: missing attribute '{name}'")]
    MissingAttribute { context: String, name: String },
    #[error("{context}: unexpected element '{tag}'")]
    UnexpectedElement { context: String, tag: String },
    #[error("expected root element '{expected}', found '{found}'")]
    UnexpectedRoot { expected: String, found: String },
}
