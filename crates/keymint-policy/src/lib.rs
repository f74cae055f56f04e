//! ---
//! km_section: "04-policy-compilation"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Permissions and governance compilation."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
//! Policy compilation for keymint.
//!
//! Permissions grants and governance domain rules are authored with the
//! application vocabulary (`ros_publish`, `ros_topic_rule`, hierarchical topic
//! names). The compilers in this crate rewrite them into the canonical DDS
//! security vocabulary. Dispatch is closed: every tag the compilers do not
//! know how to rewrite is reported as an error instead of being dropped.

pub mod document;
pub mod error;
pub mod governance;
pub mod namespace;
pub mod permissions;

pub use document::{GovernanceDocument, PermissionsDocument};
pub use error::{CompileError, CompileResult};
pub use governance::{AccessRuleKind, GovernanceCompiler};
pub use namespace::{topic_expression, DdsNamespace, NamespaceMapper};
pub use permissions::{CriteriaKind, ExpressionListKind, PermissionsCompiler, RuleKind};
