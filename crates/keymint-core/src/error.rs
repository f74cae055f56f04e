//! ---
//! km_section: "07-keystore-pipeline"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Pipeline error type."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
use keymint_policy::CompileError;
use keymint_schema::SchemaError;
use keymint_security::IdentityError;
use keymint_xml::XmlError;
use thiserror::Error;

use crate::manifest::FragmentKind;

pub type KeymintResult<T> = Result<T, KeymintError>;

/// Failures surfaced by the keystore pipeline, tagged with the stage and
/// fragment they came from.
#[derive(Debug, Error)]
pub enum KeymintError {
    #[error("fragment '{source_name}' could not be parsed: {source}")]
    Parse {
        source_name: String,
        #[source]
        source: XmlError,
    },
    #[error("{kind} fragment '{source_name}' has root '{found}', expected '{expected}'")]
    UnexpectedRoot {
        kind: FragmentKind,
        source_name: String,
        expected: &'static str,
        found: String,
    },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("{kind} fragment '{source_name}' could not be completed from defaults: {source}")]
    Defaults {
        kind: FragmentKind,
        source_name: String,
        #[source]
        source: SchemaError,
    },
    #[error("{kind} fragment '{source_name}' failed to compile: {source}")]
    Compile {
        kind: FragmentKind,
        source_name: String,
        #[source]
        source: CompileError,
    },
    #[error("identities fragment '{source_name}' could not be read: {source}")]
    Declaration {
        source_name: String,
        #[source]
        source: IdentityError,
    },
    #[error("identity '{identity}' from '{source_name}' could not be issued: {source}")]
    Identity {
        source_name: String,
        identity: String,
        #[source]
        source: IdentityError,
    },
    #[error("{artifact} could not be serialized: {source}")]
    Serialize {
        artifact: &'static str,
        #[source]
        source: XmlError,
    },
}
