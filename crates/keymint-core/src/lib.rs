//! ---
//! km_section: "07-keystore-pipeline"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Keystore pipeline from manifest fragments to artifacts."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
//! Keystore pipeline for keymint.
//!
//! A [`ManifestBundle`] carries the already-parsed permissions, governance and
//! identities fragments of one manifest. [`KeystoreBuilder`] validates (or
//! fills from defaults) each fragment, compiles each one, joins the results of
//! the same kind in file order, optionally verifies them against the DDS
//! schemas, and issues the declared identities. Errors name the fragment file
//! and, for issuance, the identity that failed.

pub mod error;
pub mod manifest;
pub mod pipeline;

pub use error::{KeymintError, KeymintResult};
pub use manifest::{FragmentKind, ManifestBundle, ManifestFragment};
pub use pipeline::{KeystoreArtifacts, KeystoreBuilder};
