//! ---
//! km_section: "07-keystore-pipeline"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Manifest fragments handed to the pipeline."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
use std::fmt;

use keymint_schema::{builtin, ContentSchema};
use keymint_xml::Element;

use crate::error::{KeymintError, KeymintResult};

/// The three fragment kinds a manifest may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Permissions,
    Governance,
    Identities,
}

impl FragmentKind {
    /// Root tag of a fragment of this kind.
    pub fn root_tag(self) -> &'static str {
        match self {
            FragmentKind::Permissions => "permissions",
            FragmentKind::Governance => "domain_access_rules",
            FragmentKind::Identities => "identities",
        }
    }

    /// Input schema fragments of this kind are checked against.
    pub fn schema(self) -> ContentSchema {
        match self {
            FragmentKind::Permissions => builtin::keyage_permissions(),
            FragmentKind::Governance => builtin::keyage_governance(),
            FragmentKind::Identities => builtin::keyage_identities(),
        }
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FragmentKind::Permissions => "permissions",
            FragmentKind::Governance => "governance",
            FragmentKind::Identities => "identities",
        };
        f.write_str(name)
    }
}

/// One parsed manifest file, optionally paired with a defaults document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFragment {
    /// File name (or any label) used in diagnostics.
    pub source: String,
    pub document: Element,
    pub defaults: Option<Element>,
}

impl ManifestFragment {
    pub fn new(source: impl Into<String>, document: Element) -> Self {
        Self {
            source: source.into(),
            document,
            defaults: None,
        }
    }

    /// Parse `document` (and `defaults`, if given) from XML text.
    pub fn parse(source: impl Into<String>, document: &str, defaults: Option<&str>) -> KeymintResult<Self> {
        let source = source.into();
        let parse = |xml: &str| {
            keymint_xml::codec::parse(xml).map_err(|err| KeymintError::Parse {
                source_name: source.clone(),
                source: err,
            })
        };
        let document = parse(document)?;
        let defaults = defaults.map(parse).transpose()?;
        Ok(Self {
            source,
            document,
            defaults,
        })
    }

    /// Pair the fragment with a defaults document.
    pub fn with_defaults(mut self, defaults: Element) -> Self {
        self.defaults = Some(defaults);
        self
    }
}

/// All fragments of one manifest, grouped by kind in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestBundle {
    pub permissions: Vec<ManifestFragment>,
    pub governance: Vec<ManifestFragment>,
    pub identities: Vec<ManifestFragment>,
}

impl ManifestBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_permissions(mut self, fragment: ManifestFragment) -> Self {
        self.permissions.push(fragment);
        self
    }

    pub fn with_governance(mut self, fragment: ManifestFragment) -> Self {
        self.governance.push(fragment);
        self
    }

    pub fn with_identities(mut self, fragment: ManifestFragment) -> Self {
        self.identities.push(fragment);
        self
    }

    /// Fragments of `kind`, in file order.
    pub fn fragments(&self, kind: FragmentKind) -> &[ManifestFragment] {
        match kind {
            FragmentKind::Permissions => &self.permissions,
            FragmentKind::Governance => &self.governance,
            FragmentKind::Identities => &self.identities,
        }
    }
}
