//! ---
//! km_section: "07-keystore-pipeline"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Keystore pipeline from manifest fragments to artifacts."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use keymint_common::{init_tracing, KeymintConfig};
use keymint_logging::{km_info, km_warn, log_stage_event, LogContext, StageOutcome};
use keymint_policy::{
    CompileError, GovernanceCompiler, GovernanceDocument, PermissionsCompiler, PermissionsDocument,
};
use keymint_schema::{builtin, check_schema, DefaultsFiller};
use keymint_security::{
    parse_identities, CaContext, IdentityBundle, IdentityIssuer, IssuanceMetrics,
};
use keymint_xml::Element;

use crate::error::{KeymintError, KeymintResult};
use crate::manifest::{FragmentKind, ManifestBundle, ManifestFragment};

const PERMISSIONS_ARTIFACT: &str = "permissions.xml";
const GOVERNANCE_ARTIFACT: &str = "governance.xml";

/// Everything produced for one manifest.
#[derive(Debug)]
pub struct KeystoreArtifacts {
    /// Present when the manifest referenced at least one permissions fragment.
    pub permissions: Option<PermissionsDocument>,
    /// Present when the manifest referenced at least one governance fragment.
    pub governance: Option<GovernanceDocument>,
    /// One bundle per declared identity, in declaration order.
    pub identities: Vec<IdentityBundle>,
}

impl KeystoreArtifacts {
    pub fn permissions_xml(&self) -> KeymintResult<Option<String>> {
        self.permissions
            .as_ref()
            .map(|document| {
                document.to_xml().map_err(|source| KeymintError::Serialize {
                    artifact: PERMISSIONS_ARTIFACT,
                    source,
                })
            })
            .transpose()
    }

    pub fn governance_xml(&self) -> KeymintResult<Option<String>> {
        self.governance
            .as_ref()
            .map(|document| {
                document.to_xml().map_err(|source| KeymintError::Serialize {
                    artifact: GOVERNANCE_ARTIFACT,
                    source,
                })
            })
            .transpose()
    }
}

/// Runs validate/fill, compile, merge, verify and issue over a manifest.
#[derive(Clone)]
pub struct KeystoreBuilder {
    filler: DefaultsFiller,
    verify: bool,
    permissions: PermissionsCompiler,
    governance: GovernanceCompiler,
    issuer: IdentityIssuer,
}

impl KeystoreBuilder {
    pub fn new(ca: CaContext) -> Self {
        Self {
            filler: DefaultsFiller::default(),
            verify: true,
            permissions: PermissionsCompiler::new(),
            governance: GovernanceCompiler::new(),
            issuer: IdentityIssuer::new(ca),
        }
    }

    pub fn from_config(config: &KeymintConfig) -> Self {
        let ca = CaContext::new(
            config.keystore.private_space.clone(),
            config.keystore.public_space.clone(),
        );
        Self::new(ca)
            .with_max_iterations(config.defaults.max_iterations)
            .with_verification(config.artifacts.verify)
    }

    /// Entry point for embedders: load configuration from `KEYMINT_CONFIG` or
    /// the first existing candidate, install the tracing subscriber it
    /// describes and return a builder wired to its keystore.
    pub fn bootstrap<P: AsRef<Path>>(service_name: &str, candidates: &[P]) -> anyhow::Result<Self> {
        let loaded = KeymintConfig::load_with_source(candidates)?;
        init_tracing(service_name, &loaded.config.logging)
            .with_context(|| format!("unable to initialise tracing for {service_name}"))?;
        let ctx = LogContext::new().with_stage("bootstrap");
        km_info!(
            context = &ctx,
            "configuration loaded from {}",
            loaded.source.display()
        );
        Ok(Self::from_config(&loaded.config))
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.filler = DefaultsFiller::new(max_iterations);
        self
    }

    /// Toggle validation of compiled documents against the DDS schemas.
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_metrics(mut self, metrics: IssuanceMetrics) -> Self {
        self.issuer = self.issuer.with_metrics(metrics);
        self
    }

    pub fn issuer(&self) -> &IdentityIssuer {
        &self.issuer
    }

    /// Build every artifact the manifest describes. The first failing stage
    /// aborts the build; nothing partial is returned.
    pub fn build(&self, bundle: &ManifestBundle) -> KeymintResult<KeystoreArtifacts> {
        let result = self.build_inner(bundle);
        if let Err(err) = &result {
            let ctx = LogContext::new().with_stage("build");
            log_stage_event(Some(&ctx), "keystore.build", &err.to_string(), StageOutcome::Fault);
        }
        result
    }

    fn build_inner(&self, bundle: &ManifestBundle) -> KeymintResult<KeystoreArtifacts> {
        let permissions = self.prepare(FragmentKind::Permissions, bundle)?;
        let permissions = self.compile_permissions(&permissions)?;
        let governance = self.prepare(FragmentKind::Governance, bundle)?;
        let governance = self.compile_governance(&governance)?;
        let identities = self.prepare(FragmentKind::Identities, bundle)?;
        let identities = self.issue_identities(&identities)?;

        let ctx = LogContext::new().with_stage("build");
        log_stage_event(
            Some(&ctx),
            "keystore.build",
            &format!(
                "permissions: {}, governance: {}, identities: {}",
                permissions.is_some(),
                governance.is_some(),
                identities.len()
            ),
            StageOutcome::Success,
        );
        Ok(KeystoreArtifacts {
            permissions,
            governance,
            identities,
        })
    }

    /// Validate or fill each fragment of `kind`, keeping file order and the
    /// file each tree came from.
    fn prepare<'a>(
        &self,
        kind: FragmentKind,
        bundle: &'a ManifestBundle,
    ) -> KeymintResult<Vec<Prepared<'a>>> {
        bundle
            .fragments(kind)
            .iter()
            .map(|fragment| {
                self.complete(kind, fragment).map(|root| Prepared {
                    kind,
                    source_name: &fragment.source,
                    root,
                })
            })
            .collect()
    }

    fn complete(&self, kind: FragmentKind, fragment: &ManifestFragment) -> KeymintResult<Element> {
        let fragment_name = kind.to_string();
        let ctx = LogContext::new()
            .with_manifest(&fragment.source)
            .with_fragment(&fragment_name)
            .with_stage("validate");

        if fragment.document.tag() != kind.root_tag() {
            return Err(KeymintError::UnexpectedRoot {
                kind,
                source_name: fragment.source.clone(),
                expected: kind.root_tag(),
                found: fragment.document.tag().to_owned(),
            });
        }

        let schema = kind.schema();
        match &fragment.defaults {
            Some(defaults) => {
                let filled = self
                    .filler
                    .fill(&schema, fragment.document.clone(), defaults)
                    .map_err(|source| KeymintError::Defaults {
                        kind,
                        source_name: fragment.source.clone(),
                        source,
                    })?;
                if filled != fragment.document {
                    km_warn!(context = &ctx, "defaults applied to {}", fragment.source);
                }
                Ok(filled)
            }
            None => {
                check_schema(&schema, &fragment.document, Some(&fragment.source))?;
                Ok(fragment.document.clone())
            }
        }
    }

    /// Compile each fragment on its own, then join the grants. Grant names
    /// must be unique across all fragments.
    fn compile_permissions(
        &self,
        fragments: &[Prepared<'_>],
    ) -> KeymintResult<Option<PermissionsDocument>> {
        if fragments.is_empty() {
            return Ok(None);
        }

        let mut seen = HashSet::new();
        let mut grants = Vec::new();
        for fragment in fragments {
            let compiled = self
                .permissions
                .compile(&fragment.root)
                .map_err(|source| fragment.compile_error(source))?;
            for grant in compiled.entries() {
                let name = grant.attribute("name").unwrap_or_default();
                if !seen.insert(name.to_owned()) {
                    let duplicate = CompileError::DuplicateGrant(name.to_owned());
                    return Err(fragment.compile_error(duplicate));
                }
            }
            grants.extend(compiled.entries().cloned());
        }

        let document = PermissionsDocument::from_entries(grants);
        if self.verify {
            check_schema(&builtin::dds_permissions(), document.root(), Some(PERMISSIONS_ARTIFACT))?;
        }
        let ctx = LogContext::new()
            .with_fragment("permissions")
            .with_stage("compile");
        km_info!(
            context = &ctx,
            "compiled {} grant(s) from {} fragment(s)",
            document.entries().count(),
            fragments.len()
        );
        Ok(Some(document))
    }

    fn compile_governance(
        &self,
        fragments: &[Prepared<'_>],
    ) -> KeymintResult<Option<GovernanceDocument>> {
        if fragments.is_empty() {
            return Ok(None);
        }

        let mut rules = Vec::new();
        for fragment in fragments {
            let compiled = self
                .governance
                .compile(&fragment.root)
                .map_err(|source| fragment.compile_error(source))?;
            rules.extend(compiled.entries().cloned());
        }

        let document = GovernanceDocument::from_entries(rules);
        if self.verify {
            check_schema(&builtin::dds_governance(), document.root(), Some(GOVERNANCE_ARTIFACT))?;
        }
        let ctx = LogContext::new()
            .with_fragment("governance")
            .with_stage("compile");
        km_info!(
            context = &ctx,
            "compiled {} domain rule(s) from {} fragment(s)",
            document.entries().count(),
            fragments.len()
        );
        Ok(Some(document))
    }

    /// Issue declarations in file order. Errors name the fragment and the
    /// identity that failed.
    fn issue_identities(&self, fragments: &[Prepared<'_>]) -> KeymintResult<Vec<IdentityBundle>> {
        let mut bundles = Vec::new();
        for fragment in fragments {
            let declarations =
                parse_identities(&fragment.root).map_err(|source| KeymintError::Declaration {
                    source_name: fragment.source_name.to_owned(),
                    source,
                })?;
            for declaration in &declarations {
                let bundle =
                    self.issuer
                        .issue(declaration)
                        .map_err(|source| KeymintError::Identity {
                            source_name: fragment.source_name.to_owned(),
                            identity: declaration.name.clone(),
                            source,
                        })?;
                bundles.push(bundle);
            }
        }
        Ok(bundles)
    }
}

/// A validated or filled fragment and the file it came from.
struct Prepared<'a> {
    kind: FragmentKind,
    source_name: &'a str,
    root: Element,
}

impl Prepared<'_> {
    fn compile_error(&self, source: CompileError) -> KeymintError {
        KeymintError::Compile {
            kind: self.kind,
            source_name: self.source_name.to_owned(),
            source,
        }
    }
}
