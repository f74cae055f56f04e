//! ---
//! km_section: "05-identity-pki"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Issues key, CSR and certificate per identity declaration."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
use std::fmt;

use keymint_logging::{km_debug, km_error, km_info, log_stage_event, LogContext, StageOutcome};
use keymint_xml::Element;
use zeroize::Zeroizing;

use crate::ca::CaContext;
use crate::certificates::{build_csr, issue_certificate, IssuedCertificate};
use crate::identity::{parse_identities, IdentityDeclaration};
use crate::keys::generate_key;
use crate::metrics::IssuanceMetrics;
use crate::IdentityResult;

/// Key material produced for one identity.
pub struct IdentityBundle {
    /// Identity name.
    pub name: String,
    /// Private key PEM, encrypted when the declaration asks for it.
    pub private_key_pem: Zeroizing<String>,
    /// CSR PEM.
    pub csr_pem: String,
    /// CA-signed certificate.
    pub certificate: IssuedCertificate,
}

impl fmt::Debug for IdentityBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityBundle")
            .field("name", &self.name)
            .field("serial_number", &self.certificate.serial_number)
            .field("fingerprint", &self.certificate.fingerprint)
            .finish_non_exhaustive()
    }
}

/// Turns identity declarations into key material signed by CAs found in a
/// [`CaContext`].
#[derive(Clone)]
pub struct IdentityIssuer {
    ca: CaContext,
    metrics: Option<IssuanceMetrics>,
}

impl IdentityIssuer {
    /// Issuer reading CA material from `ca`.
    pub fn new(ca: CaContext) -> Self {
        Self { ca, metrics: None }
    }

    /// Record issuance counters in `metrics`.
    pub fn with_metrics(mut self, metrics: IssuanceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// CA directories in use.
    pub fn ca_context(&self) -> &CaContext {
        &self.ca
    }

    /// Issue every identity of an `identities` tree, in document order. The
    /// first failure aborts the run.
    pub fn issue_all(&self, identities: &Element) -> IdentityResult<Vec<IdentityBundle>> {
        parse_identities(identities)?
            .iter()
            .map(|declaration| self.issue(declaration))
            .collect()
    }

    /// Generate a key, build its CSR and have the declared CA sign it.
    pub fn issue(&self, declaration: &IdentityDeclaration) -> IdentityResult<IdentityBundle> {
        let ctx = LogContext::new()
            .with_fragment("identities")
            .with_subject(&declaration.name)
            .with_stage("issue");

        match self.issue_inner(declaration, &ctx) {
            Ok(bundle) => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_certificate_issued();
                }
                km_info!(
                    context = ctx,
                    "issued certificate serial {} by '{}' (sha256 {})",
                    bundle.certificate.serial_number,
                    declaration.cert.issuer_name,
                    bundle.certificate.fingerprint
                );
                Ok(bundle)
            }
            Err(err) => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_issuance_failure();
                }
                km_error!(context = ctx, "identity issuance failed: {}", err);
                log_stage_event(
                    Some(&ctx),
                    "identity.issue",
                    &err.to_string(),
                    StageOutcome::Fault,
                );
                Err(err)
            }
        }
    }

    fn issue_inner(
        &self,
        declaration: &IdentityDeclaration,
        ctx: &LogContext,
    ) -> IdentityResult<IdentityBundle> {
        let cert = &declaration.cert;
        let authority = self.ca.load(&cert.issuer_name)?;

        let key = generate_key(declaration.key.algorithm)?;
        if let Some(metrics) = &self.metrics {
            metrics.inc_key_generated();
        }
        km_debug!(context = ctx, "generated {} key", key.algorithm());
        let private_key_pem = key.to_pem(&declaration.key.encryption)?;

        let request = build_csr(&key, &cert.subject_name, cert.hash)?;
        let certificate =
            issue_certificate(&request, cert.serial_number, &cert.validity, &authority)?;

        Ok(IdentityBundle {
            name: declaration.name.clone(),
            private_key_pem,
            csr_pem: request.pem().to_owned(),
            certificate,
        })
    }
}
