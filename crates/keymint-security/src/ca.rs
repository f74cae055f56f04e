//! ---
//! km_section: "05-identity-pki"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Certificate authority material loading."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use x509_cert::der::Decode;
use x509_cert::name::Name;
use x509_parser::prelude::{FromDer, X509Certificate};
use zeroize::Zeroizing;

use crate::signer::SigningKey;
use crate::{IdentityError, IdentityResult};

const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";
const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Directories holding certificate authority material.
///
/// The private key of issuer `name` lives at `<private_space>/<name>.key.pem`
/// and its certificate at `<public_space>/<name>.cert.pem`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaContext {
    private_space: PathBuf,
    public_space: PathBuf,
}

impl CaContext {
    /// Context rooted at the two key-material directories.
    pub fn new(private_space: impl Into<PathBuf>, public_space: impl Into<PathBuf>) -> Self {
        Self {
            private_space: private_space.into(),
            public_space: public_space.into(),
        }
    }

    /// Directory holding CA private keys.
    pub fn private_space(&self) -> &Path {
        &self.private_space
    }

    /// Directory holding CA certificates.
    pub fn public_space(&self) -> &Path {
        &self.public_space
    }

    /// Path of the private key for `issuer`.
    pub fn key_path(&self, issuer: &str) -> IdentityResult<PathBuf> {
        Ok(self
            .private_space
            .join(format!("{}.key.pem", normalize_issuer(issuer)?)))
    }

    /// Path of the certificate for `issuer`.
    pub fn cert_path(&self, issuer: &str) -> IdentityResult<PathBuf> {
        Ok(self
            .public_space
            .join(format!("{}.cert.pem", normalize_issuer(issuer)?)))
    }

    /// Load the CA for `issuer`. The key must be an unencrypted PKCS#8
    /// `PRIVATE KEY` matching the certificate's public key.
    pub fn load(&self, issuer: &str) -> IdentityResult<CertificateAuthority> {
        let key_path = self.key_path(issuer)?;
        let cert_path = self.cert_path(issuer)?;
        let key_pem = Zeroizing::new(read_material(issuer, &key_path)?);
        let cert_pem = read_material(issuer, &cert_path)?;

        let invalid_key = |reason: String| IdentityError::InvalidCaKey {
            issuer: issuer.to_owned(),
            reason,
        };
        let invalid_cert = |reason: String| IdentityError::InvalidCaCert {
            issuer: issuer.to_owned(),
            reason,
        };

        let key_block = pem::parse(key_pem.as_bytes()).map_err(|err| invalid_key(err.to_string()))?;
        if key_block.tag() != PRIVATE_KEY_LABEL {
            return Err(invalid_key(format!(
                "expected a '{PRIVATE_KEY_LABEL}' block, found '{}'",
                key_block.tag()
            )));
        }
        let key_der = Zeroizing::new(key_block.into_contents());
        let key = SigningKey::from_pkcs8_der(&key_der).map_err(|err| invalid_key(err.to_string()))?;

        let cert_block = pem::parse(cert_pem.as_bytes()).map_err(|err| invalid_cert(err.to_string()))?;
        if cert_block.tag() != CERTIFICATE_LABEL {
            return Err(invalid_cert(format!(
                "expected a '{CERTIFICATE_LABEL}' block, found '{}'",
                cert_block.tag()
            )));
        }
        let certificate = x509_cert::Certificate::from_der(cert_block.contents())
            .map_err(|err| invalid_cert(err.to_string()))?;
        let (_, parsed) = X509Certificate::from_der(cert_block.contents())
            .map_err(|err| invalid_cert(err.to_string()))?;

        let key_info = key.public_key_info()?;
        if key_info.subject_public_key
            != certificate.tbs_certificate.subject_public_key_info.subject_public_key
        {
            return Err(invalid_key(
                "private key does not match the certificate public key".into(),
            ));
        }

        let subject = parsed.subject().to_string();
        debug!(
            issuer,
            key = %key_path.display(),
            cert = %cert_path.display(),
            algorithm = key.kind(),
            subject = %subject,
            "loaded certificate authority"
        );

        Ok(CertificateAuthority {
            name: issuer.to_owned(),
            subject,
            subject_der: parsed.subject().as_raw().to_vec(),
            subject_name: certificate.tbs_certificate.subject,
            key,
        })
    }
}

fn read_material(issuer: &str, path: &Path) -> IdentityResult<String> {
    fs::read_to_string(path).map_err(|err| IdentityError::CaNotFound {
        issuer: issuer.to_owned(),
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

/// Issuer names map to file stems: surrounding whitespace and slashes are
/// dropped, interior slashes are kept as path separators, `..` is refused.
fn normalize_issuer(issuer: &str) -> IdentityResult<String> {
    let normalized = issuer.trim().trim_matches('/');
    if normalized.is_empty()
        || normalized
            .split('/')
            .any(|component| component.is_empty() || component == "." || component == "..")
    {
        return Err(IdentityError::InvalidIssuerName(issuer.to_owned()));
    }
    Ok(normalized.to_owned())
}

/// A loaded issuing CA.
pub struct CertificateAuthority {
    name: String,
    subject: String,
    subject_der: Vec<u8>,
    subject_name: Name,
    key: SigningKey,
}

impl std::fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("name", &self.name)
            .field("subject", &self.subject)
            .field("algorithm", &self.key.kind())
            .finish_non_exhaustive()
    }
}

impl CertificateAuthority {
    /// Issuer name the CA was loaded under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// CA subject in RFC 4514 form, as read from its certificate.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// DER encoding of the CA subject, as found in its certificate.
    pub fn subject_der(&self) -> &[u8] {
        &self.subject_der
    }

    pub(crate) fn subject_name(&self) -> &Name {
        &self.subject_name
    }

    pub(crate) fn key(&self) -> &SigningKey {
        &self.key
    }
}
