//! ---
//! km_section: "05-identity-pki"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Key generation, CSRs, and CA-signed certificate issuance."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Identity issuance for keymint keystores.
//!
//! An identity declaration names a key algorithm, an at-rest encryption policy
//! and a certificate request. [`IdentityIssuer`] generates the key, builds a CSR
//! from the declared distinguished name, loads the issuing CA from a
//! [`CaContext`] and returns the signed certificate together with the PEM
//! encoded key and CSR. RSA, DSA and ECDSA keys sign with SHA-256, SHA-384
//! or SHA-512.

use std::path::PathBuf;

use thiserror::Error;

pub mod ca;
pub mod certificates;
pub mod dn;
pub mod identity;
pub mod issuer;
pub mod keys;
pub mod metrics;
mod signer;

pub use ca::{CaContext, CertificateAuthority};
pub use certificates::{
    build_csr, issue_certificate, CertificateRequest, HashAlgorithm, IssuedCertificate, Validity,
};
pub use dn::{parse_distinguished_name, DnAttribute};
pub use identity::{parse_identities, CertSpec, IdentityDeclaration, KeySpec};
pub use issuer::{IdentityBundle, IdentityIssuer};
pub use keys::{generate_key, EcCurve, EncryptionPolicy, GeneratedKey, KeyAlgorithm};
pub use metrics::IssuanceMetrics;

/// Result alias for identity issuance.
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Errors raised while generating keys or issuing certificates.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Key type, size, curve, or hash pairing is not supported.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// Distinguished name uses an attribute code with no known OID.
    #[error("unknown distinguished name attribute '{0}'")]
    UnknownDnAttribute(String),
    /// Distinguished name does not follow the `key=value` grammar.
    #[error("malformed distinguished name '{subject}': {reason}")]
    MalformedDistinguishedName {
        /// Offending subject string.
        subject: String,
        /// What was wrong with it.
        reason: String,
    },
    /// CA key or certificate file is absent or unreadable.
    #[error("certificate authority '{issuer}' not found at {}: {reason}", .path.display())]
    CaNotFound {
        /// Issuer name as declared.
        issuer: String,
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O failure.
        reason: String,
    },
    /// CA private key failed to parse or does not match the CA certificate.
    #[error("invalid private key for certificate authority '{issuer}': {reason}")]
    InvalidCaKey {
        /// Issuer name as declared.
        issuer: String,
        /// Parse or consistency failure.
        reason: String,
    },
    /// CA certificate failed to parse.
    #[error("invalid certificate for certificate authority '{issuer}': {reason}")]
    InvalidCaCert {
        /// Issuer name as declared.
        issuer: String,
        /// Parse failure.
        reason: String,
    },
    /// Issuer name cannot be turned into a file name.
    #[error("invalid issuer name '{0}'")]
    InvalidIssuerName(String),
    /// Password environment variable for key encryption is unset.
    #[error("environment variable '{0}' holding the key password is not set")]
    MissingPasswordEnv(String),
    /// Validity timestamp is not `YYYY-MM-DDTHH:MM:SS`, or the window is inverted.
    #[error("invalid validity '{value}': {reason}")]
    InvalidValidity {
        /// Offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
    /// Serial number is not a positive integer.
    #[error("invalid serial number '{0}'")]
    InvalidSerialNumber(String),
    /// Identity declaration lacks a required element or attribute.
    #[error("{context}: missing '{tag}'")]
    MissingElement {
        /// Declaration being read.
        context: String,
        /// Missing tag or `@attribute`.
        tag: String,
    },
    /// Key generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    /// CSR or certificate signature could not be produced.
    #[error("signing failed: {0}")]
    Signing(String),
    /// PEM/DER encoding failed.
    #[error("encoding failed: {0}")]
    Encoding(String),
}
