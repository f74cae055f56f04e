//! ---
//! km_section: "15-testing-qa-runbook"
//! km_subsection: "integration-tests"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Shared fixtures: on-disk certificate authorities."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
#![allow(dead_code)]

use std::fs;
use std::path::Path;

use keymint_security::{generate_key, CaContext, EncryptionPolicy, KeyAlgorithm};
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};

pub const CA_SUBJECT: &str = "keymint integration CA";

/// OpenSSL-made P-256 CA whose subject repeats `OU`.
pub const MULTI_OU_CA: (&str, &str) = (
    include_str!("../fixtures/multi-ou.key.pem"),
    include_str!("../fixtures/multi-ou.cert.pem"),
);
pub const MULTI_OU_CA_SUBJECT: &str = "C=US, O=Robots, OU=Fleet, OU=Security, CN=keymint fixture CA";

/// OpenSSL-made DSA-2048 CA.
pub const DSA_CA: (&str, &str) = (
    include_str!("../fixtures/dsa.key.pem"),
    include_str!("../fixtures/dsa.cert.pem"),
);

/// Write an ECDSA P-256 CA named `issuer` under `dir/private` and `dir/public`.
pub fn write_ec_ca(dir: &Path, issuer: &str) -> CaContext {
    let key = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256).unwrap();
    write_ca(dir, issuer, key)
}

/// Same as [`write_ec_ca`] with a 2048-bit RSA key.
pub fn write_rsa_ca(dir: &Path, issuer: &str) -> CaContext {
    let generated = generate_key(KeyAlgorithm::Rsa { bits: 2048 }).unwrap();
    let pem = generated.to_pem(&EncryptionPolicy::NoEncryption).unwrap();
    let key = KeyPair::from_pem_and_sign_algo(&pem, &rcgen::PKCS_RSA_SHA256).unwrap();
    write_ca(dir, issuer, key)
}

fn write_ca(dir: &Path, issuer: &str, key: KeyPair) -> CaContext {
    let mut params = CertificateParams::default();
    params.distinguished_name.push(DnType::CommonName, CA_SUBJECT);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let certificate = params.self_signed(&key).unwrap();
    install_ca(dir, issuer, (key.serialize_pem().as_str(), certificate.pem().as_str()))
}

/// Install a `(key, certificate)` PEM pair as CA `issuer`.
pub fn install_ca(dir: &Path, issuer: &str, (key_pem, cert_pem): (&str, &str)) -> CaContext {
    let context = CaContext::new(dir.join("private"), dir.join("public"));
    fs::create_dir_all(context.private_space()).unwrap();
    fs::create_dir_all(context.public_space()).unwrap();
    fs::write(context.key_path(issuer).unwrap(), key_pem).unwrap();
    fs::write(context.cert_path(issuer).unwrap(), cert_pem).unwrap();
    context
}

/// An `identity` declaration in manifest XML.
pub fn identity_xml(name: &str, key: &str, hash: &str, subject: &str, serial: u64) -> String {
    format!(
        r#"<identity name="{name}">
  <key>
    <asymmetric_type>{key}</asymmetric_type>
    <encryption_algorithm>NoEncryption</encryption_algorithm>
  </key>
  <cert>
    <hash_algorithm>{hash}</hash_algorithm>
    <subject_name>{subject}</subject_name>
    <validity>
      <not_before>2013-06-01T13:00:00</not_before>
      <not_after>2038-06-01T13:00:00</not_after>
    </validity>
    <serial_number>{serial}</serial_number>
    <issuer_name>ca</issuer_name>
  </cert>
</identity>"#
    )
}

pub const EC_P256: &str = "<ec><curve>SECP256R1</curve></ec>";
pub const EC_P384: &str = "<ec><curve>SECP384R1</curve></ec>";
