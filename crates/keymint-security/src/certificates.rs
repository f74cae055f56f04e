//! ---
//! km_section: "05-identity-pki"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "CSR construction and CA-signed certificate issuance."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use x509_cert::attr::Attributes;
use x509_cert::der::asn1::{BitString, GeneralizedTime, UtcTime};
use x509_cert::der::{DateTime, Decode, Encode};
use x509_cert::request::{CertReq, CertReqInfo};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Time;
use x509_cert::{Certificate, TbsCertificate};
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::ca::CertificateAuthority;
use crate::dn::{parse_distinguished_name, to_name, DnAttribute};
use crate::keys::{encode_pem, GeneratedKey};
use crate::signer::SigningKey;
use crate::{IdentityError, IdentityResult};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const TIMESTAMP_LEN: usize = 19;
const CERTIFICATE_LABEL: &str = "CERTIFICATE";
const CERTIFICATE_REQUEST_LABEL: &str = "CERTIFICATE REQUEST";

/// Digest used for CSR and certificate signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// Parse `SHA256`, `sha-384`, ... case-insensitively.
    pub fn from_name(name: &str) -> IdentityResult<Self> {
        match name.trim().to_ascii_uppercase().replace('-', "").as_str() {
            "SHA256" => Ok(HashAlgorithm::Sha256),
            "SHA384" => Ok(HashAlgorithm::Sha384),
            "SHA512" => Ok(HashAlgorithm::Sha512),
            other => Err(IdentityError::UnsupportedAlgorithm(format!(
                "hash algorithm '{other}'"
            ))),
        }
    }
}

fn encoding(err: impl std::fmt::Display) -> IdentityError {
    IdentityError::Encoding(err.to_string())
}

/// Certificate validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validity {
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
}

impl Validity {
    /// Parse a window written as `YYYY-MM-DDTHH:MM:SS` timestamps, read as UTC.
    pub fn parse(not_before: &str, not_after: &str) -> IdentityResult<Self> {
        let validity = Self {
            not_before: parse_timestamp(not_before)?,
            not_after: parse_timestamp(not_after)?,
        };
        if validity.not_before > validity.not_after {
            return Err(IdentityError::InvalidValidity {
                value: format!("{not_before}..{not_after}"),
                reason: "not_before is later than not_after".into(),
            });
        }
        Ok(validity)
    }

    /// Start of the window.
    pub fn not_before(&self) -> OffsetDateTime {
        self.not_before
    }

    /// End of the window.
    pub fn not_after(&self) -> OffsetDateTime {
        self.not_after
    }
}

fn parse_timestamp(value: &str) -> IdentityResult<OffsetDateTime> {
    let invalid = |reason: String| IdentityError::InvalidValidity {
        value: value.to_owned(),
        reason,
    };
    if value.len() != TIMESTAMP_LEN {
        return Err(invalid("expected YYYY-MM-DDTHH:MM:SS".into()));
    }
    let naive = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map_err(|err| invalid(err.to_string()))?;
    let timestamp = naive.and_utc().timestamp();
    if timestamp < 0 {
        return Err(invalid("certificates cannot be valid before 1970-01-01T00:00:00".into()));
    }
    OffsetDateTime::from_unix_timestamp(timestamp).map_err(|err| invalid(err.to_string()))
}

/// RFC 5280 encoding: UTCTime through 2049, GeneralizedTime after.
fn x509_time(at: OffsetDateTime) -> IdentityResult<Time> {
    let seconds = u64::try_from(at.unix_timestamp()).map_err(encoding)?;
    let at = DateTime::from_unix_duration(Duration::from_secs(seconds)).map_err(encoding)?;
    if at.year() <= UtcTime::MAX_YEAR {
        Ok(UtcTime::from_date_time(at).map_err(encoding)?.into())
    } else {
        Ok(GeneralizedTime::from_date_time(at).into())
    }
}

/// A PEM encoded certificate signing request and the subject it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    subject: Vec<DnAttribute>,
    hash: HashAlgorithm,
    der: Vec<u8>,
    pem: String,
}

impl CertificateRequest {
    /// Parsed subject attributes, in order.
    pub fn subject(&self) -> &[DnAttribute] {
        &self.subject
    }

    /// Digest the request was signed with.
    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    /// PKCS#10 DER encoding.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// `CERTIFICATE REQUEST` PEM.
    pub fn pem(&self) -> &str {
        &self.pem
    }
}

/// Build and sign a CSR for `key` with the subject parsed from `subject`.
/// RSA, DSA and ECDSA keys sign with any supported `hash`.
pub fn build_csr(
    key: &GeneratedKey,
    subject: &str,
    hash: HashAlgorithm,
) -> IdentityResult<CertificateRequest> {
    let attributes = parse_distinguished_name(subject)?;
    let signer = SigningKey::from_pkcs8_der(key.pkcs8_der())?;

    let info = CertReqInfo {
        version: x509_cert::request::Version::V1,
        subject: to_name(&attributes)?,
        public_key: signer.public_key_info()?,
        attributes: Attributes::new(),
    };
    let signature = signer.sign(hash, &info.to_der().map_err(encoding)?)?;
    let request = CertReq {
        info,
        algorithm: signer.signature_algorithm(hash),
        signature: BitString::from_bytes(&signature).map_err(encoding)?,
    };
    let der = request.to_der().map_err(encoding)?;

    Ok(CertificateRequest {
        subject: attributes,
        hash,
        pem: encode_pem(CERTIFICATE_REQUEST_LABEL, &der),
        der,
    })
}

/// A CA-signed certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    /// `CERTIFICATE` PEM.
    pub pem: String,
    /// DER encoding.
    pub der: Vec<u8>,
    /// Serial number as requested.
    pub serial_number: u64,
    /// Issuer name in RFC 4514 form, read back from the signed certificate.
    pub issuer: String,
    /// Hex SHA-256 of `der`.
    pub fingerprint: String,
}

/// Sign `request` with `authority`, binding `serial_number` and `validity`.
///
/// The certificate is signed with the digest the request was built with. Its
/// issuer field is the CA certificate's subject, byte for byte.
pub fn issue_certificate(
    request: &CertificateRequest,
    serial_number: u64,
    validity: &Validity,
    authority: &CertificateAuthority,
) -> IdentityResult<IssuedCertificate> {
    if serial_number == 0 {
        return Err(IdentityError::InvalidSerialNumber(serial_number.to_string()));
    }

    let csr = CertReq::from_der(request.der()).map_err(encoding)?;
    let hash = request.hash();
    let signature_algorithm = authority.key().signature_algorithm(hash);
    let tbs_certificate = TbsCertificate {
        version: x509_cert::Version::V3,
        serial_number: SerialNumber::from(serial_number),
        signature: signature_algorithm.clone(),
        issuer: authority.subject_name().clone(),
        validity: x509_cert::time::Validity {
            not_before: x509_time(validity.not_before())?,
            not_after: x509_time(validity.not_after())?,
        },
        subject: csr.info.subject,
        subject_public_key_info: csr.info.public_key,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: None,
    };
    let signature = authority
        .key()
        .sign(hash, &tbs_certificate.to_der().map_err(encoding)?)?;
    let certificate = Certificate {
        tbs_certificate,
        signature_algorithm,
        signature: BitString::from_bytes(&signature).map_err(encoding)?,
    };
    let der = certificate.to_der().map_err(encoding)?;

    let (_, signed) = X509Certificate::from_der(&der).map_err(encoding)?;
    if signed.issuer().as_raw() != authority.subject_der() {
        return Err(IdentityError::InvalidCaCert {
            issuer: authority.name().to_owned(),
            reason: "issuer name of the signed certificate differs from the CA subject".into(),
        });
    }
    let issuer = signed.issuer().to_string();

    Ok(IssuedCertificate {
        pem: encode_pem(CERTIFICATE_LABEL, &der),
        fingerprint: fingerprint_der(&der),
        der,
        serial_number,
        issuer,
    })
}

fn fingerprint_der(der: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(der);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ca::tests::write_ca;
    use crate::keys::{generate_key, EcCurve, KeyAlgorithm};
    use x509_parser::certification_request::X509CertificationRequest;
    use dsa::signature::DigestVerifier;
    use p256::ecdsa::signature::hazmat::PrehashVerifier;
    use pkcs8::DecodePublicKey;
    use x509_parser::oid_registry::{OID_PKCS1_SHA384WITHRSA, OID_SIG_ECDSA_WITH_SHA384};
    use x509_parser::pem::parse_x509_pem;

    fn ec_key(curve: EcCurve) -> GeneratedKey {
        generate_key(KeyAlgorithm::Ec { curve }).unwrap()
    }

    fn window() -> Validity {
        Validity::parse("2013-06-01T13:00:00", "2038-06-01T13:00:00").unwrap()
    }

    fn parse_request(request: &CertificateRequest) -> X509CertificationRequest<'_> {
        let (_, csr) = X509CertificationRequest::from_der(request.der()).unwrap();
        csr
    }

    #[test]
    fn issued_certificate_binds_issuer_serial_and_window() {
        let dir = tempfile::tempdir().unwrap();
        let context = write_ca(dir.path(), "ca");
        let authority = context.load("ca").unwrap();

        let key = ec_key(EcCurve::P256);
        let request = build_csr(&key, "/C=US/O=Robots/CN=talker", HashAlgorithm::Sha256).unwrap();
        assert!(request.pem().starts_with("-----BEGIN CERTIFICATE REQUEST-----\n"));

        let validity = window();
        let issued = issue_certificate(&request, 7, &validity, &authority).unwrap();

        let (_, pem) = parse_x509_pem(issued.pem.as_bytes()).unwrap();
        let certificate = pem.parse_x509().unwrap();
        assert_eq!(certificate.issuer().to_string(), authority.subject());
        assert_eq!(certificate.issuer().as_raw(), authority.subject_der());
        assert_eq!(issued.issuer, authority.subject());
        assert_eq!(certificate.subject().to_string(), "C=US, O=Robots, CN=talker");
        assert_eq!(certificate.tbs_certificate.serial.to_string(), "7");
        assert_eq!(
            certificate.validity().not_before.timestamp(),
            validity.not_before().unix_timestamp()
        );
        assert_eq!(
            certificate.validity().not_after.timestamp(),
            validity.not_after().unix_timestamp()
        );
        assert_eq!(issued.fingerprint.len(), 64);
        assert_eq!(issued.der, pem.contents);
    }

    #[test]
    fn p256_key_signs_request_with_sha384() {
        let request =
            build_csr(&ec_key(EcCurve::P256), "CN=talker", HashAlgorithm::Sha384).unwrap();
        let csr = parse_request(&request);
        assert_eq!(csr.signature_algorithm.algorithm, OID_SIG_ECDSA_WITH_SHA384);

        let info = &csr.certification_request_info;
        let verifying_key = p256::ecdsa::VerifyingKey::from_public_key_der(info.subject_pki.raw).unwrap();
        let signature = p256::ecdsa::Signature::from_der(csr.signature_value.data.as_ref()).unwrap();
        verifying_key
            .verify_prehash(&sha2::Sha384::digest(info.raw), &signature)
            .unwrap();
    }

    #[test]
    fn dsa_key_gets_request_and_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let authority = write_ca(dir.path(), "ca").load("ca").unwrap();

        let key = generate_key(KeyAlgorithm::Dsa { bits: 2048 }).unwrap();
        let request = build_csr(&key, "CN=talker", HashAlgorithm::Sha256).unwrap();
        let csr = parse_request(&request);
        assert_eq!(
            csr.signature_algorithm.algorithm.to_id_string(),
            "2.16.840.1.101.3.4.3.2"
        );

        let info = &csr.certification_request_info;
        let verifying_key = dsa::VerifyingKey::from_public_key_der(info.subject_pki.raw).unwrap();
        let signature = dsa::Signature::try_from(csr.signature_value.data.as_ref()).unwrap();
        verifying_key
            .verify_digest(Sha256::new_with_prefix(info.raw), &signature)
            .unwrap();

        let issued = issue_certificate(&request, 3, &window(), &authority).unwrap();
        let (_, pem) = parse_x509_pem(issued.pem.as_bytes()).unwrap();
        let certificate = pem.parse_x509().unwrap();
        assert_eq!(certificate.subject().to_string(), "CN=talker");
        assert_eq!(
            certificate.public_key().raw,
            csr.certification_request_info.subject_pki.raw
        );
    }

    #[test]
    fn rsa_requests_follow_requested_digest() {
        let key = generate_key(KeyAlgorithm::Rsa { bits: 2048 }).unwrap();
        let request = build_csr(&key, "CN=listener", HashAlgorithm::Sha384).unwrap();
        let csr = parse_request(&request);
        assert_eq!(csr.signature_algorithm.algorithm, OID_PKCS1_SHA384WITHRSA);
        assert_eq!(
            csr.certification_request_info.subject.to_string(),
            "CN=listener"
        );
        assert_eq!(request.hash(), HashAlgorithm::Sha384);
    }

    #[test]
    fn certificate_is_signed_with_the_request_digest() {
        let dir = tempfile::tempdir().unwrap();
        let authority = write_ca(dir.path(), "ca").load("ca").unwrap();
        let request =
            build_csr(&ec_key(EcCurve::P384), "CN=talker", HashAlgorithm::Sha384).unwrap();
        let issued = issue_certificate(&request, 9, &window(), &authority).unwrap();
        let (_, pem) = parse_x509_pem(issued.pem.as_bytes()).unwrap();
        let certificate = pem.parse_x509().unwrap();
        assert_eq!(certificate.signature_algorithm.algorithm, OID_SIG_ECDSA_WITH_SHA384);
    }

    #[test]
    fn validity_is_parsed_strictly() {
        for value in [
            "2013-06-01 13:00:00",
            "2013-06-01T13:00:00Z",
            "2013-06-01T13:00",
            "2013-6-1T13:00:00",
            "2013-13-01T13:00:00",
            "1969-12-31T23:59:59",
        ] {
            assert!(
                matches!(
                    Validity::parse(value, "2038-06-01T13:00:00"),
                    Err(IdentityError::InvalidValidity { .. })
                ),
                "{value} accepted"
            );
        }
        assert!(matches!(
            Validity::parse("2038-06-01T13:00:00", "2013-06-01T13:00:00"),
            Err(IdentityError::InvalidValidity { .. })
        ));
        let validity = Validity::parse("1970-01-01T00:01:00", "1970-01-01T00:02:00").unwrap();
        assert_eq!(validity.not_before().unix_timestamp(), 60);
    }

    #[test]
    fn late_dates_use_generalized_time() {
        let validity = Validity::parse("2013-06-01T13:00:00", "2100-01-01T00:00:00").unwrap();
        assert!(matches!(
            x509_time(validity.not_before()).unwrap(),
            Time::UtcTime(_)
        ));
        assert!(matches!(
            x509_time(validity.not_after()).unwrap(),
            Time::GeneralTime(_)
        ));
    }

    #[test]
    fn zero_serial_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let context = write_ca(dir.path(), "ca");
        let authority = context.load("ca").unwrap();
        let request =
            build_csr(&ec_key(EcCurve::P256), "CN=talker", HashAlgorithm::Sha256).unwrap();
        assert!(matches!(
            issue_certificate(&request, 0, &window(), &authority),
            Err(IdentityError::InvalidSerialNumber(_))
        ));
    }

    #[test]
    fn hash_names_are_normalized() {
        assert_eq!(HashAlgorithm::from_name("sha-384").unwrap(), HashAlgorithm::Sha384);
        assert!(HashAlgorithm::from_name("MD5").is_err());
    }
}
