//! ---
//! km_section: "05-identity-pki"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Algorithm-specific signing for CSRs and certificates."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
//! Signing keys for RSA, DSA and ECDSA.
//!
//! Every supported key type signs with any [`HashAlgorithm`]. RSA uses
//! PKCS#1 v1.5 padding; DSA and ECDSA use deterministic (RFC 6979) nonces.

use dsa::signature::{DigestSigner, SignatureEncoding};
use p256::ecdsa::signature::hazmat::PrehashSigner;
use pkcs8::{EncodePublicKey, PrivateKeyInfo};
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha256, Sha384, Sha512};
use x509_cert::der::asn1::{Any, ObjectIdentifier};
use x509_cert::der::Decode;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::certificates::HashAlgorithm;
use crate::{IdentityError, IdentityResult};

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const ID_DSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10040.4.1");
const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const SHA384_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const SHA512_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
const DSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.3.2");
const DSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.3.3");
const DSA_WITH_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.3.4");
const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const ECDSA_WITH_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");

fn encoding(err: impl std::fmt::Display) -> IdentityError {
    IdentityError::Encoding(err.to_string())
}

fn signing_failed(err: impl std::fmt::Display) -> IdentityError {
    IdentityError::Signing(err.to_string())
}

impl HashAlgorithm {
    fn digest(self, message: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha256 => Sha256::digest(message).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(message).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(message).to_vec(),
        }
    }

    fn pkcs1v15(self) -> Pkcs1v15Sign {
        match self {
            HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
            HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
            HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
        }
    }
}

/// Private key able to produce X.509 signatures.
pub(crate) enum SigningKey {
    Rsa(RsaPrivateKey),
    Dsa(dsa::SigningKey),
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
}

impl SigningKey {
    /// Decode an unencrypted PKCS#8 private key.
    pub(crate) fn from_pkcs8_der(der: &[u8]) -> IdentityResult<Self> {
        let info = PrivateKeyInfo::try_from(der).map_err(encoding)?;
        let algorithm = info.algorithm.oid;
        if algorithm == RSA_ENCRYPTION {
            return Ok(SigningKey::Rsa(
                RsaPrivateKey::try_from(info).map_err(encoding)?,
            ));
        }
        if algorithm == ID_DSA {
            return Ok(SigningKey::Dsa(
                dsa::SigningKey::try_from(info).map_err(encoding)?,
            ));
        }
        if algorithm == ID_EC_PUBLIC_KEY {
            let curve = info.algorithm.parameters_oid().map_err(encoding)?;
            if curve == SECP256R1 {
                return Ok(SigningKey::P256(
                    p256::ecdsa::SigningKey::try_from(info).map_err(encoding)?,
                ));
            }
            if curve == SECP384R1 {
                return Ok(SigningKey::P384(
                    p384::ecdsa::SigningKey::try_from(info).map_err(encoding)?,
                ));
            }
            return Err(IdentityError::UnsupportedAlgorithm(format!(
                "elliptic curve {curve}"
            )));
        }
        Err(IdentityError::UnsupportedAlgorithm(format!(
            "private key algorithm {algorithm}"
        )))
    }

    /// Short name for log and error messages.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            SigningKey::Rsa(_) => "rsa",
            SigningKey::Dsa(_) => "dsa",
            SigningKey::P256(_) => "ec-SECP256R1",
            SigningKey::P384(_) => "ec-SECP384R1",
        }
    }

    /// Subject public key info of the matching public key.
    pub(crate) fn public_key_info(&self) -> IdentityResult<SubjectPublicKeyInfoOwned> {
        let document = match self {
            SigningKey::Rsa(key) => key.to_public_key().to_public_key_der(),
            SigningKey::Dsa(key) => key.verifying_key().to_public_key_der(),
            SigningKey::P256(key) => key.verifying_key().to_public_key_der(),
            SigningKey::P384(key) => key.verifying_key().to_public_key_der(),
        }
        .map_err(encoding)?;
        SubjectPublicKeyInfoOwned::from_der(document.as_bytes()).map_err(encoding)
    }

    /// Algorithm identifier written next to signatures made with `hash`.
    pub(crate) fn signature_algorithm(&self, hash: HashAlgorithm) -> AlgorithmIdentifierOwned {
        let (oid, parameters) = match (self, hash) {
            (SigningKey::Rsa(_), HashAlgorithm::Sha256) => (SHA256_WITH_RSA, Some(Any::null())),
            (SigningKey::Rsa(_), HashAlgorithm::Sha384) => (SHA384_WITH_RSA, Some(Any::null())),
            (SigningKey::Rsa(_), HashAlgorithm::Sha512) => (SHA512_WITH_RSA, Some(Any::null())),
            (SigningKey::Dsa(_), HashAlgorithm::Sha256) => (DSA_WITH_SHA256, None),
            (SigningKey::Dsa(_), HashAlgorithm::Sha384) => (DSA_WITH_SHA384, None),
            (SigningKey::Dsa(_), HashAlgorithm::Sha512) => (DSA_WITH_SHA512, None),
            (_, HashAlgorithm::Sha256) => (ECDSA_WITH_SHA256, None),
            (_, HashAlgorithm::Sha384) => (ECDSA_WITH_SHA384, None),
            (_, HashAlgorithm::Sha512) => (ECDSA_WITH_SHA512, None),
        };
        AlgorithmIdentifierOwned { oid, parameters }
    }

    /// Sign `message` hashed with `hash`. DSA and ECDSA signatures are DER
    /// encoded `SEQUENCE { r, s }`.
    pub(crate) fn sign(&self, hash: HashAlgorithm, message: &[u8]) -> IdentityResult<Vec<u8>> {
        match self {
            SigningKey::Rsa(key) => key
                .sign(hash.pkcs1v15(), &hash.digest(message))
                .map_err(signing_failed),
            SigningKey::Dsa(key) => {
                let signature: dsa::Signature = match hash {
                    HashAlgorithm::Sha256 => key.try_sign_digest(Sha256::new_with_prefix(message)),
                    HashAlgorithm::Sha384 => key.try_sign_digest(Sha384::new_with_prefix(message)),
                    HashAlgorithm::Sha512 => key.try_sign_digest(Sha512::new_with_prefix(message)),
                }
                .map_err(signing_failed)?;
                Ok(signature.to_vec())
            }
            SigningKey::P256(key) => {
                let signature: p256::ecdsa::DerSignature = key
                    .sign_prehash(&hash.digest(message))
                    .map_err(signing_failed)?;
                Ok(signature.as_bytes().to_vec())
            }
            SigningKey::P384(key) => {
                let signature: p384::ecdsa::DerSignature = key
                    .sign_prehash(&hash.digest(message))
                    .map_err(signing_failed)?;
                Ok(signature.as_bytes().to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_key, EcCurve, KeyAlgorithm};
    use p256::ecdsa::signature::hazmat::PrehashVerifier;

    fn signer(algorithm: KeyAlgorithm) -> SigningKey {
        let key = generate_key(algorithm).unwrap();
        SigningKey::from_pkcs8_der(key.pkcs8_der()).unwrap()
    }

    #[test]
    fn decodes_every_generated_key_type() {
        let kinds: Vec<&str> = [
            KeyAlgorithm::Rsa { bits: 2048 },
            KeyAlgorithm::Dsa { bits: 2048 },
            KeyAlgorithm::Ec { curve: EcCurve::P256 },
            KeyAlgorithm::Ec { curve: EcCurve::P384 },
        ]
        .into_iter()
        .map(|algorithm| signer(algorithm).kind())
        .collect();
        assert_eq!(kinds, ["rsa", "dsa", "ec-SECP256R1", "ec-SECP384R1"]);
    }

    #[test]
    fn p256_signs_with_a_longer_digest() {
        let key = signer(KeyAlgorithm::Ec { curve: EcCurve::P256 });
        let signature = key.sign(HashAlgorithm::Sha384, b"tbs").unwrap();
        let SigningKey::P256(inner) = &key else {
            panic!("expected a P-256 key");
        };
        let parsed = p256::ecdsa::Signature::from_der(&signature).unwrap();
        inner
            .verifying_key()
            .verify_prehash(&HashAlgorithm::Sha384.digest(b"tbs"), &parsed)
            .unwrap();
        assert_eq!(
            key.signature_algorithm(HashAlgorithm::Sha384).oid,
            ECDSA_WITH_SHA384
        );
    }

    #[test]
    fn rsa_identifiers_carry_null_parameters() {
        let key = signer(KeyAlgorithm::Rsa { bits: 2048 });
        let identifier = key.signature_algorithm(HashAlgorithm::Sha512);
        assert_eq!(identifier.oid, SHA512_WITH_RSA);
        assert_eq!(identifier.parameters, Some(Any::null()));
        assert!(!key.sign(HashAlgorithm::Sha512, b"tbs").unwrap().is_empty());
    }

    #[test]
    fn dsa_signatures_are_der_sequences() {
        let key = signer(KeyAlgorithm::Dsa { bits: 2048 });
        let signature = key.sign(HashAlgorithm::Sha384, b"tbs").unwrap();
        assert_eq!(signature[0], 0x30);
        assert!(dsa::Signature::try_from(signature.as_slice()).is_ok());
        assert_eq!(
            key.signature_algorithm(HashAlgorithm::Sha384).oid,
            DSA_WITH_SHA384
        );
    }

    #[test]
    fn unknown_key_material_is_rejected() {
        assert!(matches!(
            SigningKey::from_pkcs8_der(b"not der"),
            Err(IdentityError::Encoding(_))
        ));
    }
}
