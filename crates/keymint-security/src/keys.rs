//! ---
//! km_section: "05-identity-pki"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Private key generation and PEM encoding."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
use std::fmt;

use pkcs8::pkcs5::pbes2;
use pkcs8::{EncodePrivateKey, PrivateKeyInfo};
use rand::RngCore;
use rcgen::{KeyPair, SignatureAlgorithm};
use zeroize::Zeroizing;

use crate::{IdentityError, IdentityResult};

const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";
const ENCRYPTED_PRIVATE_KEY_LABEL: &str = "ENCRYPTED PRIVATE KEY";
const PBKDF2_ITERATIONS: u32 = 100_000;
const RSA_KEY_SIZES: std::ops::RangeInclusive<usize> = 2048..=8192;

/// Elliptic curves available for key generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    /// NIST P-256 (`SECP256R1`).
    P256,
    /// NIST P-384 (`SECP384R1`).
    P384,
}

impl EcCurve {
    /// Accepts the SECG, NIST and OpenSSL spellings, case-insensitively.
    pub fn from_name(name: &str) -> IdentityResult<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "SECP256R1" | "P-256" | "P256" | "PRIME256V1" => Ok(EcCurve::P256),
            "SECP384R1" | "P-384" | "P384" => Ok(EcCurve::P384),
            other => Err(IdentityError::UnsupportedAlgorithm(format!(
                "elliptic curve '{other}'"
            ))),
        }
    }
}

impl fmt::Display for EcCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcCurve::P256 => f.write_str("SECP256R1"),
            EcCurve::P384 => f.write_str("SECP384R1"),
        }
    }
}

/// Key algorithm and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// RSA with the given modulus size in bits.
    Rsa {
        /// Modulus size.
        bits: usize,
    },
    /// DSA with the given prime size in bits.
    Dsa {
        /// Prime size.
        bits: usize,
    },
    /// ECDSA on a named curve.
    Ec {
        /// Curve.
        curve: EcCurve,
    },
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Rsa { bits } => write!(f, "rsa-{bits}"),
            KeyAlgorithm::Dsa { bits } => write!(f, "dsa-{bits}"),
            KeyAlgorithm::Ec { curve } => write!(f, "ec-{curve}"),
        }
    }
}

/// At-rest protection applied when a private key is written as PEM.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EncryptionPolicy {
    /// Plain PKCS#8.
    #[default]
    NoEncryption,
    /// PKCS#8 PBES2 (PBKDF2-SHA256, AES-256-CBC) with the password read from
    /// the named environment variable.
    BestAvailable {
        /// Environment variable holding the password.
        password_env: String,
    },
}

impl EncryptionPolicy {
    fn password(&self) -> IdentityResult<Option<Zeroizing<String>>> {
        match self {
            EncryptionPolicy::NoEncryption => Ok(None),
            EncryptionPolicy::BestAvailable { password_env } => std::env::var(password_env)
                .map(|password| Some(Zeroizing::new(password)))
                .map_err(|_| IdentityError::MissingPasswordEnv(password_env.clone())),
        }
    }
}

/// Freshly generated private key held as PKCS#8 DER.
pub struct GeneratedKey {
    algorithm: KeyAlgorithm,
    pkcs8_der: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for GeneratedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Generate a private key for `algorithm`.
pub fn generate_key(algorithm: KeyAlgorithm) -> IdentityResult<GeneratedKey> {
    let der = match algorithm {
        KeyAlgorithm::Rsa { bits } => {
            if !RSA_KEY_SIZES.contains(&bits) {
                return Err(IdentityError::UnsupportedAlgorithm(format!(
                    "rsa key size {bits} (expected {}..={})",
                    RSA_KEY_SIZES.start(),
                    RSA_KEY_SIZES.end()
                )));
            }
            let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), bits)
                .map_err(|err| IdentityError::KeyGeneration(err.to_string()))?;
            key.to_pkcs8_der()
                .map_err(|err| IdentityError::Encoding(err.to_string()))?
                .as_bytes()
                .to_vec()
        }
        KeyAlgorithm::Dsa { bits } => {
            let size = dsa_key_size(bits)?;
            let mut rng = rand::thread_rng();
            let components = dsa::Components::generate(&mut rng, size);
            let key = dsa::SigningKey::generate(&mut rng, components);
            key.to_pkcs8_der()
                .map_err(|err| IdentityError::Encoding(err.to_string()))?
                .as_bytes()
                .to_vec()
        }
        KeyAlgorithm::Ec { curve } => KeyPair::generate_for(ec_signature_algorithm(curve))
            .map_err(|err| IdentityError::KeyGeneration(err.to_string()))?
            .serialize_der(),
    };
    Ok(GeneratedKey {
        algorithm,
        pkcs8_der: Zeroizing::new(der),
    })
}

#[allow(deprecated)]
fn dsa_key_size(bits: usize) -> IdentityResult<dsa::KeySize> {
    match bits {
        1024 => Ok(dsa::KeySize::DSA_1024_160),
        2048 => Ok(dsa::KeySize::DSA_2048_256),
        3072 => Ok(dsa::KeySize::DSA_3072_256),
        other => Err(IdentityError::UnsupportedAlgorithm(format!(
            "dsa key size {other} (expected 1024, 2048 or 3072)"
        ))),
    }
}

fn ec_signature_algorithm(curve: EcCurve) -> &'static SignatureAlgorithm {
    match curve {
        EcCurve::P256 => &rcgen::PKCS_ECDSA_P256_SHA256,
        EcCurve::P384 => &rcgen::PKCS_ECDSA_P384_SHA384,
    }
}

pub(crate) fn encode_pem(label: &str, der: &[u8]) -> String {
    let block = pem::Pem::new(label, der.to_vec());
    pem::encode_config(
        &block,
        pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
    )
}

impl GeneratedKey {
    /// Algorithm the key was generated for.
    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// PKCS#8 DER encoding of the private key.
    pub fn pkcs8_der(&self) -> &[u8] {
        &self.pkcs8_der
    }

    /// PEM encoding under `policy`: `PRIVATE KEY`, or `ENCRYPTED PRIVATE KEY`
    /// when a password is configured.
    pub fn to_pem(&self, policy: &EncryptionPolicy) -> IdentityResult<Zeroizing<String>> {
        let Some(password) = policy.password()? else {
            return Ok(Zeroizing::new(encode_pem(PRIVATE_KEY_LABEL, &self.pkcs8_der)));
        };

        let mut rng = rand::thread_rng();
        let mut salt = [0u8; 16];
        let mut iv = [0u8; 16];
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut iv);

        let params = pbes2::Parameters::pbkdf2_sha256_aes256cbc(PBKDF2_ITERATIONS, &salt, &iv)
            .map_err(|err| IdentityError::Encoding(err.to_string()))?;
        let info = PrivateKeyInfo::try_from(self.pkcs8_der.as_slice())
            .map_err(|err| IdentityError::Encoding(err.to_string()))?;
        let encrypted = info
            .encrypt_with_params(params, password.as_bytes())
            .map_err(|err| IdentityError::Encoding(err.to_string()))?;
        Ok(Zeroizing::new(encode_pem(
            ENCRYPTED_PRIVATE_KEY_LABEL,
            encrypted.as_bytes(),
        )))
    }
}
