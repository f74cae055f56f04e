//! ---
//! km_section: "05-identity-pki"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Identity declarations read from the identities manifest."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
use keymint_xml::Element;

use crate::certificates::{HashAlgorithm, Validity};
use crate::keys::{EcCurve, EncryptionPolicy, KeyAlgorithm};
use crate::{IdentityError, IdentityResult};

const IDENTITY: &str = "identity";

/// Key half of an identity declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    /// Algorithm and parameters.
    pub algorithm: KeyAlgorithm,
    /// At-rest protection of the PEM output.
    pub encryption: EncryptionPolicy,
}

/// Certificate half of an identity declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertSpec {
    /// Digest for the CSR and certificate signatures.
    pub hash: HashAlgorithm,
    /// Subject distinguished name as written.
    pub subject_name: String,
    /// Validity window.
    pub validity: Validity,
    /// Certificate serial number.
    pub serial_number: u64,
    /// Issuing CA name.
    pub issuer_name: String,
}

/// One `identity` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityDeclaration {
    /// Identity name (`name` attribute).
    pub name: String,
    /// Key request.
    pub key: KeySpec,
    /// Certificate request.
    pub cert: CertSpec,
}

/// Read every `identity` child of an `identities` tree, in document order.
pub fn parse_identities(identities: &Element) -> IdentityResult<Vec<IdentityDeclaration>> {
    identities
        .find_all(IDENTITY)
        .map(IdentityDeclaration::from_element)
        .collect()
}

impl IdentityDeclaration {
    /// Read a single `identity` element.
    pub fn from_element(identity: &Element) -> IdentityResult<Self> {
        let name = identity
            .attribute("name")
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| missing(IDENTITY, "@name"))?
            .to_owned();
        let context = format!("{IDENTITY} '{name}'");

        let key = required(identity, &context, "key")?;
        let cert = required(identity, &context, "cert")?;
        Ok(Self {
            key: parse_key(key, &context)?,
            cert: parse_cert(cert, &context)?,
            name,
        })
    }
}

fn parse_key(key: &Element, context: &str) -> IdentityResult<KeySpec> {
    let asymmetric = required(key, context, "asymmetric_type")?;
    let algorithm = match asymmetric.children().first() {
        Some(params) if params.tag() == "rsa" => KeyAlgorithm::Rsa {
            bits: key_size(params, context)?,
        },
        Some(params) if params.tag() == "dsa" => KeyAlgorithm::Dsa {
            bits: key_size(params, context)?,
        },
        Some(params) if params.tag() == "ec" => KeyAlgorithm::Ec {
            curve: EcCurve::from_name(required_text(params, context, "curve")?)?,
        },
        Some(params) => {
            return Err(IdentityError::UnsupportedAlgorithm(format!(
                "{context}: key type '{}'",
                params.tag()
            )))
        }
        None => return Err(missing(context, "asymmetric_type/rsa|dsa|ec")),
    };

    let encryption = match required_text(key, context, "encryption_algorithm")? {
        "NoEncryption" => EncryptionPolicy::NoEncryption,
        "BestAvailableEncryption" => EncryptionPolicy::BestAvailable {
            password_env: required_text(key, context, "password_env")?.to_owned(),
        },
        other => {
            return Err(IdentityError::UnsupportedAlgorithm(format!(
                "{context}: encryption '{other}'"
            )))
        }
    };

    Ok(KeySpec {
        algorithm,
        encryption,
    })
}

fn key_size(params: &Element, context: &str) -> IdentityResult<usize> {
    let value = required_text(params, context, "key_size")?;
    value.parse().map_err(|_| {
        IdentityError::UnsupportedAlgorithm(format!("{context}: key size '{value}'"))
    })
}

fn parse_cert(cert: &Element, context: &str) -> IdentityResult<CertSpec> {
    let validity = required(cert, context, "validity")?;
    let serial = required_text(cert, context, "serial_number")?;
    let serial_number = serial
        .parse::<u64>()
        .ok()
        .filter(|serial| *serial > 0)
        .ok_or_else(|| IdentityError::InvalidSerialNumber(serial.to_owned()))?;

    Ok(CertSpec {
        hash: HashAlgorithm::from_name(required_text(cert, context, "hash_algorithm")?)?,
        subject_name: required_text(cert, context, "subject_name")?.to_owned(),
        validity: Validity::parse(
            required_text(validity, context, "not_before")?,
            required_text(validity, context, "not_after")?,
        )?,
        serial_number,
        issuer_name: required_text(cert, context, "issuer_name")?.to_owned(),
    })
}

fn required<'a>(parent: &'a Element, context: &str, tag: &str) -> IdentityResult<&'a Element> {
    parent.find(tag).ok_or_else(|| missing(context, tag))
}

fn required_text<'a>(parent: &'a Element, context: &str, tag: &str) -> IdentityResult<&'a str> {
    parent
        .child_text(tag)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| missing(context, tag))
}

fn missing(context: &str, tag: &str) -> IdentityError {
    IdentityError::MissingElement {
        context: context.to_owned(),
        tag: tag.to_owned(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn leaf(tag: &str, text: &str) -> Element {
        Element::new(tag).with_text(text)
    }

    pub(crate) fn identity(name: &str, key_params: Element, serial: &str) -> Element {
        Element::new(IDENTITY)
            .with_attribute("name", name)
            .with_child(
                Element::new("key")
                    .with_child(Element::new("asymmetric_type").with_child(key_params))
                    .with_child(leaf("encryption_algorithm", "NoEncryption")),
            )
            .with_child(
                Element::new("cert")
                    .with_child(leaf("hash_algorithm", "SHA256"))
                    .with_child(leaf("subject_name", "/C=US/CN=talker"))
                    .with_child(
                        Element::new("validity")
                            .with_child(leaf("not_before", "2013-06-01T13:00:00"))
                            .with_child(leaf("not_after", "2038-06-01T13:00:00")),
                    )
                    .with_child(leaf("serial_number", serial))
                    .with_child(leaf("issuer_name", "ca")),
            )
    }

    pub(crate) fn ec_params(curve: &str) -> Element {
        Element::new("ec").with_child(leaf("curve", curve))
    }

    #[test]
    fn reads_identities_in_order() {
        let identities = Element::new("identities")
            .with_child(identity("talker", ec_params("SECP256R1"), "1"))
            .with_child(identity(
                "listener",
                Element::new("rsa").with_child(leaf("key_size", "2048")),
                "2",
            ));
        let declarations = parse_identities(&identities).unwrap();
        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[0].name, "talker");
        assert_eq!(
            declarations[0].key.algorithm,
            KeyAlgorithm::Ec {
                curve: EcCurve::P256
            }
        );
        assert_eq!(declarations[0].key.encryption, EncryptionPolicy::NoEncryption);
        assert_eq!(declarations[0].cert.subject_name, "/C=US/CN=talker");
        assert_eq!(declarations[0].cert.issuer_name, "ca");
        assert_eq!(declarations[1].key.algorithm, KeyAlgorithm::Rsa { bits: 2048 });
        assert_eq!(declarations[1].cert.serial_number, 2);
    }

    #[test]
    fn best_available_encryption_needs_password_env() {
        let mut element = identity("talker", ec_params("SECP256R1"), "1");
        let key = element.get_mut(&[0]).unwrap();
        key.get_mut(&[1])
            .unwrap()
            .set_text(Some("BestAvailableEncryption".into()));
        assert!(matches!(
            IdentityDeclaration::from_element(&element),
            Err(IdentityError::MissingElement { ref tag, .. }) if tag == "password_env"
        ));

        element
            .get_mut(&[0])
            .unwrap()
            .push(leaf("password_env", "TALKER_PASSWORD"));
        let declaration = IdentityDeclaration::from_element(&element).unwrap();
        assert_eq!(
            declaration.key.encryption,
            EncryptionPolicy::BestAvailable {
                password_env: "TALKER_PASSWORD".into()
            }
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            IdentityDeclaration::from_element(&identity("talker", ec_params("SECP256R1"), "0")),
            Err(IdentityError::InvalidSerialNumber(_))
        ));
        assert!(matches!(
            IdentityDeclaration::from_element(&identity("talker", ec_params("SECP256R1"), "-4")),
            Err(IdentityError::InvalidSerialNumber(_))
        ));
        assert!(matches!(
            IdentityDeclaration::from_element(&identity("talker", ec_params("SECP521R1"), "1")),
            Err(IdentityError::UnsupportedAlgorithm(_))
        ));
        assert!(matches!(
            IdentityDeclaration::from_element(&identity(
                "talker",
                Element::new("ed25519"),
                "1"
            )),
            Err(IdentityError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn unnamed_identity_is_missing_name() {
        let element = Element::new(IDENTITY);
        assert!(matches!(
            IdentityDeclaration::from_element(&element),
            Err(IdentityError::MissingElement { ref tag, .. }) if tag == "@name"
        ));
    }
}
