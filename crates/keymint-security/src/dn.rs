//! ---
//! km_section: "05-identity-pki"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Distinguished name parsing."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
//! Distinguished name parsing.
//!
//! Subjects are written as `key=value` pairs separated by `/` or `,`, e.g.
//! `/C=US/ST=CA/CN=talker` or `C=US,ST=CA,CN=talker`. Attribute codes are
//! case-insensitive; dotted numeric OIDs are accepted as codes. Attributes
//! may repeat (`OU=Fleet/OU=Security`); each becomes its own RDN.

use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::der::asn1::{Any, ObjectIdentifier, SetOfVec};
use x509_cert::der::Tag;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

use crate::{IdentityError, IdentityResult};

/// Short codes in common use.
const SHORT_CODES: &[(&str, &[u64])] = &[
    ("CN", &[2, 5, 4, 3]),
    ("C", &[2, 5, 4, 6]),
    ("L", &[2, 5, 4, 7]),
    ("ST", &[2, 5, 4, 8]),
    ("O", &[2, 5, 4, 10]),
    ("OU", &[2, 5, 4, 11]),
    ("STREET", &[2, 5, 4, 9]),
    ("DC", &[0, 9, 2342, 19200300, 100, 1, 25]),
    ("UID", &[0, 9, 2342, 19200300, 100, 1, 1]),
];

/// Long attribute names.
const ATTRIBUTE_NAMES: &[(&str, &[u64])] = &[
    ("COMMONNAME", &[2, 5, 4, 3]),
    ("COUNTRYNAME", &[2, 5, 4, 6]),
    ("LOCALITYNAME", &[2, 5, 4, 7]),
    ("STATEORPROVINCENAME", &[2, 5, 4, 8]),
    ("ORGANIZATIONNAME", &[2, 5, 4, 10]),
    ("ORGANIZATIONALUNITNAME", &[2, 5, 4, 11]),
    ("STREETADDRESS", &[2, 5, 4, 9]),
    ("SERIALNUMBER", &[2, 5, 4, 5]),
    ("SN", &[2, 5, 4, 4]),
    ("SURNAME", &[2, 5, 4, 4]),
    ("GN", &[2, 5, 4, 42]),
    ("GIVENNAME", &[2, 5, 4, 42]),
    ("T", &[2, 5, 4, 12]),
    ("TITLE", &[2, 5, 4, 12]),
    ("INITIALS", &[2, 5, 4, 43]),
    ("PSEUDONYM", &[2, 5, 4, 65]),
    ("DNQUALIFIER", &[2, 5, 4, 46]),
    ("POSTALCODE", &[2, 5, 4, 17]),
    ("DOMAINCOMPONENT", &[0, 9, 2342, 19200300, 100, 1, 25]),
    ("USERID", &[0, 9, 2342, 19200300, 100, 1, 1]),
    ("E", &[1, 2, 840, 113549, 1, 9, 1]),
    ("EMAILADDRESS", &[1, 2, 840, 113549, 1, 9, 1]),
];

/// One `code=value` pair of a parsed subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnAttribute {
    /// Attribute OID arcs.
    pub oid: Vec<u64>,
    /// Attribute value as written.
    pub value: String,
}

impl DnAttribute {
    /// OID in dotted notation.
    pub fn dotted_oid(&self) -> String {
        self.oid
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// String type used for the encoded value.
    fn value_tag(&self) -> Tag {
        match self.oid.as_slice() {
            // countryName, serialNumber, dnQualifier
            [2, 5, 4, 6] | [2, 5, 4, 5] | [2, 5, 4, 46] => Tag::PrintableString,
            // emailAddress, domainComponent
            [1, 2, 840, 113549, 1, 9, 1] | [0, 9, 2342, 19200300, 100, 1, 25] => Tag::Ia5String,
            _ => Tag::Utf8String,
        }
    }

    fn to_type_and_value(&self) -> x509_cert::der::Result<AttributeTypeAndValue> {
        Ok(AttributeTypeAndValue {
            oid: ObjectIdentifier::new(&self.dotted_oid())?,
            value: Any::new(self.value_tag(), self.value.as_bytes())?,
        })
    }
}

fn lookup_oid(code: &str) -> Option<Vec<u64>> {
    let upper = code.to_ascii_uppercase();
    SHORT_CODES
        .iter()
        .chain(ATTRIBUTE_NAMES)
        .find(|(name, _)| *name == upper)
        .map(|(_, oid)| oid.to_vec())
        .or_else(|| parse_dotted_oid(code))
}

fn parse_dotted_oid(code: &str) -> Option<Vec<u64>> {
    ObjectIdentifier::new(code).ok()?;
    let arcs = code
        .split('.')
        .map(str::parse::<u64>)
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    (arcs.len() >= 2).then_some(arcs)
}

/// Parse `subject` into its attributes, in the order written.
pub fn parse_distinguished_name(subject: &str) -> IdentityResult<Vec<DnAttribute>> {
    let malformed = |reason: String| IdentityError::MalformedDistinguishedName {
        subject: subject.to_owned(),
        reason,
    };

    let mut attributes: Vec<DnAttribute> = Vec::new();
    for segment in subject.split(['/', ',']) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (code, value) = segment
            .split_once('=')
            .ok_or_else(|| malformed(format!("'{segment}' is not a key=value pair")))?;
        let (code, value) = (code.trim(), value.trim());
        if code.is_empty() {
            return Err(malformed(format!("'{segment}' has an empty attribute code")));
        }
        let oid =
            lookup_oid(code).ok_or_else(|| IdentityError::UnknownDnAttribute(code.to_owned()))?;
        attributes.push(DnAttribute {
            oid,
            value: value.to_owned(),
        });
    }

    if attributes.is_empty() {
        return Err(malformed("no attributes".into()));
    }
    Ok(attributes)
}

/// Encode parsed attributes as an X.509 name, one RDN per attribute, in order.
pub(crate) fn to_name(attributes: &[DnAttribute]) -> IdentityResult<Name> {
    attributes
        .iter()
        .map(|attribute| {
            let entry = attribute.to_type_and_value()?;
            Ok(RelativeDistinguishedName(SetOfVec::try_from(vec![entry])?))
        })
        .collect::<x509_cert::der::Result<Vec<_>>>()
        .map(RdnSequence)
        .map_err(|err| IdentityError::Encoding(err.to_string()))
}
