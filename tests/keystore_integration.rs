//! ---
//! km_section: "15-testing-qa-runbook"
//! km_subsection: "integration-tests"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "End-to-end keystore builds from manifest XML."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
mod common;

use std::sync::Arc;

use common::{identity_xml, write_ec_ca, CA_SUBJECT, EC_P256};
use keymint_common::KeymintConfig;
use keymint_core::{KeymintError, KeystoreBuilder, ManifestBundle, ManifestFragment};
use keymint_schema::SchemaError;
use keymint_security::{IdentityError, IssuanceMetrics};
use keymint_xml::Element;
use tempfile::tempdir;
use x509_parser::pem::parse_x509_pem;

const PERMISSIONS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<permissions>
  <grant name="talker">
    <subject_name>CN=talker</subject_name>
    <validity>
      <not_before>2013-06-01T13:00:00</not_before>
      <not_after>2038-06-01T13:00:00</not_after>
    </validity>
    <allow_rule>
      <domains><id>0</id></domains>
      <ros_publish><topics><topic>/chatter</topic></topics></ros_publish>
    </allow_rule>
    <default>DENY</default>
  </grant>
</permissions>
"#;

/// Partial grant: subject and validity come from the defaults document.
const PARTIAL_PERMISSIONS: &str = r#"
<permissions>
  <grant name="listener">
    <allow_rule>
      <domains><id>0</id></domains>
      <ros_subscribe><topics><topic>/chatter</topic></topics></ros_subscribe>
    </allow_rule>
    <default>DENY</default>
  </grant>
</permissions>
"#;

const PERMISSIONS_DEFAULTS: &str = r#"
<permissions>
  <grant name="default">
    <subject_name>CN=default</subject_name>
    <validity>
      <not_before>2013-06-01T13:00:00</not_before>
      <not_after>2038-06-01T13:00:00</not_after>
    </validity>
    <default>DENY</default>
  </grant>
</permissions>
"#;

const GOVERNANCE: &str = r#"
<domain_access_rules>
  <domain_rule>
    <domains><id>0</id></domains>
    <allow_unauthenticated_participants>false</allow_unauthenticated_participants>
    <enable_join_access_control>true</enable_join_access_control>
    <discovery_protection_kind>ENCRYPT</discovery_protection_kind>
    <liveliness_protection_kind>ENCRYPT</liveliness_protection_kind>
    <rtps_protection_kind>SIGN</rtps_protection_kind>
    <topic_access_rules>
      <topic_rule>
        <topic_expression>/chatter</topic_expression>
        <enable_discovery_protection>true</enable_discovery_protection>
        <enable_liveliness_protection>true</enable_liveliness_protection>
        <enable_read_access_control>true</enable_read_access_control>
        <enable_write_access_control>true</enable_write_access_control>
        <metadata_protection_kind>ENCRYPT</metadata_protection_kind>
        <data_protection_kind>ENCRYPT</data_protection_kind>
      </topic_rule>
    </topic_access_rules>
  </domain_rule>
</domain_access_rules>
"#;

fn builder_for(dir: &std::path::Path) -> KeystoreBuilder {
    let context = write_ec_ca(dir, "ca");
    let mut config: KeymintConfig = "[defaults]\nmax_iterations = 32\n".parse().unwrap();
    config.keystore.private_space = context.private_space().to_path_buf();
    config.keystore.public_space = context.public_space().to_path_buf();
    KeystoreBuilder::from_config(&config)
}

#[test]
fn manifest_builds_all_artifacts() {
    let dir = tempdir().unwrap();
    let registry = Arc::new(prometheus::Registry::new());
    let builder =
        builder_for(dir.path()).with_metrics(IssuanceMetrics::new(registry.clone()).unwrap());

    let identities = format!(
        "<identities>{}</identities>",
        identity_xml("talker", EC_P256, "SHA256", "/C=US/CN=talker", 11)
    );
    let bundle = ManifestBundle::new()
        .with_permissions(ManifestFragment::parse("talker.permissions.xml", PERMISSIONS, None).unwrap())
        .with_permissions(
            ManifestFragment::parse(
                "listener.permissions.xml",
                PARTIAL_PERMISSIONS,
                Some(PERMISSIONS_DEFAULTS),
            )
            .unwrap(),
        )
        .with_governance(ManifestFragment::parse("governance.xml", GOVERNANCE, None).unwrap())
        .with_identities(ManifestFragment::parse("identities.xml", &identities, None).unwrap());

    let artifacts = builder.build(&bundle).unwrap();

    let permissions_xml = artifacts.permissions_xml().unwrap().unwrap();
    let permissions: Element = permissions_xml.parse().unwrap();
    let grants: Vec<&Element> = permissions
        .find_path("permissions")
        .unwrap()
        .find_all("grant")
        .collect();
    assert_eq!(grants.len(), 2);
    assert_eq!(grants[0].attribute("name"), Some("talker"));
    assert_eq!(grants[1].child_text("subject_name"), Some("CN=default"));
    assert_eq!(
        grants[1].find_path("allow_rule/subscribe/topics/topic").and_then(Element::text),
        Some("rt__chatter")
    );
    assert_eq!(grants[1].children().last().map(Element::tag), Some("default"));

    let governance_xml = artifacts.governance_xml().unwrap().unwrap();
    assert!(governance_xml.contains("<topic_expression>rt__chatter</topic_expression>"));
    assert!(governance_xml.contains("<rtps_protection_kind>SIGN</rtps_protection_kind>"));
    assert!(governance_xml.ends_with('\n'));

    assert_eq!(artifacts.identities.len(), 1);
    let identity = &artifacts.identities[0];
    assert_eq!(identity.name, "talker");
    let (_, pem) = parse_x509_pem(identity.certificate.pem.as_bytes()).unwrap();
    let certificate = pem.parse_x509().unwrap();
    assert_eq!(certificate.issuer().to_string(), format!("CN={CA_SUBJECT}"));
    assert_eq!(certificate.subject().to_string(), "C=US, CN=talker");
    assert_eq!(certificate.tbs_certificate.serial.to_string(), "11");
    assert_eq!(registry.gather().len(), 3);
}

#[test]
fn incomplete_fragment_without_defaults_is_rejected_with_file_name() {
    let dir = tempdir().unwrap();
    let bundle = ManifestBundle::new().with_permissions(
        ManifestFragment::parse("listener.permissions.xml", PARTIAL_PERMISSIONS, None).unwrap(),
    );
    let err = builder_for(dir.path()).build(&bundle).unwrap_err();
    match err {
        KeymintError::Schema(SchemaError::ValidationFailed {
            document,
            location,
            expected,
            ..
        }) => {
            assert_eq!(document, "listener.permissions.xml");
            assert_eq!(location, "/permissions/grant[0]");
            assert_eq!(expected, ["subject_name"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn failing_identity_aborts_the_build() {
    let dir = tempdir().unwrap();
    let identities = format!(
        "<identities>{}</identities>",
        identity_xml("talker", EC_P256, "SHA256", "CN=talker", 1).replace(
            "<issuer_name>ca</issuer_name>",
            "<issuer_name>missing</issuer_name>"
        )
    );
    let bundle = ManifestBundle::new()
        .with_permissions(ManifestFragment::parse("talker.permissions.xml", PERMISSIONS, None).unwrap())
        .with_identities(ManifestFragment::parse("identities.xml", &identities, None).unwrap());
    let err = builder_for(dir.path()).build(&bundle).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("'talker'"), "{message}");
    assert!(message.contains("'identities.xml'"), "{message}");
    match err {
        KeymintError::Identity {
            source_name,
            identity,
            source: IdentityError::CaNotFound { issuer, .. },
        } => {
            assert_eq!(source_name, "identities.xml");
            assert_eq!(identity, "talker");
            assert_eq!(issuer, "missing");
        }
        other => panic!("unexpected error: {other}"),
    }
}
