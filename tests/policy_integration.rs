//! ---
//! km_section: "15-testing-qa-runbook"
//! km_subsection: "integration-tests"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Policy compilation against parsed manifest XML."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
use keymint_policy::{
    topic_expression, CompileError, GovernanceCompiler, NamespaceMapper, PermissionsCompiler,
};
use keymint_schema::{builtin, SchemaValidator};
use keymint_xml::Element;

const TALKER_PERMISSIONS: &str = r#"
<permissions>
  <grant name="talker">
    <subject_name>CN=talker</subject_name>
    <validity>
      <not_before>2013-06-01T13:00:00</not_before>
      <not_after>2038-06-01T13:00:00</not_after>
    </validity>
    <default>DENY</default>
    <allow_rule>
      <domains><id>0</id></domains>
      <ros_relay>
        <topics><topic>/chatter</topic><topic>/rosout</topic></topics>
        <partitions><partition>p</partition></partitions>
      </ros_relay>
      <subscribe>
        <topics><topic>rt__parameter_events</topic></topics>
      </subscribe>
    </allow_rule>
  </grant>
</permissions>
"#;

fn texts<'a>(element: &'a Element, tag: &'a str) -> Vec<&'a str> {
    element.find_all(tag).filter_map(Element::text).collect()
}

#[test]
fn permissions_manifest_compiles_to_dds_vocabulary() {
    let manifest: Element = TALKER_PERMISSIONS.parse().unwrap();
    assert!(builtin::keyage_permissions().is_valid(&manifest));

    let document = PermissionsCompiler::new().compile(&manifest).unwrap();
    assert_eq!(builtin::dds_permissions().validate(document.root()), Ok(()));

    let grant = document.entries().next().unwrap();
    let tags: Vec<&str> = grant.children().iter().map(Element::tag).collect();
    assert_eq!(tags, ["subject_name", "validity", "allow_rule", "default"]);

    let rule = grant.find("allow_rule").unwrap();
    let criteria: Vec<&str> = rule.children().iter().map(Element::tag).collect();
    assert_eq!(criteria, ["domains", "publish", "subscribe", "subscribe"]);

    let publish = rule.find("publish").unwrap();
    assert_eq!(
        texts(publish.find("topics").unwrap(), "topic"),
        ["rt__chatter", "rt__rosout"]
    );
    assert_eq!(
        texts(publish.find("partitions").unwrap(), "partition"),
        ["p"]
    );
    let relayed_subscribe = &rule.children()[2];
    assert_eq!(relayed_subscribe.find("partitions"), publish.find("partitions"));
    let canonical_subscribe = &rule.children()[3];
    assert_eq!(
        texts(canonical_subscribe.find("topics").unwrap(), "topic"),
        ["rt__parameter_events"]
    );

    let xml = document.to_xml().unwrap();
    assert!(xml.starts_with("<?xml"));
    assert!(xml.ends_with("</dds>\n"));
    assert!(xml.contains("\n  <permissions>\n"));
}

#[test]
fn unsupported_criteria_produce_no_document() {
    let manifest: Element = TALKER_PERMISSIONS
        .replace("ros_relay", "ros_call")
        .parse()
        .unwrap();
    let err = PermissionsCompiler::new().compile(&manifest).unwrap_err();
    assert_eq!(
        err,
        CompileError::UnsupportedCriteriaKind {
            grant: "talker".into(),
            tag: "ros_call".into(),
        }
    );
}

#[test]
fn governance_maps_application_topics_only() {
    let manifest: Element = r#"
<domain_access_rules>
  <domain_rule>
    <domains><id_range><min>0</min><max>10</max></id_range></domains>
    <allow_unauthenticated_participants>false</allow_unauthenticated_participants>
    <enable_join_access_control>true</enable_join_access_control>
    <discovery_protection_kind>ENCRYPT</discovery_protection_kind>
    <liveliness_protection_kind>SIGN</liveliness_protection_kind>
    <rtps_protection_kind>NONE</rtps_protection_kind>
    <topic_access_rules>
      <ros_topic_rule>
        <topic_expression>/chatter</topic_expression>
        <enable_discovery_protection>true</enable_discovery_protection>
        <enable_liveliness_protection>false</enable_liveliness_protection>
        <enable_read_access_control>true</enable_read_access_control>
        <enable_write_access_control>true</enable_write_access_control>
        <metadata_protection_kind>ENCRYPT</metadata_protection_kind>
        <data_protection_kind>ENCRYPT</data_protection_kind>
      </ros_topic_rule>
      <topic_rule>
        <topic_expression>*</topic_expression>
        <enable_discovery_protection>true</enable_discovery_protection>
        <enable_liveliness_protection>false</enable_liveliness_protection>
        <enable_read_access_control>true</enable_read_access_control>
        <enable_write_access_control>true</enable_write_access_control>
        <metadata_protection_kind>NONE</metadata_protection_kind>
        <data_protection_kind>NONE</data_protection_kind>
      </topic_rule>
    </topic_access_rules>
  </domain_rule>
</domain_access_rules>
"#
    .parse()
    .unwrap();
    assert!(builtin::keyage_governance().is_valid(&manifest));

    let document = GovernanceCompiler::new().compile(&manifest).unwrap();
    assert_eq!(builtin::dds_governance().validate(document.root()), Ok(()));

    let rule = document.entries().next().unwrap();
    let source = manifest.find("domain_rule").unwrap();
    assert_eq!(rule.find("domains"), source.find("domains"));

    let expressions: Vec<&str> = rule
        .find_path("topic_access_rules")
        .unwrap()
        .find_all("topic_rule")
        .filter_map(|topic_rule| topic_rule.child_text("topic_expression"))
        .collect();
    assert_eq!(expressions, ["rt__chatter", "*"]);
}

#[test]
fn custom_mapper_is_used_for_topics() {
    #[derive(Clone, Copy)]
    struct Upper;

    impl NamespaceMapper for Upper {
        fn topic(&self, name: &str) -> String {
            name.trim_start_matches('/').to_uppercase()
        }
    }

    let manifest: Element = TALKER_PERMISSIONS.parse().unwrap();
    let document = PermissionsCompiler::with_mapper(Upper).compile(&manifest).unwrap();
    let publish = document
        .entries()
        .next()
        .and_then(|grant| grant.find_path("allow_rule/publish/topics"))
        .unwrap();
    assert_eq!(texts(publish, "topic"), ["CHATTER", "ROSOUT"]);
    assert_eq!(topic_expression("/a/b"), "rt__a__b");
}
