//! ---
//! km_section: "03-schema-defaults"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Schema validation capability and defaults repair."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
//! Built-in schemas.
//!
//! The `keyage_*` schemas describe manifest fragments as authors write them,
//! using the application vocabulary (`ros_publish`, `ros_topic_rule`, ...).
//! The `dds_*` schemas describe the artifacts handed to the middleware
//! security plugin and only admit the canonical vocabulary.

use crate::content::{ContentModel, ContentSchema, ContentSchemaBuilder, Particle, TextType};

pub const KEYAGE_PERMISSIONS: &str = "keyage/permissions";
pub const KEYAGE_GOVERNANCE: &str = "keyage/governance";
pub const KEYAGE_IDENTITIES: &str = "keyage/identities";
pub const DDS_PERMISSIONS: &str = "dds/permissions";
pub const DDS_GOVERNANCE: &str = "dds/governance";

/// Criteria tags already in the canonical vocabulary.
pub const CANONICAL_CRITERIA: &[&str] = &["publish", "subscribe", "relay"];

/// Criteria tags accepted in permissions manifests.
pub const MANIFEST_CRITERIA: &[&str] = &[
    "publish",
    "subscribe",
    "relay",
    "ros_publish",
    "ros_subscribe",
    "ros_relay",
    "ros_call",
    "ros_execute",
    "ros_request",
    "ros_reply",
    "ros_operate",
    "ros_read",
    "ros_write",
];

/// Access rule tags accepted in governance manifests.
pub const MANIFEST_ACCESS_RULES: &[&str] = &[
    "topic_rule",
    "ros_topic_rule",
    "ros_service_rule",
    "ros_action_rule",
    "ros_parameter_rule",
];

const PROTECTION_KINDS: &[&str] = &[
    "NONE",
    "SIGN",
    "ENCRYPT",
    "SIGN_WITH_ORIGIN_AUTHENTICATION",
    "ENCRYPT_WITH_ORIGIN_AUTHENTICATION",
];

const BASIC_PROTECTION_KINDS: &[&str] = &["NONE", "SIGN", "ENCRYPT"];

const TOPIC_RULE_FIELDS: &[&str] = &[
    "topic_expression",
    "enable_discovery_protection",
    "enable_liveliness_protection",
    "enable_read_access_control",
    "enable_write_access_control",
    "metadata_protection_kind",
    "data_protection_kind",
];

fn required_sequence(tags: &[&str]) -> ContentModel {
    ContentModel::sequence(tags.iter().map(|tag| Particle::required(tag)))
}

fn validity(builder: ContentSchemaBuilder) -> ContentSchemaBuilder {
    builder
        .text("subject_name", TextType::String)
        .element("validity", required_sequence(&["not_before", "not_after"]))
        .texts(&["not_before", "not_after"], TextType::DateTime)
}

fn domains(builder: ContentSchemaBuilder) -> ContentSchemaBuilder {
    builder
        .element(
            "domains",
            ContentModel::sequence([Particle::new(["id", "id_range"], 1, None)]),
        )
        .text("id", TextType::Integer)
        .element(
            "id_range",
            ContentModel::sequence([Particle::required("min"), Particle::optional("max")]),
        )
        .texts(&["min", "max"], TextType::Integer)
}

fn expression_lists(builder: ContentSchemaBuilder) -> ContentSchemaBuilder {
    builder
        .element("topics", ContentModel::sequence([Particle::one_or_more("topic")]))
        .text("topic", TextType::String)
        .element(
            "partitions",
            ContentModel::sequence([Particle::one_or_more("partition")]),
        )
        .text("partition", TextType::String)
        .element("data_tags", ContentModel::sequence([Particle::one_or_more("tag")]))
        .element("tag", required_sequence(&["name", "value"]))
        .texts(&["name", "value"], TextType::String)
}

fn topic_rule_fields(builder: ContentSchemaBuilder) -> ContentSchemaBuilder {
    builder
        .text("topic_expression", TextType::String)
        .texts(
            &[
                "enable_discovery_protection",
                "enable_liveliness_protection",
                "enable_read_access_control",
                "enable_write_access_control",
            ],
            TextType::Boolean,
        )
        .text(
            "metadata_protection_kind",
            TextType::enumeration(PROTECTION_KINDS.iter().copied()),
        )
        .text(
            "data_protection_kind",
            TextType::enumeration(BASIC_PROTECTION_KINDS.iter().copied()),
        )
}

fn domain_rule(builder: ContentSchemaBuilder) -> ContentSchemaBuilder {
    builder
        .element(
            "domain_rule",
            required_sequence(&[
                "domains",
                "allow_unauthenticated_participants",
                "enable_join_access_control",
                "discovery_protection_kind",
                "liveliness_protection_kind",
                "rtps_protection_kind",
                "topic_access_rules",
            ]),
        )
        .texts(
            &["allow_unauthenticated_participants", "enable_join_access_control"],
            TextType::Boolean,
        )
        .texts(
            &[
                "discovery_protection_kind",
                "liveliness_protection_kind",
                "rtps_protection_kind",
            ],
            TextType::enumeration(PROTECTION_KINDS.iter().copied()),
        )
}

/// Permissions manifest fragment: root `permissions`, children `grant`.
pub fn keyage_permissions() -> ContentSchema {
    let mut builder = ContentSchema::builder(KEYAGE_PERMISSIONS, "permissions")
        .element("permissions", ContentModel::sequence([Particle::one_or_more("grant")]))
        .element_with_attributes(
            "grant",
            &["name"],
            ContentModel::sequence([
                Particle::required("subject_name"),
                Particle::required("validity"),
                Particle::any_of(&["allow_rule", "deny_rule", "default"]),
            ]),
        )
        .text("default", TextType::enumeration(["ALLOW", "DENY"]));
    for rule in ["allow_rule", "deny_rule"] {
        builder = builder.element(
            rule,
            ContentModel::sequence([
                Particle::optional("domains"),
                Particle::any_of(MANIFEST_CRITERIA),
            ]),
        );
    }
    for criteria in MANIFEST_CRITERIA {
        builder = builder.element(
            criteria,
            ContentModel::sequence([Particle::any_of(&["topics", "partitions", "data_tags"])]),
        );
    }
    expression_lists(domains(validity(builder))).build()
}

/// Governance manifest fragment: root `domain_access_rules`, children `domain_rule`.
pub fn keyage_governance() -> ContentSchema {
    let builder = ContentSchema::builder(KEYAGE_GOVERNANCE, "domain_access_rules")
        .element(
            "domain_access_rules",
            ContentModel::sequence([Particle::one_or_more("domain_rule")]),
        )
        .element(
            "topic_access_rules",
            ContentModel::sequence([Particle::any_of(MANIFEST_ACCESS_RULES)]),
        )
        .element("topic_rule", required_sequence(TOPIC_RULE_FIELDS))
        .element("ros_topic_rule", required_sequence(TOPIC_RULE_FIELDS))
        .element("ros_service_rule", ContentModel::Any)
        .element("ros_action_rule", ContentModel::Any)
        .element("ros_parameter_rule", ContentModel::Any);
    topic_rule_fields(domains(domain_rule(builder))).build()
}

/// Identities manifest fragment: root `identities`, children `identity`.
pub fn keyage_identities() -> ContentSchema {
    let builder = ContentSchema::builder(KEYAGE_IDENTITIES, "identities")
        .element(
            "identities",
            ContentModel::sequence([Particle::one_or_more("identity")]),
        )
        .element_with_attributes("identity", &["name"], required_sequence(&["key", "cert"]))
        .element(
            "key",
            ContentModel::sequence([
                Particle::required("asymmetric_type"),
                Particle::required("encryption_algorithm"),
                Particle::optional("password_env"),
            ]),
        )
        .element(
            "asymmetric_type",
            ContentModel::sequence([Particle::one_of(&["rsa", "dsa", "ec"])]),
        )
        .element("rsa", required_sequence(&["key_size"]))
        .element("dsa", required_sequence(&["key_size"]))
        .element("ec", required_sequence(&["curve"]))
        .text("key_size", TextType::Integer)
        .text("curve", TextType::enumeration(["SECP256R1", "SECP384R1"]))
        .text(
            "encryption_algorithm",
            TextType::enumeration(["NoEncryption", "BestAvailableEncryption"]),
        )
        .text("password_env", TextType::String)
        .element(
            "cert",
            required_sequence(&[
                "hash_algorithm",
                "subject_name",
                "validity",
                "serial_number",
                "issuer_name",
            ]),
        )
        .text(
            "hash_algorithm",
            TextType::enumeration(["SHA256", "SHA384", "SHA512"]),
        )
        .text("serial_number", TextType::Integer)
        .text("issuer_name", TextType::String);
    validity(builder).build()
}

/// Compiled permissions artifact: `dds > permissions > grant*`.
pub fn dds_permissions() -> ContentSchema {
    let mut builder = ContentSchema::builder(DDS_PERMISSIONS, "dds")
        .element("dds", required_sequence(&["permissions"]))
        .element("permissions", ContentModel::sequence([Particle::one_or_more("grant")]))
        .element_with_attributes(
            "grant",
            &["name"],
            ContentModel::sequence([
                Particle::required("subject_name"),
                Particle::required("validity"),
                Particle::any_of(&["allow_rule", "deny_rule"]),
                Particle::required("default"),
            ]),
        )
        .text("default", TextType::enumeration(["ALLOW", "DENY"]));
    for rule in ["allow_rule", "deny_rule"] {
        builder = builder.element(
            rule,
            ContentModel::sequence([
                Particle::required("domains"),
                Particle::any_of(CANONICAL_CRITERIA),
            ]),
        );
    }
    for criteria in CANONICAL_CRITERIA {
        builder = builder.element(
            criteria,
            ContentModel::sequence([
                Particle::required("topics"),
                Particle::optional("partitions"),
                Particle::optional("data_tags"),
            ]),
        );
    }
    expression_lists(domains(validity(builder))).build()
}

/// Compiled governance artifact: `dds > domain_access_rules > domain_rule*`.
pub fn dds_governance() -> ContentSchema {
    let builder = ContentSchema::builder(DDS_GOVERNANCE, "dds")
        .element("dds", required_sequence(&["domain_access_rules"]))
        .element(
            "domain_access_rules",
            ContentModel::sequence([Particle::one_or_more("domain_rule")]),
        )
        .element(
            "topic_access_rules",
            ContentModel::sequence([Particle::any_of(&["topic_rule"])]),
        )
        .element("topic_rule", required_sequence(TOPIC_RULE_FIELDS));
    topic_rule_fields(domains(domain_rule(builder))).build()
}
