//! ---
//! km_section: "04-policy-compilation"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Topic name mapping into the DDS namespace."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---

/// Prefix the middleware applies to application topics.
pub const TOPIC_PREFIX: &str = "rt";
const SEPARATOR: &str = "__";

/// Maps application-level names to wire-level expressions.
pub trait NamespaceMapper {
    fn topic(&self, name: &str) -> String;
}

/// DDS topic naming: `rt` prefix, `/` replaced by `__`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DdsNamespace;

impl NamespaceMapper for DdsNamespace {
    fn topic(&self, name: &str) -> String {
        topic_expression(name)
    }
}

/// `topic_expression("/a/b") == "rt__a__b"`. Total; the input is not validated.
pub fn topic_expression(name: &str) -> String {
    format!("{TOPIC_PREFIX}{}", name.replace('/', SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_hierarchical_names() {
        assert_eq!(topic_expression("/a/b"), "rt__a__b");
        assert_eq!(topic_expression("/chatter"), "rt__chatter");
        assert_eq!(DdsNamespace.topic("/ns/robot/cmd_vel"), "rt__ns__robot__cmd_vel");
    }

    #[test]
    fn edge_inputs_are_total() {
        assert_eq!(topic_expression(""), "rt");
        assert_eq!(topic_expression("chatter"), "rtchatter");
        assert_eq!(topic_expression("//"), "rt____");
    }
}
