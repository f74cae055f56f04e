//! ---
//! km_section: "04-policy-compilation"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Governance domain rule compilation."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
//! Governance compilation.
//!
//! Every `domain_rule` keeps its own elements in order and must carry exactly
//! one `topic_access_rules`. Inside it, `topic_rule` entries pass through with
//! application topic names mapped into the DDS namespace, and
//! `ros_topic_rule` is rewritten into a `topic_rule`. Service, action and
//! parameter rules have no mapping yet and fail the compile.

use keymint_logging::{km_debug, LogContext};
use keymint_xml::Element;

use crate::document::GovernanceDocument;
use crate::error::{CompileError, CompileResult};
use crate::namespace::{DdsNamespace, NamespaceMapper};

const GOVERNANCE_ROOT: &str = "domain_access_rules";
const DOMAIN_RULE: &str = "domain_rule";
const TOPIC_ACCESS_RULES: &str = "topic_access_rules";
const TOPIC_EXPRESSION: &str = "topic_expression";

/// Access rule kinds accepted under `topic_access_rules`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRuleKind {
    TopicRule,
    RosTopicRule,
    RosServiceRule,
    RosActionRule,
    RosParameterRule,
}

impl AccessRuleKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "topic_rule" => Some(AccessRuleKind::TopicRule),
            "ros_topic_rule" => Some(AccessRuleKind::RosTopicRule),
            "ros_service_rule" => Some(AccessRuleKind::RosServiceRule),
            "ros_action_rule" => Some(AccessRuleKind::RosActionRule),
            "ros_parameter_rule" => Some(AccessRuleKind::RosParameterRule),
            _ => None,
        }
    }
}

/// Compiles a `domain_access_rules > domain_rule*` manifest into a
/// [`GovernanceDocument`].
#[derive(Debug, Clone, Default)]
pub struct GovernanceCompiler<M = DdsNamespace> {
    mapper: M,
}

impl GovernanceCompiler<DdsNamespace> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M: NamespaceMapper> GovernanceCompiler<M> {
    pub fn with_mapper(mapper: M) -> Self {
        Self { mapper }
    }

    pub fn compile(&self, governance: &Element) -> CompileResult<GovernanceDocument> {
        if governance.tag() != GOVERNANCE_ROOT {
            return Err(CompileError::UnexpectedRoot {
                expected: GOVERNANCE_ROOT.into(),
                found: governance.tag().to_owned(),
            });
        }

        let mut rules = Vec::with_capacity(governance.children().len());
        for (index, child) in governance.children().iter().enumerate() {
            if child.tag() != DOMAIN_RULE {
                return Err(CompileError::UnexpectedElement {
                    context: GOVERNANCE_ROOT.into(),
                    tag: child.tag().to_owned(),
                });
            }
            rules.push(self.compile_domain_rule(index, child)?);
        }
        Ok(GovernanceDocument::from_entries(rules))
    }

    fn compile_domain_rule(&self, index: usize, rule: &Element) -> CompileResult<Element> {
        let context = format!("{DOMAIN_RULE}[{index}]");
        let mut access_rules = None;
        let mut output = Element::new(DOMAIN_RULE);

        for child in rule.children() {
            if child.tag() != TOPIC_ACCESS_RULES {
                output.push(child.clone());
                continue;
            }
            if access_rules.is_some() {
                return Err(CompileError::DuplicateElement {
                    context,
                    tag: TOPIC_ACCESS_RULES.into(),
                });
            }
            access_rules = Some(child);
        }

        let access_rules = access_rules.ok_or_else(|| CompileError::MissingElement {
            context: context.clone(),
            tag: TOPIC_ACCESS_RULES.into(),
        })?;

        let mut compiled = Element::new(TOPIC_ACCESS_RULES);
        for access_rule in access_rules.children() {
            compiled.push(self.compile_access_rule(&context, access_rule)?);
        }

        let log_context = LogContext::new().with_stage("governance");
        km_debug!(
            context = &log_context,
            "{context} compiled with {} topic rule(s)",
            compiled.children().len()
        );
        output.push(compiled);
        Ok(output)
    }

    fn compile_access_rule(&self, context: &str, rule: &Element) -> CompileResult<Element> {
        let unsupported = || CompileError::UnsupportedAccessRuleKind {
            domain_rule: context.to_owned(),
            tag: rule.tag().to_owned(),
        };
        match AccessRuleKind::from_tag(rule.tag()).ok_or_else(unsupported)? {
            AccessRuleKind::TopicRule => Ok(self.map_canonical_topic_rule(rule)),
            AccessRuleKind::RosTopicRule => self.rewrite_ros_topic_rule(context, rule),
            AccessRuleKind::RosServiceRule
            | AccessRuleKind::RosActionRule
            | AccessRuleKind::RosParameterRule => Err(unsupported()),
        }
    }

    /// Canonical rules pass through unchanged unless their expression is an
    /// application name (leading `/`), which is mapped in place.
    fn map_canonical_topic_rule(&self, rule: &Element) -> Element {
        let mut output = rule.clone();
        for (index, expression) in rule.children().iter().enumerate() {
            if expression.tag() != TOPIC_EXPRESSION {
                continue;
            }
            let Some(name) = expression.text().map(str::trim) else {
                continue;
            };
            if name.starts_with('/') {
                if let Some(target) = output.get_mut(&[index]) {
                    target.set_text(Some(self.mapper.topic(name)));
                }
            }
        }
        output
    }

    fn rewrite_ros_topic_rule(&self, context: &str, rule: &Element) -> CompileResult<Element> {
        let expression = rule
            .find(TOPIC_EXPRESSION)
            .ok_or_else(|| CompileError::MissingElement {
                context: format!("{context} ros_topic_rule"),
                tag: TOPIC_EXPRESSION.into(),
            })?;
        let name = expression.text().map(str::trim).unwrap_or_default();

        let mut output = Element::new("topic_rule")
            .with_child(Element::new(TOPIC_EXPRESSION).with_text(self.mapper.topic(name)));
        output.extend(
            rule.children()
                .iter()
                .filter(|child| child.tag() != TOPIC_EXPRESSION)
                .cloned(),
        );
        Ok(output)
    }
}
