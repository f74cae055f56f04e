//! ---
//! km_section: "04-policy-compilation"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Permissions grant compilation."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
//! Permissions compilation.
//!
//! Each grant keeps its name, `subject_name` and `validity`; its rules follow
//! in authored order and the `default` action is moved to the end. Within a
//! rule `domains` comes first, canonical criteria pass through, and
//! `ros_publish`/`ros_subscribe`/`ros_relay` criteria are rewritten into
//! `publish`/`subscribe` containers with mapped topic names.

use std::collections::HashSet;

use keymint_logging::{km_debug, LogContext};
use keymint_xml::Element;

use crate::document::PermissionsDocument;
use crate::error::{CompileError, CompileResult};
use crate::namespace::{DdsNamespace, NamespaceMapper};

const PERMISSIONS_ROOT: &str = "permissions";
const GRANT: &str = "grant";
const DOMAINS: &str = "domains";
const DEFAULT: &str = "default";

/// Rule containers inside a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Allow,
    Deny,
}

impl RuleKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "allow_rule" => Some(RuleKind::Allow),
            "deny_rule" => Some(RuleKind::Deny),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            RuleKind::Allow => "allow_rule",
            RuleKind::Deny => "deny_rule",
        }
    }
}

/// Action kinds a criteria element may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriteriaKind {
    Publish,
    Subscribe,
    Relay,
    RosPublish,
    RosSubscribe,
    RosRelay,
    RosCall,
    RosExecute,
    RosRequest,
    RosReply,
    RosOperate,
    RosRead,
    RosWrite,
}

impl CriteriaKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        let kind = match tag {
            "publish" => CriteriaKind::Publish,
            "subscribe" => CriteriaKind::Subscribe,
            "relay" => CriteriaKind::Relay,
            "ros_publish" => CriteriaKind::RosPublish,
            "ros_subscribe" => CriteriaKind::RosSubscribe,
            "ros_relay" => CriteriaKind::RosRelay,
            "ros_call" => CriteriaKind::RosCall,
            "ros_execute" => CriteriaKind::RosExecute,
            "ros_request" => CriteriaKind::RosRequest,
            "ros_reply" => CriteriaKind::RosReply,
            "ros_operate" => CriteriaKind::RosOperate,
            "ros_read" => CriteriaKind::RosRead,
            "ros_write" => CriteriaKind::RosWrite,
            _ => return None,
        };
        Some(kind)
    }

    /// Already in the DDS vocabulary.
    pub fn is_canonical(self) -> bool {
        matches!(
            self,
            CriteriaKind::Publish | CriteriaKind::Subscribe | CriteriaKind::Relay
        )
    }

    /// Canonical containers produced by rewriting this kind, or `None` when
    /// no rewrite exists for it.
    pub fn canonical_containers(self) -> Option<&'static [&'static str]> {
        match self {
            CriteriaKind::RosPublish => Some(&["publish"]),
            CriteriaKind::RosSubscribe => Some(&["subscribe"]),
            CriteriaKind::RosRelay => Some(&["publish", "subscribe"]),
            _ => None,
        }
    }
}

/// Expression lists carried by criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionListKind {
    Topics,
    Partitions,
    DataTags,
}

impl ExpressionListKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "topics" => Some(ExpressionListKind::Topics),
            "partitions" => Some(ExpressionListKind::Partitions),
            "data_tags" => Some(ExpressionListKind::DataTags),
            _ => None,
        }
    }
}

/// Compiles a `permissions > grant*` manifest into a [`PermissionsDocument`].
#[derive(Debug, Clone, Default)]
pub struct PermissionsCompiler<M = DdsNamespace> {
    mapper: M,
}

impl PermissionsCompiler<DdsNamespace> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M: NamespaceMapper> PermissionsCompiler<M> {
    pub fn with_mapper(mapper: M) -> Self {
        Self { mapper }
    }

    pub fn compile(&self, permissions: &Element) -> CompileResult<PermissionsDocument> {
        if permissions.tag() != PERMISSIONS_ROOT {
            return Err(CompileError::UnexpectedRoot {
                expected: PERMISSIONS_ROOT.into(),
                found: permissions.tag().to_owned(),
            });
        }

        let mut seen = HashSet::new();
        let mut grants = Vec::with_capacity(permissions.children().len());
        for child in permissions.children() {
            if child.tag() != GRANT {
                return Err(CompileError::UnexpectedElement {
                    context: PERMISSIONS_ROOT.into(),
                    tag: child.tag().to_owned(),
                });
            }
            let grant = self.compile_grant(child)?;
            let name = grant.attribute("name").unwrap_or_default().to_owned();
            if !seen.insert(name.clone()) {
                return Err(CompileError::DuplicateGrant(name));
            }
            grants.push(grant);
        }

        Ok(PermissionsDocument::from_entries(grants))
    }

    fn compile_grant(&self, grant: &Element) -> CompileResult<Element> {
        let name = grant
            .attribute("name")
            .ok_or_else(|| CompileError::MissingAttribute {
                context: GRANT.into(),
                name: "name".into(),
            })?;
        let context = format!("grant '{name}'");
        let log_context = LogContext::new()
            .with_subject(name)
            .with_stage("permissions");

        let subject_name = single_child(grant, "subject_name", &context)?;
        let validity = single_child(grant, "validity", &context)?;
        let default = optional_child(grant, DEFAULT, &context)?;

        let mut output = Element::new(GRANT)
            .with_attribute("name", name)
            .with_child(subject_name.clone())
            .with_child(validity.clone());

        for child in grant.children() {
            match child.tag() {
                "subject_name" | "validity" | DEFAULT => continue,
                tag => match RuleKind::from_tag(tag) {
                    Some(kind) => output.push(self.compile_rule(name, kind, child)?),
                    None => {
                        return Err(CompileError::UnsupportedRuleKind {
                            grant: name.to_owned(),
                            tag: tag.to_owned(),
                        })
                    }
                },
            }
        }

        if let Some(default) = default {
            output.push(default.clone());
        }

        km_debug!(
            context = &log_context,
            "compiled grant with {} rule(s)",
            output.children().len() - 2 - usize::from(default.is_some())
        );
        Ok(output)
    }

    fn compile_rule(&self, grant: &str, kind: RuleKind, rule: &Element) -> CompileResult<Element> {
        let context = format!("grant '{grant}' {}", kind.tag());
        let mut output = Element::new(kind.tag());
        if let Some(domains) = optional_child(rule, DOMAINS, &context)? {
            output.push(domains.clone());
        }

        for criteria in rule.children() {
            if criteria.tag() == DOMAINS {
                continue;
            }
            let kind = CriteriaKind::from_tag(criteria.tag()).ok_or_else(|| {
                CompileError::UnsupportedCriteriaKind {
                    grant: grant.to_owned(),
                    tag: criteria.tag().to_owned(),
                }
            })?;
            if kind.is_canonical() {
                output.push(criteria.clone());
            } else {
                output.extend(self.rewrite_criteria(grant, kind, criteria)?);
            }
        }
        Ok(output)
    }

    fn rewrite_criteria(
        &self,
        grant: &str,
        kind: CriteriaKind,
        criteria: &Element,
    ) -> CompileResult<Vec<Element>> {
        let containers =
            kind.canonical_containers()
                .ok_or_else(|| CompileError::UnsupportedCriteriaKind {
                    grant: grant.to_owned(),
                    tag: criteria.tag().to_owned(),
                })?;
        let mut outputs: Vec<Element> = containers.iter().map(|tag| Element::new(*tag)).collect();

        for list in criteria.children() {
            let list_kind = ExpressionListKind::from_tag(list.tag()).ok_or_else(|| {
                CompileError::UnsupportedExpressionKind {
                    grant: grant.to_owned(),
                    tag: list.tag().to_owned(),
                }
            })?;
            let rewritten = match list_kind {
                ExpressionListKind::Topics => self.map_topics(grant, list)?,
                ExpressionListKind::Partitions | ExpressionListKind::DataTags => list.clone(),
            };
            for output in &mut outputs {
                output.push(rewritten.clone());
            }
        }
        Ok(outputs)
    }

    fn map_topics(&self, grant: &str, topics: &Element) -> CompileResult<Element> {
        let mut output = Element::new("topics");
        for expression in topics.children() {
            if expression.tag() != "topic" {
                return Err(CompileError::UnsupportedExpressionKind {
                    grant: grant.to_owned(),
                    tag: expression.tag().to_owned(),
                });
            }
            let name = expression.text().map(str::trim).unwrap_or_default();
            output.push(Element::new("topic").with_text(self.mapper.topic(name)));
        }
        Ok(output)
    }
}

fn optional_child<'a>(
    parent: &'a Element,
    tag: &'a str,
    context: &str,
) -> CompileResult<Option<&'a Element>> {
    let mut matches = parent.find_all(tag);
    let first = matches.next();
    if matches.next().is_some() {
        return Err(CompileError::DuplicateElement {
            context: context.to_owned(),
            tag: tag.to_owned(),
        });
    }
    Ok(first)
}

fn single_child<'a>(parent: &'a Element, tag: &'a str, context: &str) -> CompileResult<&'a Element> {
    optional_child(parent, tag, context)?.ok_or_else(|| CompileError::MissingElement {
        context: context.to_owned(),
        tag: tag.to_owned(),
    })
}
