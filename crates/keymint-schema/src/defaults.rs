//! ---
//! km_section: "03-schema-defaults"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Schema validation capability and defaults repair."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
//! Defaults filling.
//!
//! The filler repairs one issue per validation pass: a missing element is
//! spliced in from the defaults document at the insertion index the validator
//! reported, and an invalid leaf gets the default's text. Any other issue is
//! returned as [`SchemaError::UnrepairableDocument`].

use keymint_logging::{km_debug, LogContext};
use keymint_xml::Element;

use crate::validator::{IssueKind, SchemaValidator, ValidationIssue};
use crate::{SchemaError, SchemaResult};

const DEFAULT_MAX_ITERATIONS: usize = 256;

/// Completes partial documents from a same-schema defaults document.
#[derive(Debug, Clone, Copy)]
pub struct DefaultsFiller {
    max_iterations: usize,
}

impl Default for DefaultsFiller {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITERATIONS)
    }
}

impl DefaultsFiller {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
        }
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Repair `candidate` until it validates against `schema`.
    pub fn fill(
        &self,
        schema: &dyn SchemaValidator,
        candidate: Element,
        defaults: &Element,
    ) -> SchemaResult<Element> {
        let context = LogContext::new().with_stage("defaults");
        let mut document = candidate;

        for iteration in 0..self.max_iterations {
            let issue = match schema.validate(&document) {
                Ok(()) => {
                    km_debug!(
                        context = &context,
                        "{} document complete after {} repair(s)",
                        schema.name(),
                        iteration
                    );
                    return Ok(document);
                }
                Err(issue) => issue,
            };

            let before = document.clone();
            repair(schema.name(), &mut document, defaults, &issue)?;
            if document == before {
                return Err(SchemaError::DefaultsFillLoopDetected {
                    schema: schema.name().to_owned(),
                    location: issue.location,
                    iterations: iteration + 1,
                });
            }
            km_debug!(
                context = &context,
                "{} default applied at {}: {}",
                schema.name(),
                issue.location,
                issue.kind
            );
        }

        match schema.validate(&document) {
            Ok(()) => Ok(document),
            Err(issue) => Err(SchemaError::DefaultsFillLoopDetected {
                schema: schema.name().to_owned(),
                location: issue.location,
                iterations: self.max_iterations,
            }),
        }
    }
}

fn unrepairable(schema: &str, issue: &ValidationIssue, reason: impl Into<String>) -> SchemaError {
    SchemaError::UnrepairableDocument {
        schema: schema.to_owned(),
        location: issue.location.clone(),
        reason: reason.into(),
    }
}

fn repair(
    schema: &str,
    document: &mut Element,
    defaults: &Element,
    issue: &ValidationIssue,
) -> SchemaResult<()> {
    match &issue.kind {
        IssueKind::MissingElement { expected, index } => {
            let parent_tags = owned_tag_path(document, &issue.path)
                .ok_or_else(|| unrepairable(schema, issue, "issue path does not resolve"))?;
            let replacement = expected
                .iter()
                .find_map(|tag| lookup_default(defaults, &parent_tags, tag))
                .cloned()
                .ok_or_else(|| {
                    unrepairable(
                        schema,
                        issue,
                        format!("no default element named '{}'", expected.join("' or '")),
                    )
                })?;
            let parent = document
                .get_mut(&issue.path)
                .ok_or_else(|| unrepairable(schema, issue, "issue path does not resolve"))?;
            parent.insert(*index, replacement);
            Ok(())
        }
        IssueKind::InvalidValue { tag, .. } => {
            let mut parent_tags = owned_tag_path(document, &issue.path)
                .ok_or_else(|| unrepairable(schema, issue, "issue path does not resolve"))?;
            parent_tags.pop();
            let text = lookup_default(defaults, &parent_tags, tag)
                .and_then(Element::text)
                .map(str::to_owned)
                .ok_or_else(|| {
                    unrepairable(schema, issue, format!("no default value for '{tag}'"))
                })?;
            let target = document
                .get_mut(&issue.path)
                .ok_or_else(|| unrepairable(schema, issue, "issue path does not resolve"))?;
            target.set_text(Some(text));
            Ok(())
        }
        other => Err(unrepairable(schema, issue, other.to_string())),
    }
}

fn owned_tag_path(document: &Element, path: &[usize]) -> Option<Vec<String>> {
    document
        .tag_path(path)
        .map(|tags| tags.into_iter().map(str::to_owned).collect())
}

/// Find the default for `tag` under the element at `parent_tags`, falling back
/// to the first same-named element anywhere in `defaults`.
fn lookup_default<'d>(defaults: &'d Element, parent_tags: &[String], tag: &str) -> Option<&'d Element> {
    let scoped = match parent_tags.split_first() {
        Some((root, rest)) if root == defaults.tag() => rest
            .iter()
            .try_fold(defaults, |node, step| node.find(step))
            .and_then(|parent| parent.find(tag)),
        None if defaults.tag() == tag => Some(defaults),
        _ => None,
    };
    scoped.or_else(|| defaults.find_descendant(tag))
}
