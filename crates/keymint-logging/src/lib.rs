//! ---
//! km_section: "06-persistence-logging"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Structured logging adapters for the keystore pipeline."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Context-enriched logging for keymint stages.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

#[doc(hidden)]
pub use tracing;

/// Initialize a baseline tracing subscriber suitable for development and tests.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer())
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Manifest (or fragment file) being processed.
    pub manifest: Option<&'a str>,
    /// Fragment kind: permissions, governance, identities.
    pub fragment: Option<&'a str>,
    /// Grant, domain rule, or identity name.
    pub subject: Option<&'a str>,
    /// Pipeline stage (validate, fill, compile, issue, ...).
    pub stage: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a manifest name.
    pub fn with_manifest(mut self, manifest: &'a str) -> Self {
        self.manifest = Some(manifest);
        self
    }

    /// Attach a fragment kind.
    pub fn with_fragment(mut self, fragment: &'a str) -> Self {
        self.fragment = Some(fragment);
        self
    }

    /// Attach a grant / domain rule / identity name.
    pub fn with_subject(mut self, subject: &'a str) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Attach a pipeline stage.
    pub fn with_stage(mut self, stage: &'a str) -> Self {
        self.stage = Some(stage);
        self
    }
}

/// Outcome recorded for a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage completed.
    Success,
    /// The stage failed; the error is returned to the caller.
    Fault,
}

impl StageOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            StageOutcome::Success => "success",
            StageOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized stage event with a success/fault outcome.
pub fn log_stage_event(context: Option<&LogContext>, event: &str, message: &str, outcome: StageOutcome) {
    let ctx = context.cloned().unwrap_or_default();
    match outcome {
        StageOutcome::Success => tracing::info!(
            event,
            outcome = outcome.as_str(),
            manifest = ctx.manifest.unwrap_or(""),
            fragment = ctx.fragment.unwrap_or(""),
            subject = ctx.subject.unwrap_or(""),
            stage = ctx.stage.unwrap_or(""),
            message = %message
        ),
        StageOutcome::Fault => tracing::error!(
            event,
            outcome = outcome.as_str(),
            manifest = ctx.manifest.unwrap_or(""),
            fragment = ctx.fragment.unwrap_or(""),
            subject = ctx.subject.unwrap_or(""),
            stage = ctx.stage.unwrap_or(""),
            message = %message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_emit_without_panic() {
        init();
        let ctx = LogContext::new()
            .with_manifest("keyage.xml")
            .with_subject("talker");
        km_info!(context = ctx.clone(), "grant compiled");
        km_debug!("debug message");
        km_warn!(context = ctx.clone(), "defaults applied: {}", 2);
        km_error!(context = ctx, "error code: {}", 42);
    }

    #[test]
    fn stage_event_helper_emits() {
        init();
        let ctx = LogContext::new().with_stage("compile");
        log_stage_event(Some(&ctx), "policy.compile", "permissions compiled", StageOutcome::Success);
        log_stage_event(None, "policy.compile", "permissions rejected", StageOutcome::Fault);
    }
}
