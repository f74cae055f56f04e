//! ---
//! km_section: "06-persistence-logging"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Structured logging adapters for the keystore pipeline."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
#[doc(hidden)]
#[macro_export]
macro_rules! __km_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        $crate::tracing::event!(
            $level,
            manifest = ctx.manifest.unwrap_or(""),
            fragment = ctx.fragment.unwrap_or(""),
            subject = ctx.subject.unwrap_or(""),
            stage = ctx.stage.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with keymint context.
#[macro_export]
macro_rules! km_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__km_event!($crate::tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__km_event!($crate::tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with keymint context.
#[macro_export]
macro_rules! km_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__km_event!($crate::tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__km_event!($crate::tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with keymint context.
#[macro_export]
macro_rules! km_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__km_event!($crate::tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__km_event!($crate::tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with keymint context.
#[macro_export]
macro_rules! km_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__km_event!($crate::tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__km_event!($crate::tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
