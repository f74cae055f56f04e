//! ---
//! km_section: "05-identity-pki"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Prometheus counters for identity issuance."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
use prometheus::{IntCounter, Registry};
use std::sync::Arc;

/// Issuance counters exported via Prometheus.
#[derive(Clone)]
pub struct IssuanceMetrics {
    registry: Arc<Registry>,
    keys_generated_total: IntCounter,
    certificates_issued_total: IntCounter,
    issuance_failures_total: IntCounter,
}

impl IssuanceMetrics {
    /// Register the counters with `registry`.
    pub fn new(registry: Arc<Registry>) -> anyhow::Result<Self> {
        let keys_generated_total =
            IntCounter::new("keymint_keys_generated_total", "Private keys generated")?;
        let certificates_issued_total = IntCounter::new(
            "keymint_certificates_issued_total",
            "Identity certificates issued",
        )?;
        let issuance_failures_total = IntCounter::new(
            "keymint_issuance_failures_total",
            "Identity declarations that failed to issue",
        )?;

        registry.register(Box::new(keys_generated_total.clone()))?;
        registry.register(Box::new(certificates_issued_total.clone()))?;
        registry.register(Box::new(issuance_failures_total.clone()))?;

        Ok(Self {
            registry,
            keys_generated_total,
            certificates_issued_total,
            issuance_failures_total,
        })
    }

    /// Access the underlying registry.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Count a generated key.
    pub fn inc_key_generated(&self) {
        self.keys_generated_total.inc();
    }

    /// Count an issued certificate.
    pub fn inc_certificate_issued(&self) {
        self.certificates_issued_total.inc();
    }

    /// Count a failed issuance.
    pub fn inc_issuance_failure(&self) {
        self.issuance_failures_total.inc();
    }

    /// Certificates issued so far.
    pub fn certificates_issued(&self) -> u64 {
        self.certificates_issued_total.get()
    }

    /// Failed issuances so far.
    pub fn issuance_failures(&self) -> u64 {
        self.issuance_failures_total.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_increment() {
        let registry = Arc::new(Registry::new());
        let metrics = IssuanceMetrics::new(registry.clone()).unwrap();
        metrics.inc_key_generated();
        metrics.inc_certificate_issued();
        metrics.inc_issuance_failure();
        assert_eq!(registry.gather().len(), 3);
        assert_eq!(metrics.certificates_issued(), 1);
    }

    #[test]
    fn registering_twice_fails() {
        let registry = Arc::new(Registry::new());
        IssuanceMetrics::new(registry.clone()).unwrap();
        assert!(IssuanceMetrics::new(registry).is_err());
    }
}
