//! Default expiration notifications bound to new root certificates.

use crate::model::NotificationPolicy;

/// Category every root certificate is bound to at creation.
pub const DEFAULT_SECURITY: &str = "DEFAULT_SECURITY";

/// Source of notification policies; policies are always produced from a
/// template, never assembled by callers.
pub trait NotificationTemplates: Send + Sync {
    fn default_expiration_notifications(
        &self,
        category: &str,
        recipient: &str,
    ) -> Vec<NotificationPolicy>;
}

/// One policy per configured interval, labelled `<CATEGORY>_<N>_DAY`.
#[derive(Debug, Clone)]
pub struct IntervalTemplates {
    intervals: Vec<u32>,
}

impl IntervalTemplates {
    pub fn new(intervals: impl Into<Vec<u32>>) -> Self {
        let mut intervals = intervals.into();
        intervals.sort_unstable_by(|a, b| b.cmp(a));
        intervals.dedup();
        Self { intervals }
    }
}

impl NotificationTemplates for IntervalTemplates {
    fn default_expiration_notifications(
        &self,
        category: &str,
        recipient: &str,
    ) -> Vec<NotificationPolicy> {
        if recipient.trim().is_empty() {
            tracing::warn!(category, "No notification recipient configured");
            return Vec::new();
        }
        self.intervals
            .iter()
            .map(|days| NotificationPolicy {
                label: format!("{category}_{days}_DAY"),
                category: category.to_string(),
                recipient: recipient.to_string(),
                interval_days: *days,
                active: true,
            })
            .collect()
    }
}

/// Attach the default security notifications for a certificate.
pub(crate) fn bind_default_security(
    templates: &dyn NotificationTemplates,
    recipient: &str,
) -> Vec<NotificationPolicy> {
    templates.default_expiration_notifications(DEFAULT_SECURITY, recipient)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_policy_per_interval_longest_first() {
        let templates = IntervalTemplates::new(vec![2, 30, 15, 30]);
        let policies = bind_default_security(&templates, "security@example.com");

        let labels: Vec<&str> = policies.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "DEFAULT_SECURITY_30_DAY",
                "DEFAULT_SECURITY_15_DAY",
                "DEFAULT_SECURITY_2_DAY"
            ]
        );
        assert!(policies
            .iter()
            .all(|p| p.recipient == "security@example.com" && p.active));
        assert!(policies.iter().all(|p| p.category == DEFAULT_SECURITY));
    }

    #[test]
    fn blank_recipient_binds_nothing() {
        let templates = IntervalTemplates::new(vec![30]);
        assert!(bind_default_security(&templates, "  ").is_empty());
    }
}
