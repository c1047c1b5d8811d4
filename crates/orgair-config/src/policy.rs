//! Environment-conditional policy rules.
//!
//! Rules of a [`ConditionalPolicy`] apply only when its discriminant field
//! holds the activating value. Each rule is evaluated on its own, so one
//! deployment can violate several at once. Messages name fields and
//! lengths, never secret contents.

use tracing::debug;

use crate::field::{FieldValue, FieldValues};
use crate::issue::{ValidationIssue, POLICY};
use crate::schema::{ConditionalPolicy, PolicyRule};

/// Whether the policy is active for these values.
///
/// An invalid discriminant leaves the policy inactive; the field issue
/// already reports it.
pub fn is_active(policy: &ConditionalPolicy, values: &FieldValues) -> bool {
    values
        .text(policy.discriminant)
        .is_some_and(|value| value == policy.active_when)
}

/// Evaluate one policy.
pub fn check(policy: &ConditionalPolicy, values: &FieldValues) -> Vec<ValidationIssue> {
    if !is_active(policy, values) {
        return Vec::new();
    }

    debug!(
        discriminant = policy.discriminant,
        value = policy.active_when,
        "evaluating conditional policy"
    );

    policy
        .rules
        .iter()
        .filter_map(|rule| check_rule(policy, rule, values))
        .collect()
}

/// Evaluate every policy, in declaration order.
pub fn check_all(policies: &[ConditionalPolicy], values: &FieldValues) -> Vec<ValidationIssue> {
    policies.iter().flat_map(|p| check(p, values)).collect()
}

fn check_rule(
    policy: &ConditionalPolicy,
    rule: &PolicyRule,
    values: &FieldValues,
) -> Option<ValidationIssue> {
    let when = format!("{}={}", policy.discriminant, policy.active_when);

    match *rule {
        PolicyRule::FlagDisabled { field, rule } => values.flag(field).filter(|on| *on).map(|_| {
            ValidationIssue::new(
                POLICY,
                rule,
                format!("{field} must be false when {when}"),
            )
        }),
        PolicyRule::SecretMinLength { field, min, rule } => {
            let len = match values.get(field)? {
                FieldValue::Secret(secret) => secret.len(),
                FieldValue::Unset => 0,
                _ => return None,
            };
            (len < min).then(|| {
                ValidationIssue::new(
                    POLICY,
                    rule,
                    format!("{field} must be at least {min} characters when {when} (got {len})"),
                )
            })
        }
        PolicyRule::AnyCredential { fields, rule } => {
            // A member that failed its own checks is already reported.
            if fields.iter().any(|f| !values.contains(f)) {
                return None;
            }
            let configured = fields
                .iter()
                .any(|f| values.secret(f).is_some_and(|s| !s.is_empty()));
            (!configured).then(|| {
                ValidationIssue::new(
                    POLICY,
                    rule,
                    format!(
                        "at least one of {} must be configured when {when}",
                        fields.join(", ")
                    ),
                )
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::RuleId;
    use crate::schema::{
        ANTHROPIC_API_KEY, APP_ENV, DEBUG, OPENAI_API_KEY, PRODUCTION_POLICY, SECRET_KEY,
    };
    use crate::secret::Secret;

    fn production(debug: bool, secret: &str, openai: Option<&str>) -> FieldValues {
        let mut values = FieldValues::new();
        values.insert(APP_ENV, FieldValue::Text("production".to_string()));
        values.insert(DEBUG, FieldValue::Flag(debug));
        values.insert(SECRET_KEY, FieldValue::Secret(Secret::new(secret)));
        values.insert(
            OPENAI_API_KEY,
            openai.map_or(FieldValue::Unset, |k| FieldValue::Secret(Secret::new(k))),
        );
        values.insert(ANTHROPIC_API_KEY, FieldValue::Unset);
        values
    }

    #[test]
    fn test_compliant_production_passes() {
        let values = production(false, &"x".repeat(32), Some("sk-live"));
        assert!(check(&PRODUCTION_POLICY, &values).is_empty());
    }

    #[test]
    fn test_inactive_outside_production() {
        let mut values = production(true, "short", None);
        values.insert(APP_ENV, FieldValue::Text("development".to_string()));
        assert!(!is_active(&PRODUCTION_POLICY, &values));
        assert!(check(&PRODUCTION_POLICY, &values).is_empty());
    }

    #[test]
    fn test_every_violation_reported() {
        let values = production(true, "short-but-secret", None);
        let issues = check(&PRODUCTION_POLICY, &values);

        let rules: Vec<_> = issues.iter().map(|i| i.rule).collect();
        assert_eq!(
            rules,
            vec![
                RuleId::ProductionDebugDisabled,
                RuleId::ProductionSecretLength,
                RuleId::ProductionLlmCredential,
            ]
        );
        assert!(issues.iter().all(|i| i.field == POLICY));
        assert!(issues.iter().all(|i| !i.message.contains("short-but-secret")));
        assert!(issues[1].message.contains("SECRET_KEY"));
        assert!(issues[1].message.contains("32"));
    }

    #[test]
    fn test_secret_length_boundary() {
        let values = production(false, &"k".repeat(31), Some("sk-a"));
        assert_eq!(check(&PRODUCTION_POLICY, &values).len(), 1);

        let values = production(false, &"k".repeat(32), Some("sk-a"));
        assert!(check(&PRODUCTION_POLICY, &values).is_empty());
    }

    #[test]
    fn test_invalid_credential_member_not_double_reported() {
        let mut values = FieldValues::new();
        values.insert(APP_ENV, FieldValue::Text("production".to_string()));
        values.insert(DEBUG, FieldValue::Flag(false));
        values.insert(SECRET_KEY, FieldValue::Secret(Secret::new("k".repeat(40))));
        values.insert(ANTHROPIC_API_KEY, FieldValue::Unset);

        assert!(check(&PRODUCTION_POLICY, &values).is_empty());
    }

    #[test]
    fn test_issue_carries_rule_declared_on_policy() {
        const STAGING: ConditionalPolicy = ConditionalPolicy {
            discriminant: APP_ENV,
            active_when: "staging",
            rules: &[PolicyRule::SecretMinLength {
                field: SECRET_KEY,
                min: 16,
                rule: RuleId::MinLength,
            }],
        };

        let mut values = production(false, "too-short", Some("sk-live"));
        values.insert(APP_ENV, FieldValue::Text("staging".to_string()));

        assert!(check(&PRODUCTION_POLICY, &values).is_empty());
        let issues = check(&STAGING, &values);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule, STAGING.rules[0].rule_id());
        assert_eq!(issues[0].rule, RuleId::MinLength);
        assert!(issues[0].message.contains("when APP_ENV=staging"));
    }
}
