//! Multi-field invariants.
//!
//! A weight group is only evaluated when every member passed its own field
//! checks; otherwise the member's issues already explain the failure and a
//! sum over unknown values would be noise.

use tracing::debug;

use crate::field::FieldValues;
use crate::issue::{RuleId, ValidationIssue, CROSS_FIELD};
use crate::schema::WeightGroup;

/// Result of evaluating one weight group.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupCheck {
    /// The sum is within tolerance of the target.
    Passed {
        /// Computed sum.
        sum: f64,
    },
    /// The sum deviates from the target by more than the tolerance.
    Failed(ValidationIssue),
    /// At least one member has no valid decimal value.
    Skipped,
}

/// Evaluate a weight group against the typed values of valid fields.
pub fn check_weight_group(group: &WeightGroup, values: &FieldValues) -> GroupCheck {
    let mut sum = 0.0;
    for field in group.fields {
        match values.decimal(field) {
            Some(weight) => sum += weight,
            None => {
                debug!(group = group.name, field, "skipping weight sum, member invalid");
                return GroupCheck::Skipped;
            }
        }
    }

    if (sum - group.target).abs() > group.tolerance {
        GroupCheck::Failed(ValidationIssue::new(
            CROSS_FIELD,
            RuleId::WeightSum,
            format!(
                "{} must sum to {:.1} (tolerance {}), got sum {sum:.3} over {}",
                group.name,
                group.target,
                group.tolerance,
                group.fields.join(", ")
            ),
        ))
    } else {
        GroupCheck::Passed { sum }
    }
}

/// Issues from every weight group, in declaration order.
pub fn check_all(groups: &[WeightGroup], values: &FieldValues) -> Vec<ValidationIssue> {
    groups
        .iter()
        .filter_map(|group| match check_weight_group(group, values) {
            GroupCheck::Failed(issue) => Some(issue),
            GroupCheck::Passed { .. } | GroupCheck::Skipped => None,
        })
        .collect()
}
