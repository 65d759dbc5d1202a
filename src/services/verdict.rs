// src/services/verdict.rs
//! Final pass/fail decision over a validation report. No model call.

use crate::models::{CountComparison, OverallResult, ValidationResult, Verdict, YesNo};

/// Lowest fidelity score that can still pass.
pub const MIN_FIDELITY_SCORE: u8 = 70;

const PASSED_MESSAGE: &str = "Image validation passed - Restoration is accurate";
const FAILED_MESSAGE: &str = "Image validation failed - Issues detected";

pub fn decide(result: &ValidationResult) -> Verdict {
    let comparison = &result.element_comparison;

    let added_elements = result.has_added_elements == YesNo::Yes
        || !comparison.added_elements.is_empty();
    let people_match = counts_match(&comparison.people_count);
    let objects_match = counts_match(&comparison.objects_count);

    let passed = result.validation_passed == YesNo::Yes
        && !added_elements
        && result.has_altered_faces == YesNo::No
        && result.has_changed_composition == YesNo::No
        && people_match
        && objects_match
        && result.fidelity_score >= MIN_FIDELITY_SCORE;

    let mut message = String::from(if passed { PASSED_MESSAGE } else { FAILED_MESSAGE });

    if !comparison.added_elements.is_empty() {
        message.push_str(&format!(
            ". Added elements detected: {}",
            comparison.added_elements.join(", ")
        ));
    }
    if !comparison.removed_elements.is_empty() {
        message.push_str(&format!(
            ". Removed elements: {}",
            comparison.removed_elements.join(", ")
        ));
    }
    if !people_match {
        message.push_str(&count_mismatch("People", &comparison.people_count));
    }
    if !objects_match {
        message.push_str(&count_mismatch("Objects", &comparison.objects_count));
    }

    Verdict {
        overall_result: if passed {
            OverallResult::Passed
        } else {
            OverallResult::Failed
        },
        confidence_score: result.fidelity_score.min(100),
        message,
    }
}

// A missing `match` is not evidence of a mismatch.
fn counts_match(count: &CountComparison) -> bool {
    count.matches != Some(false)
}

fn count_mismatch(label: &str, count: &CountComparison) -> String {
    format!(
        ". {} count mismatch: original={}, restored={}",
        label, count.original, count.restored
    )
}
