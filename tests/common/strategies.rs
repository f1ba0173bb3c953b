//! Proptest strategies for dispatcher inputs

use proptest::prelude::*;

/// Small pool of author names so collisions are common
pub fn author_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("ripley".to_string()),
        Just("hicks".to_string()),
        Just("bishop".to_string()),
        Just("vasquez".to_string()),
    ]
}

/// `true` for critical, `false` for common
pub fn submission_strategy() -> impl Strategy<Value = (String, bool)> {
    (author_strategy(), prop::bool::weighted(0.3))
}

pub fn submissions_strategy() -> impl Strategy<Value = Vec<(String, bool)>> {
    prop::collection::vec(submission_strategy(), 1..40)
}
