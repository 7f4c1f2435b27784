//! Custom assertion helpers for integration tests.

use pullup_core::{EntitySet, RecordSet};
use pullup_flow::error::Error;
use pullup_flow::update::ReconcileUpdate;

/// Asserts that `records` cover exactly `companies`.
///
/// # Panics
///
/// Panics if an expected company has no record or a record belongs to an
/// unexpected company.
pub fn assert_entities(records: &RecordSet, companies: &[&str]) {
    let expected = EntitySet::parse(companies).expect("valid company names");
    let actual = records.entities();
    assert_eq!(
        actual.names().iter().map(|n| n.to_lowercase()).collect::<Vec<_>>(),
        expected.names().iter().map(|n| n.to_lowercase()).collect::<Vec<_>>(),
        "record set covers {actual}, expected {expected}"
    );
}

/// Asserts that `error` is `UnavailableAfterScrape` for exactly
/// `unresolved`, and returns its partial records.
///
/// # Panics
///
/// Panics on any other error or a different unresolved list.
pub fn assert_unavailable<'a>(error: &'a Error, unresolved: &[&str]) -> &'a RecordSet {
    match error {
        Error::UnavailableAfterScrape {
            unresolved: actual,
            partial,
        } => {
            let actual: Vec<&str> = actual.iter().map(String::as_str).collect();
            assert_eq!(actual, unresolved, "unexpected unresolved companies");
            partial
        }
        other => panic!("expected UnavailableAfterScrape, got {other:?}"),
    }
}

/// Asserts that `error` is a trigger failure with `message`, and returns
/// its partial records.
///
/// # Panics
///
/// Panics on any other error or a different message.
pub fn assert_trigger_failure<'a>(error: &'a Error, message: &str) -> &'a RecordSet {
    match error {
        Error::TriggerFailure {
            message: actual,
            partial,
        } => {
            assert_eq!(actual, message);
            partial
        }
        other => panic!("expected TriggerFailure, got {other:?}"),
    }
}

/// Asserts the ordering and monotonicity of an update stream.
///
/// The interim update, if any, comes first; every later update's available
/// set contains the previous one's; no entity returns to pending.
///
/// # Panics
///
/// Panics if any of those properties is violated.
pub fn assert_updates_monotonic(updates: &[ReconcileUpdate]) {
    for (i, update) in updates.iter().enumerate() {
        if update.is_interim() {
            assert_eq!(i, 0, "interim update must be the first update");
        }
    }

    for pair in updates.windows(2) {
        let before = pair[0].records().entities();
        let after = pair[1].records().entities();
        for entity in &before {
            assert!(
                after.contains(entity),
                "{} disappeared from available between updates",
                entity.name()
            );
            assert!(
                !pair[1].pending().contains(entity),
                "{} moved back to pending",
                entity.name()
            );
        }
        assert!(
            pair[1].pending().len() <= pair[0].pending().len(),
            "pending set grew between updates"
        );
    }
}
