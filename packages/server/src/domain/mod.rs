//! Aggregates persisted as documents, and the set semantics they enforce.

pub mod activity;
pub mod file;
pub mod user;

pub use activity::{Activity, ActivityKind};
pub use file::{Comment, FileRecord, Submission, SubmissionSource};
pub use user::{UserComment, UserRecord, UserSubmission, Username};

/// Append `item` unless an equal element is present. Returns whether it was added.
pub(crate) fn insert_unique<T: PartialEq>(items: &mut Vec<T>, item: T) -> bool {
    if items.contains(&item) {
        false
    } else {
        items.push(item);
        true
    }
}

/// Remove every element equal to `item`. Returns whether anything was removed.
pub(crate) fn remove_item<T: PartialEq>(items: &mut Vec<T>, item: &T) -> bool {
    let before = items.len();
    items.retain(|existing| existing != item);
    items.len() != before
}
