// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property: an event subject never carries a `.`-bearing entity key
//! unsanitized (spec.md §8 invariant 2).

use proptest::prelude::*;

use cim_aggregate::subjects::{event_subject, sanitize};

proptest! {
    /// `sanitize` never leaves a `.` in its output.
    #[test]
    fn sanitize_output_has_no_dots(s in ".*") {
        prop_assert!(!sanitize(&s).contains('.'));
    }

    /// The entity-key segment of a published subject is always the
    /// sanitized form, never the raw key, whenever the raw key contained a
    /// dot.
    #[test]
    fn event_subject_never_contains_a_dotted_raw_key(
        key in "[a-zA-Z0-9]{1,5}(\\.[a-zA-Z0-9]{1,5}){1,4}",
        event_type in "[a-z_]{1,10}"
    ) {
        let subject = event_subject("events", Some(&key), &event_type);
        let sanitized_key = sanitize(&key);

        prop_assert_eq!(
            subject,
            format!("events.{sanitized_key}.{event_type}")
        );
        prop_assert!(!subject.contains(&key));
    }
}
