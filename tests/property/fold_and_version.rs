// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property: folding a sequence of applied events advances `version` by
//! exactly the number of events applied, and the resulting `data` matches
//! what a pure `ApplyEvent` would produce (spec.md §8 invariant 1).

use proptest::prelude::*;

use cim_aggregate::aggregate::ApplyOutcome;
use cim_aggregate::envelope::EventEnvelope;
use cim_aggregate::snapshot::AggregateState;

use crate::fixtures::{apply_bank_event, AccountCreatedEvent};

fn account_created_event(account_id: String, balance: i64) -> EventEnvelope {
    EventEnvelope::new(
        "account_created",
        account_id.clone(),
        &AccountCreatedEvent { account_id, balance },
    )
    .unwrap()
}

fn fold(events: &[EventEnvelope]) -> AggregateState {
    let mut state = AggregateState::absent("ACC1");
    for event in events {
        state = match apply_bank_event(&state, event) {
            ApplyOutcome::Keep(next) => AggregateState {
                key: next.key,
                version: state.version + 1,
                data: next.data,
            },
            ApplyOutcome::Delete => AggregateState::absent(&state.key),
        };
    }
    state
}

proptest! {
    /// `version` after folding `n` events is exactly `n`.
    #[test]
    fn version_equals_event_count(
        balances in prop::collection::vec(1i64..1_000_000, 0..30)
    ) {
        let events: Vec<_> = balances
            .iter()
            .map(|&balance| account_created_event("ACC1".to_string(), balance))
            .collect();

        let state = fold(&events);
        prop_assert_eq!(state.version as usize, events.len());
    }

    /// The folded `data` always matches the last event's payload — this
    /// fixture's `ApplyEvent` replaces state wholesale rather than
    /// accumulating, so `fold(ApplyEvent, ∅, E)` reduces to `ApplyEvent`
    /// applied once to the last element.
    #[test]
    fn data_reflects_last_applied_event(
        balances in prop::collection::vec(1i64..1_000_000, 1..30)
    ) {
        let events: Vec<_> = balances
            .iter()
            .map(|&balance| account_created_event("ACC1".to_string(), balance))
            .collect();

        let state = fold(&events);
        let expected_balance = *balances.last().unwrap();
        prop_assert_eq!(
            state.data.unwrap()["balance"].as_i64().unwrap(),
            expected_balance
        );
    }

    /// Folding is deterministic: running it twice over the same sequence
    /// yields identical state.
    #[test]
    fn fold_is_deterministic(
        balances in prop::collection::vec(1i64..1_000_000, 0..30)
    ) {
        let events: Vec<_> = balances
            .iter()
            .map(|&balance| account_created_event("ACC1".to_string(), balance))
            .collect();

        let first = fold(&events);
        let second = fold(&events);
        prop_assert_eq!(first, second);
    }
}
