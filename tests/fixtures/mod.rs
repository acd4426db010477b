// Copyright (c) 2025 - Cowboy AI, Inc.
//! Bank account test fixture (spec.md §8's seed scenarios S1-S7).
//!
//! This is the minimal `AggregateBehavior` the spec's seed scenarios are
//! written against (ported from `examples/es-bankaccount` in the original
//! source). It is test infrastructure only — spec.md §1 lists a shipped
//! bank-account example as out of scope, but the seed scenarios need
//! something concrete to drive.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use cim_aggregate::aggregate::{AggregateBehavior, AggregateOptions, ApplyOutcome};
use cim_aggregate::command::Command;
use cim_aggregate::envelope::EventEnvelope;
use cim_aggregate::errors::AggregateResult;
use cim_aggregate::middleware::{Middleware, MiddlewareChain};
use cim_aggregate::snapshot::AggregateState;

pub const COMMAND_CREATE_ACCOUNT: &str = "create_account";
pub const EVENT_ACCOUNT_CREATED: &str = "account_created";
/// Not reachable via any accepted command — published directly onto the
/// stream by the S7 delete-path test to drive `ApplyOutcome::Delete`
/// without needing a `close_account` command of its own.
pub const EVENT_ACCOUNT_CLOSED: &str = "account_closed";
pub const MINIMUM_INITIAL_BALANCE: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountCommand {
    pub account_id: String,
    pub initial_balance: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountCreatedEvent {
    pub account_id: String,
    pub balance: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccountState {
    pub account_id: String,
    pub balance: i64,
}

/// Rejects any command whose `x-username` metadata is missing or
/// `"unauthorized"` (ported verbatim from the original `authenticator`).
pub struct Authenticator;

#[async_trait]
impl Middleware for Authenticator {
    async fn run(&self, _state: &AggregateState, cmd: &mut Command) -> AggregateResult<()> {
        match cmd.metadata_get("x-username") {
            None => Err(cim_aggregate::errors::AggregateError::MiddlewareRejected(
                "username must be supplied".to_string(),
            )),
            Some("unauthorized") => Err(cim_aggregate::errors::AggregateError::MiddlewareRejected(
                "unauthorized user".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }
}

pub struct BankAccountAggregate;

#[async_trait]
impl AggregateBehavior for BankAccountAggregate {
    fn init_aggregate(&self) -> AggregateOptions {
        AggregateOptions {
            service_version: "0.1.0".to_string(),
            command_subject_prefix: "examples.bank.cmds".to_string(),
            event_subject_prefix: "examples.bank.events".to_string(),
            stream_name: "BANK_ACCOUNT_EVENTS".to_string(),
            accepted_commands: vec![COMMAND_CREATE_ACCOUNT.to_string()],
            state_store_bucket_name: "agg_bankaccount".to_string(),
            aggregate_name: "bankaccount".to_string(),
            middleware: MiddlewareChain::new(vec![std::sync::Arc::new(Authenticator)]),
            ..AggregateOptions::default()
        }
    }

    async fn handle_command(
        &self,
        state: &AggregateState,
        cmd: &Command,
    ) -> Result<Vec<EventEnvelope>, String> {
        match cmd.command_type.as_str() {
            COMMAND_CREATE_ACCOUNT => create_account(state, cmd),
            other => Err(format!("unexpected command type: {other}")),
        }
    }

    async fn apply_event(
        &self,
        state: &AggregateState,
        event: &EventEnvelope,
    ) -> Result<ApplyOutcome, String> {
        Ok(apply_bank_event(state, event))
    }
}

/// The pure command-handling logic, exposed standalone so tests can exercise
/// it without going through the async trait (spec.md §8 properties 1 and 4).
pub fn create_account(state: &AggregateState, cmd: &Command) -> Result<Vec<EventEnvelope>, String> {
    let create: CreateAccountCommand =
        serde_json::from_value(cmd.data.clone()).map_err(|e| e.to_string())?;

    if state.version > 0 {
        return Err("can't create an account that already has previous events".to_string());
    }

    if create.initial_balance < MINIMUM_INITIAL_BALANCE {
        return Err("bank accounts must be created with at least 100 moneybucks".to_string());
    }

    let payload = AccountCreatedEvent {
        account_id: create.account_id.clone(),
        balance: create.initial_balance,
    };

    let event = EventEnvelope::new(EVENT_ACCOUNT_CREATED, create.account_id, &payload)
        .map_err(|e| e.to_string())?;

    Ok(vec![event])
}

/// The pure apply logic (spec.md §8 property 1's `fold(ApplyEvent, ∅, E)`).
pub fn apply_bank_event(state: &AggregateState, event: &EventEnvelope) -> ApplyOutcome {
    match event.event_type.as_str() {
        EVENT_ACCOUNT_CREATED => {
            let decoded: AccountCreatedEvent = event
                .data_as()
                .expect("account_created event must decode into AccountCreatedEvent");
            let next_state = BankAccountState {
                account_id: decoded.account_id,
                balance: decoded.balance,
            };
            let data = serde_json::to_value(&next_state).expect("BankAccountState is JSON-serializable");
            ApplyOutcome::Keep(AggregateState {
                key: next_state.account_id,
                version: state.version,
                data: Some(data),
            })
        }
        EVENT_ACCOUNT_CLOSED => ApplyOutcome::Delete,
        _ => ApplyOutcome::Keep(state.clone()),
    }
}
