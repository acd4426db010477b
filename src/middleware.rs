//! Middleware chain: ordered command preprocessors (spec §4.7)

use std::sync::Arc;

use async_trait::async_trait;

use crate::command::Command;
use crate::errors::AggregateResult;
use crate::snapshot::AggregateState;

/// One command preprocessor.
///
/// State is exposed read-only (the narrowing recommendation of spec §9 —
/// the source exposes both state and command as mutable; this runtime keeps
/// only the command mutable since state mutations are never persisted here
/// regardless). Typical uses: authentication from metadata, rate limiting,
/// payload validation.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Inspect `state` and mutate `cmd` in place. Return an error to
    /// short-circuit the remaining chain and reject the command.
    async fn run(&self, state: &AggregateState, cmd: &mut Command) -> AggregateResult<()>;
}

/// An ordered sequence of [`Middleware`], run until one fails or the chain
/// is exhausted.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    stages: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Build a chain from an ordered list of preprocessors.
    pub fn new(stages: Vec<Arc<dyn Middleware>>) -> Self {
        Self { stages }
    }

    /// Run every stage in order against `(state, cmd)`, short-circuiting on
    /// the first error.
    pub async fn run(&self, state: &AggregateState, cmd: &mut Command) -> AggregateResult<()> {
        for stage in &self.stages {
            stage.run(state, cmd).await?;
        }
        Ok(())
    }
}
