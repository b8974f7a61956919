//! Linear query lifecycle.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Stage;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum QueryState {
    Received,
    Embedding,
    Retrieving,
    Assembling,
    Generating,
    Completed,
    Failed { stage: Stage, reason: String },
}

impl QueryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryState::Completed | QueryState::Failed { .. })
    }

    /// Pipeline stage this state runs, if it runs one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            QueryState::Embedding => Some(Stage::Embedding),
            QueryState::Retrieving => Some(Stage::Retrieving),
            QueryState::Assembling => Some(Stage::Assembling),
            QueryState::Generating => Some(Stage::Generating),
            QueryState::Failed { stage, .. } => Some(*stage),
            QueryState::Received | QueryState::Completed => None,
        }
    }

    /// The state that follows this one on success.
    fn successor(&self) -> Option<QueryState> {
        match self {
            QueryState::Received => Some(QueryState::Embedding),
            QueryState::Embedding => Some(QueryState::Retrieving),
            QueryState::Retrieving => Some(QueryState::Assembling),
            QueryState::Assembling => Some(QueryState::Generating),
            QueryState::Generating => Some(QueryState::Completed),
            QueryState::Completed | QueryState::Failed { .. } => None,
        }
    }
}

/// Records the states one query passes through.
#[derive(Debug, Clone)]
pub(crate) struct QueryRun {
    trace: Vec<QueryState>,
}

impl QueryRun {
    pub(crate) fn start() -> Self {
        debug!(state = ?QueryState::Received, "query state");
        Self {
            trace: vec![QueryState::Received],
        }
    }

    pub(crate) fn current(&self) -> &QueryState {
        // `trace` is never empty.
        &self.trace[self.trace.len() - 1]
    }

    /// Moves to the next state in the chain. No-op once terminal.
    pub(crate) fn advance(&mut self) {
        if let Some(next) = self.current().successor() {
            debug!(state = ?next, "query state");
            self.trace.push(next);
        }
    }

    pub(crate) fn fail(&mut self, stage: Stage, reason: impl Into<String>) {
        if self.current().is_terminal() {
            return;
        }
        let reason = reason.into();
        warn!(%stage, %reason, "query failed");
        self.trace.push(QueryState::Failed { stage, reason });
    }

    pub(crate) fn into_trace(self) -> Vec<QueryState> {
        self.trace
    }
}
