//! Request outcomes and panel errors.

use crate::core::{Origin, PanelState, Request};
use serde::Serialize;
use thiserror::Error;

/// How an accepted request was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The transition was applied.
    Applied,
    /// The transition was applied and a delayed transition is now pending.
    Scheduled,
    /// The requested value already held.
    NoOp,
    /// A timer expiry found its premise gone and did nothing.
    Stale,
    /// Refused without an error to the caller; observers were rolled back.
    Reasserted,
}

/// A refused request. Never fatal; the panel always reasserts the unchanged
/// state to observers alongside it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("rejected: wrong state: {request} not allowed while {state}")]
    WrongState { request: Request, state: PanelState },

    #[error("rejected: invalid origin: {request} not allowed from {origin}")]
    InvalidOrigin { request: Request, origin: Origin },
}

pub type RequestResult = Result<Outcome, Rejection>;

/// Errors constructing a panel.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("alarm panel must be created inside a Tokio runtime")]
    NoRuntime,
}
