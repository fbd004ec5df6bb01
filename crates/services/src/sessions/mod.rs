mod engine;
mod plan;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use engine::{
    NextAction, NextStep, Progress, Prompt, SessionEngine, SessionSummary, SubmitOutcome,
};
pub use plan::{SHORT_SESSION_SIZE, SessionMode, select_indices};
pub use workflow::{AnswerResult, QuizSession, SessionLoopService};
