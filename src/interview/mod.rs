//! Turn protocol: the ordered question/answer history and the reasoning
//! service that produces each next question.

mod context;
mod controller;
mod reasoning;
mod turn;

pub use context::InterviewContext;
pub use controller::TurnController;
pub use reasoning::{HistoryEntry, HttpReasoningService, ReasoningService};
pub use turn::{Turn, TurnKind};
