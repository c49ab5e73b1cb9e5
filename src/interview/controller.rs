use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use super::context::InterviewContext;
use super::reasoning::ReasoningService;
use super::turn::Turn;
use crate::error::{InterviewError, Result};

#[derive(Default)]
struct ControllerState {
    history: Vec<Turn>,
    /// A request to the reasoning service is in flight
    pending: bool,
    /// No further turns are accepted
    closed: bool,
}

/// Owns the question/answer history
///
/// Invariants: ordinals strictly increase, kinds alternate starting with a
/// question, and an answer is only recorded together with the question that
/// follows it. Failed requests leave the history untouched; nothing is retried.
pub struct TurnController {
    reasoning: Arc<dyn ReasoningService>,
    state: Mutex<ControllerState>,
}

impl TurnController {
    pub fn new(reasoning: Arc<dyn ReasoningService>) -> Self {
        Self {
            reasoning,
            state: Mutex::new(ControllerState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Request the first question
    pub async fn begin(&self, context: &InterviewContext) -> Result<Turn> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(InterviewError::SessionClosed);
            }
            if state.pending || !state.history.is_empty() {
                return Err(InterviewError::AlreadyBegun);
            }
            state.pending = true;
        }

        let result = self.reasoning.first_question(context).await;

        let mut state = self.lock();
        state.pending = false;
        if state.closed {
            return Err(InterviewError::SessionClosed);
        }

        let question = Turn::question(result?, 1);
        state.history.push(question.clone());
        info!("First question ready");
        Ok(question)
    }

    /// Record `text` as the answer to the open question and fetch the next one
    ///
    /// A second call while one is in flight is rejected with `AnswerPending`.
    /// Results arriving after `close()` are discarded.
    pub async fn submit_answer(&self, text: String) -> Result<Turn> {
        let (request_history, answer_ordinal) = {
            let mut state = self.lock();
            if state.closed {
                return Err(InterviewError::SessionClosed);
            }
            if state.pending {
                return Err(InterviewError::AnswerPending);
            }
            let Some(last) = state.history.last() else {
                return Err(InterviewError::NoOpenQuestion);
            };
            if !last.is_question() {
                return Err(InterviewError::NoOpenQuestion);
            }

            let answer_ordinal = last.ordinal + 1;
            let mut request_history = state.history.clone();
            request_history.push(Turn::answer(text.clone(), answer_ordinal));
            state.pending = true;
            (request_history, answer_ordinal)
        };

        let result = self.reasoning.next_question(&request_history, &text).await;

        let mut state = self.lock();
        state.pending = false;
        if state.closed {
            warn!("Discarding question that arrived after the interview ended");
            return Err(InterviewError::SessionClosed);
        }

        let question = Turn::question(result?, answer_ordinal + 1);
        state.history.push(Turn::answer(text, answer_ordinal));
        state.history.push(question.clone());
        info!("Question {} ready", question.ordinal);
        Ok(question)
    }

    /// Stop accepting turns and return the final history
    pub fn close(&self) -> Vec<Turn> {
        let mut state = self.lock();
        state.closed = true;
        state.history.clone()
    }

    pub fn history(&self) -> Vec<Turn> {
        self.lock().history.clone()
    }

    /// The question currently awaiting an answer
    pub fn current_question(&self) -> Option<Turn> {
        self.lock().history.last().filter(|t| t.is_question()).cloned()
    }

    pub fn is_pending(&self) -> bool {
        self.lock().pending
    }
}
