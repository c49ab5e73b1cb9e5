// Integration tests for the interview session lifecycle
//
// All capabilities are in-process fakes; time is paused so deadlines and
// sampling intervals advance deterministically.

mod common;

use common::{session_config, Harness, ScriptedRecognizer};
use interview_coach::analysis::PLACEHOLDER_MESSAGE;
use interview_coach::error::InterviewError;
use interview_coach::interview::TurnKind;
use interview_coach::session::{Completion, EndTrigger, InterviewSession, Phase, SessionEvent};
use interview_coach::transcription::TranscriptionFeed;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

const LONG: Duration = Duration::from_secs(600);

fn session(harness: &Harness, id: &str, duration: Duration) -> Arc<InterviewSession> {
    InterviewSession::new(
        session_config(id, duration),
        harness.services.clone(),
        TranscriptionFeed::unsupported(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_interview_runs_from_first_question_to_feedback() {
    let harness = Harness::new();
    let session = session(&harness, "interview-flow", LONG);
    assert_eq!(session.phase(), Phase::Idle);

    let first = session.begin().await.unwrap();
    assert_eq!(first.kind, TurnKind::Question);
    assert_eq!(first.ordinal, 1);
    assert_eq!(first.text, "Tell me about yourself.");
    assert_eq!(session.phase(), Phase::Active);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    let next = session
        .submit_answer(Some("I rebuilt our billing pipeline.".to_string()))
        .await
        .unwrap();
    assert_eq!(next.ordinal, 3);
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let output = session.end().await.unwrap();
    assert_eq!(session.phase(), Phase::Ended);
    assert_eq!(output.trigger, EndTrigger::User);

    let kinds: Vec<TurnKind> = output.history.iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![TurnKind::Question, TurnKind::Answer, TurnKind::Question]);
    let ordinals: Vec<u32> = output.history.iter().map(|t| t.ordinal).collect();
    assert_eq!(ordinals, vec![1, 2, 3]);
    assert_eq!(output.history[1].text, "I rebuilt our billing pipeline.");

    assert!(!output.feedback_is_placeholder);
    assert_eq!(output.feedback.strengths, vec!["Concrete examples"]);

    // About four seconds of 16 kHz mono audio
    assert!(!output.artifact.is_empty());
    assert!(output.artifact.duration_secs() >= 3.0);
    assert!(output.artifact.chunk_count >= 3);

    assert!(output.affect_samples.len() >= 3);
    assert!(output
        .affect_samples
        .windows(2)
        .all(|pair| pair[0].offset_ms <= pair[1].offset_ms));

    assert_eq!(harness.analysis.calls(), 1);
    let last_request = *harness.analysis.last_request.lock().unwrap();
    let (turns, samples, bytes) = last_request.unwrap();
    assert_eq!(turns, 3);
    assert_eq!(samples, output.affect_samples.len());
    assert_eq!(bytes, output.artifact.len());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.devices.live(), 0, "capture stream must be released");
    assert_eq!(harness.store.saved(), vec!["interview-flow".to_string()]);
    assert!(session.output().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_ends_unanswered_interview() {
    let harness = Harness::new();
    let session = session(&harness, "interview-deadline", Duration::from_secs(2));

    session.begin().await.unwrap();

    let Completion::Finalized(output) = session.wait_for_completion().await else {
        panic!("deadline should finalize the interview");
    };
    assert_eq!(output.trigger, EndTrigger::Deadline);
    assert_eq!(output.history.len(), 1);
    assert!(output.history[0].is_question());
    assert_eq!(session.phase(), Phase::Ended);
    assert_eq!(harness.analysis.calls(), 1);

    let err = session.end().await.unwrap_err();
    assert!(matches!(err, InterviewError::InvalidPhase { phase: Phase::Ended }));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_end_requests_finalize_once() {
    let harness = Harness::new();
    let session = session(&harness, "interview-race", Duration::from_secs(1));
    session.begin().await.unwrap();

    // The deadline falls due in the same tick as the user requests
    tokio::time::sleep(Duration::from_secs(1)).await;
    let attempts: Vec<_> = (0..4)
        .map(|_| {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.end().await })
        })
        .collect();
    let results = futures::future::join_all(attempts).await;
    let wins = results
        .into_iter()
        .filter(|result| result.as_ref().unwrap().is_ok())
        .count();
    assert!(wins <= 1);

    let Completion::Finalized(output) = session.wait_for_completion().await else {
        panic!("interview should be finalized");
    };
    if wins == 0 {
        assert_eq!(output.trigger, EndTrigger::Deadline);
    } else {
        assert_eq!(output.trigger, EndTrigger::User);
    }

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(harness.analysis.calls(), 1);
    assert_eq!(harness.store.saved().len(), 1);
    assert_eq!(session.phase(), Phase::Ended);
}

#[tokio::test(start_paused = true)]
async fn test_analysis_failure_yields_placeholder_feedback() {
    let harness = Harness::new();
    harness.analysis.fail.store(true, Ordering::SeqCst);
    let session = session(&harness, "interview-placeholder", LONG);

    session.begin().await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    let output = session.end().await.unwrap();

    assert!(output.feedback_is_placeholder);
    assert_eq!(output.feedback.overall_performance, PLACEHOLDER_MESSAGE);
    assert!(output.feedback.strengths.is_empty());
    assert_eq!(output.history.len(), 1);
    assert_eq!(session.phase(), Phase::Ended);
}

#[tokio::test(start_paused = true)]
async fn test_no_affect_samples_after_ending() {
    let harness = Harness::new();
    *harness.classifier.delay.lock().unwrap() = Duration::from_millis(1500);
    let session = session(&harness, "interview-affect", LONG);

    session.begin().await.unwrap();
    tokio::time::sleep(Duration::from_millis(3200)).await;

    let output = session.end().await.unwrap();
    let collected = output.affect_samples.len();
    let calls = harness.classifier.calls();

    // Let every in-flight classification finish
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(session.status().affect_samples, collected);
    assert_eq!(harness.classifier.calls(), calls, "no ticks after ending");
}

#[tokio::test(start_paused = true)]
async fn test_classification_resolving_with_end_is_discarded() {
    let harness = Harness::new();
    let gate = harness.classifier.gate();
    let session = session(&harness, "interview-affect-race", LONG);

    session.begin().await.unwrap();
    // The first tick's classification is now waiting on the gate
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(harness.classifier.calls(), 1);

    gate.notify_waiters();
    let output = session.end().await.unwrap();

    assert!(output.affect_samples.is_empty());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.status().affect_samples, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_first_question_returns_to_idle() {
    let harness = Harness::new();
    harness.reasoning.fail_first.store(true, Ordering::SeqCst);
    let session = session(&harness, "interview-retry", LONG);

    let err = session.begin().await.unwrap_err();
    assert!(matches!(err, InterviewError::TurnGenerationFailed { .. }));
    assert_eq!(session.phase(), Phase::Idle);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.devices.live(), 0, "failed start must release devices");

    harness.reasoning.fail_first.store(false, Ordering::SeqCst);
    let first = session.begin().await.unwrap();
    assert_eq!(first.ordinal, 1);
    assert_eq!(session.phase(), Phase::Active);
    assert_eq!(harness.devices.opened.load(Ordering::SeqCst), 2);

    assert!(session.abandon().await);
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_is_device_unavailable() {
    let harness = Harness::new();
    harness.devices.deny_permission.store(true, Ordering::SeqCst);
    let session = session(&harness, "interview-denied", LONG);

    let err = session.begin().await.unwrap_err();
    assert!(matches!(err, InterviewError::DeviceUnavailable { .. }));
    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(harness.reasoning.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_abandon_releases_everything_without_remote_calls() {
    let harness = Harness::new();
    let session = session(&harness, "interview-teardown", LONG);

    session.begin().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let reasoning_calls = harness.reasoning.calls();

    assert!(session.abandon().await);
    assert_eq!(session.phase(), Phase::Ended);
    assert!(matches!(session.completion(), Completion::Abandoned));
    assert!(session.output().is_none());
    assert!(!session.abandon().await);

    let err = session.end().await.unwrap_err();
    assert!(matches!(err, InterviewError::InvalidPhase { phase: Phase::Ended }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.devices.live(), 0);
    assert_eq!(harness.analysis.calls(), 0);
    assert_eq!(harness.reasoning.calls(), reasoning_calls);
    assert!(harness.store.saved().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_abandon_while_starting() {
    let harness = Harness::new();
    harness.reasoning.set_first_delay(Duration::from_secs(5));
    let session = session(&harness, "interview-early-teardown", LONG);

    let starting = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.begin().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.phase(), Phase::Starting);

    assert!(session.abandon().await);
    let err = starting.await.unwrap().unwrap_err();
    assert!(matches!(err, InterviewError::Abandoned));
    assert_eq!(session.phase(), Phase::Ended);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.devices.live(), 0);
    assert_eq!(harness.analysis.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_recognition_is_announced_once() {
    let harness = Harness::new();
    let session = session(&harness, "interview-typed", LONG);
    let mut events = session.subscribe();

    session.begin().await.unwrap();
    assert!(!session.status().recognition_available);

    // Nothing was heard and nothing typed: the empty answer still counts
    session.submit_answer(None).await.unwrap();
    let history = session.history();
    assert_eq!(history[1].kind, TurnKind::Answer);
    assert_eq!(history[1].text, "");

    session.submit_answer(Some("typed".to_string())).await.unwrap();

    let mut notices = 0;
    let mut questions = 0;
    let mut phases = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::Notice(_) => notices += 1,
            SessionEvent::Question(_) => questions += 1,
            SessionEvent::PhaseChanged(phase) => phases.push(phase),
        }
    }
    assert_eq!(notices, 1);
    assert_eq!(questions, 3);
    assert_eq!(phases, vec![Phase::Starting, Phase::Active]);

    session.abandon().await;
}

#[tokio::test(start_paused = true)]
async fn test_spoken_answer_uses_live_transcript() {
    let harness = Harness::new();
    let recognizer = Arc::new(ScriptedRecognizer::new("I led the migration to Rust."));
    let session = InterviewSession::new(
        session_config("interview-spoken", LONG),
        harness.services.clone(),
        TranscriptionFeed::supported(recognizer.clone()),
    );

    session.begin().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.transcript(), "I led the migration to Rust.");
    assert!(session.status().recognition_available);

    session.submit_answer(None).await.unwrap();
    assert_eq!(session.history()[1].text, "I led the migration to Rust.");
    assert_eq!(recognizer.starts(), 2, "feed restarts for the next answer");

    let output = session.end().await.unwrap();
    assert_eq!(output.history.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_second_answer_while_pending_is_rejected() {
    let harness = Harness::new();
    harness.reasoning.set_next_delay(Duration::from_secs(2));
    let session = session(&harness, "interview-pending", LONG);
    session.begin().await.unwrap();

    let pending = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.submit_answer(Some("first".to_string())).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let err = session
        .submit_answer(Some("second".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, InterviewError::AnswerPending));

    let next = pending.await.unwrap().unwrap();
    assert_eq!(next.ordinal, 3);
    assert_eq!(session.history()[1].text, "first");
}

#[tokio::test(start_paused = true)]
async fn test_question_arriving_after_end_is_discarded() {
    let harness = Harness::new();
    harness.reasoning.set_next_delay(Duration::from_secs(3));
    let session = session(&harness, "interview-late-question", LONG);
    session.begin().await.unwrap();

    let pending = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.submit_answer(Some("answer".to_string())).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let output = session.end().await.unwrap();
    assert_eq!(output.history.len(), 1);

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, InterviewError::SessionClosed));
    assert_eq!(session.history().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_question_resolving_with_end_is_discarded() {
    let harness = Harness::new();
    let session = session(&harness, "interview-turn-race", LONG);
    session.begin().await.unwrap();

    let gate = harness.reasoning.gate_next();
    let pending = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.submit_answer(Some("A1".to_string())).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    gate.notify_waiters();
    let output = session.end().await.unwrap();

    let texts: Vec<&str> = output.history.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["Tell me about yourself."]);

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, InterviewError::SessionClosed));
    assert_eq!(session.history().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_follow_up_keeps_history_and_question_open() {
    let harness = Harness::new();
    harness.reasoning.fail_next.store(true, Ordering::SeqCst);
    let session = session(&harness, "interview-follow-up", LONG);
    session.begin().await.unwrap();

    let err = session
        .submit_answer(Some("answer".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, InterviewError::TurnGenerationFailed { .. }));
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.phase(), Phase::Active);

    harness.reasoning.fail_next.store(false, Ordering::SeqCst);
    let next = session
        .submit_answer(Some("answer".to_string()))
        .await
        .unwrap();
    assert_eq!(next.ordinal, 3);
}

#[tokio::test(start_paused = true)]
async fn test_operations_outside_active_phase_are_rejected() {
    let harness = Harness::new();
    let session = session(&harness, "interview-phases", LONG);

    let err = session.submit_answer(Some("early".to_string())).await.unwrap_err();
    assert!(matches!(err, InterviewError::InvalidPhase { phase: Phase::Idle }));
    let err = session.end().await.unwrap_err();
    assert!(matches!(err, InterviewError::InvalidPhase { phase: Phase::Idle }));
    assert!(!session.abandon().await);

    session.begin().await.unwrap();
    let err = session.begin().await.unwrap_err();
    assert!(matches!(err, InterviewError::InvalidPhase { phase: Phase::Active }));

    session.end().await.unwrap();
    let err = session.submit_answer(None).await.unwrap_err();
    assert!(matches!(err, InterviewError::InvalidPhase { phase: Phase::Ended }));
}

#[tokio::test(start_paused = true)]
async fn test_status_reports_countdown_and_progress() {
    let harness = Harness::new();
    let session = session(&harness, "interview-status", LONG);

    let idle = session.status();
    assert_eq!(idle.phase, Phase::Idle);
    assert_eq!(idle.remaining_secs, None);

    session.begin().await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let status = session.status();
    assert_eq!(status.session_id, "interview-status");
    assert_eq!(status.phase, Phase::Active);
    assert_eq!(status.remaining_secs, Some(590));
    assert_eq!(status.current_question.as_deref(), Some("Tell me about yourself."));
    assert_eq!(status.turns, 1);
    assert!(status.affect_samples >= 9);
    assert!(status.started_at.is_some());

    session.end().await.unwrap();
    assert_eq!(session.status().remaining_secs, None);
}
