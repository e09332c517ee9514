use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::response::AppError;

use super::difficulty::LevelChange;
use super::generative::ProblemGenerator;
use super::grading::{self, ExpectedAnswer};
use super::prefetch;
use super::problem::{Locale, OperationKind, Problem};
use super::session_store::{Session, SessionSlot, SessionSnapshot, SessionStore};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedSession {
    pub session_id: String,
    pub state: SessionSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServedProblem {
    pub problem: Problem,
    pub state: SessionSnapshot,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedAnswer {
    pub correct: bool,
    pub expected: ExpectedAnswer,
    pub feedback: String,
    pub next_hint: String,
    pub next_problem_preview: Problem,
    pub state: SessionSnapshot,
}

/// Adaptive practice sessions: difficulty tracking, prefetching and grading
/// on top of the session store.
pub struct PracticeService {
    store: Arc<SessionStore>,
    generator: Arc<ProblemGenerator>,
    queue_target: usize,
    prefetch_use_generative: bool,
}

impl PracticeService {
    pub fn new(
        store: Arc<SessionStore>,
        generator: Arc<ProblemGenerator>,
        queue_target: usize,
        prefetch_use_generative: bool,
    ) -> Self {
        Self {
            store,
            generator,
            queue_target,
            prefetch_use_generative,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn generator(&self) -> &Arc<ProblemGenerator> {
        &self.generator
    }

    pub fn queue_target(&self) -> usize {
        self.queue_target
    }

    pub async fn start_session(&self, op: OperationKind, locale: Locale) -> StartedSession {
        let (session_id, slot) = self.store.create(op);
        let state = slot.lock().await.snapshot();
        self.schedule_refill(&slot, locale);
        info!(session_id = %session_id, op = op.as_str(), "practice session started");
        StartedSession { session_id, state }
    }

    /// Serves the on-deck problem, else the queue head, else a fresh local one.
    pub async fn next_problem(
        &self,
        session_id: &str,
        op: Option<OperationKind>,
        locale: Locale,
    ) -> Result<ServedProblem, AppError> {
        let slot = self
            .store
            .get(session_id)
            .ok_or_else(|| AppError::bad_request("Invalid sessionId"))?;

        let served = {
            let mut session = slot.lock().await;
            if let Some(op) = op {
                session.op = op;
            }
            let problem = match session.on_deck.take() {
                Some(problem) => problem,
                None => self.take_from_queue_or_synthesize(&mut session, locale),
            };
            session.last_problem = Some(problem.clone());
            ServedProblem {
                problem,
                state: session.snapshot(),
            }
        };

        self.schedule_refill(&slot, locale);
        Ok(served)
    }

    /// Scores the answer to the session's last problem, adjusts the level and
    /// puts the following problem on deck.
    pub async fn grade_answer(
        &self,
        session_id: &str,
        answer: &Value,
        locale: Locale,
    ) -> Result<GradedAnswer, AppError> {
        let invalid = || AppError::bad_request("Invalid session or no last problem");
        let slot = self.store.get(session_id).ok_or_else(invalid)?;

        let graded = {
            let mut session = slot.lock().await;
            let outcome = match session.last_problem.as_ref() {
                Some(problem) => grading::grade(problem, answer, locale),
                None => return Err(invalid()),
            };

            match session.difficulty.record(outcome.correct) {
                LevelChange::Promoted { from, to } => {
                    info!(session_id, from, to, "level up");
                }
                LevelChange::Demoted { from, to } => {
                    info!(session_id, from, to, wrong = session.difficulty.wrong, "level down");
                }
                LevelChange::Unchanged => {}
            }

            let preview = self.take_from_queue_or_synthesize(&mut session, locale);
            session.on_deck = Some(preview.clone());

            GradedAnswer {
                correct: outcome.correct,
                expected: outcome.expected,
                feedback: outcome.feedback,
                next_hint: outcome.next_hint,
                next_problem_preview: preview,
                state: session.snapshot(),
            }
        };

        self.schedule_refill(&slot, locale);
        Ok(graded)
    }

    pub fn end_session(&self, session_id: &str) -> bool {
        let ended = self.store.remove(session_id);
        if ended {
            info!(session_id, "practice session ended");
        }
        ended
    }

    pub fn cleanup_expired(&self, ttl: Duration) -> usize {
        self.store.cleanup_expired(ttl)
    }

    /// On-demand problems are always synthesized locally so handlers never
    /// wait on the generative backend.
    fn take_from_queue_or_synthesize(&self, session: &mut Session, locale: Locale) -> Problem {
        session.queue.pop().unwrap_or_else(|| {
            self.generator
                .synthesize_local(session.op, session.difficulty.level, locale)
        })
    }

    fn schedule_refill(&self, slot: &Arc<SessionSlot>, locale: Locale) {
        let handle = tokio::spawn({
            let slot = Arc::clone(slot);
            let generator = Arc::clone(&self.generator);
            let target = self.queue_target;
            let prefer_generative = self.prefetch_use_generative;
            async move {
                prefetch::refill(slot, generator, target, locale, prefer_generative).await;
            }
        });
        slot.replace_refill(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm_provider::GenerativeBackend;
    use crate::services::problem::Solution;
    use serde_json::json;

    fn service(queue_target: usize) -> PracticeService {
        let generator = Arc::new(ProblemGenerator::new(Arc::new(GenerativeBackend::disabled())));
        PracticeService::new(Arc::new(SessionStore::new()), generator, queue_target, false)
    }

    fn right_answer(problem: &Problem) -> Value {
        match problem.solution {
            Solution::Integer(v) => json!(v),
            Solution::Fraction(f) => json!(f.to_string()),
        }
    }

    #[tokio::test]
    async fn test_start_returns_initial_state() {
        let svc = service(3);
        let started = svc.start_session(OperationKind::Mul, Locale::Es).await;
        assert!(started.session_id.starts_with("sess-"));
        assert_eq!(started.state.op, OperationKind::Mul);
        assert_eq!(started.state.level, 1);
        assert_eq!(svc.store().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_session_is_rejected() {
        let svc = service(3);
        assert!(svc.next_problem("nope", None, Locale::Es).await.is_err());
        assert!(svc.grade_answer("nope", &json!(1), Locale::Es).await.is_err());
    }

    #[tokio::test]
    async fn test_grade_before_next_is_rejected() {
        let svc = service(0);
        let started = svc.start_session(OperationKind::Add, Locale::Es).await;
        assert!(svc
            .grade_answer(&started.session_id, &json!(1), Locale::Es)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_next_retargets_operation() {
        let svc = service(0);
        let started = svc.start_session(OperationKind::Add, Locale::En).await;
        let served = svc
            .next_problem(&started.session_id, Some(OperationKind::Frac), Locale::En)
            .await
            .unwrap();
        assert_eq!(served.problem.op, OperationKind::Frac);
        assert_eq!(served.state.op, OperationKind::Frac);
    }

    #[tokio::test]
    async fn test_grade_puts_preview_on_deck() {
        let svc = service(0);
        let id = svc.start_session(OperationKind::Add, Locale::En).await.session_id;
        let served = svc.next_problem(&id, None, Locale::En).await.unwrap();

        let graded = svc
            .grade_answer(&id, &right_answer(&served.problem), Locale::En)
            .await
            .unwrap();
        assert!(graded.correct);
        assert_eq!(graded.state.streak, 1);

        let next = svc.next_problem(&id, None, Locale::En).await.unwrap();
        assert_eq!(next.problem.id, graded.next_problem_preview.id);
    }

    #[tokio::test]
    async fn test_three_correct_answers_level_up() {
        let svc = service(0);
        let id = svc.start_session(OperationKind::Sub, Locale::Es).await.session_id;
        let mut last = None;
        for _ in 0..3 {
            let served = svc.next_problem(&id, None, Locale::Es).await.unwrap();
            last = Some(
                svc.grade_answer(&id, &right_answer(&served.problem), Locale::Es)
                    .await
                    .unwrap(),
            );
        }
        let state = last.unwrap().state;
        assert_eq!((state.level, state.streak, state.correct), (2, 0, 3));
    }

    #[tokio::test]
    async fn test_wrong_answer_feedback() {
        let svc = service(0);
        let id = svc.start_session(OperationKind::Add, Locale::En).await.session_id;
        svc.next_problem(&id, None, Locale::En).await.unwrap();
        let graded = svc.grade_answer(&id, &json!("abc"), Locale::En).await.unwrap();
        assert!(!graded.correct);
        assert!(graded.feedback.starts_with("Almost."));
        assert_eq!(graded.next_hint, "Add ones; if ≥10, carry 1.");
        assert_eq!(graded.state.wrong, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rounds_keep_queue_bounded() {
        let svc = Arc::new(service(2));
        let id = svc.start_session(OperationKind::Mul, Locale::En).await.session_id;
        svc.next_problem(&id, None, Locale::En).await.unwrap();

        let rounds = (0..16).map(|_| {
            let svc = Arc::clone(&svc);
            let id = id.clone();
            tokio::spawn(async move {
                let served = svc.next_problem(&id, None, Locale::En).await.unwrap();
                svc.grade_answer(&id, &right_answer(&served.problem), Locale::En)
                    .await
                    .unwrap()
            })
        });
        for graded in futures::future::join_all(rounds).await {
            let graded = graded.unwrap();
            assert!(graded.state.correct + graded.state.wrong <= 16);
        }

        let slot = svc.store().get(&id).unwrap();
        assert!(slot.lock().await.queue.len() <= svc.queue_target());
        tokio::time::sleep(Duration::from_millis(50)).await;
        let session = slot.lock().await;
        assert!(session.queue.len() <= svc.queue_target());
        assert_eq!(session.difficulty.correct + session.difficulty.wrong, 16);
    }

    #[tokio::test]
    async fn test_end_session() {
        let svc = service(3);
        let id = svc.start_session(OperationKind::Add, Locale::Es).await.session_id;
        assert!(svc.end_session(&id));
        assert!(!svc.end_session(&id));
        assert!(svc.next_problem(&id, None, Locale::Es).await.is_err());
    }
}
