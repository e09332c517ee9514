use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use super::generative::ProblemGenerator;
use super::problem::{Locale, Problem};
use super::session_store::SessionSlot;

/// Per-session FIFO of ready problems.
///
/// One refill task pushes and request handlers pop, both through the owning
/// session's lock; a session never runs two refills at once.
#[derive(Debug, Clone, Default)]
pub struct ProblemQueue {
    items: VecDeque<Problem>,
}

impl ProblemQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, problem: Problem) {
        self.items.push_back(problem);
    }

    pub fn pop(&mut self) -> Option<Problem> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Problem> {
        self.items.iter()
    }
}

/// Tops the session queue up to `target`.
///
/// `(op, level)` is read once when the task starts, so every item of one
/// refill shares the same parameters even if the session is graded meanwhile.
/// Generation runs without holding the session lock.
pub async fn refill(
    slot: Arc<SessionSlot>,
    generator: Arc<ProblemGenerator>,
    target: usize,
    locale: Locale,
    prefer_generative: bool,
) -> usize {
    let (op, level) = {
        let session = slot.lock().await;
        (session.op, session.difficulty.level)
    };

    let mut pushed = 0;
    loop {
        if slot.lock().await.queue.len() >= target {
            break;
        }
        let problem = generator.generate_one(op, level, locale, prefer_generative).await;

        let mut session = slot.lock().await;
        if session.queue.len() >= target {
            break;
        }
        session.queue.push(problem);
        pushed += 1;
    }

    debug!(op = op.as_str(), level, pushed, "prefetch queue refilled");
    pushed
}
