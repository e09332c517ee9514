use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::MutexGuard;
use tokio::task::JoinHandle;

use super::difficulty::DifficultyState;
use super::prefetch::ProblemQueue;
use super::problem::{OperationKind, Problem};

#[derive(Debug, Clone)]
pub struct Session {
    pub op: OperationKind,
    pub difficulty: DifficultyState,
    pub last_problem: Option<Problem>,
    /// Problem computed eagerly at grading time, served before the queue.
    pub on_deck: Option<Problem>,
    pub queue: ProblemQueue,
}

impl Session {
    pub fn new(op: OperationKind) -> Self {
        Self {
            op,
            difficulty: DifficultyState::default(),
            last_problem: None,
            on_deck: None,
            queue: ProblemQueue::new(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            op: self.op,
            level: self.difficulty.level,
            streak: self.difficulty.streak,
            correct: self.difficulty.correct,
            wrong: self.difficulty.wrong,
        }
    }
}

/// Public view of a session returned by every session endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub op: OperationKind,
    pub level: u8,
    pub streak: u32,
    pub correct: u32,
    pub wrong: u32,
}

/// One session plus its lifecycle bookkeeping. All mutations of the session
/// go through the async mutex, which serializes requests on the same id.
pub struct SessionSlot {
    state: tokio::sync::Mutex<Session>,
    refill: Mutex<Option<JoinHandle<()>>>,
    last_access_ms: AtomicI64,
}

impl SessionSlot {
    pub fn new(op: OperationKind) -> Self {
        Self {
            state: tokio::sync::Mutex::new(Session::new(op)),
            refill: Mutex::new(None),
            last_access_ms: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.state.lock().await
    }

    pub fn touch(&self) {
        self.last_access_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn idle_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.last_access_ms.load(Ordering::Relaxed)
    }

    /// Installs a new refill task, aborting the one it replaces.
    pub fn replace_refill(&self, handle: JoinHandle<()>) {
        if let Some(previous) = self.refill.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn abort_refill(&self) {
        if let Some(handle) = self.refill.lock().take() {
            handle.abort();
        }
    }

    pub fn refill_running(&self) -> bool {
        self.refill
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        self.abort_refill();
    }
}

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<SessionSlot>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, op: OperationKind) -> (String, Arc<SessionSlot>) {
        let id = format!("sess-{}", uuid::Uuid::new_v4().simple());
        let slot = Arc::new(SessionSlot::new(op));
        self.sessions.write().insert(id.clone(), Arc::clone(&slot));
        (id, slot)
    }

    /// Looks a session up and marks it as recently used.
    pub fn get(&self, id: &str) -> Option<Arc<SessionSlot>> {
        let slot = self.sessions.read().get(id).cloned()?;
        slot.touch();
        Some(slot)
    }

    pub fn remove(&self, id: &str) -> bool {
        match self.sessions.write().remove(id) {
            Some(slot) => {
                slot.abort_refill();
                true
            }
            None => false,
        }
    }

    /// Evicts sessions idle for longer than `ttl`, returning how many went.
    pub fn cleanup_expired(&self, ttl: Duration) -> usize {
        let now = Utc::now().timestamp_millis();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);

        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, slot| {
            let keep = slot.idle_ms(now) <= ttl_ms;
            if !keep {
                slot.abort_refill();
            }
            keep
        });
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
