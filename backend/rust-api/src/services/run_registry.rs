use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use super::quiz_runner::{QuizRunner, RunPhase, TickOutcome};
use crate::metrics::QUIZ_RUNS_ACTIVE;
use crate::models::timer::{TimeExpired, TimerEvent, TimerTick};

const EVENT_BUFFER: usize = 64;

/// One live quiz attempt.
pub struct RunHandle {
    pub id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub runner: Mutex<QuizRunner>,
    /// Set once the completed result has been saved.
    pub result_id: Mutex<Option<String>>,
    /// Taken when the run finishes, which ends every open stream.
    events: std::sync::Mutex<Option<broadcast::Sender<TimerEvent>>>,
    active: AtomicBool,
}

impl RunHandle {
    /// A finished run hands out an already-closed receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        match self.sender() {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Marks the run finished: releases the active gauge and closes its
    /// event channel. Only the first call has an effect.
    pub fn finish(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        if let Ok(mut events) = self.events.lock() {
            events.take();
        }
        QUIZ_RUNS_ACTIVE.dec();
        true
    }

    fn sender(&self) -> Option<broadcast::Sender<TimerEvent>> {
        self.events.lock().ok().and_then(|events| events.clone())
    }

    fn publish(&self, event: TimerEvent) {
        if let Some(sender) = self.sender() {
            // no subscribers is fine
            let _ = sender.send(event);
        }
    }
}

/// In-memory runs keyed by quiz id.
pub struct QuizRunRegistry {
    runs: RwLock<HashMap<String, Arc<RunHandle>>>,
    idempotency: RwLock<HashMap<String, String>>,
    tick_interval: Duration,
    ttl: chrono::Duration,
}

impl QuizRunRegistry {
    pub fn new(tick_interval: Duration, ttl: Duration) -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            idempotency: RwLock::new(HashMap::new()),
            tick_interval,
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(4)),
        }
    }

    fn idempotency_slot(user_id: &str, key: &str) -> String {
        format!("{}:{}", user_id, key)
    }

    /// Run previously started with this user's idempotency key, if still live.
    pub async fn find_by_idempotency(&self, user_id: &str, key: &str) -> Option<Arc<RunHandle>> {
        let run_id = self
            .idempotency
            .read()
            .await
            .get(&Self::idempotency_slot(user_id, key))
            .cloned()?;
        self.get(&run_id).await
    }

    /// Registers a new run and starts its ticker. When the idempotency key
    /// was claimed in the meantime the existing run wins and `false` is
    /// returned alongside it.
    pub async fn start(
        &self,
        user_id: &str,
        runner: QuizRunner,
        idempotency_key: Option<&str>,
    ) -> (Arc<RunHandle>, bool) {
        self.prune_expired().await;

        let mut idempotency = self.idempotency.write().await;
        if let Some(key) = idempotency_key {
            let slot = Self::idempotency_slot(user_id, key);
            if let Some(existing) = idempotency.get(&slot) {
                if let Some(run) = self.runs.read().await.get(existing).cloned() {
                    return (run, false);
                }
            }
        }

        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let handle = Arc::new(RunHandle {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            started_at: Utc::now(),
            runner: Mutex::new(runner),
            result_id: Mutex::new(None),
            events: std::sync::Mutex::new(Some(events)),
            active: AtomicBool::new(true),
        });

        self.runs
            .write()
            .await
            .insert(handle.id.clone(), handle.clone());
        if let Some(key) = idempotency_key {
            idempotency.insert(Self::idempotency_slot(user_id, key), handle.id.clone());
        }
        drop(idempotency);

        QUIZ_RUNS_ACTIVE.inc();
        tracing::info!("Quiz run started: quiz={}, user={}", handle.id, user_id);
        spawn_ticker(Arc::downgrade(&handle), self.tick_interval);
        (handle, true)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<RunHandle>> {
        self.runs.read().await.get(id).cloned()
    }

    /// Drops the run; its ticker stops on the next interval.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.runs.write().await.remove(id);
        if let Some(run) = &removed {
            self.idempotency.write().await.retain(|_, run_id| run_id != id);
            run.finish();
            tracing::info!("Quiz run removed: quiz={}", id);
        }
        removed.is_some()
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }

    pub async fn prune_expired(&self) -> usize {
        let cutoff = Utc::now() - self.ttl;
        let expired: Vec<String> = self
            .runs
            .read()
            .await
            .values()
            .filter(|run| run.started_at < cutoff)
            .map(|run| run.id.clone())
            .collect();
        for id in &expired {
            self.remove(id).await;
        }
        if !expired.is_empty() {
            tracing::info!("Pruned {} expired quiz runs", expired.len());
        }
        expired.len()
    }
}

/// Counts down the current question once per interval and publishes what
/// happened. Holds only a weak reference so a removed run stops it.
fn spawn_ticker(run: Weak<RunHandle>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(run) = run.upgrade() else {
                break;
            };
            if !run.is_active() {
                break;
            }
            let mut runner = run.runner.lock().await;
            if runner.phase() == RunPhase::Completed {
                break;
            }

            let question_number = runner.question_number();
            let event = match runner.tick() {
                TickOutcome::Idle => None,
                TickOutcome::Ticked(remaining) => Some(TimerEvent::TimerTick(TimerTick {
                    quiz_id: run.id.clone(),
                    question_number,
                    remaining_seconds: remaining,
                    total_seconds: runner.settings().seconds_per_question,
                    timestamp: Utc::now(),
                })),
                TickOutcome::TimedOut => {
                    tracing::info!(
                        "Question timed out: quiz={}, question={}",
                        run.id,
                        question_number
                    );
                    Some(TimerEvent::TimeExpired(TimeExpired {
                        quiz_id: run.id.clone(),
                        question_number,
                        timestamp: Utc::now(),
                        message: "Time's up!".to_string(),
                    }))
                }
            };
            drop(runner);

            if let Some(event) = event {
                run.publish(event);
            }
        }
        tracing::debug!("Ticker stopped");
    });
}
