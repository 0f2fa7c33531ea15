//! Debounce windows with a max-wait ceiling, one window per key.
//!
//! A key fires once it has been quiet for `debounce`, or once `max_wait` has
//! passed since the first touch of the window, whichever comes first. Timers
//! are tokio tasks; fired keys are delivered through [`DebounceScheduler::next_due`].

use crate::policy::AutosavePolicy;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

struct PendingWindow {
    first_touch: Instant,
    deadline: Instant,
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct DebounceScheduler<T>
where
    T: Copy + Eq + Hash + Send + 'static,
{
    debounce: Duration,
    max_wait: Duration,
    next_generation: u64,
    pending: HashMap<T, PendingWindow>,
    ready: VecDeque<T>,
    fired_tx: mpsc::UnboundedSender<(T, u64)>,
    fired_rx: mpsc::UnboundedReceiver<(T, u64)>,
}

impl<T> DebounceScheduler<T>
where
    T: Copy + Eq + Hash + Send + 'static,
{
    pub fn new(debounce: Duration, max_wait: Duration) -> Self {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        Self {
            debounce,
            max_wait: max_wait.max(debounce),
            next_generation: 0,
            pending: HashMap::new(),
            ready: VecDeque::new(),
            fired_tx,
            fired_rx,
        }
    }

    pub fn from_policy(policy: &AutosavePolicy) -> Self {
        let policy = policy.normalized();
        Self::new(policy.debounce(), policy.max_wait())
    }

    /// Records activity on `key`, (re)arming its window.
    pub fn schedule(&mut self, key: T) {
        let now = Instant::now();
        let first_touch = match self.pending.remove(&key) {
            // The previous window elapsed but was not collected yet: keep its
            // delivery and open a fresh window for the new activity.
            Some(window) if window.deadline <= now => {
                window.handle.abort();
                if !self.ready.contains(&key) {
                    self.ready.push_back(key);
                }
                now
            }
            Some(window) => {
                window.handle.abort();
                window.first_touch
            }
            None => now,
        };
        let deadline = (now + self.debounce).min(first_touch + self.max_wait);

        self.next_generation += 1;
        let generation = self.next_generation;
        let fired_tx = self.fired_tx.clone();
        let handle = tokio::spawn(async move {
            sleep_until(deadline).await;
            let _ = fired_tx.send((key, generation));
        });

        self.pending.insert(
            key,
            PendingWindow {
                first_touch,
                deadline,
                generation,
                handle,
            },
        );
    }

    pub fn cancel(&mut self, key: T) -> bool {
        self.ready.retain(|ready| *ready != key);
        match self.pending.remove(&key) {
            Some(window) => {
                window.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        self.ready.clear();
        for (_, window) in self.pending.drain() {
            window.handle.abort();
        }
    }

    pub fn is_pending(&self, key: T) -> bool {
        self.pending.contains_key(&key) || self.ready.contains(&key)
    }

    /// Waits for the next window to elapse and returns its key.
    ///
    /// Deliveries from windows that were re-armed or cancelled in the
    /// meantime are skipped. Returns `None` right away when no window is open.
    pub async fn next_due(&mut self) -> Option<T> {
        if let Some(key) = self.ready.pop_front() {
            return Some(key);
        }
        loop {
            if self.pending.is_empty() {
                return None;
            }
            let (key, generation) = self.fired_rx.recv().await?;
            let current = self
                .pending
                .get(&key)
                .is_some_and(|window| window.generation == generation);
            if current {
                self.pending.remove(&key);
                return Some(key);
            }
        }
    }
}

impl<T> Drop for DebounceScheduler<T>
where
    T: Copy + Eq + Hash + Send + 'static,
{
    fn drop(&mut self) {
        self.cancel_all();
    }
}
