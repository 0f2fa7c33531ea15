use super::ChangeNotifier;
use crate::core::EntityId;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::sync::watch;

/// Lightweight refresh signals: bumped after every successful write so list
/// views can reload.
pub struct RefreshSignals {
    ticks: Mutex<BTreeMap<&'static str, u64>>,
    total: watch::Sender<u64>,
}

impl RefreshSignals {
    pub fn new() -> Self {
        let (total, _) = watch::channel(0);
        Self {
            ticks: Mutex::new(BTreeMap::new()),
            total,
        }
    }

    pub fn bump(&self, kind: &'static str) -> u64 {
        let tick = match self.ticks.lock() {
            Ok(mut ticks) => {
                let tick = ticks.entry(kind).or_insert(0);
                *tick += 1;
                *tick
            }
            Err(_) => 0,
        };
        self.total.send_modify(|total| *total += 1);
        tick
    }

    pub fn tick(&self, kind: &str) -> u64 {
        self.ticks
            .lock()
            .ok()
            .and_then(|ticks| ticks.get(kind).copied())
            .unwrap_or(0)
    }

    /// Receiver that observes every bump across all kinds.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.total.subscribe()
    }
}

impl Default for RefreshSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier for RefreshSignals {
    fn notify_external_watchers(&self, kind: &'static str, _entity_id: &EntityId) {
        self.bump(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_are_counted_per_kind() {
        let signals = RefreshSignals::new();
        let rx = signals.subscribe();

        signals.notify_external_watchers("task", &EntityId::from("t"));
        signals.notify_external_watchers("task", &EntityId::from("t"));
        signals.notify_external_watchers("project", &EntityId::from("p"));

        assert_eq!(signals.tick("task"), 2);
        assert_eq!(signals.tick("project"), 1);
        assert_eq!(signals.tick("space"), 0);
        assert_eq!(*rx.borrow(), 3);
    }
}
