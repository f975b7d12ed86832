// src/synthesizer/publisher.rs
use super::snapshot::{ChangeSignal, RoutingSnapshot, RoutingTable};
use arc_swap::ArcSwap;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Holds the current snapshot behind an atomic pointer.
///
/// Readers load without locking. Writers serialize on a short mutex so that the
/// version bump, the swap and the change notification happen as one step.
pub struct SnapshotPublisher {
    current: ArcSwap<RoutingSnapshot>,
    versions: watch::Sender<u64>,
    write: Mutex<()>,
}

impl SnapshotPublisher {
    /// Starts from an empty version-0 snapshot so readers never see nothing.
    pub fn new() -> Self {
        let (versions, receiver) = watch::channel(0);
        let initial = RoutingSnapshot {
            version: 0,
            created_at: Utc::now(),
            table: RoutingTable::default(),
            change_signal: ChangeSignal::new(0, receiver),
        };

        Self {
            current: ArcSwap::from_pointee(initial),
            versions,
            write: Mutex::new(()),
        }
    }

    pub fn current(&self) -> Arc<RoutingSnapshot> {
        self.current.load_full()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.versions.subscribe()
    }

    pub fn publish(&self, table: RoutingTable) -> Arc<RoutingSnapshot> {
        let _guard = self.write.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let version = self.current.load().version + 1;
        let snapshot = Arc::new(RoutingSnapshot {
            version,
            created_at: Utc::now(),
            table,
            change_signal: ChangeSignal::new(version, self.versions.subscribe()),
        });

        self.current.store(snapshot.clone());
        self.versions.send_replace(version);
        snapshot
    }
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_initial_snapshot_is_empty() {
        let publisher = SnapshotPublisher::new();
        let snapshot = publisher.current();

        assert_eq!(snapshot.version, 0);
        assert!(snapshot.routes().is_empty());
        assert!(!snapshot.change_signal.has_changed());
    }

    #[test]
    fn test_publish_supersedes_previous_signal() {
        let publisher = SnapshotPublisher::new();
        let before = publisher.current();

        let after = publisher.publish(RoutingTable::default());

        assert_eq!(after.version, 1);
        assert!(before.change_signal.has_changed());
        assert!(!after.change_signal.has_changed());
        assert_eq!(publisher.current().version, 1);
    }

    #[tokio::test]
    async fn test_changed_resolves_on_publish() {
        let publisher = Arc::new(SnapshotPublisher::new());
        let signal = publisher.current().change_signal.clone();

        let waiter = tokio::spawn(async move { signal.changed().await });
        publisher.publish(RoutingTable::default());

        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_changed_reports_dropped_publisher() {
        let publisher = SnapshotPublisher::new();
        let signal = publisher.current().change_signal.clone();
        drop(publisher);

        assert!(!signal.changed().await);
    }

    #[test]
    fn test_concurrent_publishes_get_distinct_versions() {
        let publisher = Arc::new(SnapshotPublisher::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let publisher = publisher.clone();
                thread::spawn(move || {
                    (0..50)
                        .map(|_| publisher.publish(RoutingTable::default()).version)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut versions: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        versions.sort_unstable();
        versions.dedup();

        assert_eq!(versions.len(), 200);
        assert_eq!(publisher.current().version, 200);
    }
}
