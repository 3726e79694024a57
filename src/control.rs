// Control loop
// Fixed-rate, single-threaded consumer: each tick reads the latest snapshot without
// waiting, polls operator commands, and runs one tracking step to completion.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::feed::SnapshotSlot;
use crate::feedback::FeedbackSink;
use crate::input::CommandInput;
use crate::oracle::PositionOracle;
use crate::position::Snapshot;
use crate::tracking::Tracker;

pub struct ControlLoop {
    tracker: Tracker,
    slot: SnapshotSlot,
    oracle: Arc<dyn PositionOracle>,
    input: Box<dyn CommandInput>,
    sink: Box<dyn FeedbackSink>,
    tick: Duration,
    cycles: u64,
}

impl ControlLoop {
    pub fn new(
        tracker: Tracker,
        slot: SnapshotSlot,
        oracle: Arc<dyn PositionOracle>,
        input: Box<dyn CommandInput>,
        sink: Box<dyn FeedbackSink>,
        tick: Duration,
    ) -> Self {
        ControlLoop { tracker, slot, oracle, input, sink, tick, cycles: 0 }
    }

    /// Run until a cancel command arrives. Returns the tracker in its final state.
    pub async fn run(mut self) -> Tracker {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if !self.cycle(Utc::now()) {
                break;
            }
        }
        info!(
            "Control loop stopped after {} cycles, {} objects tracked",
            self.cycles,
            self.tracker.history().len()
        );
        self.tracker
    }

    /// One control cycle. Returns false once cancelled.
    pub fn cycle(&mut self, now: DateTime<Utc>) -> bool {
        let commands = self.input.poll();
        if commands.cancel {
            info!("Cancel requested");
            return false;
        }
        self.cycles += 1;

        let snapshot = match self.slot.latest() {
            Some(snapshot) => snapshot.clone(),
            None => Snapshot::empty(now),
        };
        self.tracker.step(
            &snapshot,
            now,
            commands.switch,
            self.oracle.as_ref(),
            self.sink.as_mut(),
        );
        true
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::feed::PositionFeed;
    use crate::feedback::{HandoffEvent, Status};
    use crate::input::Commands;
    use crate::position::{ObjectId, PositionSample};
    use crate::tracking::tests::TableOracle;
    use crate::tracking::TrackingState;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::watch;

    /// Plays back a fixed list of commands, then cancels.
    struct Scripted(VecDeque<Commands>);

    impl CommandInput for Scripted {
        fn poll(&mut self) -> Commands {
            self.0.pop_front().unwrap_or(Commands { switch: false, cancel: true })
        }
    }

    /// Never issues a command.
    struct Idle;

    impl CommandInput for Idle {
        fn poll(&mut self) -> Commands {
            Commands::default()
        }
    }

    fn idle(cycles: usize) -> Scripted {
        Scripted(std::iter::repeat(Commands::default()).take(cycles).collect())
    }

    /// Counts alerts through a shared handle so the test can inspect them after the loop.
    #[derive(Clone, Default)]
    struct Alerts(Arc<Mutex<(usize, usize, usize)>>);

    impl FeedbackSink for Alerts {
        fn on_handoff_success(&mut self, _event: &HandoffEvent) {
            self.0.lock().unwrap().0 += 1;
        }

        fn on_handoff_failure(&mut self, _current: &ObjectId, _at: DateTime<Utc>) {
            self.0.lock().unwrap().1 += 1;
        }

        fn on_status(&mut self, _status: &Status) {
            self.0.lock().unwrap().2 += 1;
        }
    }

    #[tokio::test]
    async fn test_cancel_ends_loop() {
        let oracle = Arc::new(TableOracle::with(&[("A", 60.0, 10.0)]));
        let (_tx, rx) = watch::channel(None);
        let control = ControlLoop::new(
            Tracker::new(TrackerConfig::default()),
            SnapshotSlot::new(rx),
            oracle,
            Box::new(idle(0)),
            Box::new(Alerts::default()),
            Duration::from_millis(1),
        );
        let tracker = tokio::time::timeout(Duration::from_secs(5), control.run())
            .await
            .expect("loop should stop on cancel");
        // No snapshot ever arrived
        assert_eq!(tracker.state(), &TrackingState::NoTarget);
    }

    #[tokio::test]
    async fn test_loop_reuses_last_snapshot() {
        let oracle = Arc::new(TableOracle::with(&[("A", 60.0, 10.0), ("B", 55.0, 12.0)]));
        let (tx, rx) = watch::channel(None);
        let alerts = Alerts::default();
        let mut control = ControlLoop::new(
            Tracker::new(TrackerConfig::default()),
            SnapshotSlot::new(rx),
            oracle.clone(),
            Box::new(Scripted(
                vec![
                    Commands::default(),
                    Commands::default(),
                    Commands { switch: true, cancel: false },
                    Commands::default(),
                ]
                .into(),
            )),
            Box::new(alerts.clone()),
            Duration::from_millis(1),
        );

        // Nothing published yet
        assert!(control.cycle(Utc::now()));
        assert_eq!(control.tracker().state(), &TrackingState::NoTarget);

        tx.send_replace(Some(oracle.snapshot_now()));
        drop(tx);
        // Feed is gone; the held snapshot keeps driving decisions
        assert!(control.cycle(Utc::now()));
        assert_eq!(control.tracker().state().target(), Some(&ObjectId::new("A")));
        assert!(control.cycle(Utc::now()));
        assert_eq!(control.tracker().state().target(), Some(&ObjectId::new("B")));
        assert!(control.cycle(Utc::now()));
        assert!(!control.cycle(Utc::now()));
        assert_eq!(control.cycles(), 4);

        let (successes, failures, statuses) = *alerts.0.lock().unwrap();
        assert_eq!(successes, 2);
        assert_eq!(failures, 0);
        assert_eq!(statuses, 3);
    }

    #[tokio::test]
    async fn test_end_to_end_with_feed() {
        let oracle = Arc::new(TableOracle::with(&[
            ("A", 60.0, 10.0),
            ("B", 55.0, 12.0),
            ("C", 20.0, 40.0),
        ]));
        let (feed, slot) = PositionFeed::start(oracle.clone(), Duration::from_millis(2));
        let alerts = Alerts::default();
        let mut control = ControlLoop::new(
            Tracker::new(TrackerConfig::default()),
            slot,
            oracle.clone(),
            Box::new(Idle),
            Box::new(alerts.clone()),
            Duration::from_millis(2),
        );

        tokio::time::timeout(Duration::from_secs(5), async {
            while control.tracker().state().target().is_none() {
                control.cycle(Utc::now());
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("should acquire a target");
        let first = control.tracker().state().target().cloned().unwrap();

        // The tracked object sets; the feed delivers the change
        oracle.set(first.as_str(), 10.0, 10.0);
        tokio::time::timeout(Duration::from_secs(5), async {
            while control.tracker().state().target() == Some(&first) {
                tokio::time::sleep(Duration::from_millis(5)).await;
                control.cycle(Utc::now());
            }
        })
        .await
        .expect("should hand off");

        let history = control.tracker().history();
        assert!(history.contains(&ObjectId::new("A")));
        assert!(history.contains(&ObjectId::new("B")));
        assert!(!history.contains(&ObjectId::new("C")));
        assert_eq!(alerts.0.lock().unwrap().0, 2);

        feed.shutdown().await;
    }

    #[test]
    fn test_malformed_snapshot_does_not_stop_loop() {
        let oracle = Arc::new(TableOracle::with(&[("A", 60.0, 10.0)]));
        let (tx, rx) = watch::channel(None);
        let mut control = ControlLoop::new(
            Tracker::new(TrackerConfig::default()),
            SnapshotSlot::new(rx),
            oracle,
            Box::new(idle(2)),
            Box::new(Alerts::default()),
            Duration::from_millis(1),
        );
        tx.send_replace(Some(Snapshot::new(
            Utc::now(),
            vec![PositionSample::new("BAD", f64::NAN, 10.0), PositionSample::new("A", 60.0, 10.0)],
        )));
        assert!(control.cycle(Utc::now()));
        assert_eq!(control.tracker().state().target(), Some(&ObjectId::new("A")));
        assert!(control.cycle(Utc::now()));
        assert!(!control.cycle(Utc::now()));
    }
}
