// Position feed
// Background producer publishing full snapshots into a single-slot, latest-wins channel

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::oracle::PositionOracle;
use crate::position::Snapshot;

/// Handle to the running feed task.
pub struct PositionFeed {
    handle: JoinHandle<()>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl PositionFeed {
    /// Start polling `oracle` every `period`.
    ///
    /// Each new snapshot replaces whatever is in the slot, consumed or not.
    /// The task ends on its own if the oracle fails or every [`SnapshotSlot`] is dropped.
    pub fn start(oracle: Arc<dyn PositionOracle>, period: Duration) -> (Self, SnapshotSlot) {
        let (tx, rx) = watch::channel(None);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            info!("Position feed started ({} ms period)", period.as_millis());
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut published = 0u64;
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Position feed shutting down after {} snapshots", published);
                        break;
                    }
                    _ = tx.closed() => {
                        debug!("Snapshot consumer gone, stopping position feed");
                        break;
                    }
                    _ = ticker.tick() => {
                        let oracle = oracle.clone();
                        let now = Utc::now();
                        match tokio::task::spawn_blocking(move || oracle.snapshot(now)).await {
                            Ok(Ok(snapshot)) => {
                                tx.send_replace(Some(snapshot));
                                published += 1;
                            }
                            Ok(Err(e)) => {
                                warn!("Position feed stopped: {}", e);
                                break;
                            }
                            Err(e) => {
                                error!("Snapshot computation aborted: {}", e);
                                break;
                            }
                        }
                    }
                }
            }
        });

        (
            PositionFeed { handle, shutdown_tx: Some(shutdown_tx) },
            SnapshotSlot::new(rx),
        )
    }

    /// The feed task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the feed and wait for the task to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        let _ = self.handle.await;
    }
}

/// Consumer side of the feed. Never waits: returns the newest snapshot if one
/// arrived since the last call, otherwise the one it already holds.
pub struct SnapshotSlot {
    rx: watch::Receiver<Option<Snapshot>>,
    last: Option<Snapshot>,
}

impl SnapshotSlot {
    pub fn new(rx: watch::Receiver<Option<Snapshot>>) -> Self {
        SnapshotSlot { rx, last: None }
    }

    /// Latest known snapshot, if the feed has published at least once.
    pub fn latest(&mut self) -> Option<&Snapshot> {
        // Err means the feed has stopped; whatever it published last is still in the slot
        match self.rx.has_changed() {
            Ok(false) => {}
            Ok(true) | Err(_) => {
                if let Some(snapshot) = self.rx.borrow_and_update().as_ref() {
                    self.last = Some(snapshot.clone());
                }
            }
        }
        self.last.as_ref()
    }
}
