// ── Device hub ──
//
// Owns one PollingCoordinator per configured device, keyed by device id.
// Setting up an entry runs the first refresh; only a device that answered
// is registered and handed a background poll task.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::SensorCatalog;
use crate::config::DeviceEntry;
use crate::coordinator::PollingCoordinator;
use crate::device::Connector;
use crate::error::CoreError;

struct EntryHandle<C: Connector> {
    coordinator: Arc<PollingCoordinator<C>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Registry of running device coordinators.
pub struct DeviceHub<C: Connector> {
    connector: Arc<C>,
    catalog: Arc<SensorCatalog>,
    entries: DashMap<String, EntryHandle<C>>,
    cancel: CancellationToken,
}

impl<C: Connector> DeviceHub<C> {
    /// A hub using the reference sensor catalog.
    pub fn new(connector: Arc<C>) -> Self {
        Self::with_catalog(connector, SensorCatalog::reference())
    }

    pub fn with_catalog(connector: Arc<C>, catalog: SensorCatalog) -> Self {
        Self {
            connector,
            catalog: Arc::new(catalog),
            entries: DashMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    // ── Entry lifecycle ──────────────────────────────────────────

    /// Set up polling for `entry`.
    ///
    /// Runs the first update cycle before registering anything; a failure
    /// there leaves the hub unchanged and reports the device as not ready.
    /// A hub that has been shut down accepts no new entries.
    pub async fn setup_entry(
        &self,
        entry: DeviceEntry,
    ) -> Result<Arc<PollingCoordinator<C>>, CoreError> {
        if self.is_shut_down() {
            return Err(CoreError::ShutDown);
        }
        let device_id = entry.unique_id().to_owned();
        if self.entries.contains_key(&device_id) {
            return Err(CoreError::AlreadySetUp { device_id });
        }

        let scan_interval = entry.scan_interval;
        let coordinator = Arc::new(PollingCoordinator::new(
            entry,
            Arc::clone(&self.connector),
            Arc::clone(&self.catalog),
        ));

        coordinator
            .run_update_cycle()
            .await
            .map_err(|source| CoreError::NotReady {
                device_id: device_id.clone(),
                source,
            })?;

        // Shutdown may have started during the first refresh.
        if self.is_shut_down() {
            return Err(CoreError::ShutDown);
        }
        match self.entries.entry(device_id.clone()) {
            Entry::Occupied(_) => Err(CoreError::AlreadySetUp { device_id }),
            Entry::Vacant(slot) => {
                let cancel = self.cancel.child_token();
                let task = tokio::spawn(poll_task(
                    Arc::clone(&coordinator),
                    scan_interval,
                    cancel.clone(),
                ));
                slot.insert(EntryHandle {
                    coordinator: Arc::clone(&coordinator),
                    cancel,
                    task,
                });
                info!(
                    device_id = %device_id,
                    interval_secs = scan_interval.as_secs(),
                    "device set up"
                );
                Ok(coordinator)
            }
        }
    }

    /// Stop polling `device_id` and drop its coordinator.
    ///
    /// Returns `false` if the device was not set up. An in-flight cycle runs
    /// to its own timeout before the task ends.
    pub async fn unload_entry(&self, device_id: &str) -> bool {
        let Some((_, handle)) = self.entries.remove(device_id) else {
            return false;
        };
        handle.cancel.cancel();
        if let Err(e) = handle.task.await {
            warn!(device_id, error = %e, "poll task ended abnormally");
        }
        debug!(device_id, "device unloaded");
        true
    }

    /// Unload every device. Later calls to [`Self::setup_entry`] fail with
    /// [`CoreError::ShutDown`].
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        for device_id in self.device_ids() {
            self.unload_entry(&device_id).await;
        }
    }

    // ── Lookup ───────────────────────────────────────────────────

    pub fn coordinator(&self, device_id: &str) -> Option<Arc<PollingCoordinator<C>>> {
        self.entries
            .get(device_id)
            .map(|h| Arc::clone(&h.coordinator))
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Run an update cycle every `period` until cancelled.
///
/// A tick that elapses while a cycle is still running is skipped, not
/// queued: the next cycle starts one full period after the slow one ends.
async fn poll_task<C: Connector>(
    coordinator: Arc<PollingCoordinator<C>>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await; // the first refresh already ran during setup

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let started = Instant::now();
                // Failures are recorded in the coordinator state.
                let _ = coordinator.run_update_cycle().await;
                if started.elapsed() >= period {
                    interval.reset();
                }
            }
        }
    }
    debug!(device_id = coordinator.device_id(), "poll task stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::test_support::{DEVICE_ID, Reply, ScriptedConnector, entry};

    fn hub(connector: &ScriptedConnector) -> DeviceHub<ScriptedConnector> {
        DeviceHub::new(Arc::new(connector.clone()))
    }

    fn ok_reply() -> Reply {
        Reply::status(json!({ "dps": { "8": 238 } }))
    }

    #[tokio::test(start_paused = true)]
    async fn setup_runs_first_refresh_and_polls_on_interval() {
        let connector = ScriptedConnector::repeating(ok_reply());
        let hub = hub(&connector);

        let coordinator = hub.setup_entry(entry("Pool")).await.unwrap();
        assert_eq!(connector.fetches(), 1);
        assert!(coordinator.snapshot().last_cycle_succeeded);

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(connector.fetches(), 4);

        hub.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_first_refresh_registers_nothing() {
        let connector = ScriptedConnector::new([Reply::Unavailable]);
        let hub = hub(&connector);

        let err = hub.setup_entry(entry("Pool")).await.err().unwrap();

        assert!(matches!(err, CoreError::NotReady { .. }));
        assert!(hub.is_empty());
        assert!(hub.coordinator(DEVICE_ID).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_device_is_rejected() {
        let connector = ScriptedConnector::repeating(ok_reply());
        let hub = hub(&connector);

        hub.setup_entry(entry("Pool")).await.unwrap();
        let err = hub.setup_entry(entry("Pool again")).await.err().unwrap();

        assert!(matches!(err, CoreError::AlreadySetUp { .. }));
        assert_eq!(hub.len(), 1);
        hub.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn setup_after_shutdown_is_refused() {
        let connector = ScriptedConnector::repeating(ok_reply());
        let hub = hub(&connector);

        hub.shutdown().await;
        let err = hub.setup_entry(entry("Pool")).await.err().unwrap();

        assert!(matches!(err, CoreError::ShutDown));
        assert!(hub.is_shut_down());
        assert!(hub.is_empty());
        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(connector.fetches(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_first_refresh_registers_nothing() {
        let connector = ScriptedConnector::repeating(Reply::Slow(
            Duration::from_secs(5),
            Box::new(ok_reply()),
        ));
        let hub = Arc::new(hub(&connector));

        let setup = tokio::spawn({
            let hub = Arc::clone(&hub);
            async move { hub.setup_entry(entry("Pool")).await.map(|_| ()) }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        hub.shutdown().await;

        let err = setup.await.unwrap().err().unwrap();
        assert!(matches!(err, CoreError::ShutDown));
        assert!(hub.is_empty());
        assert_eq!(connector.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unload_stops_polling() {
        let connector = ScriptedConnector::repeating(ok_reply());
        let hub = hub(&connector);

        hub.setup_entry(entry("Pool")).await.unwrap();
        assert!(hub.unload_entry(DEVICE_ID).await);
        assert!(!hub.unload_entry(DEVICE_ID).await);

        let before = connector.fetches();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(connector.fetches(), before);
        assert!(hub.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_cycle_skips_missed_ticks() {
        // First refresh answers immediately, later cycles take 70s against
        // a 30s interval.
        let connector = ScriptedConnector::new([ok_reply()])
            .then_repeat(Reply::Slow(Duration::from_secs(70), Box::new(ok_reply())));
        let hub = hub(&connector);

        hub.setup_entry(entry("Pool")).await.unwrap();
        assert_eq!(connector.fetches(), 1);

        // Cycle runs from 30s to 100s. Ticks at 60s and 90s are dropped,
        // so the next cycle starts at 130s.
        tokio::time::sleep(Duration::from_secs(110)).await;
        assert_eq!(connector.fetches(), 2);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(connector.fetches(), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(connector.fetches(), 3);

        hub.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failing_cycles_keep_entry_registered() {
        let connector = ScriptedConnector::new([ok_reply()]).then_repeat(Reply::Timeout);
        let hub = hub(&connector);

        let coordinator = hub.setup_entry(entry("Pool")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;

        let state = coordinator.snapshot();
        assert!(!state.last_cycle_succeeded);
        assert!(state.last_reading.is_some());
        assert!(hub.coordinator(DEVICE_ID).is_some());
        hub.shutdown().await;
    }
}
