// ── Reconciliation coordinator ──
//
// Owns the published snapshot. Each tick fetches status, inventory and
// events concurrently, retries each source independently, merges what
// arrived into a new snapshot and publishes it by replacement.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use vesta_api::{PanelApi, PanelClient, PanelTransport, TransportConfig, panel_base_url};

use crate::clock::{Clock, SystemClock};
use crate::command::{self, CommandDispatcher, InFlight, PendingCommand};
use crate::config::{PanelConfig, PollSettings};
use crate::error::{CommandError, CoreError, FetchError};
use crate::model::{
    ArmMode, DeviceId, DeviceRecord, Freshness, PanelSnapshot, Source, SourceFreshness,
    SystemSnapshot,
};
use crate::parse::{
    LogEntry, ScopeIndex, ZoneIndex, parse_event_log, parse_inventory, parse_status,
};
use crate::retry;
use crate::store::{EventWindows, SnapshotStore, merge_batch};
use crate::stream::ChangeStream;

// ── Observable state ─────────────────────────────────────────────

/// Reachability of the panel as seen by the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No tick has completed yet.
    Connecting,
    Online,
    /// Every source failed on the last `consecutive_failures` ticks.
    Degraded { consecutive_failures: u32 },
    Offline { consecutive_failures: u32 },
    /// The panel rejected the credentials.
    AuthRequired,
}

/// Phase of the current or last tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Fetching,
    Merging,
    Published { generation: u64 },
    Failed,
    /// Polling at reduced frequency until `until`.
    BackingOff { until: Instant },
}

/// How one source fared within one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: Source,
    pub attempts: u32,
    pub error: Option<FetchError>,
}

impl SourceReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of one call to [`Coordinator::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Status arrived; a new snapshot was published. Inventory or events
    /// may have been carried forward as stale.
    Published {
        generation: u64,
        changed: bool,
        reports: Vec<SourceReport>,
    },
    /// Status failed while another source succeeded. Nothing published.
    StatusUnavailable { reports: Vec<SourceReport> },
    /// Every source failed. Nothing published.
    FullFailure {
        consecutive_failures: u32,
        reports: Vec<SourceReport>,
    },
    /// The panel rejected the credentials. Nothing published.
    AuthFailed { reports: Vec<SourceReport> },
    /// Reduced-frequency mode; the next poll is due at `until`.
    Deferred { until: Instant },
    /// Another tick was already running.
    Skipped,
    /// Shutdown interrupted the tick.
    Cancelled,
}

impl TickOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }
}

// ── Coordinator ──────────────────────────────────────────────────

/// Polls one panel and owns its reconciled state.
///
/// Cheaply cloneable; clones share the same snapshot, channels and
/// shutdown token.
pub struct Coordinator<T> {
    pub(crate) inner: Arc<Inner<T>>,
}

impl<T> Clone for Coordinator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(crate) struct Inner<T> {
    pub(crate) transport: T,
    pub(crate) settings: PollSettings,
    clock: Arc<dyn Clock>,
    pub(crate) store: SnapshotStore,
    connection: watch::Sender<ConnectionState>,
    poller: watch::Sender<PollerState>,
    ticking: AtomicBool,
    health: Mutex<Health>,
    scopes: Mutex<ScopeIndex>,
    pub(crate) pending: Mutex<Option<PendingCommand>>,
    pub(crate) next_command_id: AtomicU64,
    refresh: Notify,
    pub(crate) cancel: CancellationToken,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug, Default)]
struct Health {
    consecutive_failures: u32,
    resume_at: Option<Instant>,
}

pub(crate) fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Coordinator<PanelClient> {
    /// Build a coordinator talking HTTP to the configured panel.
    pub fn from_config(config: &PanelConfig) -> Result<Self, CoreError> {
        let base_url = panel_base_url(&config.host, config.use_https)?;
        let transport = TransportConfig {
            timeout: config.timeout,
            accept_invalid_certs: config.accept_invalid_certs,
        };
        let client = PanelClient::new(
            base_url,
            config.username.clone(),
            config.password.clone(),
            &transport,
        )?;
        Ok(Self::new(client, config.poll.clone()))
    }
}

impl<T: PanelTransport> Coordinator<T> {
    pub fn new(transport: T, settings: PollSettings) -> Self {
        Self::with_clock(transport, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(transport: T, settings: PollSettings, clock: Arc<dyn Clock>) -> Self {
        let store = SnapshotStore::new(SystemSnapshot::empty(clock.now()));
        let (connection, _) = watch::channel(ConnectionState::Connecting);
        let (poller, _) = watch::channel(PollerState::Idle);

        Self {
            inner: Arc::new(Inner {
                transport,
                settings,
                clock,
                store,
                connection,
                poller,
                ticking: AtomicBool::new(false),
                health: Mutex::new(Health::default()),
                scopes: Mutex::new(ScopeIndex::default()),
                pending: Mutex::new(None),
                next_command_id: AtomicU64::new(1),
                refresh: Notify::new(),
                cancel: CancellationToken::new(),
                task: tokio::sync::Mutex::new(None),
            }),
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.inner.settings
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    // ── Consumer surface ─────────────────────────────────────────

    /// The latest published snapshot. Wait-free.
    pub fn current_snapshot(&self) -> Arc<SystemSnapshot> {
        self.inner.store.current()
    }

    /// Change sets for every publish that changed something.
    pub fn subscribe(&self) -> ChangeStream {
        ChangeStream::new(self.inner.store.subscribe_changes())
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<Arc<SystemSnapshot>> {
        self.inner.store.subscribe_snapshots()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.subscribe()
    }

    pub fn poller_state(&self) -> watch::Receiver<PollerState> {
        self.inner.poller.subscribe()
    }

    /// Command path sharing this coordinator's in-flight slot.
    pub fn dispatcher(&self) -> CommandDispatcher<T> {
        CommandDispatcher::new(self.clone())
    }

    /// Shorthand for `self.dispatcher().set_arm_mode(target)`.
    pub async fn set_arm_mode(&self, target: ArmMode) -> Result<(), CommandError> {
        self.dispatcher().set_arm_mode(target).await
    }

    pub fn in_flight(&self) -> Option<InFlight> {
        command::in_flight(&self.inner.pending)
    }

    /// One unretried status fetch, outside the tick cycle. Publishes
    /// nothing; useful for checking credentials.
    pub async fn probe(&self) -> Result<PanelSnapshot, CoreError> {
        let body = self.inner.transport.fetch_status().await?;
        Ok(parse_status(&body, self.inner.clock.now())?)
    }

    /// Ask the poll loop for a tick now and lift any reduced-frequency
    /// deferral.
    pub fn refresh_now(&self) {
        lock(&self.inner.health).resume_at = None;
        self.inner.refresh.notify_one();
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Drive ticks on `poll_interval` until [`shutdown`](Self::shutdown).
    pub async fn run(&self) {
        let inner = &*self.inner;
        let mut interval = tokio::time::interval(inner.settings.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = inner.cancel.cancelled() => break,
                () = inner.refresh.notified() => debug!("immediate refresh requested"),
                _ = interval.tick() => {}
            }
            tokio::select! {
                biased;
                () = inner.cancel.cancelled() => break,
                outcome = self.tick() => trace!(?outcome, "tick finished"),
            }
        }

        inner.poller.send_replace(PollerState::Idle);
        debug!("poll loop stopped");
    }

    /// Cancel in-flight work, resolve a pending command as abandoned and
    /// wait for the poll loop started by [`start`](Self::start).
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        command::abandon(&self.inner.pending);

        if let Some(handle) = self.inner.task.lock().await.take() {
            let _ = handle.await;
        }
        info!("coordinator stopped");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    // ── Tick ─────────────────────────────────────────────────────

    /// Run one reconciliation step.
    ///
    /// Returns immediately with `Skipped` if another tick is running.
    pub async fn tick(&self) -> TickOutcome {
        let inner = &*self.inner;
        if inner.cancel.is_cancelled() {
            return TickOutcome::Cancelled;
        }
        let Some(_guard) = TickGuard::acquire(inner) else {
            debug!("tick already running, skipping");
            return TickOutcome::Skipped;
        };

        let started = Instant::now();
        let resume_at = lock(&inner.health).resume_at;
        if let Some(until) = resume_at.filter(|at| *at > started) {
            trace!("reduced-frequency polling, tick deferred");
            return TickOutcome::Deferred { until };
        }

        inner.poller.send_replace(PollerState::Fetching);
        let now = inner.clock.now();
        let deadline = started + inner.settings.tick_deadline;
        let max_count = inner.settings.event_fetch_count;

        let (status, inventory, events) = tokio::join!(
            self.fetch(Source::Status, deadline, move || async move {
                let body = inner.transport.fetch_status().await?;
                parse_status(&body, now).map_err(FetchError::from)
            }),
            self.fetch(Source::Inventory, deadline, move || async move {
                let body = inner.transport.fetch_devices().await?;
                parse_inventory(&body, now).map_err(FetchError::from)
            }),
            self.fetch(Source::Events, deadline, move || async move {
                let body = inner.transport.fetch_events(max_count).await?;
                parse_event_log(&body).map_err(FetchError::from)
            }),
        );

        let reports = vec![status.report(), inventory.report(), events.report()];
        if reports
            .iter()
            .any(|r| r.error == Some(FetchError::Cancelled))
        {
            return TickOutcome::Cancelled;
        }

        inner.poller.send_replace(PollerState::Merging);

        if reports
            .iter()
            .any(|r| r.error.as_ref().is_some_and(FetchError::is_auth))
        {
            return self.on_auth_failure(started, reports);
        }

        let any_secondary = inventory.result.is_ok() || events.result.is_ok();
        match status.result {
            Ok(panel) => self.publish(
                panel,
                inventory.result,
                events.result,
                now,
                started,
                reports,
            ),
            Err(e) if any_secondary => {
                warn!(error = %e, "panel status unavailable, snapshot left unchanged");
                self.record_reachable();
                inner.poller.send_replace(PollerState::Failed);
                TickOutcome::StatusUnavailable { reports }
            }
            Err(_) => self.on_full_failure(started, reports),
        }
    }

    async fn fetch<R, F, Fut>(&self, source: Source, deadline: Instant, op: F) -> Fetched<R>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, FetchError>>,
    {
        let inner = &*self.inner;
        let attempts = AtomicU32::new(0);
        let run = retry::run(&inner.settings.retry, source, &inner.cancel, &attempts, op);
        let result = tokio::time::timeout_at(deadline, run)
            .await
            .unwrap_or(Err(FetchError::DeadlineExceeded));
        let attempts = attempts.load(Ordering::Relaxed);

        if let Err(e) = &result {
            warn!(%source, attempts, error = %e, "source fetch failed");
        }
        Fetched {
            source,
            attempts,
            result,
        }
    }

    fn publish(
        &self,
        panel: PanelSnapshot,
        inventory: Result<BTreeMap<DeviceId, DeviceRecord>, FetchError>,
        events: Result<Vec<LogEntry>, FetchError>,
        now: DateTime<Utc>,
        started: Instant,
        reports: Vec<SourceReport>,
    ) -> TickOutcome {
        let inner = &*self.inner;
        let prev = inner.store.current();

        let (devices, inventory_freshness) = match inventory {
            Ok(devices) => (devices, Freshness::Fresh),
            Err(e) => (
                prev.devices.clone(),
                prev.freshness.inventory.degrade(now, e.to_string()),
            ),
        };

        let (mut windows, events_freshness) = match events {
            Ok(entries) => {
                let zones = ZoneIndex::new(&devices);
                let batch = lock(&inner.scopes).assign(entries, &zones);
                let windows = merge_batch(
                    &prev.panel_events,
                    &prev.device_events,
                    batch,
                    inner.settings.event_capacity,
                );
                (windows, Freshness::Fresh)
            }
            Err(e) => (
                EventWindows {
                    panel: prev.panel_events.clone(),
                    devices: prev.device_events.clone(),
                },
                prev.freshness.events.degrade(now, e.to_string()),
            ),
        };

        // Unenrolled devices take their history with them. Rows still
        // scoped to one land in a window that is dropped here.
        windows.devices.retain(|id, _| devices.contains_key(id));

        let next = SystemSnapshot {
            generation: prev.generation + 1,
            panel,
            devices,
            panel_events: windows.panel,
            device_events: windows.devices,
            freshness: SourceFreshness {
                inventory: inventory_freshness,
                events: events_freshness,
            },
        };
        let (snapshot, changes) = inner.store.publish(next);
        let generation = snapshot.generation;

        self.record_reachable();
        inner
            .poller
            .send_replace(PollerState::Published { generation });
        command::observe_tick(
            &inner.pending,
            &snapshot.panel.arm_mode,
            started,
            inner.settings.convergence_ticks,
        );

        debug!(
            generation,
            arm_mode = %snapshot.panel.arm_mode,
            devices = snapshot.devices.len(),
            changed = !changes.is_empty(),
            "snapshot published"
        );
        TickOutcome::Published {
            generation,
            changed: !changes.is_empty(),
            reports,
        }
    }

    /// At least one source answered: leave reduced-frequency mode.
    fn record_reachable(&self) {
        let inner = &*self.inner;
        let recovered = {
            let mut health = lock(&inner.health);
            let recovered = health.consecutive_failures > 0;
            *health = Health::default();
            recovered
        };
        if recovered {
            info!("panel reachable again, resuming normal polling");
        }
        inner.connection.send_if_modified(|state| {
            if *state == ConnectionState::Online {
                false
            } else {
                *state = ConnectionState::Online;
                true
            }
        });
    }

    fn on_full_failure(&self, started: Instant, reports: Vec<SourceReport>) -> TickOutcome {
        let inner = &*self.inner;
        let until = started + inner.settings.degraded_interval;
        let consecutive_failures = {
            let mut health = lock(&inner.health);
            health.consecutive_failures += 1;
            health.resume_at = Some(until);
            health.consecutive_failures
        };

        let state = if consecutive_failures >= inner.settings.offline_after {
            ConnectionState::Offline {
                consecutive_failures,
            }
        } else {
            ConnectionState::Degraded {
                consecutive_failures,
            }
        };
        inner.connection.send_replace(state);
        inner.poller.send_replace(PollerState::BackingOff { until });
        warn!(
            consecutive_failures,
            retry_in = ?inner.settings.degraded_interval,
            "all panel sources failed, polling at reduced frequency"
        );

        TickOutcome::FullFailure {
            consecutive_failures,
            reports,
        }
    }

    fn on_auth_failure(&self, started: Instant, reports: Vec<SourceReport>) -> TickOutcome {
        let inner = &*self.inner;
        lock(&inner.health).resume_at = Some(started + inner.settings.degraded_interval);

        let previous = inner.connection.send_replace(ConnectionState::AuthRequired);
        if previous != ConnectionState::AuthRequired {
            error!("panel rejected credentials; check username and password");
        }
        inner.poller.send_replace(PollerState::Failed);
        TickOutcome::AuthFailed { reports }
    }
}

impl<T: PanelTransport + 'static> Coordinator<T> {
    /// Spawn [`run`](Self::run) as a background task.
    pub async fn start(&self) {
        let mut task = self.inner.task.lock().await;
        if task.is_some() {
            return;
        }
        let coordinator = self.clone();
        *task = Some(tokio::spawn(async move { coordinator.run().await }));
        debug!("poll loop started");
    }
}

// ── Helpers ──────────────────────────────────────────────────────

struct Fetched<R> {
    source: Source,
    attempts: u32,
    result: Result<R, FetchError>,
}

impl<R> Fetched<R> {
    fn report(&self) -> SourceReport {
        SourceReport {
            source: self.source,
            attempts: self.attempts,
            error: self.result.as_ref().err().cloned(),
        }
    }
}

/// Holds the single-tick flag; a dropped tick releases it.
struct TickGuard<'a> {
    ticking: &'a AtomicBool,
    poller: &'a watch::Sender<PollerState>,
}

impl<'a> TickGuard<'a> {
    fn acquire<T>(inner: &'a Inner<T>) -> Option<Self> {
        inner
            .ticking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                ticking: &inner.ticking,
                poller: &inner.poller,
            })
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.poller.send_if_modified(|state| {
            if matches!(state, PollerState::Fetching | PollerState::Merging) {
                *state = PollerState::Idle;
                true
            } else {
                false
            }
        });
        self.ticking.store(false, Ordering::Release);
    }
}
