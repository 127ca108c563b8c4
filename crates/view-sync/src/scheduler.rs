//! Tick scheduler: drives the simulation service on a fixed cadence.
//!
//! The scheduler owns the run/pause flag and the cadence timer. Every cycle
//! asks the service to advance, then fetches the world and the latest
//! statistics concurrently and applies each to the [`SharedView`] on its own,
//! so one failing request never blocks the other.
//!
//! At most one cycle is in flight at a time. A cadence tick that finds the
//! previous cycle still running is skipped; a manual step waits its turn.
//!
//! ```text
//!  SyncHandle ──commands──▶ TickScheduler ──▶ RemoteWorld
//!                                │
//!                                ├──▶ SharedView (replace on success)
//!                                └──▶ SyncEvent channel (every outcome)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};
use world_client::{ClientError, RemoteWorld};
use world_model::{AgentDecision, StatsRecord};

use crate::config::SyncConfig;
use crate::view::SharedView;
use crate::SyncError;

/// Requests accepted by a running [`TickScheduler`].
#[derive(Debug, Clone, PartialEq)]
pub enum SyncCommand {
    SetRunning(bool),
    ToggleRunning,
    /// Run one tick cycle now, whether running or paused.
    Step,
    /// Fetch world and statistics without advancing.
    Refresh,
    QueryDecision(String),
    RunBatch { ticks: u32, reset_seed: bool },
    ExportStats,
    Shutdown,
}

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// The one-off refresh when the scheduler starts.
    Startup,
    Cadence,
    Step,
    Refresh,
}

/// Outcome of one cycle, published once both fetches have resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub kind: CycleKind,
    /// Whether the service accepted the advance request. Always false for
    /// cycles that do not advance.
    pub advanced: bool,
    /// Revision of the applied world snapshot, `None` if the fetch failed or
    /// was skipped.
    pub world_revision: Option<u64>,
    /// Whether the statistics fetch succeeded (an empty result counts).
    pub stat_ok: bool,
}

impl CycleReport {
    /// True when every request of the cycle succeeded.
    pub fn is_clean(&self) -> bool {
        let advance_ok = self.advanced || !matches!(self.kind, CycleKind::Cadence | CycleKind::Step);
        advance_ok && self.world_revision.is_some() && self.stat_ok
    }
}

/// Notifications for the render side, drained once per frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    RunStateChanged { running: bool },
    WorldUpdated { revision: u64 },
    StatUpdated { tick: Option<u64> },
    CycleSettled(CycleReport),
    DecisionReady { agent_id: String, decision: AgentDecision },
    DecisionFailed { agent_id: String, error: String },
    BatchFinished { records: usize },
    StatsExported { csv: Vec<u8> },
    RequestFailed { operation: &'static str, error: String },
}

/// Cloneable command surface of a scheduler.
///
/// Dropping every handle stops the scheduler just like [`SyncHandle::shutdown`].
#[derive(Debug, Clone)]
pub struct SyncHandle {
    commands: mpsc::UnboundedSender<SyncCommand>,
}

impl SyncHandle {
    pub fn send(&self, command: SyncCommand) -> Result<(), SyncError> {
        self.commands.send(command).map_err(|_| SyncError::Closed)
    }

    pub fn set_running(&self, running: bool) -> Result<(), SyncError> {
        self.send(SyncCommand::SetRunning(running))
    }

    pub fn toggle_running(&self) -> Result<(), SyncError> {
        self.send(SyncCommand::ToggleRunning)
    }

    pub fn step(&self) -> Result<(), SyncError> {
        self.send(SyncCommand::Step)
    }

    pub fn refresh(&self) -> Result<(), SyncError> {
        self.send(SyncCommand::Refresh)
    }

    pub fn query_decision(&self, agent_id: impl Into<String>) -> Result<(), SyncError> {
        self.send(SyncCommand::QueryDecision(agent_id.into()))
    }

    pub fn run_batch(&self, ticks: u32, reset_seed: bool) -> Result<(), SyncError> {
        self.send(SyncCommand::RunBatch { ticks, reset_seed })
    }

    pub fn export_stats(&self) -> Result<(), SyncError> {
        self.send(SyncCommand::ExportStats)
    }

    /// Stop the cadence and abort in-flight requests.
    pub fn shutdown(&self) -> Result<(), SyncError> {
        self.send(SyncCommand::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// State shared by the scheduler loop and the tasks it spawns.
struct SyncCore<C> {
    client: C,
    view: SharedView,
    steps_per_tick: u32,
    events: mpsc::UnboundedSender<SyncEvent>,
    /// Held for the duration of every advancing cycle and batch run.
    cycle_gate: Arc<Mutex<()>>,
}

impl<C: RemoteWorld> SyncCore<C> {
    fn publish(&self, event: SyncEvent) {
        // The render side may already be gone during teardown.
        let _ = self.events.send(event);
    }

    fn report_failure(&self, err: &ClientError) {
        tracing::warn!("{}", err);
        self.view.record_error(err.to_string());
        self.publish(SyncEvent::RequestFailed {
            operation: err.operation(),
            error: err.to_string(),
        });
    }

    /// Fetch world and statistics concurrently, applying each on success.
    async fn refresh(&self) -> (Option<u64>, bool) {
        let (world, stat) = tokio::join!(self.client.fetch_world(), self.client.fetch_latest_stat());

        let revision = match world {
            Ok(snapshot) => {
                let agents = snapshot.agents.len();
                let revision = self.view.apply_world(snapshot);
                tracing::debug!("Applied world revision {} ({} agents)", revision, agents);
                self.publish(SyncEvent::WorldUpdated { revision });
                Some(revision)
            }
            Err(e) => {
                self.report_failure(&e);
                None
            }
        };

        let stat_ok = match stat {
            Ok(stat) => {
                let tick = stat.as_ref().map(|s| s.tick);
                self.view.apply_stat(stat);
                self.publish(SyncEvent::StatUpdated { tick });
                true
            }
            Err(e) => {
                self.report_failure(&e);
                false
            }
        };

        if revision.is_some() && stat_ok {
            self.view.clear_error();
        }

        (revision, stat_ok)
    }

    /// Advance (for cadence and step cycles) and refresh.
    async fn run_cycle(&self, kind: CycleKind) -> CycleReport {
        let advancing = matches!(kind, CycleKind::Cadence | CycleKind::Step);

        let mut report = CycleReport {
            kind,
            advanced: false,
            world_revision: None,
            stat_ok: false,
        };

        if advancing {
            match self.client.advance_tick(self.steps_per_tick).await {
                Ok(()) => report.advanced = true,
                Err(e) => {
                    self.report_failure(&e);
                    self.publish(SyncEvent::CycleSettled(report.clone()));
                    return report;
                }
            }
        }

        let (world_revision, stat_ok) = self.refresh().await;
        report.world_revision = world_revision;
        report.stat_ok = stat_ok;

        tracing::debug!("{:?} cycle settled: {:?}", kind, report);
        self.publish(SyncEvent::CycleSettled(report.clone()));
        report
    }

    async fn query_decision(&self, agent_id: String) {
        match self.client.query_agent_decision(&agent_id).await {
            Ok(decision) => {
                tracing::info!("Agent {} decided: {}", agent_id, decision.action);
                self.view.record_decision(&agent_id, decision.clone());
                self.publish(SyncEvent::DecisionReady {
                    agent_id,
                    decision,
                });
                // The service may have appended to the agent's memory.
                self.run_cycle(CycleKind::Refresh).await;
            }
            Err(e) => {
                tracing::warn!("Decision query for {} failed: {}", agent_id, e);
                self.view.record_error(e.to_string());
                self.publish(SyncEvent::DecisionFailed {
                    agent_id,
                    error: e.to_string(),
                });
                // An unreadable reply still came from a service that may have
                // stored a memory line before answering.
                if e.is_protocol() {
                    self.run_cycle(CycleKind::Refresh).await;
                }
            }
        }
    }

    async fn run_batch(&self, ticks: u32, reset_seed: bool) {
        let records: Vec<StatsRecord> = match self.client.run_batch(ticks, reset_seed).await {
            Ok(records) => {
                tracing::info!("Batch run of {} ticks returned {} records", ticks, records.len());
                records
            }
            Err(e) => {
                self.report_failure(&e);
                Vec::new()
            }
        };

        let count = records.len();
        self.view.set_batch_report(records);
        self.publish(SyncEvent::BatchFinished { records: count });

        // A seeded batch resets the service's world.
        self.run_cycle(CycleKind::Refresh).await;
    }

    async fn export_stats(&self) {
        match self.client.export_stats().await {
            Ok(csv) => {
                tracing::info!("Exported {} bytes of statistics", csv.len());
                self.publish(SyncEvent::StatsExported { csv });
            }
            Err(e) => self.report_failure(&e),
        }
    }
}

/// Cadence driver for one view. Construct with [`TickScheduler::new`], then
/// [`TickScheduler::spawn`] it onto a tokio runtime.
pub struct TickScheduler<C> {
    core: Arc<SyncCore<C>>,
    commands: mpsc::UnboundedReceiver<SyncCommand>,
    running: bool,
    interval: Duration,
    tasks: JoinSet<()>,
}

impl<C: RemoteWorld> TickScheduler<C> {
    /// Create a scheduler along with its command handle and event stream.
    pub fn new(
        client: C,
        view: SharedView,
        config: &SyncConfig,
    ) -> (Self, SyncHandle, mpsc::UnboundedReceiver<SyncEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let core = SyncCore {
            client,
            view,
            steps_per_tick: config.steps_per_tick.max(1),
            events: event_tx,
            cycle_gate: Arc::new(Mutex::new(())),
        };

        let scheduler = Self {
            core: Arc::new(core),
            commands: command_rx,
            running: config.start_running,
            interval: config.tick_interval(),
            tasks: JoinSet::new(),
        };

        let handle = SyncHandle {
            commands: command_tx,
        };

        (scheduler, handle, event_rx)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Spawn the scheduler loop on the current tokio runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until shut down or until every [`SyncHandle`] is dropped.
    pub async fn run(mut self) {
        let period = self.interval.max(Duration::from_millis(1));
        self.core.view.set_running(self.running);
        tracing::info!(
            "Tick scheduler started ({} ms cadence, {})",
            period.as_millis(),
            if self.running { "running" } else { "paused" }
        );

        // Initial view regardless of run state.
        let core = Arc::clone(&self.core);
        self.tasks.spawn(async move {
            core.run_cycle(CycleKind::Startup).await;
        });

        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.running {
                        self.start_cadence_cycle();
                    }
                }
                command = self.commands.recv() => match command {
                    None | Some(SyncCommand::Shutdown) => break,
                    Some(command) => self.handle_command(command),
                },
                Some(result) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = result {
                        if e.is_panic() {
                            tracing::error!("Sync task panicked: {}", e);
                        }
                    }
                }
            }
        }

        self.tasks.abort_all();
        self.core.view.set_running(false);
        tracing::info!("Tick scheduler stopped");
    }

    fn set_running(&mut self, running: bool) {
        if self.running == running {
            return;
        }
        self.running = running;
        self.core.view.set_running(running);
        tracing::info!("Simulation {}", if running { "resumed" } else { "paused" });
        self.core.publish(SyncEvent::RunStateChanged { running });
    }

    fn start_cadence_cycle(&mut self) {
        let Ok(guard) = Arc::clone(&self.core.cycle_gate).try_lock_owned() else {
            tracing::debug!("Previous tick still in flight, skipping cadence tick");
            return;
        };

        let core = Arc::clone(&self.core);
        self.tasks.spawn(async move {
            let _guard = guard;
            core.run_cycle(CycleKind::Cadence).await;
        });
    }

    fn handle_command(&mut self, command: SyncCommand) {
        let core = Arc::clone(&self.core);
        match command {
            SyncCommand::SetRunning(running) => self.set_running(running),
            SyncCommand::ToggleRunning => {
                let running = !self.running;
                self.set_running(running);
            }
            SyncCommand::Step => {
                tracing::info!("Manual step requested");
                self.tasks.spawn(async move {
                    let _guard = Arc::clone(&core.cycle_gate).lock_owned().await;
                    core.run_cycle(CycleKind::Step).await;
                });
            }
            SyncCommand::Refresh => {
                self.tasks.spawn(async move {
                    core.run_cycle(CycleKind::Refresh).await;
                });
            }
            SyncCommand::QueryDecision(agent_id) => {
                self.tasks.spawn(async move {
                    core.query_decision(agent_id).await;
                });
            }
            SyncCommand::RunBatch { ticks, reset_seed } => {
                tracing::info!("Batch run of {} ticks requested", ticks);
                self.tasks.spawn(async move {
                    let _guard = Arc::clone(&core.cycle_gate).lock_owned().await;
                    core.run_batch(ticks, reset_seed).await;
                });
            }
            SyncCommand::ExportStats => {
                self.tasks.spawn(async move {
                    core.export_stats().await;
                });
            }
            // Handled by the run loop.
            SyncCommand::Shutdown => {}
        }
    }
}
