//! Bridge between the frame loop and the tick scheduler.
//!
//! The scheduler runs on its own tokio runtime and never touches the ECS.
//! Each frame the bridge drains the scheduler's events: world changes become
//! [`ViewUpdatedEvent`]s, exports land in the output directory, and failures
//! show up on the notice line.

use bevy::app::AppExit;
use bevy::prelude::*;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::UnboundedReceiver;

use view_sync::{http_scheduler, SharedView, SyncError, SyncEvent, SyncHandle, ViewSyncConfig};

use crate::export::{batch_report_csv, write_output, BATCH_REPORT_FILE, STATS_EXPORT_FILE};

/// How long in-flight requests get to finish once the app exits.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

/// Plugin that pumps scheduler events into the app.
///
/// [`SyncBridge`] and [`ViewerSettings`] should be inserted by main.rs before
/// adding this plugin. Without a bridge the app renders nothing but keeps
/// running.
pub struct SyncBridgePlugin;

impl Plugin for SyncBridgePlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<ViewerSettings>() {
            app.init_resource::<ViewerSettings>();
        }

        app.init_resource::<Notice>()
            .add_event::<ViewUpdatedEvent>()
            .add_systems(First, drain_sync_events)
            .add_systems(Last, shutdown_on_exit);
    }
}

/// Viewer configuration assembled from the config file and CLI arguments.
#[derive(Resource, Debug, Clone)]
pub struct ViewerSettings {
    pub config: ViewSyncConfig,
    /// Where stats exports and batch reports are written.
    pub output_dir: PathBuf,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            config: ViewSyncConfig::default(),
            output_dir: PathBuf::from("output"),
        }
    }
}

/// One-line outcome of the last user action or failure.
#[derive(Resource, Debug, Default)]
pub struct Notice {
    pub text: Option<String>,
}

impl Notice {
    pub fn set(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }
}

/// Emitted when the shared view holds a new world snapshot.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewUpdatedEvent {
    pub revision: u64,
}

/// Errors starting the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Owns the scheduler's runtime and the frame side of its channels.
#[derive(Resource)]
pub struct SyncBridge {
    runtime: Option<Runtime>,
    handle: SyncHandle,
    events: Mutex<UnboundedReceiver<SyncEvent>>,
    view: SharedView,
}

impl SyncBridge {
    /// Start a runtime and spawn an HTTP-backed scheduler on it.
    pub fn connect(config: &ViewSyncConfig) -> Result<Self, BridgeError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("view-sync")
            .enable_all()
            .build()?;

        let view = SharedView::new();
        let (scheduler, handle, events) = http_scheduler(config, view.clone())?;
        runtime.spawn(scheduler.run());

        Ok(Self {
            runtime: Some(runtime),
            handle,
            events: Mutex::new(events),
            view,
        })
    }

    pub fn view(&self) -> &SharedView {
        &self.view
    }

    pub fn handle(&self) -> &SyncHandle {
        &self.handle
    }

    /// Take every event published since the last call.
    pub fn drain(&self) -> Vec<SyncEvent> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let mut drained = Vec::new();
        while let Ok(event) = events.try_recv() {
            drained.push(event);
        }
        drained
    }

    /// Stop the scheduler, then the runtime it runs on. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        if self.handle.shutdown().is_err() {
            tracing::debug!("Scheduler already stopped");
        }
        runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
        tracing::info!("View sync stopped");
    }
}

impl Drop for SyncBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Drain scheduler events once per frame, ahead of every Update system.
fn drain_sync_events(
    bridge: Option<Res<SyncBridge>>,
    settings: Res<ViewerSettings>,
    mut notice: ResMut<Notice>,
    mut updates: EventWriter<ViewUpdatedEvent>,
) {
    let Some(bridge) = bridge else {
        return;
    };

    for event in bridge.drain() {
        if let Some(update) = handle_sync_event(event, bridge.view(), &settings, &mut notice) {
            updates.send(update);
        }
    }
}

/// Apply one scheduler event to the frame side.
///
/// Returns the update to forward when the event carries a new world.
pub fn handle_sync_event(
    event: SyncEvent,
    view: &SharedView,
    settings: &ViewerSettings,
    notice: &mut Notice,
) -> Option<ViewUpdatedEvent> {
    match event {
        SyncEvent::WorldUpdated { revision } => return Some(ViewUpdatedEvent { revision }),
        SyncEvent::StatUpdated { tick } => {
            tracing::trace!("Latest stat tick: {:?}", tick);
        }
        SyncEvent::CycleSettled(report) => {
            if !report.is_clean() {
                tracing::debug!("{:?} cycle settled with failures", report.kind);
            }
        }
        SyncEvent::RunStateChanged { running } => {
            tracing::debug!("Run state changed: running={}", running);
        }
        SyncEvent::DecisionReady { agent_id, decision } => {
            notice.set(format!("{}: {}", agent_id, decision.action));
        }
        SyncEvent::DecisionFailed { agent_id, error } => {
            notice.set(format!("Decision for {} failed: {}", agent_id, error));
        }
        SyncEvent::BatchFinished { records } => {
            // An empty batch is already reported through RequestFailed when
            // the run itself failed.
            if records > 0 {
                write_batch_report(view, settings, notice);
            }
        }
        SyncEvent::StatsExported { csv } => {
            match write_output(&settings.output_dir, STATS_EXPORT_FILE, &csv) {
                Ok(path) => notice.set(format!("Stats exported to {}", path.display())),
                Err(e) => {
                    tracing::warn!("Failed to write stats export: {}", e);
                    notice.set(format!("Failed to write stats export: {}", e));
                }
            }
        }
        SyncEvent::RequestFailed { operation, error } => {
            notice.set(format!("{} failed: {}", operation, error));
        }
    }
    None
}

fn write_batch_report(view: &SharedView, settings: &ViewerSettings, notice: &mut Notice) {
    let Some(records) = view.batch_report() else {
        return;
    };
    let world = view.world();
    let poi_names = world.iter().flat_map(|w| w.poi_names());
    let csv = batch_report_csv(&records, poi_names);

    match write_output(&settings.output_dir, BATCH_REPORT_FILE, csv.as_bytes()) {
        Ok(path) => notice.set(format!(
            "Batch of {} records written to {}",
            records.len(),
            path.display()
        )),
        Err(e) => {
            tracing::warn!("Failed to write batch report: {}", e);
            notice.set(format!("Failed to write batch report: {}", e));
        }
    }
}

/// Stop the scheduler before the runtime and the app go away.
fn shutdown_on_exit(mut exits: EventReader<AppExit>, bridge: Option<ResMut<SyncBridge>>) {
    if exits.read().next().is_none() {
        return;
    }
    if let Some(mut bridge) = bridge {
        bridge.shutdown();
    }
}
