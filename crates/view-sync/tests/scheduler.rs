//! Integration tests for the tick scheduler.
//!
//! These run against an in-memory fake of the simulation service with tokio's
//! clock paused, so cadence timing is deterministic.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use view_sync::{
    CycleKind, CycleReport, SharedView, SyncConfig, SyncEvent, SyncHandle, TickScheduler,
};
use world_client::{ClientError, RemoteWorld};
use world_model::fixtures::{agent, stat_with};
use world_model::{AgentDecision, PoiLocation, StatsRecord, WorldSnapshot};

const PERIOD_MS: u64 = 1800;

#[derive(Default)]
struct FakeInner {
    ticks: AtomicU32,
    tick_requests: AtomicU32,
    world_fetches: AtomicU32,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
    tick_delay_ms: AtomicU64,
    fail_tick: AtomicBool,
    fail_world: AtomicBool,
    fail_stat: AtomicBool,
    fail_decision: AtomicBool,
    garble_decision: AtomicBool,
}

/// In-memory simulation service. Agent `a1` walks one grid unit per tick.
#[derive(Clone, Default)]
struct FakeWorld {
    inner: Arc<FakeInner>,
}

impl FakeWorld {
    fn ticks(&self) -> u32 {
        self.inner.ticks.load(Ordering::SeqCst)
    }

    fn tick_requests(&self) -> u32 {
        self.inner.tick_requests.load(Ordering::SeqCst)
    }

    fn world_fetches(&self) -> u32 {
        self.inner.world_fetches.load(Ordering::SeqCst)
    }

    fn set(&self, flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }

    fn failure(operation: &'static str) -> ClientError {
        ClientError::Server {
            operation,
            status: 503,
            message: "unavailable".into(),
        }
    }
}

impl RemoteWorld for FakeWorld {
    async fn fetch_world(&self) -> Result<WorldSnapshot, ClientError> {
        if self.inner.fail_world.load(Ordering::SeqCst) {
            return Err(Self::failure("world"));
        }
        self.inner.world_fetches.fetch_add(1, Ordering::SeqCst);
        let x = self.ticks() as f32;
        let mut snapshot = WorldSnapshot {
            agents: vec![agent("a1", x, 0.0, &["Cafe"])],
            pois: Default::default(),
        };
        snapshot.pois.insert("Cafe".into(), PoiLocation(5.0, 5.0));
        Ok(snapshot)
    }

    async fn fetch_latest_stat(&self) -> Result<Option<StatsRecord>, ClientError> {
        if self.inner.fail_stat.load(Ordering::SeqCst) {
            return Err(Self::failure("stats"));
        }
        let ticks = self.ticks();
        Ok((ticks > 0).then(|| stat_with(ticks as u64, &[("Cafe", ticks * 2)])))
    }

    async fn advance_tick(&self, steps: u32) -> Result<(), ClientError> {
        self.inner.tick_requests.fetch_add(1, Ordering::SeqCst);
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.inner.tick_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.inner.fail_tick.load(Ordering::SeqCst) {
            return Err(Self::failure("tick"));
        }
        self.inner.ticks.fetch_add(steps, Ordering::SeqCst);
        Ok(())
    }

    async fn query_agent_decision(&self, agent_id: &str) -> Result<AgentDecision, ClientError> {
        if self.inner.fail_decision.load(Ordering::SeqCst) {
            return Err(Self::failure("agent_llm"));
        }
        if self.inner.garble_decision.load(Ordering::SeqCst) {
            return Err(ClientError::Protocol {
                operation: "agent_llm",
                detail: "expected value at line 1 column 1".into(),
            });
        }
        Ok(AgentDecision {
            thought: format!("{agent_id} wants coffee"),
            action: "move".into(),
            memory: Some("heading to cafe".into()),
        })
    }

    async fn export_stats(&self) -> Result<Vec<u8>, ClientError> {
        Ok(format!("tick,hour,Cafe\n{},9,0\n", self.ticks()).into_bytes())
    }

    async fn run_batch(&self, ticks: u32, _reset_seed: bool) -> Result<Vec<StatsRecord>, ClientError> {
        Ok((1..=ticks as u64).map(|t| stat_with(t, &[])).collect())
    }
}

struct Harness {
    fake: FakeWorld,
    view: SharedView,
    handle: SyncHandle,
    events: UnboundedReceiver<SyncEvent>,
    task: tokio::task::JoinHandle<()>,
}

fn start(start_running: bool) -> Harness {
    start_with(FakeWorld::default(), start_running)
}

fn start_with(fake: FakeWorld, start_running: bool) -> Harness {
    let view = SharedView::new();
    let config = SyncConfig {
        tick_interval_ms: PERIOD_MS,
        start_running,
        ..SyncConfig::default()
    };
    let (scheduler, handle, events) = TickScheduler::new(fake.clone(), view.clone(), &config);
    let task = scheduler.spawn();
    Harness {
        fake,
        view,
        handle,
        events,
        task,
    }
}

impl Harness {
    /// Wait for the next settled cycle of the given kind.
    async fn settled(&mut self, kind: CycleKind) -> CycleReport {
        loop {
            match self.events.recv().await {
                Some(SyncEvent::CycleSettled(report)) if report.kind == kind => return report,
                Some(_) => continue,
                None => panic!("event stream closed before {:?} cycle settled", kind),
            }
        }
    }

    /// Wait for the first event matching `pred`.
    async fn until(&mut self, pred: impl Fn(&SyncEvent) -> bool) -> SyncEvent {
        loop {
            match self.events.recv().await {
                Some(event) if pred(&event) => return event,
                Some(_) => continue,
                None => panic!("event stream closed"),
            }
        }
    }
}

async fn advance_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_startup_refresh_happens_while_paused() {
    let mut h = start(false);

    let report = h.settled(CycleKind::Startup).await;

    assert!(!report.advanced);
    assert_eq!(report.world_revision, Some(1));
    assert!(report.stat_ok);
    assert_eq!(h.fake.tick_requests(), 0);
    assert!(h.view.world().is_some());
    // No ticks yet: no record, and that is not an error.
    assert!(h.view.latest_stat().is_none());
    assert!(h.view.last_error().is_none());
    assert!(!h.view.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_cadence_ticks_while_running() {
    let mut h = start(true);
    h.settled(CycleKind::Startup).await;

    advance_ms(PERIOD_MS * 3 + 100).await;

    assert_eq!(h.fake.ticks(), 3);
    let stat = h.view.latest_stat().unwrap();
    assert_eq!(stat.tick, 3);
    assert_eq!(h.view.occupancy("Cafe"), 6);
    assert_eq!(h.view.world().unwrap().agents[0].x, 3.0);
}

#[tokio::test(start_paused = true)]
async fn test_pause_stops_cadence() {
    let mut h = start(true);
    h.settled(CycleKind::Startup).await;
    advance_ms(PERIOD_MS + 100).await;
    assert_eq!(h.fake.ticks(), 1);

    h.handle.set_running(false).unwrap();
    h.until(|e| matches!(e, SyncEvent::RunStateChanged { running: false }))
        .await;
    advance_ms(PERIOD_MS * 4).await;
    assert_eq!(h.fake.ticks(), 1);
    assert!(!h.view.is_running());

    h.handle.toggle_running().unwrap();
    h.until(|e| matches!(e, SyncEvent::RunStateChanged { running: true }))
        .await;
    advance_ms(PERIOD_MS * 2).await;
    assert!(h.fake.ticks() >= 2);
}

#[tokio::test(start_paused = true)]
async fn test_step_works_while_paused() {
    let mut h = start(false);
    h.settled(CycleKind::Startup).await;

    h.handle.step().unwrap();
    let report = h.settled(CycleKind::Step).await;

    assert!(report.is_clean());
    assert_eq!(h.fake.ticks(), 1);
    assert_eq!(h.view.latest_stat().unwrap().tick, 1);

    advance_ms(PERIOD_MS * 3).await;
    assert_eq!(h.fake.ticks(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_ticks_never_stack() {
    let fake = FakeWorld::default();
    fake.inner.tick_delay_ms.store(PERIOD_MS * 3, Ordering::SeqCst);
    let mut h = start_with(fake, true);
    h.settled(CycleKind::Startup).await;

    advance_ms(PERIOD_MS * 10).await;

    assert_eq!(h.fake.inner.max_in_flight.load(Ordering::SeqCst), 1);
    // Each cycle spans three periods, so most cadence ticks are skipped.
    assert!(h.fake.tick_requests() <= 4);
    assert!(h.fake.tick_requests() >= 2);
}

#[tokio::test(start_paused = true)]
async fn test_pause_does_not_cancel_in_flight_tick() {
    let fake = FakeWorld::default();
    fake.inner.tick_delay_ms.store(1000, Ordering::SeqCst);
    let mut h = start_with(fake, true);
    h.settled(CycleKind::Startup).await;

    // The first cadence tick fires at 1800 ms and is in flight until 2800 ms.
    advance_ms(PERIOD_MS + 200).await;
    assert_eq!(h.fake.tick_requests(), 1);
    h.handle.set_running(false).unwrap();

    let report = h.settled(CycleKind::Cadence).await;
    assert!(report.is_clean());
    assert_eq!(h.fake.ticks(), 1);
    assert_eq!(h.view.latest_stat().unwrap().tick, 1);

    advance_ms(PERIOD_MS * 4).await;
    assert_eq!(h.fake.tick_requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_world_failure_keeps_last_view_and_applies_stat() {
    let mut h = start(false);
    h.settled(CycleKind::Startup).await;
    let before = h.view.world().unwrap();

    h.fake.set(&h.fake.inner.fail_world, true);
    h.handle.step().unwrap();
    let report = h.settled(CycleKind::Step).await;

    assert!(report.advanced);
    assert_eq!(report.world_revision, None);
    assert!(report.stat_ok);
    // Old world retained, new statistics applied.
    assert_eq!(h.view.world().unwrap(), before);
    assert_eq!(h.view.world_revision(), 1);
    assert_eq!(h.view.latest_stat().unwrap().tick, 1);
    assert!(h.view.last_error().unwrap().contains("world"));
}

#[tokio::test(start_paused = true)]
async fn test_stat_failure_still_applies_world() {
    let mut h = start(false);
    h.settled(CycleKind::Startup).await;

    h.fake.set(&h.fake.inner.fail_stat, true);
    h.handle.step().unwrap();
    let report = h.settled(CycleKind::Step).await;

    assert_eq!(report.world_revision, Some(2));
    assert!(!report.stat_ok);
    assert_eq!(h.view.world().unwrap().agents[0].x, 1.0);
    assert!(h.view.latest_stat().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failed_advance_skips_refresh_and_cadence_continues() {
    let mut h = start(true);
    h.settled(CycleKind::Startup).await;
    h.fake.set(&h.fake.inner.fail_tick, true);

    let failed = h.settled(CycleKind::Cadence).await;
    assert!(!failed.advanced);
    assert_eq!(failed.world_revision, None);
    assert_eq!(h.fake.world_fetches(), 1);

    h.fake.set(&h.fake.inner.fail_tick, false);
    let recovered = h.settled(CycleKind::Cadence).await;
    assert!(recovered.is_clean());
    assert_eq!(h.fake.tick_requests(), 2);
    assert_eq!(h.fake.ticks(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_decision_query_records_and_refreshes() {
    let mut h = start(false);
    h.settled(CycleKind::Startup).await;
    let fetches = h.fake.world_fetches();

    h.handle.query_decision("a1").unwrap();
    let event = h
        .until(|e| matches!(e, SyncEvent::DecisionReady { .. }))
        .await;
    match event {
        SyncEvent::DecisionReady { agent_id, decision } => {
            assert_eq!(agent_id, "a1");
            assert_eq!(decision.action, "move");
        }
        other => panic!("unexpected event {other:?}"),
    }
    h.settled(CycleKind::Refresh).await;

    assert_eq!(h.fake.world_fetches(), fetches + 1);
    assert_eq!(h.view.decision("a1").unwrap().thought, "a1 wants coffee");
}

#[tokio::test(start_paused = true)]
async fn test_failed_decision_leaves_previous_untouched() {
    let mut h = start(false);
    h.settled(CycleKind::Startup).await;
    h.view.select(Some("a1".into()));

    h.handle.query_decision("a1").unwrap();
    h.settled(CycleKind::Refresh).await;
    let previous = h.view.decision("a1").unwrap();

    let fetches = h.fake.world_fetches();

    h.fake.set(&h.fake.inner.fail_decision, true);
    h.handle.query_decision("a1").unwrap();
    h.until(|e| matches!(e, SyncEvent::DecisionFailed { .. }))
        .await;
    advance_ms(PERIOD_MS).await;

    assert_eq!(h.view.decision("a1"), Some(previous.clone()));
    assert_eq!(h.view.selected_agent().unwrap().decision, Some(previous));
    // A rejected query changed nothing on the service.
    assert_eq!(h.fake.world_fetches(), fetches);
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_decision_still_refreshes() {
    let mut h = start(false);
    h.settled(CycleKind::Startup).await;
    let fetches = h.fake.world_fetches();

    h.fake.set(&h.fake.inner.garble_decision, true);
    h.handle.query_decision("a1").unwrap();
    let failed = h
        .until(|e| matches!(e, SyncEvent::DecisionFailed { .. }))
        .await;
    match failed {
        SyncEvent::DecisionFailed { agent_id, error } => {
            assert_eq!(agent_id, "a1");
            assert!(error.contains("agent_llm"), "{error}");
        }
        other => panic!("unexpected event {other:?}"),
    }

    let report = h.settled(CycleKind::Refresh).await;
    assert_eq!(report.world_revision, Some(2));
    assert_eq!(h.fake.world_fetches(), fetches + 1);
    assert!(h.view.decision("a1").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_batch_run_and_export() {
    let mut h = start(false);
    h.settled(CycleKind::Startup).await;

    h.handle.run_batch(5, true).unwrap();
    let finished = h
        .until(|e| matches!(e, SyncEvent::BatchFinished { .. }))
        .await;
    assert_eq!(finished, SyncEvent::BatchFinished { records: 5 });
    assert_eq!(h.view.batch_report().unwrap().len(), 5);
    h.settled(CycleKind::Refresh).await;

    h.handle.export_stats().unwrap();
    let exported = h
        .until(|e| matches!(e, SyncEvent::StatsExported { .. }))
        .await;
    match exported {
        SyncEvent::StatsExported { csv } => assert!(csv.starts_with(b"tick,hour")),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_scheduler() {
    let mut h = start(true);
    h.settled(CycleKind::Startup).await;

    h.handle.shutdown().unwrap();
    (&mut h.task).await.unwrap();

    assert!(h.handle.is_closed());
    assert!(h.handle.step().is_err());
    let ticks = h.fake.ticks();
    advance_ms(PERIOD_MS * 3).await;
    assert_eq!(h.fake.ticks(), ticks);
    assert!(!h.view.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handles_stops_scheduler() {
    let h = start(true);
    let Harness { handle, task, .. } = h;

    drop(handle);
    task.await.unwrap();
}
