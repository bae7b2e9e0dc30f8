use super::*;
use crate::api::{Ack, SimulationApi, SimulationHistoryRecord, SimulationMode, SimulationStatus, StartParams};
use crate::config::ConsoleConfig;
use crate::error::{ApiError, ApiResult};
use crate::logic::alerts::{AlertNotice, AlertSink};
use crate::logic::risk::RiskBand;

use parking_lot::Mutex;
use serde_json::{json, Map};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Calls {
    status: AtomicUsize,
    history: AtomicUsize,
    start: AtomicUsize,
    stop: AtomicUsize,
    reset: AtomicUsize,
    speed: AtomicUsize,
    mode: AtomicUsize,
}

struct FakeApi {
    status: Mutex<ApiResult<SimulationStatus>>,
    history: Mutex<ApiResult<Vec<SimulationHistoryRecord>>>,
    control: Mutex<ApiResult<Ack>>,
    poll_latency: Mutex<Duration>,
    control_latency: Mutex<Duration>,
    calls: Calls,
}

impl FakeApi {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(Ok(status(SimulationMode::Classification, json!(1)))),
            history: Mutex::new(Ok(Vec::new())),
            control: Mutex::new(Ok(json!({"status": "ok"}))),
            poll_latency: Mutex::new(Duration::ZERO),
            control_latency: Mutex::new(Duration::ZERO),
            calls: Calls::default(),
        })
    }

    fn set_status(&self, result: ApiResult<SimulationStatus>) {
        *self.status.lock() = result;
    }

    fn set_history(&self, result: ApiResult<Vec<SimulationHistoryRecord>>) {
        *self.history.lock() = result;
    }

    fn set_control(&self, result: ApiResult<Ack>) {
        *self.control.lock() = result;
    }

    fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    async fn pause(latency: Duration) {
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    async fn control(&self, counter: &AtomicUsize) -> ApiResult<Ack> {
        counter.fetch_add(1, Ordering::SeqCst);
        let latency = *self.control_latency.lock();
        Self::pause(latency).await;
        self.control.lock().clone()
    }
}

impl SimulationApi for FakeApi {
    async fn status(&self) -> ApiResult<SimulationStatus> {
        self.calls.status.fetch_add(1, Ordering::SeqCst);
        let latency = *self.poll_latency.lock();
        Self::pause(latency).await;
        self.status.lock().clone()
    }

    async fn history(&self, _limit: usize) -> ApiResult<Vec<SimulationHistoryRecord>> {
        self.calls.history.fetch_add(1, Ordering::SeqCst);
        let latency = *self.poll_latency.lock();
        Self::pause(latency).await;
        self.history.lock().clone()
    }

    async fn start(&self, _params: &StartParams) -> ApiResult<Ack> {
        self.control(&self.calls.start).await
    }

    async fn stop(&self) -> ApiResult<Ack> {
        self.control(&self.calls.stop).await
    }

    async fn reset(&self) -> ApiResult<Ack> {
        self.control(&self.calls.reset).await
    }

    async fn set_speed(&self, _speed: f64) -> ApiResult<Ack> {
        self.control(&self.calls.speed).await
    }

    async fn set_mode(&self, _mode: SimulationMode) -> ApiResult<Ack> {
        self.control(&self.calls.mode).await
    }
}

fn status(mode: SimulationMode, hazard: serde_json::Value) -> SimulationStatus {
    let mut prediction = Map::new();
    prediction.insert("hazard_level".to_string(), hazard);
    SimulationStatus {
        running: true,
        current_index: 10,
        mode,
        speed: 1.0,
        last_prediction: Some(prediction),
        dataset_length: 500,
    }
}

fn record(id: i64, alert: &str) -> SimulationHistoryRecord {
    SimulationHistoryRecord {
        id,
        timestamp: "2025-03-01T10:00:00".to_string(),
        mode: "classification".to_string(),
        raw_row: Map::new(),
        model_output: Map::new(),
        risk_level: json!(2),
        alert_message: alert.to_string(),
    }
}

fn network_down() -> ApiError {
    ApiError::Network("connection refused".to_string())
}

/// Session plus everything its alert sink received
fn session_with(api: &Arc<FakeApi>, config: ConsoleConfig) -> (Session<Arc<FakeApi>>, Arc<Mutex<Vec<AlertNotice>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let sink: Arc<dyn AlertSink> = Arc::new(move |notice: AlertNotice| sink_seen.lock().push(notice));
    (Session::new(Arc::clone(api), &config, sink), seen)
}

fn session(api: &Arc<FakeApi>) -> (Session<Arc<FakeApi>>, Arc<Mutex<Vec<AlertNotice>>>) {
    session_with(api, ConsoleConfig::default())
}

// ========== Polling ==========

#[tokio::test]
async fn test_refresh_now_fetches_both_slices() {
    let api = FakeApi::new();
    api.set_history(Ok(vec![record(1, ""), record(2, "")]));
    let (session, _) = session(&api);

    let (s, h) = session.scheduler().refresh_now().await;
    assert_eq!(s, PollOutcome::Updated);
    assert_eq!(h, PollOutcome::Updated);

    let snap = session.snapshot();
    assert!(!snap.loading);
    assert!(snap.status.is_some());
    assert_eq!(snap.history.len(), 2);
    assert!(snap.last_status_at.is_some());
    assert!(snap.last_history_at.is_some());
    assert_eq!(snap.error, None);
}

#[tokio::test]
async fn test_status_failures_keep_last_good_state() {
    let api = FakeApi::new();
    api.set_history(Ok(vec![record(1, ""), record(2, "")]));
    let (session, _) = session(&api);
    session.scheduler().refresh_now().await;
    let good = session.snapshot();

    api.set_status(Err(network_down()));
    for _ in 0..3 {
        let outcome = session.scheduler().fetch_status().await;
        assert_eq!(outcome, PollOutcome::Failed(network_down()));

        let snap = session.snapshot();
        assert_eq!(snap.error.as_deref(), Some("Network error: connection refused"));
        assert_eq!(snap.history, good.history);
        assert_eq!(snap.status, good.status);
        assert_eq!(snap.last_status_at, good.last_status_at);
        assert!(!snap.loading);
    }
}

#[tokio::test]
async fn test_loading_clears_after_first_failed_attempt() {
    let api = FakeApi::new();
    api.set_status(Err(network_down()));
    let (session, _) = session(&api);
    assert!(session.snapshot().loading);

    session.scheduler().fetch_status().await;
    let snap = session.snapshot();
    assert!(!snap.loading);
    assert!(snap.status.is_none());
    assert!(snap.error.is_some());

    api.set_status(Ok(status(SimulationMode::Regression, json!(40))));
    session.scheduler().fetch_status().await;
    assert!(!session.snapshot().loading);
}

#[tokio::test]
async fn test_success_on_either_slice_clears_error() {
    let api = FakeApi::new();
    api.set_status(Err(network_down()));
    let (session, _) = session(&api);

    session.scheduler().fetch_status().await;
    assert!(session.snapshot().error.is_some());

    session.scheduler().fetch_history().await;
    assert_eq!(session.snapshot().error, None);
}

#[tokio::test]
async fn test_history_capped_to_limit() {
    let api = FakeApi::new();
    api.set_history(Ok((1..=10).map(|id| record(id, "")).collect()));
    let config = ConsoleConfig {
        history_limit: 5,
        ..Default::default()
    };
    let (session, _) = session_with(&api, config);

    session.scheduler().fetch_history().await;
    let ids: Vec<i64> = session.snapshot().history.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![6, 7, 8, 9, 10]);
}

#[tokio::test]
async fn test_derived_risk_follows_status() {
    let api = FakeApi::new();
    let (session, _) = session(&api);

    api.set_status(Ok(status(SimulationMode::Regression, json!(19.999))));
    session.scheduler().fetch_status().await;
    assert_eq!(session.snapshot().risk.band, RiskBand::Moderate);

    api.set_status(Ok(status(SimulationMode::Regression, json!(20))));
    session.scheduler().fetch_status().await;
    let snap = session.snapshot();
    assert_eq!(snap.risk.band, RiskBand::High);
    assert_eq!(snap.risk.index, 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_fetch_is_skipped() {
    let api = FakeApi::new();
    *api.poll_latency.lock() = Duration::from_millis(500);
    let (session, _) = session(&api);

    let (a, b) = tokio::join!(session.scheduler().fetch_status(), session.scheduler().fetch_status());
    assert_eq!(a, PollOutcome::Updated);
    assert_eq!(b, PollOutcome::Skipped);
    assert_eq!(FakeApi::count(&api.calls.status), 1);
}

#[tokio::test(start_paused = true)]
async fn test_loops_poll_at_their_own_cadence() {
    let api = FakeApi::new();
    let (session, _) = session(&api);

    let mut handle = session.scheduler().start();
    tokio::time::sleep(Duration::from_millis(4_500)).await;
    assert_eq!(FakeApi::count(&api.calls.status), 4);
    assert_eq!(FakeApi::count(&api.calls.history), 2);
    assert!(handle.is_running());

    handle.stop();
    tokio::time::sleep(Duration::from_millis(3_000)).await;
    assert_eq!(FakeApi::count(&api.calls.status), 4);
    assert_eq!(FakeApi::count(&api.calls.history), 2);
    assert!(!handle.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_failing_status_loop_keeps_ticking() {
    let api = FakeApi::new();
    api.set_history(Ok(vec![record(1, ""), record(2, "")]));
    let (session, _) = session(&api);
    session.scheduler().refresh_now().await;
    let good = session.snapshot();

    api.set_status(Err(network_down()));
    let mut handle = session.scheduler().start();
    tokio::time::sleep(Duration::from_millis(3_500)).await;

    // one call from the initial sync plus three failing ticks
    assert_eq!(FakeApi::count(&api.calls.status), 4);
    let snap = session.snapshot();
    // last event at 3000 ms is a failed status tick
    assert_eq!(snap.error.as_deref(), Some("Network error: connection refused"));
    assert_eq!(snap.history, good.history);
    assert_eq!(snap.status, good.status);
    assert!(!snap.loading);
    assert!(handle.is_running());
    handle.stop();
}

#[tokio::test(start_paused = true)]
async fn test_failing_loops_report_stable_error() {
    let api = FakeApi::new();
    api.set_history(Ok(vec![record(1, "")]));
    let (session, _) = session(&api);
    session.scheduler().refresh_now().await;
    let good = session.snapshot();

    api.set_status(Err(network_down()));
    api.set_history(Err(network_down()));
    let mut handle = session.scheduler().start();

    for tick in 1..=3u64 {
        // sample between ticks: 1500, 2500, 3500 ms
        let wait = if tick == 1 { 1_500 } else { 1_000 };
        tokio::time::sleep(Duration::from_millis(wait)).await;
        let snap = session.snapshot();
        assert_eq!(snap.error.as_deref(), Some("Network error: connection refused"), "tick {}", tick);
        assert_eq!(snap.history, good.history);
        assert_eq!(snap.last_status_at, good.last_status_at);
        assert!(!snap.loading);
    }
    assert_eq!(FakeApi::count(&api.calls.status), 4);
    handle.stop();
}

#[tokio::test(start_paused = true)]
async fn test_slow_network_never_overlaps() {
    let api = FakeApi::new();
    *api.poll_latency.lock() = Duration::from_millis(2_500);
    let (session, _) = session(&api);

    let mut handle = session.scheduler().start();
    // status requests start at 1000 and 4000; 2000 and 3000 are skipped
    tokio::time::sleep(Duration::from_millis(4_500)).await;
    assert_eq!(FakeApi::count(&api.calls.status), 2);
    handle.stop();
}

#[tokio::test(start_paused = true)]
async fn test_open_syncs_before_loops() {
    let api = FakeApi::new();
    let (session, _) = session(&api);

    let mut handle = session.open().await;
    assert_eq!(FakeApi::count(&api.calls.status), 1);
    assert_eq!(FakeApi::count(&api.calls.history), 1);
    assert!(!session.snapshot().loading);
    handle.stop();
}

// ========== Alerts ==========

#[tokio::test]
async fn test_one_notice_for_newest_alert_in_batch() {
    let api = FakeApi::new();
    api.set_history(Ok(vec![
        record(101, "Escalation detected: hazard class increased."),
        record(102, ""),
        record(103, "Sustained high risk for 3 steps."),
        record(104, ""),
        record(105, "Displacement spike detected."),
    ]));
    let (session, seen) = session(&api);

    session.scheduler().fetch_history().await;
    {
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].record_id, 105);
        assert_eq!(seen[0].message, "Displacement spike detected.");
        assert_eq!(seen[0].band, RiskBand::High);
    }
    assert_eq!(session.scheduler().watermark(), 105);

    // Same batch again: nothing new
    session.scheduler().fetch_history().await;
    assert_eq!(seen.lock().len(), 1);
}

#[tokio::test]
async fn test_notice_targets_highest_alerted_record() {
    let api = FakeApi::new();
    api.set_history(Ok(vec![
        record(101, "a"),
        record(102, "b"),
        record(103, ""),
        record(104, "c"),
        record(105, ""),
    ]));
    let (session, seen) = session(&api);

    session.scheduler().fetch_history().await;
    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].record_id, 104);
}

#[tokio::test]
async fn test_overlapping_fetches_alert_once_per_new_max() {
    let api = FakeApi::new();
    let (session, seen) = session(&api);

    for batch in [vec![1, 2], vec![2, 3], vec![3, 4, 5], vec![4, 5]] {
        api.set_history(Ok(batch.into_iter().map(|id| record(id, "alert")).collect()));
        session.scheduler().fetch_history().await;
    }

    let ids: Vec<i64> = seen.lock().iter().map(|n| n.record_id).collect();
    assert_eq!(ids, vec![2, 3, 5]);
}

#[tokio::test]
async fn test_failed_history_leaves_watermark() {
    let api = FakeApi::new();
    api.set_history(Ok(vec![record(7, "alert")]));
    let (session, seen) = session(&api);
    session.scheduler().fetch_history().await;

    api.set_history(Err(ApiError::Timeout(60_000)));
    session.scheduler().fetch_history().await;

    assert_eq!(session.scheduler().watermark(), 7);
    assert_eq!(seen.lock().len(), 1);
    assert_eq!(session.snapshot().history.len(), 1);
}

#[tokio::test]
async fn test_sessions_do_not_share_state() {
    let api_a = FakeApi::new();
    let api_b = FakeApi::new();
    api_a.set_history(Ok(vec![record(50, "alert")]));
    api_b.set_history(Ok(vec![record(10, "alert")]));
    let (a, seen_a) = session(&api_a);
    let (b, seen_b) = session(&api_b);

    a.scheduler().fetch_history().await;
    b.scheduler().fetch_history().await;

    assert_eq!(a.scheduler().watermark(), 50);
    assert_eq!(b.scheduler().watermark(), 10);
    assert_eq!(seen_a.lock().len(), 1);
    assert_eq!(seen_b.lock().len(), 1);
}

// ========== Control gate ==========

#[tokio::test(start_paused = true)]
async fn test_concurrent_start_invokes_api_once() {
    let api = FakeApi::new();
    *api.control_latency.lock() = Duration::from_millis(100);
    let (session, _) = session(&api);
    let gate = session.gate();

    let (first, second) = tokio::join!(gate.start(StartParams::default()), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let snap = session.snapshot();
        assert!(snap.action_in_progress);
        assert_eq!(snap.action_label, Some(ControlAction::Start));
        assert!(gate.is_busy());
        gate.start(StartParams::default()).await
    });

    assert_eq!(first, GateOutcome::Completed);
    assert_eq!(second, GateOutcome::Busy);
    assert_eq!(FakeApi::count(&api.calls.start), 1);

    let snap = session.snapshot();
    assert!(!snap.action_in_progress);
    assert_eq!(snap.action_label, None);
    assert!(!gate.is_busy());
}

#[tokio::test]
async fn test_successful_action_refreshes_store() {
    let api = FakeApi::new();
    api.set_history(Ok(vec![record(1, "")]));
    let (session, _) = session(&api);

    assert_eq!(session.gate().stop().await, GateOutcome::Completed);
    assert_eq!(FakeApi::count(&api.calls.stop), 1);
    assert_eq!(FakeApi::count(&api.calls.status), 1);
    assert_eq!(FakeApi::count(&api.calls.history), 1);
    assert_eq!(session.snapshot().history.len(), 1);
}

#[tokio::test]
async fn test_failed_action_releases_gate() {
    let api = FakeApi::new();
    api.set_control(Err(ApiError::Server {
        status: 400,
        detail: "Dataset not loaded or empty".to_string(),
    }));
    let (session, _) = session(&api);

    let outcome = session.gate().start(StartParams::default()).await;
    assert!(matches!(outcome, GateOutcome::Failed(ApiError::Server { status: 400, .. })));

    let snap = session.snapshot();
    assert_eq!(
        snap.error.as_deref(),
        Some("Failed to start simulation: Server error 400: Dataset not loaded or empty")
    );
    assert!(!snap.action_in_progress);
    assert_eq!(snap.action_label, None);
    assert_eq!(FakeApi::count(&api.calls.status), 0);

    // Gate is free again
    api.set_control(Ok(json!({"status": "reset"})));
    assert_eq!(session.gate().reset().await, GateOutcome::Completed);
    assert_eq!(session.snapshot().error, None);
}

#[tokio::test(start_paused = true)]
async fn test_set_speed_waits_for_gate() {
    let api = FakeApi::new();
    *api.control_latency.lock() = Duration::from_millis(100);
    let (session, _) = session(&api);
    let gate = session.gate();

    let (reset, speed) = tokio::join!(gate.reset(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        gate.set_speed(0.5).await
    });

    assert_eq!(reset, GateOutcome::Completed);
    assert_eq!(speed, GateOutcome::Busy);
    assert_eq!(FakeApi::count(&api.calls.speed), 0);
}

#[tokio::test(start_paused = true)]
async fn test_set_speed_holds_gate_visibly() {
    let api = FakeApi::new();
    *api.control_latency.lock() = Duration::from_millis(100);
    let (session, _) = session(&api);
    let gate = session.gate();

    let (speed, start) = tokio::join!(gate.set_speed(0.5), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let snap = session.snapshot();
        assert!(snap.action_in_progress);
        assert_eq!(snap.action_label, None);
        gate.start(StartParams::default()).await
    });

    assert_eq!(speed, GateOutcome::Completed);
    assert_eq!(start, GateOutcome::Busy);
    assert_eq!(FakeApi::count(&api.calls.start), 0);
    assert!(!session.snapshot().action_in_progress);
}

#[tokio::test]
async fn test_failed_set_mode_clears_in_progress() {
    let api = FakeApi::new();
    api.set_control(Err(network_down()));
    let (session, _) = session(&api);

    let outcome = session.gate().set_mode(SimulationMode::Regression).await;
    assert_eq!(outcome, GateOutcome::Failed(network_down()));
    let snap = session.snapshot();
    assert!(!snap.action_in_progress);
    assert_eq!(snap.action_label, None);
}

#[tokio::test]
async fn test_set_speed_reconciles_status_only() {
    let api = FakeApi::new();
    let (session, _) = session(&api);

    assert_eq!(session.gate().set_speed(0.25).await, GateOutcome::Completed);
    assert_eq!(FakeApi::count(&api.calls.speed), 1);
    assert_eq!(FakeApi::count(&api.calls.status), 1);
    assert_eq!(FakeApi::count(&api.calls.history), 0);
    assert_eq!(session.snapshot().action_label, None);
}

#[tokio::test]
async fn test_set_mode_reconciles_status_and_history() {
    let api = FakeApi::new();
    let (session, _) = session(&api);

    assert_eq!(session.gate().set_mode(SimulationMode::Regression).await, GateOutcome::Completed);
    assert_eq!(FakeApi::count(&api.calls.mode), 1);
    assert_eq!(FakeApi::count(&api.calls.status), 1);
    assert_eq!(FakeApi::count(&api.calls.history), 1);
}

#[tokio::test]
async fn test_set_mode_failure_is_surfaced() {
    let api = FakeApi::new();
    api.set_control(Err(ApiError::Server {
        status: 400,
        detail: "Unknown mode".to_string(),
    }));
    let (session, _) = session(&api);

    let outcome = session.gate().set_mode(SimulationMode::Regression).await;
    assert!(matches!(outcome, GateOutcome::Failed(_)));
    assert_eq!(
        session.snapshot().error.as_deref(),
        Some("Failed to set mode: Server error 400: Unknown mode")
    );
    assert!(!session.gate().is_busy());
}

#[tokio::test]
async fn test_nodes_follow_history() {
    let api = FakeApi::new();
    api.set_history(Ok((1..=8).map(|id| record(id, if id == 8 { "alert" } else { "" })).collect()));
    let (session, _) = session(&api);
    session.scheduler().fetch_history().await;

    let nodes = session.nodes();
    assert_eq!(nodes.len(), 5);
    // id 8 routes to node 8 % 5 = 3
    assert_eq!(nodes[3].alerts.len(), 1);
    assert!(nodes.iter().all(|n| n.hazard <= 3 && n.trend.len() == 8));
}
