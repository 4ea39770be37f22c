use anyhow::{ensure, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::{Config, DichotomyConfig, SolverConfig, SolverMode};
use crate::dichotomy::{DichotomyEngine, DichotomyParameters, DichotomyResult, ResultAssembler};
use crate::domain::{SplittingFactors, Zone, ZonalValues};
use crate::error::CapacityError;
use crate::evaluation::{EvaluationInvoker, NetworkEvaluator, RemoteEvaluator};
use crate::power_flow::NetworkSnapshot;
use crate::shift::ShiftDispatcher;
use crate::telemetry::BusinessLog;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub service: Arc<CapacityService>,
}

impl AppState {
    pub fn new(cfg: Config) -> Result<Self> {
        let evaluator = build_evaluator(&cfg.solver)?;
        let service = Arc::new(
            CapacityService::new(evaluator, cfg.dichotomy.clone(), cfg.solver.timeout())
                .with_retained_runs(cfg.server.retained_runs),
        );
        Ok(Self { cfg, service })
    }
}

/// Solver backend selected by `solver.mode`
pub fn build_evaluator(solver: &SolverConfig) -> Result<Arc<dyn NetworkEvaluator>> {
    match solver.mode {
        #[cfg(feature = "sim")]
        SolverMode::Simulated => Ok(Arc::new(
            crate::evaluation::SimulatedEvaluator::new(solver.divergence_threshold_mw)
                .with_latency(Duration::from_millis(solver.simulated_latency_ms)),
        )),
        SolverMode::Remote => {
            ensure!(
                !solver.base_url.trim().is_empty(),
                "solver.base_url must be set when solver.mode is remote"
            );
            Ok(Arc::new(RemoteEvaluator::new(
                solver.base_url.as_str(),
                Duration::from_secs(solver.connect_timeout_seconds),
            )?))
        }
    }
}

/// One capacity computation request. Search limits fall back to the
/// `[dichotomy]` configuration when omitted.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CapacityRequest {
    pub network: NetworkSnapshot,
    pub reference_zone: Zone,
    pub splitting_factors: ZonalValues,
    #[serde(default)]
    pub reference_exchanges: ZonalValues,
    #[serde(default)]
    pub merchant_line_flows: ZonalValues,
    #[serde(default)]
    pub seed_index: Option<f64>,
    #[serde(default)]
    pub bracket: Option<[f64; 2]>,
    #[validate(range(exclusive_min = 0.0))]
    pub precision_mw: Option<f64>,
    pub min_value_mw: Option<f64>,
    pub max_value_mw: Option<f64>,
    #[validate(range(exclusive_min = 0.0))]
    pub step_mw: Option<f64>,
    #[validate(range(min = 1))]
    pub max_bracket_steps: Option<u32>,
}

impl CapacityRequest {
    pub fn parameters(&self, defaults: &DichotomyConfig) -> DichotomyParameters {
        let precision = self.precision_mw.unwrap_or(defaults.precision_mw);
        DichotomyParameters {
            seed_index: self.seed_index,
            bracket: self.bracket,
            precision,
            min_value: self.min_value_mw.unwrap_or(defaults.min_value_mw),
            max_value: self.max_value_mw.unwrap_or(defaults.max_value_mw),
            step_hint: self.step_mw.unwrap_or(defaults.step_mw),
            max_bracket_steps: self.max_bracket_steps.unwrap_or(defaults.max_bracket_steps),
        }
    }
}

/// Published outcome of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityReport {
    pub run_id: Uuid,
    pub network_id: String,
    pub started_at: DateTime<Utc>,
    pub computed_at: DateTime<Utc>,
    pub result: DichotomyResult,
    /// Zonal shifts dispatched at the final value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shifts_at_final_value: Option<ZonalValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CapacityError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Running,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub run_id: Uuid,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub interrupt_requested: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<CapacityReport>,
}

struct RunEntry {
    cancel: CancellationToken,
    started_at: DateTime<Utc>,
    report: Option<CapacityReport>,
}

impl RunEntry {
    fn status(&self, run_id: Uuid) -> RunStatus {
        RunStatus {
            run_id,
            state: if self.report.is_some() {
                RunState::Completed
            } else {
                RunState::Running
            },
            started_at: self.started_at,
            interrupt_requested: self.cancel.is_cancelled(),
            report: self.report.clone(),
        }
    }
}

/// Completed runs kept when `server.retained_runs` is not set
pub const DEFAULT_RETAINED_RUNS: usize = 256;

/// Everything a run needs once its request has been validated
struct PreparedRun {
    network: Arc<NetworkSnapshot>,
    dispatcher: ShiftDispatcher,
    params: DichotomyParameters,
}

/// Owns the solver backend and the registry of capacity runs
pub struct CapacityService {
    evaluator: Arc<dyn NetworkEvaluator>,
    defaults: DichotomyConfig,
    solver_timeout: Option<Duration>,
    runs: RwLock<HashMap<Uuid, RunEntry>>,
    /// Completed runs kept for status queries, oldest evicted first
    retained_runs: usize,
    shutdown: CancellationToken,
}

impl CapacityService {
    pub fn new(
        evaluator: Arc<dyn NetworkEvaluator>,
        defaults: DichotomyConfig,
        solver_timeout: Option<Duration>,
    ) -> Self {
        Self {
            evaluator,
            defaults,
            solver_timeout,
            runs: RwLock::new(HashMap::new()),
            retained_runs: DEFAULT_RETAINED_RUNS,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_retained_runs(mut self, retained_runs: usize) -> Self {
        self.retained_runs = retained_runs.max(1);
        self
    }

    pub fn evaluator_name(&self) -> &'static str {
        self.evaluator.name()
    }

    pub fn defaults(&self) -> &DichotomyConfig {
        &self.defaults
    }

    /// Compute a capacity and wait for the report. The run keeps going
    /// and is still published if the caller stops waiting.
    pub async fn run(self: &Arc<Self>, request: CapacityRequest) -> Result<CapacityReport, CapacityError> {
        let prepared = self.prepare(request)?;
        let run_id = Uuid::new_v4();
        self.spawn_run(run_id, prepared)
            .await
            .await
            .map_err(|e| CapacityError::internal(format!("capacity run {run_id} aborted: {e}")))
    }

    /// Start a capacity computation in the background
    pub async fn submit(self: &Arc<Self>, request: CapacityRequest) -> Result<Uuid, CapacityError> {
        let prepared = self.prepare(request)?;
        let run_id = Uuid::new_v4();
        self.spawn_run(run_id, prepared).await;
        Ok(run_id)
    }

    pub async fn status(&self, run_id: Uuid) -> Result<RunStatus, CapacityError> {
        self.runs
            .read()
            .await
            .get(&run_id)
            .map(|entry| entry.status(run_id))
            .ok_or_else(|| CapacityError::not_found(format!("unknown run {run_id}")))
    }

    /// Ask a run to stop. Returns false when it had already finished.
    pub async fn interrupt(&self, run_id: Uuid) -> Result<bool, CapacityError> {
        let runs = self.runs.read().await;
        let entry = runs
            .get(&run_id)
            .ok_or_else(|| CapacityError::not_found(format!("unknown run {run_id}")))?;

        if entry.report.is_some() {
            return Ok(false);
        }
        BusinessLog::new(run_id).warn("interrupt requested");
        entry.cancel.cancel();
        Ok(true)
    }

    /// Interrupt every running computation, used on shutdown
    pub async fn interrupt_all(&self) {
        let running = self
            .runs
            .read()
            .await
            .values()
            .filter(|entry| entry.report.is_none())
            .count();
        if running > 0 {
            warn!(running, "interrupting running capacity computations");
        }
        self.shutdown.cancel();
    }

    fn prepare(&self, request: CapacityRequest) -> Result<PreparedRun, CapacityError> {
        request.validate()?;

        let params = request.parameters(&self.defaults);
        params.check().map_err(CapacityError::configuration)?;

        request
            .network
            .constraints
            .validate()
            .map_err(CapacityError::configuration)?;

        let splitting = SplittingFactors::new(request.reference_zone, request.splitting_factors)?;
        let dispatcher = ShiftDispatcher::new(
            splitting,
            request.reference_exchanges,
            request.merchant_line_flows,
        );

        Ok(PreparedRun {
            network: Arc::new(request.network),
            dispatcher,
            params,
        })
    }

    async fn spawn_run(self: &Arc<Self>, run_id: Uuid, prepared: PreparedRun) -> JoinHandle<CapacityReport> {
        let (cancel, started_at) = self.register(run_id).await;
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let report = service.execute(run_id, started_at, prepared, cancel).await;
            service.complete(&report).await;
            report
        })
    }

    async fn register(&self, run_id: Uuid) -> (CancellationToken, DateTime<Utc>) {
        let cancel = self.shutdown.child_token();
        let started_at = Utc::now();
        self.runs.write().await.insert(
            run_id,
            RunEntry {
                cancel: cancel.clone(),
                started_at,
                report: None,
            },
        );
        (cancel, started_at)
    }

    async fn execute(
        &self,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        prepared: PreparedRun,
        cancel: CancellationToken,
    ) -> CapacityReport {
        let log = BusinessLog::new(run_id);
        log.info(format_args!(
            "capacity run started on network {} with reference zone {}",
            prepared.network.id,
            prepared.dispatcher.reference_zone()
        ));

        let network_id = prepared.network.id.clone();
        let dispatcher = prepared.dispatcher.clone();
        let invoker = EvaluationInvoker::new(
            prepared.network,
            prepared.dispatcher,
            Arc::clone(&self.evaluator),
        )
        .with_timeout(self.solver_timeout)
        .with_cancellation(cancel.clone());

        let engine = DichotomyEngine::new(invoker, prepared.params).with_business_log(log);
        let state = engine.run(&cancel).await;
        let result = ResultAssembler::assemble(&state);

        match result.final_value {
            Some(value) => log.info(format_args!(
                "final secure value {value:.1}MW, limited by {}",
                result.limiting_cause
            )),
            None => log.error(format_args!(
                "no secure value found, limited by {}",
                result.limiting_cause
            )),
        }

        CapacityReport {
            run_id,
            network_id,
            started_at,
            computed_at: Utc::now(),
            shifts_at_final_value: result.final_value.map(|value| dispatcher.dispatch(value)),
            error: result.error(),
            result,
        }
    }

    async fn complete(&self, report: &CapacityReport) {
        let mut runs = self.runs.write().await;
        if let Some(entry) = runs.get_mut(&report.run_id) {
            entry.report = Some(report.clone());
        }

        let mut completed: Vec<(DateTime<Utc>, Uuid)> = runs
            .iter()
            .filter_map(|(id, entry)| entry.report.as_ref().map(|r| (r.computed_at, *id)))
            .collect();
        if completed.len() > self.retained_runs {
            completed.sort();
            let excess = completed.len() - self.retained_runs;
            for (_, id) in completed.into_iter().take(excess) {
                runs.remove(&id);
            }
        }
        drop(runs);

        info!(run_id = %report.run_id, cause = %report.result.limiting_cause, "capacity run completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dichotomy::LimitingCause;
    use crate::error::ErrorKind;
    use crate::evaluation::{LimitingElement, SolverResult};
    use async_trait::async_trait;

    /// Secure while the FR shift stays at or below `limit`
    struct ThresholdEvaluator {
        limit: f64,
        delay: Duration,
    }

    #[async_trait]
    impl NetworkEvaluator for ThresholdEvaluator {
        async fn evaluate(
            &self,
            _network: &NetworkSnapshot,
            shifts: &ZonalValues,
        ) -> anyhow::Result<SolverResult> {
            tokio::time::sleep(self.delay).await;
            let fr = shifts[&Zone::new("FR").map_err(anyhow::Error::msg)?];
            let margin = self.limit - fr;
            Ok(SolverResult {
                converged: true,
                overloaded_elements: if margin < 0.0 {
                    vec![LimitingElement {
                        id: "FR-IT Albertville".to_string(),
                        margin_mw: margin,
                    }]
                } else {
                    Vec::new()
                },
                worst_margin: margin,
                glsk_exhausted: false,
            })
        }

        fn name(&self) -> &'static str {
            "threshold"
        }
    }

    fn defaults() -> DichotomyConfig {
        DichotomyConfig {
            precision_mw: 50.0,
            min_value_mw: 0.0,
            max_value_mw: 19_999.0,
            step_mw: 650.0,
            max_bracket_steps: 16,
        }
    }

    fn service(delay: Duration) -> Arc<CapacityService> {
        Arc::new(CapacityService::new(
            Arc::new(ThresholdEvaluator { limit: 2775.0, delay }),
            defaults(),
            None,
        ))
    }

    fn request() -> CapacityRequest {
        CapacityRequest {
            network: NetworkSnapshot::new("cse-d2cc", ZonalValues::new()),
            reference_zone: Zone::new("IT").unwrap(),
            splitting_factors: [(Zone::new("FR").unwrap(), 1.0)].into_iter().collect(),
            reference_exchanges: ZonalValues::new(),
            merchant_line_flows: ZonalValues::new(),
            seed_index: Some(2000.0),
            bracket: None,
            precision_mw: None,
            min_value_mw: None,
            max_value_mw: None,
            step_mw: None,
            max_bracket_steps: None,
        }
    }

    #[tokio::test]
    async fn test_run_reports_value_and_shifts() {
        let report = service(Duration::ZERO).run(request()).await.unwrap();

        let value = report.result.final_value.unwrap();
        assert!((2725.0..=2775.0).contains(&value));
        assert_eq!(report.result.limiting_cause, LimitingCause::CriticalBranch);
        assert!(report.error.is_none());

        let shifts = report.shifts_at_final_value.unwrap();
        assert_eq!(shifts[&Zone::new("FR").unwrap()], value);
        assert_eq!(shifts[&Zone::new("IT").unwrap()], -value);
    }

    #[test]
    fn test_request_defaults_and_overrides() {
        let mut request = request();
        request.precision_mw = Some(10.0);
        let params = request.parameters(&defaults());
        assert_eq!(params.precision, 10.0);
        assert_eq!(params.step_hint, 650.0);
        assert_eq!(params.max_value, 19_999.0);
    }

    #[tokio::test]
    async fn test_invalid_splitting_rejected_before_run() {
        let mut request = request();
        request.splitting_factors = [(Zone::new("FR").unwrap(), 0.5)].into_iter().collect();

        let error = service(Duration::ZERO).run(request).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_negative_precision_rejected() {
        let mut request = request();
        request.precision_mw = Some(-1.0);
        let error = service(Duration::ZERO).run(request).await.unwrap_err();
        assert_eq!(error.status, 400);
    }

    #[tokio::test]
    async fn test_unknown_run_is_not_found() {
        let service = service(Duration::ZERO);
        let error = service.status(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::NotFound);
        assert!(service.interrupt(Uuid::new_v4()).await.is_err());
    }

    async fn wait_completed(service: &CapacityService, run_id: Uuid) -> RunStatus {
        for _ in 0..200 {
            let status = service.status(run_id).await.unwrap();
            if status.state == RunState::Completed {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {run_id} did not complete");
    }

    #[tokio::test]
    async fn test_submitted_run_can_be_interrupted() {
        let service = service(Duration::from_secs(10));
        let run_id = service.submit(request()).await.unwrap();

        assert_eq!(service.status(run_id).await.unwrap().state, RunState::Running);
        assert!(service.interrupt(run_id).await.unwrap());

        let status = wait_completed(&service, run_id).await;
        let report = status.report.unwrap();
        assert!(status.interrupt_requested);
        assert_eq!(report.result.limiting_cause, LimitingCause::Interrupted);
        assert_eq!(report.error.unwrap().kind, ErrorKind::Interruption);
        assert!(report.result.final_value.is_none());
    }

    #[tokio::test]
    async fn test_interrupt_all_stops_runs() {
        let service = service(Duration::from_secs(10));
        let first = service.submit(request()).await.unwrap();
        let second = service.submit(request()).await.unwrap();

        service.interrupt_all().await;

        for run_id in [first, second] {
            let report = wait_completed(&service, run_id).await.report.unwrap();
            assert_eq!(report.result.limiting_cause, LimitingCause::Interrupted);
        }
    }

    #[tokio::test]
    async fn test_run_survives_caller_dropping_out() {
        let service = service(Duration::from_secs(60));
        let waited = tokio::time::timeout(Duration::from_millis(50), service.run(request())).await;
        assert!(waited.is_err());

        let run_id = *service.runs.read().await.keys().next().unwrap();
        assert!(service.interrupt(run_id).await.unwrap());

        let status = wait_completed(&service, run_id).await;
        assert_eq!(
            status.report.unwrap().result.limiting_cause,
            LimitingCause::Interrupted
        );
        assert!(!service.interrupt(run_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_completed_runs_are_evicted_oldest_first() {
        let service = Arc::new(
            CapacityService::new(
                Arc::new(ThresholdEvaluator {
                    limit: 2775.0,
                    delay: Duration::ZERO,
                }),
                defaults(),
                None,
            )
            .with_retained_runs(2),
        );

        let mut run_ids = Vec::new();
        for _ in 0..5 {
            run_ids.push(service.run(request()).await.unwrap().run_id);
        }

        assert_eq!(service.runs.read().await.len(), 2);
        assert_eq!(
            service.status(run_ids[0]).await.unwrap_err().kind,
            ErrorKind::NotFound
        );
        assert_eq!(
            service.status(run_ids[4]).await.unwrap().state,
            RunState::Completed
        );
    }

    #[tokio::test]
    async fn test_finished_run_interrupt_is_noop() {
        let service = service(Duration::ZERO);
        let run_id = service.submit(request()).await.unwrap();
        wait_completed(&service, run_id).await;
        assert!(!service.interrupt(run_id).await.unwrap());
    }
}
