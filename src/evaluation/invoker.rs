use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{NetworkEvaluator, SolverResult};
use crate::dichotomy::{classify, EvaluationOutcome, FailureReason, ProbeEvaluator};
use crate::power_flow::NetworkSnapshot;
use crate::shift::ShiftDispatcher;
use crate::telemetry::{TechnicalWarnings, WarnOnly};

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("evaluation cancelled")]
    Cancelled,
    #[error("solver did not answer within {0:?}")]
    TimedOut(Duration),
    #[error("solver call failed: {0:#}")]
    Solver(anyhow::Error),
}

/// Turns engine probes into solver calls: dispatch the total exchange into
/// zonal shifts, call the external evaluator on the frozen snapshot,
/// classify the answer.
///
/// Each probe is sent at most once. There is no retry here: a failed call
/// is reported as a `FAILURE` outcome.
pub struct EvaluationInvoker {
    network: Arc<NetworkSnapshot>,
    dispatcher: ShiftDispatcher,
    evaluator: Arc<dyn NetworkEvaluator>,
    timeout: Option<Duration>,
    cancel: CancellationToken,
    warnings: Arc<dyn WarnOnly>,
}

impl EvaluationInvoker {
    pub fn new(
        network: Arc<NetworkSnapshot>,
        dispatcher: ShiftDispatcher,
        evaluator: Arc<dyn NetworkEvaluator>,
    ) -> Self {
        Self {
            network,
            dispatcher,
            evaluator,
            timeout: None,
            cancel: CancellationToken::new(),
            warnings: Arc::new(TechnicalWarnings),
        }
    }

    /// Deadline for a single solver call
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Abort in-flight solver calls once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_warnings(mut self, warnings: Arc<dyn WarnOnly>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn dispatcher(&self) -> &ShiftDispatcher {
        &self.dispatcher
    }

    /// Raw solver answer for one probe
    pub async fn invoke(&self, probe: f64) -> Result<SolverResult, InvocationError> {
        if self.cancel.is_cancelled() {
            return Err(InvocationError::Cancelled);
        }

        let shifts = self.dispatcher.dispatch(probe);
        debug!(
            probe,
            network = %self.network.id,
            backend = self.evaluator.name(),
            ?shifts,
            "invoking solver"
        );

        let call = async {
            let evaluation = self.evaluator.evaluate(&self.network, &shifts);
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, evaluation)
                    .await
                    .map_err(|_| InvocationError::TimedOut(limit))?
                    .map_err(InvocationError::Solver),
                None => evaluation.await.map_err(InvocationError::Solver),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(InvocationError::Cancelled),
            result = call => result,
        }
    }
}

#[async_trait]
impl ProbeEvaluator for EvaluationInvoker {
    async fn evaluate(&self, probe: f64) -> EvaluationOutcome {
        match self.invoke(probe).await {
            Ok(result) => classify(probe, &result),
            Err(InvocationError::Cancelled) => EvaluationOutcome::Interrupted { probe },
            Err(InvocationError::TimedOut(limit)) => {
                self.warnings
                    .warn(&format!("solver timed out after {limit:?} at {probe:.1}MW"));
                EvaluationOutcome::Failure {
                    probe,
                    reason: FailureReason::Timeout,
                }
            }
            Err(InvocationError::Solver(error)) => {
                self.warnings
                    .warn(&format!("solver failed at {probe:.1}MW: {error:#}"));
                EvaluationOutcome::Failure {
                    probe,
                    reason: FailureReason::Solver(error.to_string()),
                }
            }
        }
    }
}
