use serde::{Deserialize, Serialize};

use super::{EvaluationOutcome, FailureReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Initializing,
    Bracketing,
    Refining,
    Done,
}

/// Fatal end of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Termination {
    Failure { reason: FailureReason },
    Interrupted,
}

/// One entry of the run history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedPoint {
    /// Zero-based position in the run
    pub index: usize,
    pub probe: f64,
    pub outcome: EvaluationOutcome,
}

/// Mutable state of one dichotomy run, exclusively owned by the engine.
///
/// `low` is the best proven-secure value, `high` the outcome that produced
/// the current ceiling. Once `phase` is [`Phase::Done`] nothing changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DichotomyState {
    phase: Phase,
    precision: f64,
    low: Option<f64>,
    high: Option<EvaluationOutcome>,
    termination: Option<Termination>,
    history: Vec<EvaluatedPoint>,
}

impl DichotomyState {
    pub fn new(precision: f64) -> Self {
        Self {
            phase: Phase::Initializing,
            precision,
            low: None,
            high: None,
            termination: None,
            history: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn low(&self) -> Option<f64> {
        self.low
    }

    pub fn high(&self) -> Option<&EvaluationOutcome> {
        self.high.as_ref()
    }

    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    pub fn history(&self) -> &[EvaluatedPoint] {
        &self.history
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Width of the bracket, when both ends are known
    pub fn width(&self) -> Option<f64> {
        match (self.low, &self.high) {
            (Some(low), Some(high)) => Some(high.probe() - low),
            _ => None,
        }
    }

    pub fn is_converged(&self) -> bool {
        self.width().is_some_and(|width| width <= self.precision)
    }

    pub(crate) fn enter(&mut self, phase: Phase) {
        if !self.is_done() {
            self.phase = phase;
        }
    }

    /// Record an outcome in history and move the matching bound.
    /// Fatal outcomes terminate the run.
    pub(crate) fn record(&mut self, outcome: EvaluationOutcome) {
        if self.is_done() {
            return;
        }
        self.record_only(outcome.clone());
        self.apply(outcome);
    }

    /// Record an outcome without moving any bound (bracket checks)
    pub(crate) fn record_only(&mut self, outcome: EvaluationOutcome) {
        if self.is_done() {
            return;
        }
        self.history.push(EvaluatedPoint {
            index: self.history.len(),
            probe: outcome.probe(),
            outcome,
        });
    }

    /// Move the bound matching an already recorded outcome
    pub(crate) fn apply(&mut self, outcome: EvaluationOutcome) {
        if self.is_done() {
            return;
        }
        match outcome {
            EvaluationOutcome::Secure { probe, .. } => {
                if self.low.map_or(true, |low| probe > low) {
                    self.low = Some(probe);
                }
            }
            EvaluationOutcome::Unsecure { .. } | EvaluationOutcome::GlskLimitation { .. } => {
                if self
                    .high
                    .as_ref()
                    .map_or(true, |high| outcome.probe() < high.probe())
                {
                    self.high = Some(outcome);
                }
            }
            EvaluationOutcome::Failure { reason, .. } => {
                self.terminate(Termination::Failure { reason });
            }
            EvaluationOutcome::Interrupted { .. } => self.terminate(Termination::Interrupted),
        }
    }

    pub(crate) fn fail(&mut self, reason: FailureReason) {
        self.terminate(Termination::Failure { reason });
    }

    pub(crate) fn finish(&mut self) {
        self.phase = Phase::Done;
    }

    fn terminate(&mut self, termination: Termination) {
        if self.is_done() {
            return;
        }
        self.termination = Some(termination);
        self.phase = Phase::Done;
    }
}
