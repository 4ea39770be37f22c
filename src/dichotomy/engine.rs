use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{DichotomyState, EvaluationOutcome, FailureReason, InterruptSignal, Phase};
use crate::telemetry::BusinessLog;

/// Default cap on bracketing evaluations
pub const DEFAULT_MAX_BRACKET_STEPS: u32 = 16;

/// Evaluates one candidate transfer value and classifies the result
#[async_trait]
pub trait ProbeEvaluator: Send + Sync {
    async fn evaluate(&self, probe: f64) -> EvaluationOutcome;
}

/// Search parameters of one run. Exactly one of `seed_index` and `bracket`
/// must be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DichotomyParameters {
    pub seed_index: Option<f64>,
    pub bracket: Option<[f64; 2]>,
    /// Stop once `high - low <= precision` (MW)
    #[validate(range(exclusive_min = 0.0))]
    pub precision: f64,
    /// Floor for downward bracketing (MW)
    #[serde(default)]
    pub min_value: f64,
    /// Ceiling for upward bracketing (MW)
    pub max_value: f64,
    /// First bracketing step, doubled after every same-side probe (MW)
    #[validate(range(exclusive_min = 0.0))]
    pub step_hint: f64,
    #[serde(default = "default_max_bracket_steps")]
    #[validate(range(min = 1))]
    pub max_bracket_steps: u32,
}

fn default_max_bracket_steps() -> u32 {
    DEFAULT_MAX_BRACKET_STEPS
}

impl DichotomyParameters {
    pub fn from_seed(seed_index: f64, step_hint: f64, precision: f64, max_value: f64) -> Self {
        Self {
            seed_index: Some(seed_index),
            bracket: None,
            precision,
            min_value: 0.0,
            max_value,
            step_hint,
            max_bracket_steps: DEFAULT_MAX_BRACKET_STEPS,
        }
    }

    pub fn from_bracket(low: f64, high: f64, precision: f64) -> Self {
        Self {
            seed_index: None,
            bracket: Some([low, high]),
            precision,
            min_value: low,
            max_value: high,
            step_hint: precision,
            max_bracket_steps: DEFAULT_MAX_BRACKET_STEPS,
        }
    }

    /// Field ranges plus the cross-field rules validator cannot express
    pub fn check(&self) -> Result<(), String> {
        self.validate().map_err(|errors| errors.to_string())?;

        let values = [self.precision, self.min_value, self.max_value, self.step_hint];
        if values.iter().any(|v| !v.is_finite()) {
            return Err("all limits must be finite".to_string());
        }
        if self.min_value >= self.max_value {
            return Err(format!(
                "min value {} must be below max value {}",
                self.min_value, self.max_value
            ));
        }

        match (self.seed_index, self.bracket) {
            (Some(seed), None) if seed.is_finite() => Ok(()),
            (Some(seed), None) => Err(format!("seed index is not finite: {seed}")),
            (None, Some([low, high])) => {
                if !low.is_finite() || !high.is_finite() || low >= high {
                    Err(format!("bracket [{low}, {high}] must be finite and ordered"))
                } else {
                    Ok(())
                }
            }
            _ => Err("exactly one of seed index or bracket must be set".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

/// Bisection search for the maximum secure transfer value.
///
/// Runs are strictly sequential: each probe depends on the previous
/// outcome. The interrupt signal is polled before every probe.
pub struct DichotomyEngine<E> {
    evaluator: E,
    params: DichotomyParameters,
    log: BusinessLog,
}

impl<E: ProbeEvaluator> DichotomyEngine<E> {
    pub fn new(evaluator: E, params: DichotomyParameters) -> Self {
        Self {
            evaluator,
            params,
            log: BusinessLog::detached(),
        }
    }

    pub fn with_business_log(mut self, log: BusinessLog) -> Self {
        self.log = log;
        self
    }

    pub async fn run(&self, interrupt: &dyn InterruptSignal) -> DichotomyState {
        let mut state = DichotomyState::new(self.params.precision);

        if let Err(detail) = self.params.check() {
            self.log.error(format_args!("invalid dichotomy parameters: {detail}"));
            state.fail(FailureReason::InvalidConfiguration(detail));
            return state;
        }

        match (self.params.seed_index, self.params.bracket) {
            (Some(seed), None) => self.bracket_from_seed(seed, &mut state, interrupt).await,
            (None, Some([low, high])) => self.check_bracket(low, high, &mut state, interrupt).await,
            _ => state.fail(FailureReason::InvalidConfiguration(
                "exactly one of seed index or bracket must be set".to_string(),
            )),
        }

        if !state.is_done() {
            self.refine(&mut state, interrupt).await;
        }
        state.finish();

        self.log.info(format_args!(
            "dichotomy done after {} evaluations: secure={:?} ceiling={:?}",
            state.history().len(),
            state.low(),
            state.high().map(|h| h.probe())
        ));
        state
    }

    async fn next_outcome(&self, probe: f64, interrupt: &dyn InterruptSignal) -> EvaluationOutcome {
        if interrupt.is_interrupted() {
            self.log.warn(format_args!("interrupted before probing {probe:.1}MW"));
            return EvaluationOutcome::Interrupted { probe };
        }
        let outcome = self.evaluator.evaluate(probe).await;
        self.log.info(&outcome);
        outcome
    }

    async fn bracket_from_seed(
        &self,
        seed: f64,
        state: &mut DichotomyState,
        interrupt: &dyn InterruptSignal,
    ) {
        let seed = seed.clamp(self.params.min_value, self.params.max_value);
        let outcome = self.next_outcome(seed, interrupt).await;
        state.record(outcome.clone());
        state.enter(Phase::Bracketing);

        if outcome.is_secure() {
            if seed >= self.params.max_value {
                state.finish();
                return;
            }
            self.grow(seed, Direction::Up, state, interrupt).await;
        } else if outcome.is_ceiling() {
            if seed <= self.params.min_value {
                state.finish();
                return;
            }
            self.grow(seed, Direction::Down, state, interrupt).await;
        }
    }

    /// Move away from `from` with a doubling step until the classification
    /// flips, a limit is hit or the step cap is exhausted.
    async fn grow(
        &self,
        from: f64,
        direction: Direction,
        state: &mut DichotomyState,
        interrupt: &dyn InterruptSignal,
    ) {
        let mut last = from;
        let mut step = self.params.step_hint;

        for _ in 0..self.params.max_bracket_steps {
            let next = match direction {
                Direction::Up => (last + step).min(self.params.max_value),
                Direction::Down => (last - step).max(self.params.min_value),
            };

            let outcome = self.next_outcome(next, interrupt).await;
            state.record(outcome.clone());
            if outcome.is_fatal() {
                return;
            }

            match direction {
                Direction::Up if outcome.is_secure() => {
                    if next >= self.params.max_value {
                        state.finish();
                        return;
                    }
                }
                Direction::Down if outcome.is_ceiling() => {
                    if next <= self.params.min_value {
                        state.finish();
                        return;
                    }
                }
                _ => {
                    state.enter(Phase::Refining);
                    return;
                }
            }

            last = next;
            step *= 2.0;
        }

        self.log.warn(format_args!(
            "no opposite classification after {} bracketing steps",
            self.params.max_bracket_steps
        ));
        state.fail(FailureReason::BracketGrowthExhausted);
    }

    async fn check_bracket(
        &self,
        low: f64,
        high: f64,
        state: &mut DichotomyState,
        interrupt: &dyn InterruptSignal,
    ) {
        state.enter(Phase::Bracketing);

        let mut ends = Vec::with_capacity(2);
        for probe in [low, high] {
            let outcome = self.next_outcome(probe, interrupt).await;
            state.record_only(outcome.clone());
            if outcome.is_fatal() {
                state.apply(outcome);
                return;
            }
            ends.push(outcome);
        }

        let high_outcome = ends.pop();
        let low_outcome = ends.pop();
        match (low_outcome, high_outcome) {
            (Some(low_outcome), Some(high_outcome))
                if low_outcome.is_secure() && high_outcome.is_ceiling() =>
            {
                state.apply(low_outcome);
                state.apply(high_outcome);
                state.enter(Phase::Refining);
            }
            _ => {
                self.log.error(format_args!(
                    "bracket [{low:.1}, {high:.1}] does not separate secure from unsecure"
                ));
                state.fail(FailureReason::InvalidBracket);
            }
        }
    }

    async fn refine(&self, state: &mut DichotomyState, interrupt: &dyn InterruptSignal) {
        state.enter(Phase::Refining);

        while !state.is_done() && !state.is_converged() {
            let (Some(low), Some(high)) = (state.low(), state.high().map(|h| h.probe())) else {
                break;
            };
            let probe = 0.5 * (low + high);
            // Bounds are adjacent floats: no probe can tighten them further
            if probe <= low || probe >= high {
                self.log.warn(format_args!(
                    "bracket [{low}, {high}] cannot be split below precision {}",
                    self.params.precision
                ));
                break;
            }
            let outcome = self.next_outcome(probe, interrupt).await;
            state.record(outcome);
        }
    }
}

#[async_trait]
impl<T: ProbeEvaluator + ?Sized> ProbeEvaluator for std::sync::Arc<T> {
    async fn evaluate(&self, probe: f64) -> EvaluationOutcome {
        (**self).evaluate(probe).await
    }
}
