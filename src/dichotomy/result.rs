use serde::{Deserialize, Serialize};

use super::{DichotomyState, EvaluatedPoint, EvaluationOutcome, FailureReason, Termination};
use crate::error::{CapacityError, ErrorKind};
use crate::evaluation::LimitingElement;

/// Why the search stopped where it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LimitingCause {
    /// Secure up to the configured maximum value
    SecureLimit,
    /// A network element overloads above the final value
    CriticalBranch,
    GlskLimitation,
    Failure,
    Interrupted,
}

/// Final, immutable outcome of a dichotomy run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DichotomyResult {
    /// Best proven-secure transfer value (MW), absent when none was found
    pub final_value: Option<f64>,
    /// Lowest known non-secure value (MW)
    pub high_bound: Option<f64>,
    pub limiting_cause: LimitingCause,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limiting_element: Option<LimitingElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    pub evaluated_points: Vec<EvaluatedPoint>,
}

impl DichotomyResult {
    /// The run as an error, when it ended without a usable secure value
    /// or was stopped.
    pub fn error(&self) -> Option<CapacityError> {
        match (&self.failure, self.limiting_cause) {
            (Some(reason), _) => {
                let kind = match reason {
                    FailureReason::InvalidConfiguration(_) | FailureReason::InvalidBracket => {
                        ErrorKind::Configuration
                    }
                    FailureReason::Divergence => ErrorKind::SolverDivergence,
                    FailureReason::Timeout
                    | FailureReason::Solver(_)
                    | FailureReason::BracketGrowthExhausted => ErrorKind::SolverInvocation,
                };
                Some(CapacityError::new(kind, reason.to_string()))
            }
            (None, LimitingCause::Interrupted) => Some(CapacityError::new(
                ErrorKind::Interruption,
                "capacity computation interrupted",
            )),
            (None, LimitingCause::GlskLimitation) if self.final_value.is_none() => Some(
                CapacityError::new(ErrorKind::GlskLimitation, "no secure value within GLSK limits"),
            ),
            (None, LimitingCause::CriticalBranch) if self.final_value.is_none() => {
                Some(CapacityError::new(
                    ErrorKind::NoSecureValue,
                    format!(
                        "network is unsecure down to {:.1}MW",
                        self.high_bound.unwrap_or_default()
                    ),
                ))
            }
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Projects a terminal [`DichotomyState`] onto a [`DichotomyResult`]
pub struct ResultAssembler;

impl ResultAssembler {
    pub fn assemble(state: &DichotomyState) -> DichotomyResult {
        let high = state.high();

        let (limiting_cause, failure) = match state.termination() {
            Some(Termination::Failure { reason }) => (LimitingCause::Failure, Some(reason.clone())),
            Some(Termination::Interrupted) => (LimitingCause::Interrupted, None),
            None => match high {
                Some(EvaluationOutcome::GlskLimitation { .. }) => (LimitingCause::GlskLimitation, None),
                Some(_) => (LimitingCause::CriticalBranch, None),
                None => (LimitingCause::SecureLimit, None),
            },
        };

        let limiting_element = match high {
            Some(EvaluationOutcome::Unsecure {
                limiting_element, ..
            }) => Some(limiting_element.clone()),
            _ => None,
        };

        DichotomyResult {
            final_value: state.low(),
            high_bound: high.map(|h| h.probe()),
            limiting_cause,
            limiting_element,
            failure,
            evaluated_points: state.history().to_vec(),
        }
    }
}
