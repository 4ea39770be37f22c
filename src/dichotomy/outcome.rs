use serde::{Deserialize, Serialize};
use std::fmt;

use crate::evaluation::{LimitingElement, SolverResult};

/// Why a probe or a whole run failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// Loadflow did not converge
    Divergence,
    /// Solver did not answer within the invoker deadline
    Timeout,
    /// Solver call itself failed
    Solver(String),
    /// Request shape is wrong (seed and bracket, precision, limits)
    InvalidConfiguration(String),
    /// Both bracket ends have the same security classification
    InvalidBracket,
    /// Bracketing hit its evaluation cap without finding opposite ends
    BracketGrowthExhausted,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Divergence => write!(f, "divergence"),
            Self::Timeout => write!(f, "timeout"),
            Self::Solver(detail) => write!(f, "solver failure: {detail}"),
            Self::InvalidConfiguration(detail) => write!(f, "invalid configuration: {detail}"),
            Self::InvalidBracket => write!(f, "invalid bracket"),
            Self::BracketGrowthExhausted => write!(f, "bracket growth exhausted"),
        }
    }
}

/// Classified result of evaluating one probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationOutcome {
    Secure {
        probe: f64,
        worst_margin: f64,
    },
    Unsecure {
        probe: f64,
        limiting_element: LimitingElement,
    },
    GlskLimitation {
        probe: f64,
    },
    Failure {
        probe: f64,
        reason: FailureReason,
    },
    Interrupted {
        probe: f64,
    },
}

impl EvaluationOutcome {
    pub fn probe(&self) -> f64 {
        match self {
            Self::Secure { probe, .. }
            | Self::Unsecure { probe, .. }
            | Self::GlskLimitation { probe }
            | Self::Failure { probe, .. }
            | Self::Interrupted { probe } => *probe,
        }
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, Self::Secure { .. })
    }

    /// Unsecure or GLSK limited: a valid upper bound for the search
    pub fn is_ceiling(&self) -> bool {
        matches!(self, Self::Unsecure { .. } | Self::GlskLimitation { .. })
    }

    /// Failure or interruption: the run cannot continue
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Failure { .. } | Self::Interrupted { .. })
    }
}

impl fmt::Display for EvaluationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secure { probe, worst_margin } => {
                write!(f, "SECURE at {probe:.1}MW (margin {worst_margin:.1}MW)")
            }
            Self::Unsecure {
                probe,
                limiting_element,
            } => write!(
                f,
                "UNSECURE at {probe:.1}MW ({} margin {:.1}MW)",
                limiting_element.id, limiting_element.margin_mw
            ),
            Self::GlskLimitation { probe } => write!(f, "GLSK_LIMITATION at {probe:.1}MW"),
            Self::Failure { probe, reason } => write!(f, "FAILURE at {probe:.1}MW ({reason})"),
            Self::Interrupted { probe } => write!(f, "INTERRUPTED at {probe:.1}MW"),
        }
    }
}

/// Classify a raw solver result. First matching rule wins:
/// divergence, GLSK exhaustion, remaining overloads, otherwise secure.
pub fn classify(probe: f64, result: &SolverResult) -> EvaluationOutcome {
    if !result.converged {
        return EvaluationOutcome::Failure {
            probe,
            reason: FailureReason::Divergence,
        };
    }

    if result.glsk_exhausted {
        return EvaluationOutcome::GlskLimitation { probe };
    }

    let worst_overload = result
        .overloaded_elements
        .iter()
        .min_by(|a, b| a.margin_mw.total_cmp(&b.margin_mw));

    match worst_overload {
        Some(element) => EvaluationOutcome::Unsecure {
            probe,
            limiting_element: element.clone(),
        },
        None => EvaluationOutcome::Secure {
            probe,
            worst_margin: result.worst_margin,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn element(id: &str, margin_mw: f64) -> LimitingElement {
        LimitingElement {
            id: id.to_string(),
            margin_mw,
        }
    }

    fn result(converged: bool, glsk_exhausted: bool, overloads: Vec<LimitingElement>) -> SolverResult {
        SolverResult {
            converged,
            overloaded_elements: overloads,
            worst_margin: 42.0,
            glsk_exhausted,
        }
    }

    #[rstest]
    #[case::divergence_wins(false, true, vec![element("a", -10.0)], "FAILURE")]
    #[case::glsk_before_overload(true, true, vec![element("a", -10.0)], "GLSK_LIMITATION")]
    #[case::overload(true, false, vec![element("a", -10.0)], "UNSECURE")]
    #[case::secure(true, false, vec![], "SECURE")]
    fn test_priority(
        #[case] converged: bool,
        #[case] glsk: bool,
        #[case] overloads: Vec<LimitingElement>,
        #[case] expected: &str,
    ) {
        let outcome = classify(1000.0, &result(converged, glsk, overloads));
        assert!(outcome.to_string().starts_with(expected), "{outcome}");
        assert_eq!(outcome.probe(), 1000.0);
    }

    #[test]
    fn test_divergence_reason() {
        let outcome = classify(10.0, &result(false, false, vec![]));
        assert_eq!(
            outcome,
            EvaluationOutcome::Failure {
                probe: 10.0,
                reason: FailureReason::Divergence
            }
        );
    }

    #[test]
    fn test_worst_element_is_reported() {
        let outcome = classify(
            500.0,
            &result(
                true,
                false,
                vec![element("FR-IT", -20.0), element("CH-IT", -75.5), element("AT-IT", -1.0)],
            ),
        );
        match outcome {
            EvaluationOutcome::Unsecure {
                limiting_element, ..
            } => assert_eq!(limiting_element, element("CH-IT", -75.5)),
            other => panic!("unexpected outcome {other}"),
        }
    }

    #[test]
    fn test_secure_carries_margin() {
        let outcome = classify(500.0, &result(true, false, vec![]));
        assert_eq!(
            outcome,
            EvaluationOutcome::Secure {
                probe: 500.0,
                worst_margin: 42.0
            }
        );
        assert!(outcome.is_secure());
        assert!(!outcome.is_ceiling());
        assert!(!outcome.is_fatal());
    }

    #[test]
    fn test_serialized_tag() {
        let json = serde_json::to_value(EvaluationOutcome::GlskLimitation { probe: 1.0 }).unwrap();
        assert_eq!(json["outcome"], "GLSK_LIMITATION");

        let json = serde_json::to_value(EvaluationOutcome::Failure {
            probe: 1.0,
            reason: FailureReason::Solver("down".into()),
        })
        .unwrap();
        assert_eq!(json["reason"]["reason"], "solver");
        assert_eq!(json["reason"]["detail"], "down");
    }
}
