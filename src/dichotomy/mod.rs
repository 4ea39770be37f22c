//! Dichotomy (bisection) search for the maximum secure transfer value.
//!
//! The engine drives a [`ProbeEvaluator`] through the phases
//! `INITIALIZING -> BRACKETING -> REFINING -> DONE`; the
//! [`ResultAssembler`] turns the terminal state into a [`DichotomyResult`].

pub mod engine;
pub mod interrupt;
pub mod outcome;
pub mod result;
pub mod state;

pub use engine::{DichotomyEngine, DichotomyParameters, ProbeEvaluator, DEFAULT_MAX_BRACKET_STEPS};
pub use interrupt::{InterruptSignal, NeverInterrupted};
pub use outcome::{classify, EvaluationOutcome, FailureReason};
pub use result::{DichotomyResult, LimitingCause, ResultAssembler};
pub use state::{DichotomyState, EvaluatedPoint, Phase, Termination};
