//! Cross-border capacity calculation.
//!
//! A [`dichotomy::DichotomyEngine`] searches the largest total exchange that
//! keeps the network secure. Every candidate value is split into zonal
//! shifts by the [`shift::ShiftDispatcher`] and evaluated by an external
//! loadflow / remedial-action solver behind [`evaluation::NetworkEvaluator`].

pub mod api;
pub mod config;
pub mod controller;
pub mod dichotomy;
pub mod domain;
pub mod error;
pub mod evaluation;
pub mod power_flow;
pub mod shift;
pub mod telemetry;

pub use error::{CapacityError, ErrorKind};
