//! Conversion of a scalar total exchange into per-zone injection shifts.

pub mod dispatcher;

pub use dispatcher::ShiftDispatcher;
