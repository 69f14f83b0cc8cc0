//! Schedulability analysis of mixed-criticality task systems under approximate
//! computing.
//!
//! HIGH-criticality tasks may overrun their nominal budget. Instead of
//! switching straight to HIGH mode and dropping every LOW task, the system
//! first enters a MID mode in which HIGH tasks get part of their extra budget,
//! controlled by a single factor [`Gamma`](`task::Gamma`), and LOW tasks keep
//! running at a degraded budget.
//!
//! ```text
//! gen      – random task-sets
//! rta      – response times per mode and mode change
//! gamma    – largest gamma keeping MID mode schedulable
//! overrun  – one overrun, classified with and without MID mode
//! harness  – Monte Carlo sweeps over utilization
//! ```

pub mod config;
pub mod error;
pub mod gamma;
pub mod gen;
pub mod harness;
pub mod overrun;
pub mod rta;
pub mod task;
