//! build-monitor library exports.
//!
//! Measures build duration across a `start`/`end` pair of CI steps, probes a
//! service's health endpoint, and reports the outcome as step outputs and an
//! optional webhook POST.

pub mod clock;
pub mod commands;
pub mod config;
pub mod duration;
pub mod health;
pub mod marker;
pub mod report;
pub mod timer;
pub mod webhook;

pub(crate) const USER_AGENT: &str = concat!("build-monitor/", env!("CARGO_PKG_VERSION"));
