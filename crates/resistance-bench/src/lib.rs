//! YAML-driven analysis harness around `resistance_core`: opening evaluation,
//! model-mismatch scoring, fail-probability sweeps and Monte-Carlo checks.

pub mod analytics;
pub mod config;
pub mod logging;
pub mod report;
pub mod runner;
