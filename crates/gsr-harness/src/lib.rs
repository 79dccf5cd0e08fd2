//! Scenario orchestration for the station regression harness.
//!
//! [`scenarios`] holds the built-in scenario catalog, [`process`] wraps the
//! agent subprocess, and [`runner`] materializes a scenario into running
//! mocks, races completion against the global timeout, and produces the
//! final [`runner::RunReport`].

pub mod process;
pub mod runner;
pub mod scenarios;

pub use runner::{RunReport, ScenarioRunner, Verdict};
