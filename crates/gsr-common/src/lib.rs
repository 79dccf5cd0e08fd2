//! Shared primitives for the gateway-station regression harness.
//!
//! The harness proper lives in `gsr-harness`; this crate carries the ambient
//! concerns every other member needs: environment-driven configuration,
//! tracing setup, and wall-clock helpers matching the control-plane's time
//! encoding.

pub mod config;
pub mod logging;
pub mod time;
