//! Mock peers for the station agent under test.
//!
//! Each mock owns one observation point and mutates only its own counters in
//! the shared [`context::ScenarioContext`]; verdict arbitration lives with
//! the runner in `gsr-harness`. Servers follow the spawn/handle/shutdown
//! pattern: `spawn` binds an ephemeral endpoint and returns a handle exposing
//! the bound address plus a watch-based graceful shutdown.

pub mod concentrator;
pub mod context;
pub mod discovery;
pub mod gnss;
pub mod muxs;

pub use concentrator::{ConcentratorHandle, ConcentratorSim};
pub use context::{
    FreqPair, Outcome, PpsPlan, ScenarioContext, ScenarioCounts, ScenarioDescriptor,
};
pub use discovery::{DiscoveryHandle, DiscoveryServer};
pub use gnss::{FeedStep, GnssFaultFeed};
pub use muxs::{MuxsHandle, NetworkServerMock};
