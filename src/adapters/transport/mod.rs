//! Transport Adapters
//!
//! - **SimulatedTransport** - Scriptable in-process transport (testing/development)

mod simulated;

pub use simulated::{ProbeBehavior, ScriptMode, SimulatedHandle, SimulatedTransport};
