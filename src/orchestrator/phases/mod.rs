//! Orchestrator phases that run outside the step sequence.
//!
//! - **Preflight** (`prep`): host fitness checks before any privileged action

pub mod prep;

pub use prep::preflight;
