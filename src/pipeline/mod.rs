//! Pipeline coordination: run states, the coordinator, and run reports.

mod coordinator;
mod report;
mod state;

pub use coordinator::PipelineCoordinator;
pub use report::{RunError, RunReport};
pub use state::{RunState, RunTracker};
