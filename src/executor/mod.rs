//! Statement execution: options, the admission-controlled queue and the
//! per-job acquire/execute/release cycle.

mod dispatch;
mod options;
mod queue;

pub use dispatch::{CONNECTION_LOST, normalize_sql};
pub use options::{ExecuteOptions, OutputFormat};
pub use queue::{ExecutionQueue, IDLE_CLOSE_DELAY, PendingQuery, QueueStats};
