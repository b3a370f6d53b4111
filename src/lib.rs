pub mod cli;
pub mod config;
pub mod creator;
pub mod detector;
pub mod error;
pub mod notify;
pub mod processing;
pub mod progress;
pub mod queue;
pub mod review;
pub mod scanner;
pub mod session;

pub use detector::{BatchDetector, CardDetector, DetectError, FailurePolicy, RunOutcome, RunReport};
pub use error::{CardIntakeError, Result};
pub use processing::{CancelToken, ProcessingTracker, RunState};
pub use queue::{ItemStatus, QueueItem, QueueStore, StatusCounts};
pub use review::ReviewStage;
pub use scanner::SourceFile;
pub use session::BatchSession;
