mod error;
mod model;
mod name;
mod queue;

pub use error::{QueueError, QueueResult};
pub use model::{FidStatus, FidStatusMap, JobCounts};
pub use name::{backfill_job_key, process_event_job_key, QueueName, REALTIME_SINGLETON_KEY};
pub use queue::PostgresQueue;
