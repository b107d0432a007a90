use std::fmt;

use crate::error::QueueError;

/// The three named queues the pipeline coordinates through. Fixed rather
/// than free-form so a typo in a queue name surfaces at the call site
/// instead of silently opening a fourth, unconsumed queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    Backfill,
    Realtime,
    ProcessEvent,
}

impl QueueName {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueName::Backfill => "backfill",
            QueueName::Realtime => "realtime",
            QueueName::ProcessEvent => "process-event",
        }
    }

    pub fn all() -> [QueueName; 3] {
        [QueueName::Backfill, QueueName::Realtime, QueueName::ProcessEvent]
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QueueName {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backfill" => Ok(QueueName::Backfill),
            "realtime" => Ok(QueueName::Realtime),
            "process-event" => Ok(QueueName::ProcessEvent),
            other => Err(QueueError::UnknownQueue(other.to_string())),
        }
    }
}

pub fn backfill_job_key(fid: i64) -> String {
    format!("backfill:{fid}")
}

pub fn process_event_job_key(event_id: i64) -> String {
    format!("process-event:{event_id}")
}

pub const REALTIME_SINGLETON_KEY: &str = "singleton";

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn round_trips_through_as_str_and_from_str() {
        for queue in QueueName::all() {
            assert_eq!(QueueName::from_str(queue.as_str()).unwrap(), queue);
        }
    }

    #[test]
    fn unknown_queue_name_is_rejected() {
        assert!(QueueName::from_str("not-a-real-queue").is_err());
    }

    #[test]
    fn job_keys_are_stable_for_the_same_input() {
        assert_eq!(backfill_job_key(42), backfill_job_key(42));
        assert_ne!(backfill_job_key(42), backfill_job_key(43));
    }
}
