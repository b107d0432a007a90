use hashbrown::HashMap;
use serde::Serialize;

/// Point-in-time snapshot of one queue's job distribution, surfaced by the
/// admin API and polled by operators deciding whether to scale backfill
/// concurrency.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobCounts {
    pub active: i64,
    pub waiting: i64,
    pub completed: i64,
    pub failed: i64,
    pub delayed: i64,
    pub paused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FidStatus {
    Pending,
    Active,
    Absent,
}

pub type FidStatusMap = HashMap<i64, FidStatus>;
