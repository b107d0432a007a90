use chrono::Utc;
use diesel::prelude::*;
use diesel::sql_types::{Array, BigInt, Text};
use indexer_db::schema::{jobs, queue_pause};
use indexer_db::{
    ConnectionPool, Job, NewJob, PgConnection, QueryError, JOB_STATUS_ACTIVE, JOB_STATUS_COMPLETED,
    JOB_STATUS_FAILED, JOB_STATUS_PENDING,
};
use rand::Rng;

use crate::error::QueueResult;
use crate::model::{FidStatus, FidStatusMap, JobCounts};
use crate::name::QueueName;

/// Reference Queue Layer implementation: a single `jobs` table, dequeued with
/// `SELECT ... FOR UPDATE SKIP LOCKED` so multiple backfill workers can claim
/// from the same queue without ever handing the same row to two of them.
pub struct PostgresQueue {
    pool: ConnectionPool,
}

#[derive(QueryableByName)]
struct FidJobRow {
    #[diesel(sql_type = BigInt)]
    fid: i64,
    #[diesel(sql_type = Text)]
    status: String,
}

impl PostgresQueue {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> QueueResult<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>> {
        Ok(self.pool.get().map_err(QueryError::from)?)
    }

    /// Enqueues `payload` onto `queue`, deduplicating on `key` if one is
    /// given. A job already present under the same `(queue, key)` is left
    /// untouched -- this is what makes re-enqueuing a fid that's already
    /// waiting in the backfill queue a no-op instead of a pile-up.
    pub fn enqueue(&self, queue: QueueName, payload: serde_json::Value, key: Option<&str>) -> QueueResult<i64> {
        let mut conn = self.conn()?;
        let now = Utc::now();
        let job_key = key
            .map(str::to_string)
            .unwrap_or_else(|| format!("unkeyed:{:016x}", rand::rng().random::<u64>()));

        let new_job = NewJob {
            queue: queue.as_str().to_string(),
            job_key,
            payload,
            status: JOB_STATUS_PENDING.to_string(),
            attempts: 0,
            available_at: now,
            created_at: now,
            updated_at: now,
        };

        let existing = diesel::insert_into(jobs::table)
            .values(&new_job)
            .on_conflict((jobs::queue, jobs::job_key))
            .do_nothing()
            .returning(jobs::id)
            .get_result::<i64>(&mut conn)
            .optional()
            .map_err(QueryError::from)?;

        match existing {
            Some(id) => Ok(id),
            None => {
                let id = jobs::table
                    .filter(jobs::queue.eq(queue.as_str()))
                    .filter(jobs::job_key.eq(&new_job.job_key))
                    .select(jobs::id)
                    .first::<i64>(&mut conn)
                    .map_err(QueryError::from)?;
                Ok(id)
            }
        }
    }

    pub fn pause(&self, queue: QueueName) -> QueueResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(queue_pause::table)
            .values((queue_pause::queue.eq(queue.as_str()), queue_pause::paused.eq(true)))
            .on_conflict(queue_pause::queue)
            .do_update()
            .set(queue_pause::paused.eq(true))
            .execute(&mut conn)
            .map_err(QueryError::from)?;
        Ok(())
    }

    pub fn resume(&self, queue: QueueName) -> QueueResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(queue_pause::table)
            .values((queue_pause::queue.eq(queue.as_str()), queue_pause::paused.eq(false)))
            .on_conflict(queue_pause::queue)
            .do_update()
            .set(queue_pause::paused.eq(false))
            .execute(&mut conn)
            .map_err(QueryError::from)?;
        Ok(())
    }

    pub fn is_paused(&self, queue: QueueName) -> QueueResult<bool> {
        let mut conn = self.conn()?;
        let paused = queue_pause::table
            .find(queue.as_str())
            .select(queue_pause::paused)
            .first::<bool>(&mut conn)
            .optional()
            .map_err(QueryError::from)?
            .unwrap_or(false);
        Ok(paused)
    }

    pub fn clear(&self, queue: QueueName) -> QueueResult<usize> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(jobs::table.filter(jobs::queue.eq(queue.as_str())))
            .execute(&mut conn)
            .map_err(QueryError::from)?;
        Ok(deleted)
    }

    pub fn counts(&self, queue: QueueName) -> QueueResult<JobCounts> {
        let mut conn = self.conn()?;
        let now = Utc::now();

        let active = jobs::table
            .filter(jobs::queue.eq(queue.as_str()))
            .filter(jobs::status.eq(JOB_STATUS_ACTIVE))
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(QueryError::from)?;
        let completed = jobs::table
            .filter(jobs::queue.eq(queue.as_str()))
            .filter(jobs::status.eq(JOB_STATUS_COMPLETED))
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(QueryError::from)?;
        let failed = jobs::table
            .filter(jobs::queue.eq(queue.as_str()))
            .filter(jobs::status.eq(JOB_STATUS_FAILED))
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(QueryError::from)?;
        let waiting = jobs::table
            .filter(jobs::queue.eq(queue.as_str()))
            .filter(jobs::status.eq(JOB_STATUS_PENDING))
            .filter(jobs::available_at.le(now))
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(QueryError::from)?;
        let delayed = jobs::table
            .filter(jobs::queue.eq(queue.as_str()))
            .filter(jobs::status.eq(JOB_STATUS_PENDING))
            .filter(jobs::available_at.gt(now))
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(QueryError::from)?;

        Ok(JobCounts {
            active,
            waiting,
            completed,
            failed,
            delayed,
            paused: self.is_paused(queue)?,
        })
    }

    /// Looks up whether each of `fids` has a backfill job waiting or running.
    /// Backed by a jsonb extraction on `payload->>'fid'` since the fid isn't
    /// a column of its own -- the backfill queue is the only one that's ever
    /// keyed by fid, so this doesn't need a `queue` parameter.
    pub fn status_for_fids(&self, fids: &[i64]) -> QueueResult<FidStatusMap> {
        let mut map: FidStatusMap = fids.iter().map(|&fid| (fid, FidStatus::Absent)).collect();
        if fids.is_empty() {
            return Ok(map);
        }

        let mut conn = self.conn()?;
        let rows = diesel::sql_query(
            "select (payload->>'fid')::bigint as fid, status \
             from jobs \
             where queue = 'backfill' \
               and status in ('pending', 'active') \
               and (payload->>'fid')::bigint = any($1)",
        )
        .bind::<Array<BigInt>, _>(fids)
        .load::<FidJobRow>(&mut conn)
        .map_err(QueryError::from)?;

        for row in rows {
            let status = if row.status == JOB_STATUS_ACTIVE {
                FidStatus::Active
            } else {
                FidStatus::Pending
            };
            map.insert(row.fid, status);
        }
        Ok(map)
    }

    /// Claims the oldest available job on `queue` for `worker_id`, skipping
    /// rows another worker already has locked. Returns `None` if the queue is
    /// paused or has nothing ready.
    pub fn claim_next(&self, queue: QueueName, worker_id: &str) -> QueueResult<Option<Job>> {
        if self.is_paused(queue)? {
            return Ok(None);
        }

        let mut conn = self.conn()?;
        let now = Utc::now();

        conn.transaction(|conn| {
            let candidate = jobs::table
                .filter(jobs::queue.eq(queue.as_str()))
                .filter(jobs::status.eq(JOB_STATUS_PENDING))
                .filter(jobs::available_at.le(now))
                .order_by(jobs::available_at.asc())
                .select(jobs::id)
                .for_update()
                .skip_locked()
                .first::<i64>(conn)
                .optional()?;

            let Some(id) = candidate else {
                return Ok(None);
            };

            let job = diesel::update(jobs::table.filter(jobs::id.eq(id)))
                .set((
                    jobs::status.eq(JOB_STATUS_ACTIVE),
                    jobs::attempts.eq(jobs::attempts + 1),
                    jobs::locked_by.eq(worker_id),
                    jobs::locked_at.eq(now),
                    jobs::updated_at.eq(now),
                ))
                .returning(Job::as_returning())
                .get_result::<Job>(conn)?;

            Ok(Some(job))
        })
        .map_err(QueryError::from)
        .map_err(Into::into)
    }

    pub fn complete(&self, job_id: i64) -> QueueResult<()> {
        let mut conn = self.conn()?;
        diesel::update(jobs::table.filter(jobs::id.eq(job_id)))
            .set((jobs::status.eq(JOB_STATUS_COMPLETED), jobs::updated_at.eq(Utc::now())))
            .execute(&mut conn)
            .map_err(QueryError::from)?;
        Ok(())
    }

    /// Fails `job_id`. If it's been attempted fewer than `max_attempts`
    /// times it's rescheduled with exponential backoff from `base_backoff`;
    /// otherwise it's parked in the `failed` status for an operator to look
    /// at via `counts`.
    pub fn fail(&self, job_id: i64, max_attempts: i32, base_backoff: chrono::Duration) -> QueueResult<()> {
        let mut conn = self.conn()?;
        let job = jobs::table
            .filter(jobs::id.eq(job_id))
            .select(Job::as_select())
            .first::<Job>(&mut conn)
            .map_err(QueryError::from)?;

        let now = Utc::now();
        if job.attempts >= max_attempts {
            diesel::update(jobs::table.filter(jobs::id.eq(job_id)))
                .set((jobs::status.eq(JOB_STATUS_FAILED), jobs::updated_at.eq(now)))
                .execute(&mut conn)
                .map_err(QueryError::from)?;
        } else {
            let backoff = base_backoff * 2i32.pow(job.attempts.max(0) as u32).min(1 << 20);
            diesel::update(jobs::table.filter(jobs::id.eq(job_id)))
                .set((
                    jobs::status.eq(JOB_STATUS_PENDING),
                    jobs::available_at.eq(now + backoff),
                    jobs::locked_by.eq(None::<String>),
                    jobs::locked_at.eq(None::<chrono::DateTime<Utc>>),
                    jobs::updated_at.eq(now),
                ))
                .execute(&mut conn)
                .map_err(QueryError::from)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn fid_status_defaults_to_absent_for_unknown_fids() {
        let fids = [1, 2, 3];
        let map: FidStatusMap = fids.iter().map(|&fid| (fid, FidStatus::Absent)).collect();
        assert_eq!(map.get(&1), Some(&FidStatus::Absent));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn queue_name_parses_back_from_display() {
        assert_eq!(QueueName::from_str(&QueueName::Backfill.to_string()).unwrap(), QueueName::Backfill);
    }
}
