use std::sync::Arc;

use chrono::Utc;
use indexer_db::{ConnectionPool, QueryError};
use indexer_queue::{backfill_job_key, PostgresQueue, QueueName};
use serde_json::json;
use thiserror::Error;

use crate::cache::{InMemorySetCache, TargetSetCache};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Db(#[from] QueryError),

    #[error(transparent)]
    Queue(#[from] indexer_queue::QueueError),

    #[error("target {0} already exists")]
    AlreadyExists(i64),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Owns both membership caches (targets and client targets) and funnels
/// every add/remove through SQL first, so a crash between the database
/// write and the cache update is always recoverable from SQL on the next
/// bootstrap.
pub struct TargetRegistry {
    pool: ConnectionPool,
    queue: Arc<PostgresQueue>,
    targets: InMemorySetCache,
    client_targets: InMemorySetCache,
}

impl TargetRegistry {
    pub fn new(pool: ConnectionPool, queue: Arc<PostgresQueue>) -> Self {
        Self {
            pool,
            queue,
            targets: InMemorySetCache::new(),
            client_targets: InMemorySetCache::new(),
        }
    }

    /// Loads every Target/ClientTarget row from SQL and replaces the cache
    /// contents wholesale. Must run to completion before workers are allowed
    /// to dequeue, and is also the recovery path for the healthcheck below.
    pub fn bootstrap(&self) -> RegistryResult<()> {
        let mut conn = self.pool.get().map_err(QueryError::from)?;
        let target_fids = indexer_db::all_target_fids(&mut conn)?;
        let client_fids = indexer_db::all_client_target_fids(&mut conn)?;
        self.targets.replace_all(target_fids);
        self.client_targets.replace_all(client_fids);
        Ok(())
    }

    /// Compares the SQL row count against the cache size and reloads on
    /// mismatch, logging a consistency warning -- mirrors the teacher's
    /// lock-then-verify idiom for failing loud but recovering automatically.
    pub fn healthcheck(&self) -> RegistryResult<()> {
        let mut conn = self.pool.get().map_err(QueryError::from)?;
        let sql_count = indexer_db::all_target_fids(&mut conn)?.len();
        if sql_count != self.targets.size() {
            log::warn!(
                "target cache size {} does not match SQL target count {}; reloading",
                self.targets.size(),
                sql_count,
            );
            self.bootstrap()?;
        }
        Ok(())
    }

    pub fn is_target(&self, fid: i64) -> bool {
        self.targets.contains(fid)
    }

    pub fn is_client_target(&self, fid: i64) -> bool {
        self.client_targets.contains(fid)
    }

    /// Whether `fid` is a Target *and* flagged root. Unlike [`Self::is_target`]
    /// this isn't cache-backed (the cache only tracks membership, not the
    /// root flag) so it costs a round trip; only called from the realtime
    /// expansion path, which is not the per-event hot path the cache exists
    /// to keep off SQL.
    pub fn is_root_target(&self, fid: i64) -> RegistryResult<bool> {
        let mut conn = self.pool.get().map_err(QueryError::from)?;
        Ok(indexer_db::get_target(&mut conn, fid)?.map(|t| t.is_root).unwrap_or(false))
    }

    pub fn target_fids(&self) -> Vec<i64> {
        self.targets.members()
    }

    pub fn add(&self, fid: i64, is_root: bool) -> RegistryResult<()> {
        let mut conn = self.pool.get().map_err(QueryError::from)?;
        let now = Utc::now();
        let inserted = indexer_db::insert_target_if_absent(&mut conn, fid, is_root, now)?;
        match inserted {
            Some(_) => {
                self.targets.add(fid);
                self.queue.enqueue(
                    QueueName::Backfill,
                    json!({ "fid": fid, "is_root": is_root }),
                    Some(&backfill_job_key(fid)),
                )?;
                Ok(())
            }
            None => Err(RegistryError::AlreadyExists(fid)),
        }
    }

    /// Same as [`Self::add`] but idempotent: an existing target is left
    /// alone rather than surfaced as an error. Used by dynamic expansion,
    /// where "it's already a target" is the expected common case.
    pub fn ensure(&self, fid: i64, is_root: bool) -> RegistryResult<()> {
        match self.add(fid, is_root) {
            Ok(()) | Err(RegistryError::AlreadyExists(_)) => Ok(()),
            Err(other) => Err(other),
        }
    }

    pub fn add_client_target(&self, client_fid: i64) -> RegistryResult<()> {
        let mut conn = self.pool.get().map_err(QueryError::from)?;
        let now = Utc::now();
        if indexer_db::insert_client_target_if_absent(&mut conn, client_fid, now)?.is_some() {
            self.client_targets.add(client_fid);
        }
        Ok(())
    }

    pub fn remove(&self, fid: i64) -> RegistryResult<()> {
        let mut conn = self.pool.get().map_err(QueryError::from)?;
        indexer_db::delete_target(&mut conn, fid)?;
        self.targets.remove(fid);
        Ok(())
    }

    /// Sets `is_root` on an existing Target. No cache mutation: membership
    /// doesn't change, only the root flag does. The entry point an external
    /// admin surface would call to flip a target's root status by hand,
    /// distinct from [`Self::promote_to_root`] which also handles the
    /// insert-if-absent case needed by SIGNER_ADD expansion.
    pub fn update(&self, fid: i64, is_root: bool) -> RegistryResult<()> {
        let mut conn = self.pool.get().map_err(QueryError::from)?;
        indexer_db::update_is_root(&mut conn, fid, is_root)?;
        Ok(())
    }

    /// Promotes an existing non-root Target to root, or inserts it as a
    /// fresh root Target (and enqueues its backfill) if it doesn't exist
    /// yet. Used by SIGNER_ADD dynamic expansion.
    pub fn promote_to_root(&self, fid: i64) -> RegistryResult<()> {
        let mut conn = self.pool.get().map_err(QueryError::from)?;
        match indexer_db::get_target(&mut conn, fid)? {
            Some(target) if target.is_root => Ok(()),
            Some(_) => {
                indexer_db::update_is_root(&mut conn, fid, true)?;
                Ok(())
            }
            None => {
                drop(conn);
                self.add(fid, true)
            }
        }
    }

    /// Removes `target_fid` iff no other root Target still follows it. Best
    /// effort: a race against a concurrent follow is acceptable (the next
    /// realtime tick's relevance check will simply re-add it).
    pub fn maybe_unfollow_prune(&self, target_fid: i64, unfollowed_by: i64) -> RegistryResult<()> {
        let mut conn = self.pool.get().map_err(QueryError::from)?;
        if let Some(target) = indexer_db::get_target(&mut conn, target_fid)? {
            if target.is_root {
                return Ok(());
            }
        } else {
            return Ok(());
        }
        let still_followed = indexer_db::any_other_root_target_follows(&mut conn, target_fid, unfollowed_by)?;
        if !still_followed {
            indexer_db::delete_target(&mut conn, target_fid)?;
            self.targets.remove(target_fid);
        }
        Ok(())
    }

    pub fn mark_synced(&self, fid: i64) -> RegistryResult<()> {
        let mut conn = self.pool.get().map_err(QueryError::from)?;
        indexer_db::mark_synced(&mut conn, fid, Utc::now())?;
        Ok(())
    }

    pub fn list(&self, params: &indexer_db::ListTargetsParams) -> RegistryResult<TargetsPageWithWaiting> {
        let mut conn = self.pool.get().map_err(QueryError::from)?;
        let page = indexer_db::list(&mut conn, params)?;
        let fids: Vec<i64> = page.targets.iter().map(|t| t.fid).collect();
        let statuses = self.queue.status_for_fids(&fids)?;
        let waiting = statuses
            .values()
            .filter(|s| matches!(s, indexer_queue::FidStatus::Pending | indexer_queue::FidStatus::Active))
            .count() as i64;
        Ok(TargetsPageWithWaiting { page, waiting })
    }
}

pub struct TargetsPageWithWaiting {
    pub page: indexer_db::TargetsPage,
    pub waiting: i64,
}

#[cfg(test)]
mod tests {
    // TargetRegistry's behavior is inseparable from a live Postgres
    // connection pool; it's exercised in end-to-end tests against a real
    // database rather than here.
}
