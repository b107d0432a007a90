use std::sync::Arc;

use chrono::Utc;
use hub_client::wire::{HubEvent, Message};
use hub_client::HubClient;
use indexer_db::{ConnectionPool, QueryError};
use indexer_queue::{process_event_job_key, PostgresQueue, QueueName};
use miette::Diagnostic;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::registry::TargetRegistry;

const REALTIME_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error, Diagnostic)]
pub enum RealtimeError {
    #[error(transparent)]
    Hub(#[from] hub_client::HubError),

    #[error(transparent)]
    Db(#[from] QueryError),

    #[error(transparent)]
    Queue(#[from] indexer_queue::QueueError),
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Single-instance, concurrency-1 consumer of the hub's event log. Reads
/// `SyncState("last_event_id")` as its starting cursor and persists it back
/// after every tick, so a restart resumes exactly where it left off.
pub struct RealtimeWorker {
    hub: HubClient,
    pool: ConnectionPool,
    queue: Arc<PostgresQueue>,
    registry: Arc<TargetRegistry>,
}

impl RealtimeWorker {
    pub fn new(hub: HubClient, pool: ConnectionPool, queue: Arc<PostgresQueue>, registry: Arc<TargetRegistry>) -> Self {
        Self { hub, pool, queue, registry }
    }

    pub async fn run(&self, shutdown: CancellationToken) -> RealtimeResult<()> {
        let mut cursor = {
            let mut conn = self.pool.get().map_err(QueryError::from)?;
            indexer_db::get_cursor(&mut conn)?
        };

        loop {
            if shutdown.is_cancelled() {
                break;
            }
            cursor = self.tick(cursor).await?;
        }

        if let Some(cursor) = cursor {
            let mut conn = self.pool.get().map_err(QueryError::from)?;
            indexer_db::set_cursor(&mut conn, cursor, Utc::now())?;
        }
        Ok(())
    }

    /// Fetches one page of events starting after `cursor`, processing each
    /// in order, and returns the new cursor position.
    async fn tick(&self, cursor: Option<i64>) -> RealtimeResult<Option<i64>> {
        let page = self
            .hub
            .get_events(cursor.map(|c| c as u64), Some(REALTIME_PAGE_SIZE), None)
            .await?;

        let mut cursor = cursor;
        for event in &page.events {
            if let Err(err) = self.process_event(event) {
                log::error!("error processing event {}: {err}", event.id);
            }
            cursor = Some(event.id as i64);
        }

        if let Some(cursor) = cursor {
            let mut conn = self.pool.get().map_err(QueryError::from)?;
            indexer_db::set_cursor(&mut conn, cursor, Utc::now())?;
        }

        Ok(cursor)
    }

    fn process_event(&self, event: &HubEvent) -> RealtimeResult<()> {
        if !self.is_relevant(event) {
            return Ok(());
        }

        self.queue.enqueue(
            QueueName::ProcessEvent,
            serde_json::json!({ "event": event }),
            Some(&process_event_job_key(event.id as i64)),
        )?;

        self.expand(event);
        Ok(())
    }

    /// Implements the relevance filter: merge-message events are relevant
    /// if the message's own fid, or the fid of whatever it references, is a
    /// tracked Target; on-chain events are relevant if the fid is a Target,
    /// or (for SIGNER_ADD specifically) a ClientTarget; prune/revoke events
    /// inherit the relevance of the message they carry.
    fn is_relevant(&self, event: &HubEvent) -> bool {
        if let Some(body) = &event.merge_message_body {
            return self.message_is_relevant(&body.message);
        }
        if let Some(body) = &event.prune_message_body {
            return self.registry.is_target(body.message.data.fid as i64);
        }
        if let Some(body) = &event.revoke_message_body {
            return self.registry.is_target(body.message.data.fid as i64);
        }
        if let Some(body) = &event.merge_on_chain_event_body {
            let on_chain = &body.on_chain_event;
            if on_chain.event_type == "EVENT_TYPE_SIGNER_ADD" {
                return self.registry.is_client_target(on_chain.fid as i64);
            }
            return self.registry.is_target(on_chain.fid as i64);
        }
        false
    }

    fn message_is_relevant(&self, message: &Message) -> bool {
        if self.registry.is_target(message.data.fid as i64) {
            return true;
        }
        if let Some(body) = &message.data.cast_add_body {
            if let Some(parent) = &body.parent_cast_id {
                if self.registry.is_target(parent.fid as i64) {
                    return true;
                }
            }
        }
        if let Some(body) = &message.data.reaction_body {
            if let Some(target) = &body.target_cast_id {
                if self.registry.is_target(target.fid as i64) {
                    return true;
                }
            }
        }
        if let Some(body) = &message.data.link_body {
            if let Some(target_fid) = body.target_fid {
                if self.registry.is_target(target_fid as i64) {
                    return true;
                }
            }
        }
        false
    }

    /// Dynamic expansion per a relevant event. Expansion failures are
    /// logged, not propagated: the cursor still advances regardless of
    /// whether the expansion succeeded.
    fn expand(&self, event: &HubEvent) {
        if let Some(body) = &event.merge_message_body {
            match body.message.data.message_type.as_str() {
                "MESSAGE_TYPE_LINK_ADD" => self.expand_link_add(&body.message),
                "MESSAGE_TYPE_LINK_REMOVE" => self.expand_link_remove(&body.message),
                _ => {}
            }
        }
        if let Some(body) = &event.prune_message_body {
            self.expand_link_remove(&body.message);
        }
        if let Some(body) = &event.revoke_message_body {
            self.expand_link_remove(&body.message);
        }
        if let Some(body) = &event.merge_on_chain_event_body {
            self.expand_signer_add(&body.on_chain_event);
        }
    }

    fn expand_link_add(&self, message: &Message) {
        if message.data.message_type != "MESSAGE_TYPE_LINK_ADD" {
            return;
        }
        let Some(link_body) = &message.data.link_body else { return };
        if link_body.link_type != "follow" {
            return;
        }
        let Some(target_fid) = link_body.target_fid else { return };
        match self.registry.is_root_target(message.data.fid as i64) {
            Ok(true) => {}
            Ok(false) => return,
            Err(err) => {
                log::warn!("follow expansion root check failed for fid {}: {err}", message.data.fid);
                return;
            }
        }
        if let Err(err) = self.registry.ensure(target_fid as i64, false) {
            log::warn!("follow expansion failed for target {target_fid}: {err}");
        }
    }

    fn expand_link_remove(&self, message: &Message) {
        let Some(link_body) = &message.data.link_body else { return };
        if link_body.link_type != "follow" {
            return;
        }
        let Some(target_fid) = link_body.target_fid else { return };
        if let Err(err) = self.registry.maybe_unfollow_prune(target_fid as i64, message.data.fid as i64) {
            log::warn!("unfollow prune failed for target {target_fid}: {err}");
        }
    }

    fn expand_signer_add(&self, on_chain: &hub_client::wire::OnChainEvent) {
        if on_chain.event_type != "EVENT_TYPE_SIGNER_ADD" {
            return;
        }
        if !self.registry.is_client_target(on_chain.fid as i64) {
            return;
        }
        if let Err(err) = self.registry.promote_to_root(on_chain.fid as i64) {
            log::warn!("root promotion failed for fid {}: {err}", on_chain.fid);
        }
    }
}

#[cfg(test)]
mod tests {
    // Relevance and expansion logic both depend on TargetRegistry's live
    // membership cache; covered by the indexer-core integration tests
    // rather than isolated unit tests here.
}
