use std::sync::Arc;
use std::time::Duration;

use hub_client::wire::{HubEvent, Message};
use indexer_db::{ConnectionPool, NewCast, NewLink, NewOnChainEvent, NewReaction, NewUserDataEntry, NewVerification, QueryError};
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::decode::{self, RemovalTarget};

/// Flush policy the config layer recognizes as `batch_size`/`batch_timeout_ms`.
#[derive(Debug, Clone, Copy)]
pub struct ProcessorSettings {
    pub batch_size: usize,
    pub batch_timeout: Duration,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self { batch_size: 100, batch_timeout: Duration::from_millis(1000) }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProcessEventJob {
    pub event: HubEvent,
}

#[derive(Debug, Error, Diagnostic)]
pub enum ProcessorError {
    #[error(transparent)]
    Db(#[from] QueryError),
}

pub type ProcessorResult<T> = Result<T, ProcessorError>;

#[derive(Default)]
struct Buffers {
    casts: Vec<NewCast>,
    reactions: Vec<NewReaction>,
    links: Vec<NewLink>,
    verifications: Vec<NewVerification>,
    on_chain_events: Vec<NewOnChainEvent>,
    user_data: Vec<NewUserDataEntry>,
    user_data_fids: Vec<i64>,
}

impl Buffers {
    fn pending(&self) -> usize {
        self.casts.len()
            + self.reactions.len()
            + self.links.len()
            + self.verifications.len()
            + self.on_chain_events.len()
            + self.user_data.len()
    }
}

/// Batches message-table writes behind a size/time-triggered flush, one
/// buffer per table, so a burst of realtime events doesn't turn into one
/// round trip per row. Single-threaded with respect to its own buffers --
/// correctness across multiple running instances rests entirely on
/// conflict-do-nothing inserts and hash-keyed deletes.
pub struct EventProcessor {
    pool: ConnectionPool,
    buffers: Mutex<Buffers>,
    flush_timer: Mutex<Option<CancellationToken>>,
    settings: ProcessorSettings,
}

impl EventProcessor {
    pub fn new(pool: ConnectionPool) -> Self {
        Self::with_settings(pool, ProcessorSettings::default())
    }

    pub fn with_settings(pool: ConnectionPool, settings: ProcessorSettings) -> Self {
        Self {
            pool,
            buffers: Mutex::new(Buffers::default()),
            flush_timer: Mutex::new(None),
            settings,
        }
    }

    pub async fn handle(self: &Arc<Self>, job: &ProcessEventJob) -> ProcessorResult<()> {
        let event = &job.event;

        if let Some(body) = &event.merge_message_body {
            self.handle_merge_message(&body.message).await?;
        }
        if let Some(body) = &event.merge_on_chain_event_body {
            let record = decode::decode_on_chain_event(&body.on_chain_event);
            self.append_on_chain_event(record).await?;
        }
        if let Some(body) = &event.prune_message_body {
            self.delete_message(&body.message).await?;
        }
        if let Some(body) = &event.revoke_message_body {
            self.delete_message(&body.message).await?;
        }

        Ok(())
    }

    async fn handle_merge_message(self: &Arc<Self>, message: &Message) -> ProcessorResult<()> {
        match message.data.message_type.as_str() {
            "MESSAGE_TYPE_CAST_ADD" => {
                if let Some(cast) = decode::decode_cast_add(message) {
                    self.append_cast(cast).await?;
                }
            }
            "MESSAGE_TYPE_REACTION_ADD" => {
                if let Some(reaction) = decode::decode_reaction_add(message) {
                    self.append_reaction(reaction).await?;
                }
            }
            "MESSAGE_TYPE_LINK_ADD" => {
                if let Some(link) = decode::decode_link_add(message) {
                    self.append_link(link).await?;
                }
            }
            "MESSAGE_TYPE_VERIFICATION_ADD_ETH_ADDRESS" => {
                if let Some(verification) = decode::decode_verification_add(message) {
                    self.append_verification(verification).await?;
                }
            }
            "MESSAGE_TYPE_USER_DATA_ADD" => {
                if let Some(entry) = decode::decode_user_data_add(message) {
                    self.append_user_data(entry, message.data.fid as i64).await?;
                }
            }
            "MESSAGE_TYPE_CAST_REMOVE"
            | "MESSAGE_TYPE_REACTION_REMOVE"
            | "MESSAGE_TYPE_LINK_REMOVE"
            | "MESSAGE_TYPE_VERIFICATION_REMOVE" => {
                self.delete_message(message).await?;
            }
            _ => {}
        }
        Ok(())
    }

    async fn delete_message(&self, message: &Message) -> ProcessorResult<()> {
        let Some(target) = decode::decode_removal(message) else { return Ok(()) };
        let mut conn = self.pool.get().map_err(QueryError::from)?;
        match target {
            RemovalTarget::Cast(hash) => indexer_db::delete_cast_by_hash(&mut conn, &hash)?,
            RemovalTarget::Reaction(hash) => indexer_db::delete_reaction_by_hash(&mut conn, &hash)?,
            RemovalTarget::Link(hash) => indexer_db::delete_link_by_hash(&mut conn, &hash)?,
            RemovalTarget::Verification(hash) => indexer_db::delete_verification_by_hash(&mut conn, &hash)?,
            RemovalTarget::UserData(hash) => indexer_db::delete_user_data_by_hash(&mut conn, &hash)?,
        };
        Ok(())
    }

    async fn append_cast(self: &Arc<Self>, cast: NewCast) -> ProcessorResult<()> {
        let mut buffers = self.buffers.lock().await;
        buffers.casts.push(cast);
        self.maybe_flush(buffers).await
    }

    async fn append_reaction(self: &Arc<Self>, reaction: NewReaction) -> ProcessorResult<()> {
        let mut buffers = self.buffers.lock().await;
        buffers.reactions.push(reaction);
        self.maybe_flush(buffers).await
    }

    async fn append_link(self: &Arc<Self>, link: NewLink) -> ProcessorResult<()> {
        let mut buffers = self.buffers.lock().await;
        buffers.links.push(link);
        self.maybe_flush(buffers).await
    }

    async fn append_verification(self: &Arc<Self>, verification: NewVerification) -> ProcessorResult<()> {
        let mut buffers = self.buffers.lock().await;
        buffers.verifications.push(verification);
        self.maybe_flush(buffers).await
    }

    async fn append_on_chain_event(self: &Arc<Self>, event: NewOnChainEvent) -> ProcessorResult<()> {
        let mut buffers = self.buffers.lock().await;
        buffers.on_chain_events.push(event);
        self.maybe_flush(buffers).await
    }

    async fn append_user_data(self: &Arc<Self>, entry: NewUserDataEntry, fid: i64) -> ProcessorResult<()> {
        let mut buffers = self.buffers.lock().await;
        buffers.user_data.push(entry);
        buffers.user_data_fids.push(fid);
        self.maybe_flush(buffers).await
    }

    /// After an append, flushes immediately if the combined buffers crossed
    /// the configured batch size; otherwise arms a one-shot timer (a cancellable sleep)
    /// if one isn't already running, matching the teacher's
    /// `Notify`/`CancellationToken` wakeup idiom.
    async fn maybe_flush(self: &Arc<Self>, buffers: tokio::sync::MutexGuard<'_, Buffers>) -> ProcessorResult<()> {
        if buffers.pending() >= self.settings.batch_size {
            drop(buffers);
            return self.flush().await;
        }

        let needs_timer = {
            let mut timer = self.flush_timer.lock().await;
            if timer.is_none() {
                let token = CancellationToken::new();
                *timer = Some(token.clone());
                Some(token)
            } else {
                None
            }
        };
        drop(buffers);

        if let Some(token) = needs_timer {
            // Intentionally not awaited inline: this spawns the timeout as
            // a detached task so `maybe_flush` returns immediately and the
            // caller can keep appending.
            let processor = Arc::clone(self);
            let batch_timeout = self.settings.batch_timeout;
            tokio::spawn(async move {
                tokio::select! {
                    _ = sleep(batch_timeout) => {
                        if let Err(err) = processor.flush().await {
                            log::error!("timer-triggered flush failed: {err}");
                        }
                    }
                    _ = token.cancelled() => {}
                }
            });
        }
        Ok(())
    }

    /// Flushes every non-empty buffer, clearing each regardless of whether
    /// its write succeeds -- a failed batch is logged, not retried here,
    /// since the upstream event's own `process-event` job retry is what
    /// surfaces the failure.
    pub async fn flush(&self) -> ProcessorResult<()> {
        if let Some(token) = self.flush_timer.lock().await.take() {
            token.cancel();
        }

        let mut buffers = self.buffers.lock().await;
        let casts = std::mem::take(&mut buffers.casts);
        let reactions = std::mem::take(&mut buffers.reactions);
        let links = std::mem::take(&mut buffers.links);
        let verifications = std::mem::take(&mut buffers.verifications);
        let on_chain_events = std::mem::take(&mut buffers.on_chain_events);
        let user_data = std::mem::take(&mut buffers.user_data);
        let user_data_fids = std::mem::take(&mut buffers.user_data_fids);
        drop(buffers);

        let mut conn = self.pool.get().map_err(QueryError::from)?;
        let batch_size = self.settings.batch_size;

        if !casts.is_empty() {
            if let Err(err) = indexer_db::insert_casts(&mut conn, casts, batch_size) {
                log::error!("failed to flush casts buffer: {err}");
            }
        }
        if !reactions.is_empty() {
            if let Err(err) = indexer_db::insert_reactions(&mut conn, reactions, batch_size) {
                log::error!("failed to flush reactions buffer: {err}");
            }
        }
        if !links.is_empty() {
            if let Err(err) = indexer_db::insert_links(&mut conn, links, batch_size) {
                log::error!("failed to flush links buffer: {err}");
            }
        }
        if !verifications.is_empty() {
            if let Err(err) = indexer_db::insert_verifications(&mut conn, verifications, batch_size) {
                log::error!("failed to flush verifications buffer: {err}");
            }
        }
        if !on_chain_events.is_empty() {
            if let Err(err) = indexer_db::insert_onchain_events(&mut conn, on_chain_events, batch_size) {
                log::error!("failed to flush on-chain events buffer: {err}");
            }
        }
        if !user_data.is_empty() {
            if let Err(err) = indexer_db::insert_user_data(&mut conn, user_data, batch_size) {
                log::error!("failed to flush user-data buffer: {err}");
            }
            let mut fids = user_data_fids;
            fids.sort_unstable();
            fids.dedup();
            if let Err(err) = indexer_db::refresh_user_view_for_fids(&mut conn, &fids) {
                log::error!("failed to refresh user view after flush: {err}");
            }
        }

        Ok(())
    }

    /// Flushes every remaining buffer on shutdown.
    pub async fn shutdown(&self) -> ProcessorResult<()> {
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_pending_counts_across_all_tables() {
        let mut buffers = Buffers::default();
        buffers.casts.push(NewCast {
            hash: "0x1".to_string(),
            fid: 1,
            text: "hi".to_string(),
            parent_hash: None,
            parent_fid: None,
            parent_url: None,
            timestamp: chrono::Utc::now(),
            embeds: None,
        });
        buffers.user_data_fids.push(1);
        assert_eq!(buffers.pending(), 1);
    }
}
