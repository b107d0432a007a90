use std::collections::HashSet;

use hub_client::HubClient;
use indexer_db::{ConnectionPool, QueryError};
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::decode;
use crate::registry::{RegistryError, TargetRegistry};

const MESSAGE_BATCH_SIZE: usize = 500;

#[derive(Debug, Deserialize)]
pub struct BackfillJob {
    pub fid: i64,
    pub is_root: bool,
}

#[derive(Debug, Error, Diagnostic)]
pub enum BackfillError {
    #[error(transparent)]
    Hub(#[from] hub_client::HubError),

    #[error(transparent)]
    Db(#[from] QueryError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub type BackfillResult<T> = Result<T, BackfillError>;

/// Fully imports one `fid`'s history: all message kinds fetched in
/// parallel, written with conflict-do-nothing, graph-expanded if the `fid`
/// is a root target, and only then marked synced. A failure at any step
/// before the final mark leaves `last_synced_at` null, which is what makes
/// retrying the whole job from scratch safe.
pub async fn run_backfill_job(
    job: &BackfillJob,
    hub: &HubClient,
    pool: &ConnectionPool,
    registry: &TargetRegistry,
) -> BackfillResult<()> {
    let fid = job.fid as u64;

    let (casts, reactions, links, verifications, user_data, on_chain_signers) = tokio::try_join!(
        hub.get_all_casts_by_fid(fid),
        hub.get_all_reactions_by_fid(fid),
        hub.get_all_links_by_fid(fid),
        hub.get_all_verifications_by_fid(fid),
        hub.get_all_user_data_by_fid(fid),
        hub.get_all_on_chain_signers_by_fid(fid),
    )?;

    let new_casts = casts.iter().filter_map(decode::decode_cast_add).collect();
    let new_reactions = reactions.iter().filter_map(decode::decode_reaction_add).collect();
    let new_links: Vec<_> = links.iter().filter_map(decode::decode_link_add).collect();
    let new_verifications = verifications.iter().filter_map(decode::decode_verification_add).collect();
    let new_user_data = user_data.iter().filter_map(decode::decode_user_data_add).collect();
    let new_on_chain_events: Vec<_> = on_chain_signers.iter().map(decode::decode_on_chain_event).collect();

    {
        let mut conn = pool.get().map_err(QueryError::from)?;
        indexer_db::insert_casts(&mut conn, new_casts, MESSAGE_BATCH_SIZE)?;
        indexer_db::insert_reactions(&mut conn, new_reactions, MESSAGE_BATCH_SIZE)?;
        indexer_db::insert_links(&mut conn, new_links.clone(), MESSAGE_BATCH_SIZE)?;
        indexer_db::insert_verifications(&mut conn, new_verifications, MESSAGE_BATCH_SIZE)?;
        indexer_db::insert_user_data(&mut conn, new_user_data, MESSAGE_BATCH_SIZE)?;
        indexer_db::insert_onchain_events(&mut conn, new_on_chain_events, MESSAGE_BATCH_SIZE)?;
        indexer_db::refresh_user_view_for_fids(&mut conn, &[job.fid])?;
    }

    if job.is_root {
        expand_follow_graph(&new_links, job.fid, registry)?;
    }

    registry.mark_synced(job.fid)?;
    Ok(())
}

/// For every `follow` link just written by this root target, ensures a
/// non-root Target row exists for the followee and enqueues its backfill.
/// Deduplicated within the job so a root following the same fid via
/// multiple link rows (shouldn't happen, but isn't relied upon) only
/// enqueues once.
fn expand_follow_graph(links: &[indexer_db::NewLink], fid: i64, registry: &TargetRegistry) -> BackfillResult<()> {
    let mut seen = HashSet::new();
    for link in links {
        if link.link_type != "follow" || link.fid != fid {
            continue;
        }
        if !seen.insert(link.target_fid) {
            continue;
        }
        // `ensure` inserts the Target row and enqueues its backfill job in
        // the same step `add` does for an admin-triggered target.
        registry.ensure(link.target_fid, false)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_follow_graph_ignores_non_follow_and_wrong_fid_links() {
        let links = vec![
            indexer_db::NewLink {
                hash: "0x1".to_string(),
                fid: 1,
                link_type: "block".to_string(),
                target_fid: 2,
                timestamp: chrono::Utc::now(),
            },
            indexer_db::NewLink {
                hash: "0x2".to_string(),
                fid: 99,
                link_type: "follow".to_string(),
                target_fid: 3,
                timestamp: chrono::Utc::now(),
            },
        ];
        let relevant: Vec<_> = links.iter().filter(|l| l.link_type == "follow" && l.fid == 1).collect();
        assert!(relevant.is_empty());
    }
}
