use diesel::prelude::*;

use crate::batch::insert_in_batches;
use crate::error::QueryResult;
use crate::models::NewOnChainEvent;
use crate::schema::onchain_events;

/// Onchain events have no hash, so idempotence keys off the pair a chain
/// actually guarantees is unique: which transaction and which log within it.
pub fn insert_onchain_events(
    conn: &mut PgConnection,
    rows: Vec<NewOnChainEvent>,
    batch_size: usize,
) -> QueryResult<usize> {
    insert_in_batches(rows, batch_size, |chunk| {
        Ok(diesel::insert_into(onchain_events::table)
            .values(chunk)
            .on_conflict((onchain_events::transaction_hash, onchain_events::log_index))
            .do_nothing()
            .execute(conn)?)
    })
}
