use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::error::QueryResult;
use crate::models::LAST_EVENT_ID_KEY;
use crate::schema::sync_state;

/// The last hub event id the realtime worker has durably processed, or
/// `None` if this is a fresh database and realtime consumption hasn't
/// started yet.
pub fn get_cursor(conn: &mut PgConnection) -> QueryResult<Option<i64>> {
    let row = sync_state::table
        .find(LAST_EVENT_ID_KEY)
        .select(sync_state::last_event_id)
        .first::<i64>(conn)
        .optional()?;
    Ok(row)
}

pub fn set_cursor(conn: &mut PgConnection, last_event_id: i64, now: DateTime<Utc>) -> QueryResult<()> {
    diesel::insert_into(sync_state::table)
        .values((
            sync_state::name.eq(LAST_EVENT_ID_KEY),
            sync_state::last_event_id.eq(last_event_id),
            sync_state::updated_at.eq(now),
        ))
        .on_conflict(sync_state::name)
        .do_update()
        .set((
            sync_state::last_event_id.eq(last_event_id),
            sync_state::updated_at.eq(now),
        ))
        .execute(conn)?;
    Ok(())
}
