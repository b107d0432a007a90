use diesel::prelude::*;
use itertools::Itertools;

use crate::batch::insert_in_batches;
use crate::error::QueryResult;
use crate::models::{NewCast, NewLink, NewReaction, NewUserDataEntry, NewVerification, UserView};
use crate::schema::{casts, links, reactions, user_data, user_view, verifications};

pub fn insert_casts(conn: &mut PgConnection, rows: Vec<NewCast>, batch_size: usize) -> QueryResult<usize> {
    insert_in_batches(rows, batch_size, |chunk| {
        Ok(diesel::insert_into(casts::table)
            .values(chunk)
            .on_conflict(casts::hash)
            .do_nothing()
            .execute(conn)?)
    })
}

pub fn insert_reactions(conn: &mut PgConnection, rows: Vec<NewReaction>, batch_size: usize) -> QueryResult<usize> {
    insert_in_batches(rows, batch_size, |chunk| {
        Ok(diesel::insert_into(reactions::table)
            .values(chunk)
            .on_conflict(reactions::hash)
            .do_nothing()
            .execute(conn)?)
    })
}

pub fn insert_links(conn: &mut PgConnection, rows: Vec<NewLink>, batch_size: usize) -> QueryResult<usize> {
    insert_in_batches(rows, batch_size, |chunk| {
        Ok(diesel::insert_into(links::table)
            .values(chunk)
            .on_conflict(links::hash)
            .do_nothing()
            .execute(conn)?)
    })
}

pub fn insert_verifications(conn: &mut PgConnection, rows: Vec<NewVerification>, batch_size: usize) -> QueryResult<usize> {
    insert_in_batches(rows, batch_size, |chunk| {
        Ok(diesel::insert_into(verifications::table)
            .values(chunk)
            .on_conflict(verifications::hash)
            .do_nothing()
            .execute(conn)?)
    })
}

pub fn insert_user_data(conn: &mut PgConnection, rows: Vec<NewUserDataEntry>, batch_size: usize) -> QueryResult<usize> {
    insert_in_batches(rows, batch_size, |chunk| {
        Ok(diesel::insert_into(user_data::table)
            .values(chunk)
            .on_conflict(user_data::hash)
            .do_nothing()
            .execute(conn)?)
    })
}

pub fn delete_cast_by_hash(conn: &mut PgConnection, hash: &str) -> QueryResult<usize> {
    Ok(diesel::delete(casts::table.filter(casts::hash.eq(hash))).execute(conn)?)
}

pub fn delete_reaction_by_hash(conn: &mut PgConnection, hash: &str) -> QueryResult<usize> {
    Ok(diesel::delete(reactions::table.filter(reactions::hash.eq(hash))).execute(conn)?)
}

pub fn delete_link_by_hash(conn: &mut PgConnection, hash: &str) -> QueryResult<usize> {
    Ok(diesel::delete(links::table.filter(links::hash.eq(hash))).execute(conn)?)
}

pub fn delete_verification_by_hash(conn: &mut PgConnection, hash: &str) -> QueryResult<usize> {
    Ok(diesel::delete(verifications::table.filter(verifications::hash.eq(hash))).execute(conn)?)
}

pub fn delete_user_data_by_hash(conn: &mut PgConnection, hash: &str) -> QueryResult<usize> {
    Ok(diesel::delete(user_data::table.filter(user_data::hash.eq(hash))).execute(conn)?)
}

/// Recomputes the UserView row for each of `fids` from the latest-timestamp
/// UserDataEntry of each type, and upserts it. Called by the event processor
/// right after a user-data batch flush, and by the backfill worker after it
/// finishes importing a fid's user-data -- both pass exactly the set of fids
/// they just touched, so this never has to scan the whole table.
pub fn refresh_user_view_for_fids(conn: &mut PgConnection, fids: &[i64]) -> QueryResult<usize> {
    if fids.is_empty() {
        return Ok(0);
    }

    let mut updated = 0;
    for &fid in fids {
        let entries = user_data::table
            .filter(user_data::fid.eq(fid))
            .order_by(user_data::timestamp.asc())
            .select((user_data::data_type, user_data::value, user_data::timestamp))
            .load::<(String, String, chrono::DateTime<chrono::Utc>)>(conn)?;

        // Later rows overwrite earlier ones for the same type, so the last
        // entry seen per type (in ascending timestamp order) wins.
        let latest_by_type = entries
            .into_iter()
            .into_group_map_by(|(data_type, _, _)| data_type.clone())
            .into_iter()
            .filter_map(|(data_type, mut versions)| {
                versions.sort_by_key(|(_, _, ts)| *ts);
                versions.pop().map(|(_, value, _)| (data_type, value))
            })
            .collect::<std::collections::HashMap<_, _>>();

        let now = chrono::Utc::now();
        let view = UserViewUpsert {
            fid,
            pfp: latest_by_type.get("pfp").cloned(),
            display: latest_by_type.get("display").cloned(),
            bio: latest_by_type.get("bio").cloned(),
            username: latest_by_type.get("username").cloned(),
            url: latest_by_type.get("url").cloned(),
            location: latest_by_type.get("location").cloned(),
            twitter: latest_by_type.get("twitter").cloned(),
            github: latest_by_type.get("github").cloned(),
            banner: latest_by_type.get("banner").cloned(),
            ethereum_address: latest_by_type.get("ethereum_address").cloned(),
            solana_address: latest_by_type.get("solana_address").cloned(),
            updated_at: now,
        };

        diesel::insert_into(user_view::table)
            .values(&view)
            .on_conflict(user_view::fid)
            .do_update()
            .set(&view)
            .execute(conn)?;
        updated += 1;
    }
    Ok(updated)
}

pub fn get_user_view(conn: &mut PgConnection, fid: i64) -> QueryResult<Option<UserView>> {
    Ok(user_view::table.find(fid).first(conn).optional()?)
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::user_view)]
struct UserViewUpsert {
    fid: i64,
    pfp: Option<String>,
    display: Option<String>,
    bio: Option<String>,
    username: Option<String>,
    url: Option<String>,
    location: Option<String>,
    twitter: Option<String>,
    github: Option<String>,
    banner: Option<String>,
    ethereum_address: Option<String>,
    solana_address: Option<String>,
    updated_at: chrono::DateTime<chrono::Utc>,
}
