mod batch;
mod error;
mod messages;
mod migrations;
mod models;
mod onchain;
mod pool;
pub mod schema;
mod sync_state;
mod targets;
mod url;

pub use batch::insert_in_batches;
pub use error::{QueryError, QueryResult};
pub use messages::{
    delete_cast_by_hash, delete_link_by_hash, delete_reaction_by_hash, delete_user_data_by_hash,
    delete_verification_by_hash, get_user_view, insert_casts, insert_links, insert_reactions, insert_user_data,
    insert_verifications, refresh_user_view_for_fids,
};
pub use migrations::{run_migrations, MigrationError};
pub use models::*;
pub use onchain::insert_onchain_events;
pub use pool::{get_pool, ConnectionPool};
pub use sync_state::{get_cursor, set_cursor};
pub use targets::{
    all_client_target_fids, all_target_fids, any_other_root_target_follows, delete_target, get_target,
    insert_client_target_if_absent, insert_target_if_absent, list, mark_synced, update_is_root,
    ListTargetsParams, SortOrder, SyncStatus, TargetsPage,
};
pub use url::postgres_url_from_environment;

pub use diesel::{Connection, PgConnection};
