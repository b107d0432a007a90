use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::targets)]
#[diesel(primary_key(fid))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Target {
    pub fid: i64,
    pub is_root: bool,
    pub added_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::targets)]
pub struct NewTarget {
    pub fid: i64,
    pub is_root: bool,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::client_targets)]
#[diesel(primary_key(client_fid))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ClientTarget {
    pub client_fid: i64,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::client_targets)]
pub struct NewClientTarget {
    pub client_fid: i64,
    pub added_at: DateTime<Utc>,
}

/// Aggregate counts returned alongside a [`crate::targets::list`] page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TargetCounts {
    pub total: i64,
    pub synced: i64,
    pub unsynced: i64,
    pub root: i64,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::casts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Cast {
    pub id: i64,
    pub hash: String,
    pub fid: i64,
    pub text: String,
    pub parent_hash: Option<String>,
    pub parent_fid: Option<i64>,
    pub parent_url: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub embeds: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::casts)]
pub struct NewCast {
    pub hash: String,
    pub fid: i64,
    pub text: String,
    pub parent_hash: Option<String>,
    pub parent_fid: Option<i64>,
    pub parent_url: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub embeds: Option<String>,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::reactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Reaction {
    pub id: i64,
    pub hash: String,
    pub fid: i64,
    pub reaction_type: String,
    pub target_hash: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::reactions)]
pub struct NewReaction {
    pub hash: String,
    pub fid: i64,
    pub reaction_type: String,
    pub target_hash: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::links)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Link {
    pub id: i64,
    pub hash: String,
    pub fid: i64,
    pub link_type: String,
    pub target_fid: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::links)]
pub struct NewLink {
    pub hash: String,
    pub fid: i64,
    pub link_type: String,
    pub target_fid: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::verifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Verification {
    pub id: i64,
    pub hash: String,
    pub fid: i64,
    pub address: String,
    pub protocol: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::verifications)]
pub struct NewVerification {
    pub hash: String,
    pub fid: i64,
    pub address: String,
    pub protocol: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::user_data)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserDataEntry {
    pub id: i64,
    pub hash: String,
    pub fid: i64,
    pub data_type: String,
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::user_data)]
pub struct NewUserDataEntry {
    pub hash: String,
    pub fid: i64,
    pub data_type: String,
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::user_view)]
#[diesel(primary_key(fid))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserView {
    pub fid: i64,
    pub pfp: Option<String>,
    pub display: Option<String>,
    pub bio: Option<String>,
    pub username: Option<String>,
    pub url: Option<String>,
    pub location: Option<String>,
    pub twitter: Option<String>,
    pub github: Option<String>,
    pub banner: Option<String>,
    pub ethereum_address: Option<String>,
    pub solana_address: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::onchain_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OnChainEvent {
    pub id: i64,
    pub event_type: String,
    pub chain_id: i64,
    pub block_number: i64,
    pub block_hash: String,
    pub block_timestamp: DateTime<Utc>,
    pub transaction_hash: String,
    pub log_index: i32,
    pub fid: i64,
    pub signer_event_body: Option<serde_json::Value>,
    pub id_register_event_body: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::onchain_events)]
pub struct NewOnChainEvent {
    pub event_type: String,
    pub chain_id: i64,
    pub block_number: i64,
    pub block_hash: String,
    pub block_timestamp: DateTime<Utc>,
    pub transaction_hash: String,
    pub log_index: i32,
    pub fid: i64,
    pub signer_event_body: Option<serde_json::Value>,
    pub id_register_event_body: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::sync_state)]
#[diesel(primary_key(name))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SyncState {
    pub name: String,
    pub last_event_id: i64,
    pub updated_at: DateTime<Utc>,
}

pub const LAST_EVENT_ID_KEY: &str = "last_event_id";

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Job {
    pub id: i64,
    pub queue: String,
    pub job_key: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub available_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::jobs)]
pub struct NewJob {
    pub queue: String,
    pub job_key: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub available_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::queue_pause)]
#[diesel(primary_key(queue))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct QueuePause {
    pub queue: String,
    pub paused: bool,
}

pub const JOB_STATUS_PENDING: &str = "pending";
pub const JOB_STATUS_ACTIVE: &str = "active";
pub const JOB_STATUS_COMPLETED: &str = "completed";
pub const JOB_STATUS_FAILED: &str = "failed";
