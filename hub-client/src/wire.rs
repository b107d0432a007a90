//! JSON shapes returned by a hub's HTTP API, exactly as the hub sends them
//! over the wire. Nothing in this module is canonicalized -- hashes keep
//! whatever casing the hub used, timestamps are still hub-epoch seconds, and
//! enum values are still the hub's own `SCREAMING_SNAKE_CASE` strings. The
//! message decoder (owned by the indexer core, not this crate) is the only
//! place those get turned into internal records.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubInfo {
    pub version: String,
    #[serde(default)]
    pub is_syncing: bool,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub root_hash: String,
    #[serde(default)]
    pub db_stats: Option<DbStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    #[serde(default)]
    pub num_messages: u64,
    #[serde(default)]
    pub num_fid_events: u64,
    #[serde(default)]
    pub num_fname_events: u64,
}

/// A page of anything the hub paginates: messages, events, and so on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub messages: Vec<T>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsPage {
    #[serde(default)]
    pub events: Vec<HubEvent>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub data: MessageData,
    pub hash: String,
    pub hash_scheme: String,
    pub signature: String,
    pub signature_scheme: String,
    pub signer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageData {
    #[serde(rename = "type")]
    pub message_type: String,
    pub fid: u64,
    pub timestamp: u64,
    pub network: String,
    #[serde(default)]
    pub cast_add_body: Option<CastAddBody>,
    #[serde(default)]
    pub cast_remove_body: Option<CastRemoveBody>,
    #[serde(default)]
    pub reaction_body: Option<ReactionBody>,
    #[serde(default)]
    pub link_body: Option<LinkBody>,
    #[serde(default)]
    pub verification_add_address_body: Option<VerificationAddAddressBody>,
    #[serde(default)]
    pub verification_remove_body: Option<VerificationRemoveBody>,
    #[serde(default)]
    pub user_data_body: Option<UserDataBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastId {
    pub fid: u64,
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastAddBody {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub parent_cast_id: Option<CastId>,
    #[serde(default)]
    pub parent_url: Option<String>,
    #[serde(default)]
    pub embeds: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastRemoveBody {
    pub target_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionBody {
    #[serde(rename = "type")]
    pub reaction_type: String,
    #[serde(default)]
    pub target_cast_id: Option<CastId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkBody {
    #[serde(rename = "type")]
    pub link_type: String,
    #[serde(default)]
    pub target_fid: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationAddAddressBody {
    pub address: String,
    #[serde(default)]
    pub protocol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRemoveBody {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDataBody {
    #[serde(rename = "type")]
    pub user_data_type: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubEvent {
    pub id: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub merge_message_body: Option<MergeMessageBody>,
    #[serde(default)]
    pub prune_message_body: Option<PruneOrRevokeBody>,
    #[serde(default)]
    pub revoke_message_body: Option<PruneOrRevokeBody>,
    #[serde(default)]
    pub merge_on_chain_event_body: Option<MergeOnChainEventBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeMessageBody {
    pub message: Message,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneOrRevokeBody {
    pub message: Message,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOnChainEventBody {
    pub on_chain_event: OnChainEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnChainEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub chain_id: u64,
    pub block_number: u64,
    pub block_hash: String,
    pub block_timestamp: u64,
    pub transaction_hash: String,
    pub log_index: u32,
    pub fid: u64,
    #[serde(default)]
    pub signer_event_body: Option<serde_json::Value>,
    #[serde(default)]
    pub id_register_event_body: Option<serde_json::Value>,
}
