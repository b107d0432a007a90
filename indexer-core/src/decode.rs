use chrono::{DateTime, TimeZone, Utc};
use hub_client::wire::{self, Message};
use indexer_db::{NewCast, NewLink, NewOnChainEvent, NewReaction, NewUserDataEntry, NewVerification};

/// Seconds between the Unix epoch and the hub network's own epoch. All
/// message timestamps are seconds since this offset, not since 1970.
pub const HUB_EPOCH_OFFSET_SECS: i64 = 1_609_459_200;

pub fn hub_timestamp_to_utc(hub_seconds: u64) -> DateTime<Utc> {
    Utc.timestamp_opt(HUB_EPOCH_OFFSET_SECS + hub_seconds as i64, 0)
        .single()
        .expect("hub timestamp out of range")
}

/// Lowercases a hub hash and ensures the `0x` prefix, regardless of whether
/// the hub sent one.
pub fn canonicalize_hash(hash: &str) -> String {
    let lower = hash.to_lowercase();
    if lower.starts_with("0x") {
        lower
    } else {
        format!("0x{lower}")
    }
}

pub fn reaction_type_tag(wire_type: &str) -> &'static str {
    match wire_type {
        "REACTION_TYPE_LIKE" => "like",
        "REACTION_TYPE_RECAST" => "recast",
        _ => "unknown",
    }
}

pub fn user_data_type_tag(wire_type: &str) -> &'static str {
    match wire_type {
        "USER_DATA_TYPE_PFP" => "pfp",
        "USER_DATA_TYPE_DISPLAY" => "display",
        "USER_DATA_TYPE_BIO" => "bio",
        "USER_DATA_TYPE_USERNAME" => "username",
        "USER_DATA_TYPE_URL" => "url",
        "USER_DATA_TYPE_LOCATION" => "location",
        "USER_DATA_TYPE_TWITTER" => "twitter",
        "USER_DATA_TYPE_GITHUB" => "github",
        "USER_DATA_TYPE_BANNER" => "banner",
        "USER_DATA_TYPE_USER_DATA_PRIMARY_ADDRESS_ETHEREUM" => "ethereum_address",
        "USER_DATA_TYPE_USER_DATA_PRIMARY_ADDRESS_SOLANA" => "solana_address",
        _ => "unknown",
    }
}

fn embeds_to_json_string(embeds: &Option<Vec<serde_json::Value>>) -> Option<String> {
    embeds.as_ref().map(|e| serde_json::Value::Array(e.clone()).to_string())
}

pub fn decode_cast_add(message: &Message) -> Option<NewCast> {
    let body = message.data.cast_add_body.as_ref()?;
    Some(NewCast {
        hash: canonicalize_hash(&message.hash),
        fid: message.data.fid as i64,
        text: body.text.clone(),
        parent_hash: body.parent_cast_id.as_ref().map(|c| canonicalize_hash(&c.hash)),
        parent_fid: body.parent_cast_id.as_ref().map(|c| c.fid as i64),
        parent_url: body.parent_url.clone(),
        timestamp: hub_timestamp_to_utc(message.data.timestamp),
        embeds: embeds_to_json_string(&body.embeds),
    })
}

pub fn decode_reaction_add(message: &Message) -> Option<NewReaction> {
    let body = message.data.reaction_body.as_ref()?;
    let target = body.target_cast_id.as_ref()?;
    Some(NewReaction {
        hash: canonicalize_hash(&message.hash),
        fid: message.data.fid as i64,
        reaction_type: reaction_type_tag(&body.reaction_type).to_string(),
        target_hash: canonicalize_hash(&target.hash),
        timestamp: hub_timestamp_to_utc(message.data.timestamp),
    })
}

pub fn decode_link_add(message: &Message) -> Option<NewLink> {
    let body = message.data.link_body.as_ref()?;
    let target_fid = body.target_fid?;
    Some(NewLink {
        hash: canonicalize_hash(&message.hash),
        fid: message.data.fid as i64,
        link_type: body.link_type.clone(),
        target_fid: target_fid as i64,
        timestamp: hub_timestamp_to_utc(message.data.timestamp),
    })
}

pub fn decode_verification_add(message: &Message) -> Option<NewVerification> {
    let body = message.data.verification_add_address_body.as_ref()?;
    Some(NewVerification {
        hash: canonicalize_hash(&message.hash),
        fid: message.data.fid as i64,
        address: body.address.clone(),
        protocol: body.protocol.clone(),
        timestamp: hub_timestamp_to_utc(message.data.timestamp),
    })
}

pub fn decode_user_data_add(message: &Message) -> Option<NewUserDataEntry> {
    let body = message.data.user_data_body.as_ref()?;
    Some(NewUserDataEntry {
        hash: canonicalize_hash(&message.hash),
        fid: message.data.fid as i64,
        data_type: user_data_type_tag(&body.user_data_type).to_string(),
        value: body.value.clone(),
        timestamp: hub_timestamp_to_utc(message.data.timestamp),
    })
}

pub fn decode_on_chain_event(event: &wire::OnChainEvent) -> NewOnChainEvent {
    NewOnChainEvent {
        event_type: event.event_type.clone(),
        chain_id: event.chain_id as i64,
        block_number: event.block_number as i64,
        block_hash: canonicalize_hash(&event.block_hash),
        block_timestamp: Utc
            .timestamp_opt(event.block_timestamp as i64, 0)
            .single()
            .expect("on-chain block timestamp out of range"),
        transaction_hash: canonicalize_hash(&event.transaction_hash),
        log_index: event.log_index as i32,
        fid: event.fid as i64,
        signer_event_body: event.signer_event_body.clone(),
        id_register_event_body: event.id_register_event_body.clone(),
    }
}

/// The row to delete in response to a removal message, regardless of whether
/// that message is a genuine `*_REMOVE` or the original ADD message carried
/// inside a `PRUNE_MESSAGE`/`REVOKE_MESSAGE` event body. `CAST_REMOVE`
/// deletes by `cast_remove_body.target_hash`; every other case (including
/// a pruned/revoked ADD) deletes by the message's own hash, since that's the
/// hash the row was originally inserted under.
#[derive(Debug)]
pub enum RemovalTarget {
    Cast(String),
    Reaction(String),
    Link(String),
    Verification(String),
    UserData(String),
}

/// Resolves the row a message stands for, covering both directions: an
/// explicit `*_REMOVE` message (matched by its own message type) and an
/// ADD message being pruned or revoked (a hub never wraps a `*_REMOVE`
/// message in a prune/revoke event -- it re-delivers the original ADD).
pub fn decode_removal(message: &Message) -> Option<RemovalTarget> {
    if let Some(body) = &message.data.cast_remove_body {
        return Some(RemovalTarget::Cast(canonicalize_hash(&body.target_hash)));
    }
    match message.data.message_type.as_str() {
        "MESSAGE_TYPE_CAST_ADD" => Some(RemovalTarget::Cast(canonicalize_hash(&message.hash))),
        "MESSAGE_TYPE_REACTION_ADD" | "MESSAGE_TYPE_REACTION_REMOVE" => {
            Some(RemovalTarget::Reaction(canonicalize_hash(&message.hash)))
        }
        "MESSAGE_TYPE_LINK_ADD" | "MESSAGE_TYPE_LINK_REMOVE" => {
            Some(RemovalTarget::Link(canonicalize_hash(&message.hash)))
        }
        "MESSAGE_TYPE_VERIFICATION_ADD_ETH_ADDRESS" | "MESSAGE_TYPE_VERIFICATION_REMOVE" => {
            Some(RemovalTarget::Verification(canonicalize_hash(&message.hash)))
        }
        "MESSAGE_TYPE_USER_DATA_ADD" => Some(RemovalTarget::UserData(canonicalize_hash(&message.hash))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_timestamp_round_trips_a_known_instant() {
        // 1000 seconds after the hub epoch is 2021-01-01T00:16:40Z.
        let converted = hub_timestamp_to_utc(1000);
        assert_eq!(converted.timestamp(), HUB_EPOCH_OFFSET_SECS + 1000);
    }

    #[test]
    fn canonicalize_hash_lowercases_and_prefixes() {
        assert_eq!(canonicalize_hash("0xABCDEF"), "0xabcdef");
        assert_eq!(canonicalize_hash("ABCDEF"), "0xabcdef");
    }

    #[test]
    fn reaction_type_maps_known_and_unknown_values() {
        assert_eq!(reaction_type_tag("REACTION_TYPE_LIKE"), "like");
        assert_eq!(reaction_type_tag("REACTION_TYPE_RECAST"), "recast");
        assert_eq!(reaction_type_tag("REACTION_TYPE_SOMETHING_NEW"), "unknown");
    }

    #[test]
    fn user_data_type_maps_known_and_unknown_values() {
        assert_eq!(user_data_type_tag("USER_DATA_TYPE_PFP"), "pfp");
        assert_eq!(
            user_data_type_tag("USER_DATA_TYPE_USER_DATA_PRIMARY_ADDRESS_ETHEREUM"),
            "ethereum_address"
        );
        assert_eq!(user_data_type_tag("USER_DATA_TYPE_MYSTERY"), "unknown");
    }

    #[test]
    fn embeds_absent_becomes_none_present_empty_becomes_empty_array_string() {
        assert_eq!(embeds_to_json_string(&None), None);
        assert_eq!(embeds_to_json_string(&Some(Vec::new())), Some("[]".to_string()));
    }

    fn sample_message(cast_add_body: Option<wire::CastAddBody>) -> Message {
        Message {
            data: wire::MessageData {
                message_type: "MESSAGE_TYPE_CAST_ADD".to_string(),
                fid: 7,
                timestamp: 1000,
                network: "FARCASTER_NETWORK_MAINNET".to_string(),
                cast_add_body,
                cast_remove_body: None,
                reaction_body: None,
                link_body: None,
                verification_add_address_body: None,
                verification_remove_body: None,
                user_data_body: None,
            },
            hash: "0xAABBCC".to_string(),
            hash_scheme: "HASH_SCHEME_BLAKE3".to_string(),
            signature: "sig".to_string(),
            signature_scheme: "SIGNATURE_SCHEME_ED25519".to_string(),
            signer: "signer".to_string(),
        }
    }

    #[test]
    fn decode_cast_add_returns_none_for_mismatched_body() {
        let message = sample_message(None);
        assert!(decode_cast_add(&message).is_none());
    }

    #[test]
    fn decode_cast_add_canonicalizes_hash_and_timestamp() {
        let message = sample_message(Some(wire::CastAddBody {
            text: "hello".to_string(),
            parent_cast_id: None,
            parent_url: None,
            embeds: None,
        }));
        let cast = decode_cast_add(&message).unwrap();
        assert_eq!(cast.hash, "0xaabbcc");
        assert_eq!(cast.fid, 7);
        assert_eq!(cast.timestamp.timestamp(), HUB_EPOCH_OFFSET_SECS + 1000);
        assert_eq!(cast.embeds, None);
    }

    #[test]
    fn decode_removal_of_a_pruned_or_revoked_add_message_deletes_by_its_own_hash() {
        // A PRUNE_MESSAGE/REVOKE_MESSAGE event carries the original ADD
        // message, not a *_REMOVE message -- decode_removal must still
        // resolve it to the row that needs deleting.
        let message = sample_message(Some(wire::CastAddBody {
            text: "hello".to_string(),
            parent_cast_id: None,
            parent_url: None,
            embeds: None,
        }));
        match decode_removal(&message) {
            Some(RemovalTarget::Cast(hash)) => assert_eq!(hash, "0xaabbcc"),
            other => panic!("expected RemovalTarget::Cast, got {other:?}"),
        }
    }

    #[test]
    fn decode_removal_returns_none_for_an_unrelated_message_type() {
        let mut message = sample_message(None);
        message.data.message_type = "MESSAGE_TYPE_SOMETHING_ELSE".to_string();
        assert!(decode_removal(&message).is_none());
    }
}
