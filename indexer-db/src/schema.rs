// @generated manually to match migrations/0001_init.

diesel::table! {
    targets (fid) {
        fid -> Int8,
        is_root -> Bool,
        added_at -> Timestamptz,
        last_synced_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    client_targets (client_fid) {
        client_fid -> Int8,
        added_at -> Timestamptz,
    }
}

diesel::table! {
    casts (id) {
        id -> Int8,
        hash -> Text,
        fid -> Int8,
        text -> Text,
        parent_hash -> Nullable<Text>,
        parent_fid -> Nullable<Int8>,
        parent_url -> Nullable<Text>,
        timestamp -> Timestamptz,
        embeds -> Nullable<Text>,
    }
}

diesel::table! {
    reactions (id) {
        id -> Int8,
        hash -> Text,
        fid -> Int8,
        reaction_type -> Text,
        target_hash -> Text,
        timestamp -> Timestamptz,
    }
}

diesel::table! {
    links (id) {
        id -> Int8,
        hash -> Text,
        fid -> Int8,
        link_type -> Text,
        target_fid -> Int8,
        timestamp -> Timestamptz,
    }
}

diesel::table! {
    verifications (id) {
        id -> Int8,
        hash -> Text,
        fid -> Int8,
        address -> Text,
        protocol -> Text,
        timestamp -> Timestamptz,
    }
}

diesel::table! {
    user_data (id) {
        id -> Int8,
        hash -> Text,
        fid -> Int8,
        data_type -> Text,
        value -> Text,
        timestamp -> Timestamptz,
    }
}

diesel::table! {
    user_view (fid) {
        fid -> Int8,
        pfp -> Nullable<Text>,
        display -> Nullable<Text>,
        bio -> Nullable<Text>,
        username -> Nullable<Text>,
        url -> Nullable<Text>,
        location -> Nullable<Text>,
        twitter -> Nullable<Text>,
        github -> Nullable<Text>,
        banner -> Nullable<Text>,
        ethereum_address -> Nullable<Text>,
        solana_address -> Nullable<Text>,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    onchain_events (id) {
        id -> Int8,
        event_type -> Text,
        chain_id -> Int8,
        block_number -> Int8,
        block_hash -> Text,
        block_timestamp -> Timestamptz,
        transaction_hash -> Text,
        log_index -> Int4,
        fid -> Int8,
        signer_event_body -> Nullable<Jsonb>,
        id_register_event_body -> Nullable<Jsonb>,
    }
}

diesel::table! {
    sync_state (name) {
        name -> Text,
        last_event_id -> Int8,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    jobs (id) {
        id -> Int8,
        queue -> Text,
        job_key -> Text,
        payload -> Jsonb,
        status -> Text,
        attempts -> Int4,
        available_at -> Timestamptz,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        locked_by -> Nullable<Text>,
        locked_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    queue_pause (queue) {
        queue -> Text,
        paused -> Bool,
    }
}
