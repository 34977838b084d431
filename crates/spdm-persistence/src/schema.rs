//! Esquema Diesel (mantenido a mano). Reemplazable con `diesel print-schema`.

diesel::table! {
    processes (name) {
        name -> Text,
        created_by -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    versions (id) {
        id -> BigInt,
        process_name -> Text,
        version_name -> Text,
        created_by -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    graph_nodes (version_id, node_id) {
        version_id -> BigInt,
        node_id -> Text,
        ordinal -> Integer,
        kind -> Text,
        data -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    graph_edges (version_id, edge_id) {
        version_id -> BigInt,
        edge_id -> Text,
        ordinal -> Integer,
        kind -> Text,
        source_id -> Text,
        target_id -> Text,
        data -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    artifact_links (version_id, node_id) {
        version_id -> BigInt,
        node_id -> Text,
        process_name -> Text,
        created_by -> Text,
    }
}

diesel::table! {
    execution_log (seq) {
        seq -> BigInt,
        process_name -> Text,
        version_name -> Text,
        ts -> Timestamptz,
        event_type -> Text,
        payload -> Jsonb,
    }
}

diesel::joinable!(versions -> processes (process_name));
diesel::joinable!(graph_nodes -> versions (version_id));
diesel::joinable!(graph_edges -> versions (version_id));

diesel::allow_tables_to_appear_in_same_query!(
    processes,
    versions,
    graph_nodes,
    graph_edges,
    artifact_links,
    execution_log,
);
