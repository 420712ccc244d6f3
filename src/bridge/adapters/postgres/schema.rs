//! Diesel schema for bridge lifecycle persistence.

diesel::table! {
    /// One row per bridge attempt.
    bridge_header (bridge_id) {
        /// Surrogate key from a `bigserial` sequence.
        id -> Int8,
        /// Public bridge identifier.
        bridge_id -> Uuid,
        /// System that created the bridge.
        #[max_length = 63]
        created_by -> Varchar,
        /// Lifecycle status.
        #[max_length = 20]
        status -> Varchar,
        /// Last error or closure reason.
        message -> Nullable<Text>,
        /// Accepted usage reports.
        usage_report_count -> Int8,
        /// Last liveness timestamp.
        alive_at -> Nullable<Timestamptz>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Discovery candidates waiting for negotiation.
    bridge_discovery (id) {
        /// Row identifier.
        id -> Uuid,
        /// Owning bridge.
        bridge_id -> Uuid,
        /// Serialized discovery model.
        model -> Jsonb,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Finalized arrangement of negotiated bridges.
    bridge_details (bridge_id) {
        /// Owning bridge.
        bridge_id -> Uuid,
        /// Consumer system.
        #[max_length = 63]
        consumer -> Varchar,
        /// Target provider.
        #[max_length = 63]
        provider -> Varchar,
        /// Target service definition.
        #[max_length = 63]
        service_definition -> Varchar,
        /// Target operation.
        #[max_length = 63]
        operation -> Varchar,
        /// Interface translator.
        #[max_length = 63]
        interface_translator -> Varchar,
        /// Serialized interface translation descriptor.
        interface_translator_data -> Nullable<Jsonb>,
        /// Request payload translator.
        #[max_length = 63]
        input_dm_translator -> Nullable<Varchar>,
        /// Serialized request payload translation descriptor.
        input_dm_translator_data -> Nullable<Jsonb>,
        /// Response payload translator.
        #[max_length = 63]
        result_dm_translator -> Nullable<Varchar>,
        /// Serialized response payload translation descriptor.
        result_dm_translator_data -> Nullable<Jsonb>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(bridge_discovery -> bridge_header (bridge_id));
diesel::joinable!(bridge_details -> bridge_header (bridge_id));
diesel::allow_tables_to_appear_in_same_query!(bridge_header, bridge_discovery, bridge_details);
