//! Diesel row models for bridge persistence.

use super::schema::{bridge_details, bridge_discovery, bridge_header};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

/// Bridge header row.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, AsChangeset)]
#[diesel(table_name = bridge_header)]
#[diesel(primary_key(bridge_id))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct HeaderRow {
    /// Sequence-assigned surrogate key.
    pub id: i64,
    /// Public bridge identifier.
    pub bridge_id: Uuid,
    /// Creating system.
    pub created_by: String,
    /// Lifecycle status.
    pub status: String,
    /// Last error or closure reason.
    pub message: Option<String>,
    /// Accepted usage reports.
    pub usage_report_count: i64,
    /// Last liveness timestamp.
    pub alive_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Bridge header insert; the database assigns `id`.
#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = bridge_header)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewHeaderRow {
    /// Public bridge identifier.
    pub bridge_id: Uuid,
    /// Creating system.
    pub created_by: String,
    /// Lifecycle status.
    pub status: String,
    /// Last error or closure reason.
    pub message: Option<String>,
    /// Accepted usage reports.
    pub usage_report_count: i64,
    /// Last liveness timestamp.
    pub alive_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Discovery candidate row.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = bridge_discovery)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DiscoveryRow {
    /// Row identifier.
    pub id: Uuid,
    /// Owning bridge.
    pub bridge_id: Uuid,
    /// Serialized discovery model.
    pub model: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Bridge details row.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = bridge_details)]
#[diesel(primary_key(bridge_id))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DetailsRow {
    /// Owning bridge.
    pub bridge_id: Uuid,
    /// Consumer system.
    pub consumer: String,
    /// Target provider.
    pub provider: String,
    /// Target service definition.
    pub service_definition: String,
    /// Target operation.
    pub operation: String,
    /// Interface translator.
    pub interface_translator: String,
    /// Serialized interface translation descriptor.
    pub interface_translator_data: Option<Value>,
    /// Request payload translator.
    pub input_dm_translator: Option<String>,
    /// Serialized request payload translation descriptor.
    pub input_dm_translator_data: Option<Value>,
    /// Response payload translator.
    pub result_dm_translator: Option<String>,
    /// Serialized response payload translation descriptor.
    pub result_dm_translator_data: Option<Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}
