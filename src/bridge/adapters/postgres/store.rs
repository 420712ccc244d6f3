//! `PostgreSQL` bridge store.

use super::{
    models::{DetailsRow, DiscoveryRow, HeaderRow, NewHeaderRow},
    schema::{bridge_details, bridge_discovery, bridge_header},
};
use crate::bridge::{
    domain::{
        AbortOutcome, BaseFilter, BridgeDetails, BridgeDiscovery, BridgeHeader, BridgeId,
        BridgeQuery, BridgeRecord, BridgeReport, BridgeStatus, OperationName, Page, PageRequest,
        PersistedBridgeHeaderData, ServiceDefinitionName, ServiceInstanceId, SystemName,
        TranslationDiscoveryModel,
    },
    ports::{
        BridgeStore, BridgeStoreError, BridgeStoreResult, store::OBSOLETE_DISCOVERY_MESSAGE,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::Error as DieselError;
use mockable::{Clock, DefaultClock};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

/// `PostgreSQL` connection pool type used by bridge adapters.
pub type BridgePgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed bridge store.
///
/// Mutations run in one transaction each and are serialized through a
/// per-store mutex; header rows are additionally locked with
/// `SELECT ... FOR UPDATE` so that several broker processes sharing a
/// database still observe whole transitions only.
pub struct PostgresBridgeStore<C = DefaultClock> {
    pool: BridgePgPool,
    clock: Arc<C>,
    write_lock: Arc<Mutex<()>>,
}

impl PostgresBridgeStore<DefaultClock> {
    /// Creates a store from a `PostgreSQL` connection pool.
    #[must_use]
    pub fn new(pool: BridgePgPool) -> Self {
        Self::with_clock(pool, Arc::new(DefaultClock))
    }
}

impl<C> PostgresBridgeStore<C> {
    /// Creates a store using `clock` for audit timestamps.
    #[must_use]
    pub fn with_clock(pool: BridgePgPool, clock: Arc<C>) -> Self {
        Self {
            pool,
            clock,
            write_lock: Arc::new(Mutex::new(())),
        }
    }
}

impl<C> Clone for PostgresBridgeStore<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            clock: Arc::clone(&self.clock),
            write_lock: Arc::clone(&self.write_lock),
        }
    }
}

impl From<DieselError> for BridgeStoreError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

impl<C> PostgresBridgeStore<C>
where
    C: Clock + Send + Sync + 'static,
{
    async fn run_blocking<F, T>(&self, f: F) -> BridgeStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> BridgeStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(BridgeStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(BridgeStoreError::persistence)?
    }

    async fn mutate<F, T>(&self, f: F) -> BridgeStoreResult<T>
    where
        F: FnOnce(&mut PgConnection, &C) -> BridgeStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        let clock = Arc::clone(&self.clock);
        run_serialized(Arc::clone(&self.write_lock), move || {
            let mut connection = pool.get().map_err(BridgeStoreError::persistence)?;
            connection.transaction(|transaction| f(transaction, clock.as_ref()))
        })
        .await
    }
}

/// Runs `work` on the blocking pool while holding `lock`.
///
/// The guard is owned by the blocking task, so a cancelled caller cannot
/// release it while `work` is still running.
async fn run_serialized<F, T>(lock: Arc<Mutex<()>>, work: F) -> BridgeStoreResult<T>
where
    F: FnOnce() -> BridgeStoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let serialized = lock.lock_owned().await;
    tokio::task::spawn_blocking(move || {
        let outcome = work();
        drop(serialized);
        outcome
    })
    .await
    .map_err(BridgeStoreError::persistence)?
}

#[async_trait]
impl<C> BridgeStore for PostgresBridgeStore<C>
where
    C: Clock + Send + Sync + 'static,
{
    async fn store_discoveries(
        &self,
        bridge_id: BridgeId,
        created_by: &SystemName,
        models: &[TranslationDiscoveryModel],
    ) -> BridgeStoreResult<(BridgeHeader, Vec<BridgeDiscovery>)> {
        let creator = created_by.clone();
        let candidates = models.to_vec();
        self.mutate(move |connection, clock| {
            let mut header = BridgeHeader::new(bridge_id, creator, clock);
            let discoveries: Vec<BridgeDiscovery> = candidates
                .into_iter()
                .map(|model| BridgeDiscovery::new(bridge_id, model, clock))
                .collect();
            header.transition_to(BridgeStatus::Discovered, clock)?;

            let id = diesel::insert_into(bridge_header::table)
                .values(&header_to_new_row(&header)?)
                .returning(bridge_header::id)
                .get_result::<i64>(connection)?;
            let numbered = header.with_id(id);
            let rows = discoveries
                .iter()
                .map(discovery_to_row)
                .collect::<BridgeStoreResult<Vec<_>>>()?;
            if !rows.is_empty() {
                diesel::insert_into(bridge_discovery::table)
                    .values(&rows)
                    .execute(connection)?;
            }
            Ok((numbered, discoveries))
        })
        .await
    }

    async fn select_from_discoveries(
        &self,
        bridge_id: BridgeId,
        target: &ServiceInstanceId,
    ) -> BridgeStoreResult<(TranslationDiscoveryModel, BridgeDetails)> {
        let wanted = target.clone();
        self.mutate(move |connection, clock| {
            let mut header = lock_header(connection, bridge_id)?
                .ok_or(BridgeStoreError::UnknownBridge(bridge_id))?;
            header.ensure_transition(BridgeStatus::Pending)?;

            let model = load_discoveries(connection, bridge_id)?
                .into_iter()
                .find(|row| row.model.target_instance_id == wanted)
                .map(|row| row.model)
                .ok_or_else(|| BridgeStoreError::UnknownTarget {
                    bridge_id,
                    target: wanted.clone(),
                })?;

            header.transition_to(BridgeStatus::Pending, clock)?;
            save_header(connection, &header)?;
            delete_discoveries(connection, bridge_id)?;
            let details = BridgeDetails::from_model(bridge_id, &model, clock);
            diesel::insert_into(bridge_details::table)
                .values(&details_to_row(&details)?)
                .execute(connection)?;
            Ok((model, details))
        })
        .await
    }

    async fn update_details(&self, details: &BridgeDetails) -> BridgeStoreResult<bool> {
        let mut updated = details.clone();
        self.mutate(move |connection, clock| {
            let bridge_id = updated.bridge_id;
            let header = lock_header(connection, bridge_id)?
                .ok_or(BridgeStoreError::UnknownBridge(bridge_id))?;
            if header.status().is_end() {
                return Ok(true);
            }
            updated.updated_at = clock.utc();
            let row = details_to_row(&updated)?;
            let changed = diesel::update(bridge_details::table.find(row.bridge_id))
                .set(&row)
                .execute(connection)?;
            if changed == 0 {
                return Err(BridgeStoreError::MissingDetails(bridge_id));
            }
            Ok(false)
        })
        .await
    }

    async fn mark_initialized(&self, bridge_id: BridgeId) -> BridgeStoreResult<bool> {
        self.mutate(move |connection, clock| {
            let mut header = lock_header(connection, bridge_id)?
                .ok_or(BridgeStoreError::UnknownBridge(bridge_id))?;
            if header.status().is_end() {
                return Ok(true);
            }
            header.transition_to(BridgeStatus::Initialized, clock)?;
            save_header(connection, &header)?;
            Ok(false)
        })
        .await
    }

    async fn record_problem(&self, bridge_id: BridgeId, message: &str) {
        let problem = message.to_owned();
        let outcome = self
            .mutate(move |connection, clock| {
                let Some(mut header) = lock_header(connection, bridge_id)? else {
                    return Ok(false);
                };
                if !header.status().can_transition_to(BridgeStatus::Error) {
                    return Ok(false);
                }
                header.transition_with_message(BridgeStatus::Error, problem, clock)?;
                save_header(connection, &header)?;
                Ok(true)
            })
            .await;
        match outcome {
            Ok(true) => {}
            Ok(false) => debug!(%bridge_id, "bridge problem not recorded"),
            Err(err) => error!(%bridge_id, error = %err, "failed to record bridge problem"),
        }
    }

    async fn abort(
        &self,
        bridge_id: BridgeId,
        required_creator: Option<&SystemName>,
    ) -> BridgeStoreResult<AbortOutcome> {
        let creator = required_creator.cloned();
        self.mutate(move |connection, clock| {
            let Some(mut header) = lock_header(connection, bridge_id)? else {
                return Ok(AbortOutcome::unknown());
            };
            if creator
                .as_ref()
                .is_some_and(|name| name != header.created_by())
            {
                return Err(BridgeStoreError::AbortForbidden(bridge_id));
            }

            let previous_status = header.status();
            if !previous_status.can_transition_to(BridgeStatus::Aborted) {
                return Ok(AbortOutcome {
                    happened: false,
                    previous_status: Some(previous_status),
                    details: None,
                });
            }

            delete_discoveries(connection, bridge_id)?;
            header.transition_to(BridgeStatus::Aborted, clock)?;
            save_header(connection, &header)?;
            Ok(AbortOutcome {
                happened: true,
                previous_status: Some(previous_status),
                details: load_details(connection, bridge_id)?,
            })
        })
        .await
    }

    async fn record_report(&self, report: &BridgeReport) -> BridgeStoreResult<BridgeHeader> {
        let event = report.clone();
        self.mutate(move |connection, clock| {
            let bridge_id = event.bridge_id;
            let mut header = lock_header(connection, bridge_id)?
                .ok_or(BridgeStoreError::UnknownBridge(bridge_id))?;
            let details = load_details(connection, bridge_id)?
                .ok_or(BridgeStoreError::UnknownBridge(bridge_id))?;
            if details.interface_translator != event.requester {
                return Err(BridgeStoreError::ReportForbidden {
                    bridge_id,
                    requester: event.requester.clone(),
                });
            }

            header.apply_report(&event, clock)?;
            save_header(connection, &header)?;
            Ok(header)
        })
        .await
    }

    async fn discoveries_created_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> BridgeStoreResult<Vec<BridgeDiscovery>> {
        self.run_blocking(move |connection| {
            bridge_discovery::table
                .filter(bridge_discovery::created_at.lt(threshold))
                .select(DiscoveryRow::as_select())
                .load::<DiscoveryRow>(connection)?
                .into_iter()
                .map(row_to_discovery)
                .collect()
        })
        .await
    }

    async fn close_obsolete(&self, discovery: &BridgeDiscovery) -> BridgeStoreResult<()> {
        let bridge_id = discovery.bridge_id;
        let row_id = discovery.id;
        self.mutate(move |connection, clock| {
            if let Some(mut header) = lock_header(connection, bridge_id)? {
                let status = header.status();
                if !status.is_active() && !status.is_end() {
                    match header.transition_with_message(
                        BridgeStatus::Closed,
                        OBSOLETE_DISCOVERY_MESSAGE,
                        clock,
                    ) {
                        Ok(()) => save_header(connection, &header)?,
                        Err(err) => {
                            warn!(%bridge_id, error = %err, "obsolete bridge could not be closed");
                        }
                    }
                }
            }
            diesel::delete(bridge_discovery::table.find(row_id)).execute(connection)?;
            Ok(())
        })
        .await
    }

    async fn query_details(
        &self,
        query: &BridgeQuery,
        page: PageRequest,
    ) -> BridgeStoreResult<Page<BridgeRecord>> {
        let filters = query.clone();
        self.run_blocking(move |connection| {
            let mut statement = bridge_details::table
                .inner_join(bridge_header::table)
                .select((HeaderRow::as_select(), DetailsRow::as_select()))
                .into_boxed();
            statement = match filters.base_filter() {
                Some(BaseFilter::BridgeIds) => statement.filter(
                    bridge_details::bridge_id.eq_any(
                        filters
                            .bridge_ids
                            .iter()
                            .copied()
                            .map(BridgeId::into_inner)
                            .collect::<Vec<_>>(),
                    ),
                ),
                Some(BaseFilter::Consumers) => {
                    statement.filter(bridge_details::consumer.eq_any(texts(&filters.consumers)))
                }
                Some(BaseFilter::Providers) => {
                    statement.filter(bridge_details::provider.eq_any(texts(&filters.providers)))
                }
                Some(BaseFilter::ServiceDefinitions) => statement.filter(
                    bridge_details::service_definition
                        .eq_any(texts(&filters.service_definitions)),
                ),
                Some(BaseFilter::InterfaceTranslators) => statement.filter(
                    bridge_details::interface_translator
                        .eq_any(texts(&filters.interface_translators)),
                ),
                Some(BaseFilter::Statuses) => statement.filter(
                    bridge_header::status.eq_any(
                        filters
                            .statuses
                            .iter()
                            .map(|status| status.as_str().to_owned())
                            .collect::<Vec<_>>(),
                    ),
                ),
                Some(BaseFilter::Creators) => {
                    statement.filter(bridge_header::created_by.eq_any(texts(&filters.creators)))
                }
                None => statement,
            };

            let records = statement
                .load::<(HeaderRow, DetailsRow)>(connection)?
                .into_iter()
                .map(|(header, details)| {
                    Ok(BridgeRecord {
                        header: row_to_header(header)?,
                        details: row_to_details(details)?,
                    })
                })
                .collect::<BridgeStoreResult<Vec<_>>>()?;
            Ok(page.apply(
                records
                    .into_iter()
                    .filter(|record| filters.matches(record))
                    .collect(),
            ))
        })
        .await
    }

    async fn find_header(&self, bridge_id: BridgeId) -> BridgeStoreResult<Option<BridgeHeader>> {
        self.run_blocking(move |connection| {
            bridge_header::table
                .find(bridge_id.into_inner())
                .select(HeaderRow::as_select())
                .first::<HeaderRow>(connection)
                .optional()?
                .map(row_to_header)
                .transpose()
        })
        .await
    }

    async fn find_discoveries(
        &self,
        bridge_id: BridgeId,
    ) -> BridgeStoreResult<Vec<BridgeDiscovery>> {
        self.run_blocking(move |connection| load_discoveries(connection, bridge_id))
            .await
    }

    async fn find_details(&self, bridge_id: BridgeId) -> BridgeStoreResult<Option<BridgeDetails>> {
        self.run_blocking(move |connection| load_details(connection, bridge_id))
            .await
    }
}

fn lock_header(
    connection: &mut PgConnection,
    bridge_id: BridgeId,
) -> BridgeStoreResult<Option<BridgeHeader>> {
    bridge_header::table
        .find(bridge_id.into_inner())
        .select(HeaderRow::as_select())
        .for_update()
        .first::<HeaderRow>(connection)
        .optional()?
        .map(row_to_header)
        .transpose()
}

fn save_header(connection: &mut PgConnection, header: &BridgeHeader) -> BridgeStoreResult<()> {
    let row = header_to_row(header)?;
    diesel::update(bridge_header::table.find(row.bridge_id))
        .set(&row)
        .execute(connection)?;
    Ok(())
}

fn load_discoveries(
    connection: &mut PgConnection,
    bridge_id: BridgeId,
) -> BridgeStoreResult<Vec<BridgeDiscovery>> {
    bridge_discovery::table
        .filter(bridge_discovery::bridge_id.eq(bridge_id.into_inner()))
        .select(DiscoveryRow::as_select())
        .load::<DiscoveryRow>(connection)?
        .into_iter()
        .map(row_to_discovery)
        .collect()
}

fn delete_discoveries(connection: &mut PgConnection, bridge_id: BridgeId) -> BridgeStoreResult<()> {
    diesel::delete(
        bridge_discovery::table.filter(bridge_discovery::bridge_id.eq(bridge_id.into_inner())),
    )
    .execute(connection)?;
    Ok(())
}

fn load_details(
    connection: &mut PgConnection,
    bridge_id: BridgeId,
) -> BridgeStoreResult<Option<BridgeDetails>> {
    bridge_details::table
        .find(bridge_id.into_inner())
        .select(DetailsRow::as_select())
        .first::<DetailsRow>(connection)
        .optional()?
        .map(row_to_details)
        .transpose()
}

fn texts<T: AsRef<str>>(values: &[T]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.as_ref().to_owned())
        .collect()
}

fn header_to_row(header: &BridgeHeader) -> BridgeStoreResult<HeaderRow> {
    let NewHeaderRow {
        bridge_id,
        created_by,
        status,
        message,
        usage_report_count,
        alive_at,
        created_at,
        updated_at,
    } = header_to_new_row(header)?;
    Ok(HeaderRow {
        id: header.id(),
        bridge_id,
        created_by,
        status,
        message,
        usage_report_count,
        alive_at,
        created_at,
        updated_at,
    })
}

fn header_to_new_row(header: &BridgeHeader) -> BridgeStoreResult<NewHeaderRow> {
    Ok(NewHeaderRow {
        bridge_id: header.bridge_id().into_inner(),
        created_by: header.created_by().as_str().to_owned(),
        status: header.status().as_str().to_owned(),
        message: header.message().map(str::to_owned),
        usage_report_count: i64::try_from(header.usage_report_count())
            .map_err(BridgeStoreError::persistence)?,
        alive_at: header.alive_at(),
        created_at: header.created_at(),
        updated_at: header.updated_at(),
    })
}

fn row_to_header(row: HeaderRow) -> BridgeStoreResult<BridgeHeader> {
    let HeaderRow {
        id,
        bridge_id,
        created_by: persisted_creator,
        status: persisted_status,
        message,
        usage_report_count,
        alive_at,
        created_at,
        updated_at,
    } = row;

    let data = PersistedBridgeHeaderData {
        id,
        bridge_id: BridgeId::from_uuid(bridge_id),
        created_by: SystemName::new(persisted_creator).map_err(BridgeStoreError::persistence)?,
        status: BridgeStatus::try_from(persisted_status.as_str())
            .map_err(BridgeStoreError::persistence)?,
        message,
        usage_report_count: u64::try_from(usage_report_count)
            .map_err(BridgeStoreError::persistence)?,
        alive_at,
        created_at,
        updated_at,
    };
    Ok(BridgeHeader::from_persisted(data))
}

fn discovery_to_row(discovery: &BridgeDiscovery) -> BridgeStoreResult<DiscoveryRow> {
    Ok(DiscoveryRow {
        id: discovery.id,
        bridge_id: discovery.bridge_id.into_inner(),
        model: serde_json::to_value(&discovery.model).map_err(BridgeStoreError::persistence)?,
        created_at: discovery.created_at,
    })
}

fn row_to_discovery(row: DiscoveryRow) -> BridgeStoreResult<BridgeDiscovery> {
    Ok(BridgeDiscovery {
        id: row.id,
        bridge_id: BridgeId::from_uuid(row.bridge_id),
        model: serde_json::from_value(row.model).map_err(BridgeStoreError::persistence)?,
        created_at: row.created_at,
    })
}

fn details_to_row(details: &BridgeDetails) -> BridgeStoreResult<DetailsRow> {
    Ok(DetailsRow {
        bridge_id: details.bridge_id.into_inner(),
        consumer: details.consumer.as_str().to_owned(),
        provider: details.provider.as_str().to_owned(),
        service_definition: details.service_definition.as_str().to_owned(),
        operation: details.operation.as_str().to_owned(),
        interface_translator: details.interface_translator.as_str().to_owned(),
        interface_translator_data: details
            .interface_translator_data
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(BridgeStoreError::persistence)?,
        input_dm_translator: details
            .input_dm_translator
            .as_ref()
            .map(|name| name.as_str().to_owned()),
        input_dm_translator_data: details
            .input_dm_translator_data
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(BridgeStoreError::persistence)?,
        result_dm_translator: details
            .result_dm_translator
            .as_ref()
            .map(|name| name.as_str().to_owned()),
        result_dm_translator_data: details
            .result_dm_translator_data
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(BridgeStoreError::persistence)?,
        created_at: details.created_at,
        updated_at: details.updated_at,
    })
}

fn row_to_details(row: DetailsRow) -> BridgeStoreResult<BridgeDetails> {
    let system = |name: String| SystemName::new(name).map_err(BridgeStoreError::persistence);
    Ok(BridgeDetails {
        bridge_id: BridgeId::from_uuid(row.bridge_id),
        consumer: system(row.consumer)?,
        provider: system(row.provider)?,
        service_definition: ServiceDefinitionName::new(row.service_definition)
            .map_err(BridgeStoreError::persistence)?,
        operation: OperationName::new(row.operation).map_err(BridgeStoreError::persistence)?,
        interface_translator: system(row.interface_translator)?,
        interface_translator_data: row
            .interface_translator_data
            .map(serde_json::from_value)
            .transpose()
            .map_err(BridgeStoreError::persistence)?,
        input_dm_translator: row.input_dm_translator.map(system).transpose()?,
        input_dm_translator_data: row
            .input_dm_translator_data
            .map(serde_json::from_value)
            .transpose()
            .map_err(BridgeStoreError::persistence)?,
        result_dm_translator: row.result_dm_translator.map(system).transpose()?,
        result_dm_translator_data: row
            .result_dm_translator_data
            .map(serde_json::from_value)
            .transpose()
            .map_err(BridgeStoreError::persistence)?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
