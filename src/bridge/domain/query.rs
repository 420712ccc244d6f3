//! Bridge query filters and paging.

use super::{BridgeId, BridgeRecord, BridgeStatus, ServiceDefinitionName, SystemName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Filter that is pushed down to the store as an indexed lookup.
///
/// Declaration order is the selection priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseFilter {
    /// Lookup by bridge identifiers.
    BridgeIds,
    /// Lookup by consumer systems.
    Consumers,
    /// Lookup by target providers.
    Providers,
    /// Lookup by service definitions.
    ServiceDefinitions,
    /// Lookup by interface translators.
    InterfaceTranslators,
    /// Lookup by statuses.
    Statuses,
    /// Lookup by creators.
    Creators,
}

/// Inclusive timestamp range; open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    /// Lower bound.
    pub from: Option<DateTime<Utc>>,
    /// Upper bound.
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Returns whether no bound is set.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Returns whether `value` lies within the range.
    ///
    /// A missing value only satisfies an unbounded range.
    #[must_use]
    pub fn contains(&self, value: Option<DateTime<Utc>>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        value.is_some_and(|instant| {
            self.from.is_none_or(|from| instant >= from) && self.to.is_none_or(|to| instant <= to)
        })
    }
}

/// Independent, optional filters over negotiated bridges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeQuery {
    /// Bridge identifiers.
    pub bridge_ids: Vec<BridgeId>,
    /// Creating systems.
    pub creators: Vec<SystemName>,
    /// Header statuses.
    pub statuses: Vec<BridgeStatus>,
    /// Consumer systems.
    pub consumers: Vec<SystemName>,
    /// Target providers.
    pub providers: Vec<SystemName>,
    /// Target service definitions.
    pub service_definitions: Vec<ServiceDefinitionName>,
    /// Interface translators.
    pub interface_translators: Vec<SystemName>,
    /// Data model translators, matching either direction.
    pub data_model_translators: Vec<SystemName>,
    /// Header creation time.
    pub created: TimeRange,
    /// Header liveness time.
    pub alive: TimeRange,
    /// Minimum usage report count.
    pub min_usage: Option<u64>,
    /// Maximum usage report count.
    pub max_usage: Option<u64>,
}

impl BridgeQuery {
    /// Returns the highest-priority non-empty list filter.
    #[must_use]
    pub fn base_filter(&self) -> Option<BaseFilter> {
        [
            (BaseFilter::BridgeIds, self.bridge_ids.is_empty()),
            (BaseFilter::Consumers, self.consumers.is_empty()),
            (BaseFilter::Providers, self.providers.is_empty()),
            (
                BaseFilter::ServiceDefinitions,
                self.service_definitions.is_empty(),
            ),
            (
                BaseFilter::InterfaceTranslators,
                self.interface_translators.is_empty(),
            ),
            (BaseFilter::Statuses, self.statuses.is_empty()),
            (BaseFilter::Creators, self.creators.is_empty()),
        ]
        .into_iter()
        .find_map(|(filter, empty)| (!empty).then_some(filter))
    }

    /// Returns whether the query has no filter at all.
    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        self.base_filter().is_none()
            && self.data_model_translators.is_empty()
            && self.created.is_unbounded()
            && self.alive.is_unbounded()
            && self.min_usage.is_none()
            && self.max_usage.is_none()
    }

    /// Returns whether `record` satisfies every filter.
    #[must_use]
    pub fn matches(&self, record: &BridgeRecord) -> bool {
        let header = &record.header;
        let details = &record.details;
        let usage = header.usage_report_count();

        any_or_empty(&self.bridge_ids, &header.bridge_id())
            && any_or_empty(&self.creators, header.created_by())
            && any_or_empty(&self.statuses, &header.status())
            && any_or_empty(&self.consumers, &details.consumer)
            && any_or_empty(&self.providers, &details.provider)
            && any_or_empty(&self.service_definitions, &details.service_definition)
            && any_or_empty(&self.interface_translators, &details.interface_translator)
            && (self.data_model_translators.is_empty()
                || [&details.input_dm_translator, &details.result_dm_translator]
                    .into_iter()
                    .flatten()
                    .any(|name| self.data_model_translators.contains(name)))
            && self.created.contains(Some(header.created_at()))
            && self.alive.contains(header.alive_at())
            && self.min_usage.is_none_or(|min| usage >= min)
            && self.max_usage.is_none_or(|max| usage <= max)
    }
}

fn any_or_empty<T: PartialEq>(allowed: &[T], value: &T) -> bool {
    allowed.is_empty() || allowed.contains(value)
}

/// Field used to order query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    /// Store-assigned header key, i.e. creation order.
    #[default]
    Id,
    /// Bridge identifier.
    BridgeId,
    /// Header creation time.
    CreatedAt,
    /// Header update time.
    UpdatedAt,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

/// Requested page of query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based page index.
    pub page: usize,
    /// Page size.
    pub size: usize,
    /// Sort field.
    pub sort_field: SortField,
    /// Sort direction.
    pub direction: SortDirection,
}

impl PageRequest {
    /// Creates a request for `page` of `size` rows with default ordering.
    #[must_use]
    pub const fn new(page: usize, size: usize) -> Self {
        Self {
            page,
            size,
            sort_field: SortField::Id,
            direction: SortDirection::Asc,
        }
    }

    /// Sets the ordering.
    #[must_use]
    pub const fn sorted_by(mut self, sort_field: SortField, direction: SortDirection) -> Self {
        self.sort_field = sort_field;
        self.direction = direction;
        self
    }

    /// Sorts `records` and returns the requested page.
    #[must_use]
    pub fn apply(&self, mut records: Vec<BridgeRecord>) -> Page<BridgeRecord> {
        records.sort_by(|left, right| self.compare(left, right));
        let total = records.len();
        let items = records
            .into_iter()
            .skip(self.page.saturating_mul(self.size))
            .take(self.size)
            .collect();
        Page { items, total }
    }

    fn compare(&self, left: &BridgeRecord, right: &BridgeRecord) -> Ordering {
        let ordering = match self.sort_field {
            SortField::Id => left.header.id().cmp(&right.header.id()),
            SortField::BridgeId => left.header.bridge_id().cmp(&right.header.bridge_id()),
            SortField::CreatedAt => left.header.created_at().cmp(&right.header.created_at()),
            SortField::UpdatedAt => left.header.updated_at().cmp(&right.header.updated_at()),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, usize::MAX)
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Rows of this page.
    pub items: Vec<T>,
    /// Number of rows matching the query across all pages.
    pub total: usize,
}
