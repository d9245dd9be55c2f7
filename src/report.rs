//! The dynamic report query engine.
//!
//! Executes a client-supplied filter chain against an entity kind. The
//! chain splits into a structured sub-chain (handed to the store, which
//! applies it inside the base query) and a dynamic sub-chain (evaluated
//! here, after custom fields are merged into each row). The two
//! sub-chains fold independently with their own internal connectors;
//! their relative positions in the original chain are not recombined.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::classify::{self, ASSET_FIELD_PREFIX, PERSON_FIELD_PREFIX};
use crate::error::{CustodiaResult, ValidationError};
use crate::filter::{matches_chain, FilterCondition};
use crate::ids::{AssetId, AssetTypeId, PersonId};
use crate::record::ReportRow;
use crate::storage::ReportStore;
use crate::value::FieldValue;

/// Which entity kind a report runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Report over assets.
    Asset,
    /// Report over persons.
    Person,
}

/// A report request: the de facto wire contract of the reporting
/// surface. The serde aliases accept the original upper-camel casing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    /// The entity kind to report over.
    #[serde(alias = "EntityType")]
    pub entity: EntityKind,

    /// The ordered filter chain. Empty means "all rows".
    #[serde(alias = "Filters", default)]
    pub filters: Vec<FilterCondition>,
}

impl ReportRequest {
    /// A request with no filters.
    #[must_use]
    pub fn all(entity: EntityKind) -> Self {
        Self {
            entity,
            filters: Vec::new(),
        }
    }

    /// A filtered request.
    #[must_use]
    pub fn filtered(entity: EntityKind, filters: Vec<FilterCondition>) -> Self {
        Self { entity, filters }
    }

    /// Rejects malformed chains before any storage round trip.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.filters.iter().any(|cond| cond.field.is_empty()) {
            return Err(ValidationError::EmptyFieldName);
        }
        Ok(())
    }
}

/// Report orchestration over a pluggable store.
#[derive(Clone)]
pub struct ReportQueryEngine {
    store: Arc<dyn ReportStore>,
}

impl ReportQueryEngine {
    /// Creates an engine over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    /// Executes a report.
    ///
    /// Rows come back in the store's order (entity display name
    /// ascending); dynamic filtering drops rows but never reorders. A
    /// failed custom-field lookup degrades its row (no dynamic fields
    /// merged) without aborting the report; any other storage error
    /// aborts the whole report.
    pub fn execute(&self, request: &ReportRequest) -> CustodiaResult<Vec<ReportRow>> {
        request.validate()?;
        let (structured, dynamic) = classify::partition_chain(&request.filters);

        let mut rows = match request.entity {
            EntityKind::Asset => self.store.asset_rows(&structured, Utc::now())?,
            EntityKind::Person => self.store.person_rows(&structured)?,
        };
        self.attach_custom_fields(request.entity, &mut rows);

        if !dynamic.is_empty() {
            rows.retain(|row| matches_chain(&dynamic, row));
        }
        Ok(rows)
    }

    /// Report over every asset of one type, custom fields attached, no
    /// filtering.
    pub fn execute_for_type(&self, asset_type_id: AssetTypeId) -> CustodiaResult<Vec<ReportRow>> {
        let mut rows = self.store.asset_rows_for_type(asset_type_id, Utc::now())?;
        self.attach_custom_fields(EntityKind::Asset, &mut rows);
        Ok(rows)
    }

    fn attach_custom_fields(&self, entity: EntityKind, rows: &mut [ReportRow]) {
        for row in rows.iter_mut() {
            let Some(&FieldValue::Int(id)) = row.get("id") else {
                continue;
            };
            let (prefix, fetched) = match entity {
                EntityKind::Asset => (
                    ASSET_FIELD_PREFIX,
                    self.store.asset_fields(AssetId::new(id)),
                ),
                EntityKind::Person => (
                    PERSON_FIELD_PREFIX,
                    self.store.person_fields(PersonId::new(id)),
                ),
            };
            match fetched {
                Ok(fields) => {
                    row.merge(
                        fields
                            .into_iter()
                            .map(|(name, value)| (format!("{prefix}{name}"), value.into())),
                    );
                }
                Err(err) => {
                    warn!(entity_id = id, %err, "custom field lookup failed; row degraded");
                }
            }
        }
    }
}
