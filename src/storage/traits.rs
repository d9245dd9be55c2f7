//! Abstract storage traits.
//!
//! These traits define the contract between the core (ledger, report
//! engine) and the backing store. Trait objects keep the core testable
//! against the in-memory backend and deployable against the relational
//! one without code changes.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::filter::FilterCondition;
use crate::ids::{AssetId, AssetTypeId, AssignmentId, CustomFieldId, PersonId};
use crate::record::{
    Asset, AssetType, Assignment, CustomFieldDef, CustomFieldScope, FieldDataType, NewAsset,
    NewAssignment, NewPerson, Person, ReportRow,
};

/// Display name of the sentinel person that marks an asset as not lent
/// out. Person reports always exclude this row.
pub const UNASSIGNED_PERSON: &str = "Unassigned";

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Asset not found.
    #[error("Asset not found: {0}")]
    AssetNotFound(AssetId),

    /// Person not found.
    #[error("Person not found: {0}")]
    PersonNotFound(PersonId),

    /// Asset type not found.
    #[error("Asset type not found: {0}")]
    AssetTypeNotFound(AssetTypeId),

    /// Assignment not found.
    #[error("Assignment not found: {0}")]
    AssignmentNotFound(AssignmentId),

    /// Custom field definition not found.
    #[error("Custom field not defined: {0}")]
    FieldNotDefined(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

/// The generic entity-directory collaborator: registration, lookup,
/// listing and soft-deletion of the records the core reports over.
///
/// The core never mutates directory rows beyond what this trait offers;
/// richer CRUD belongs to the calling surface.
pub trait DirectoryStore: Send + Sync {
    /// Registers an asset type. Returns the stored record with identity.
    fn create_asset_type(&self, name: &str, description: &str)
        -> Result<AssetType, StorageError>;

    /// Registers an asset. Returns the stored record with identity.
    ///
    /// # Errors
    /// `AssetTypeNotFound` if the referenced type does not exist.
    fn create_asset(&self, new: NewAsset) -> Result<Asset, StorageError>;

    /// Registers a person. Returns the stored record with identity.
    fn create_person(&self, new: NewPerson) -> Result<Person, StorageError>;

    /// Fetches an asset by id. Tombstoned rows read as absent.
    fn asset(&self, id: AssetId) -> Result<Option<Asset>, StorageError>;

    /// Fetches a person by id. Tombstoned rows read as absent.
    fn person(&self, id: PersonId) -> Result<Option<Person>, StorageError>;

    /// Lists live assets, ordered by name ascending.
    fn assets(&self) -> Result<Vec<Asset>, StorageError>;

    /// Lists live persons, ordered by name ascending.
    fn persons(&self) -> Result<Vec<Person>, StorageError>;

    /// Fetches the sentinel person marking unassigned assets.
    fn unassigned_person(&self) -> Result<Option<Person>, StorageError>;

    /// Soft-deletes an asset.
    fn remove_asset(&self, id: AssetId) -> Result<(), StorageError>;

    /// Soft-deletes a person.
    fn remove_person(&self, id: PersonId) -> Result<(), StorageError>;

    /// Declares a custom field for the given scope.
    fn define_field(
        &self,
        scope: CustomFieldScope,
        name: &str,
        data_type: FieldDataType,
    ) -> Result<CustomFieldDef, StorageError>;

    /// Lists field definitions for a scope, ordered by name.
    fn field_defs(&self, scope: CustomFieldScope) -> Result<Vec<CustomFieldDef>, StorageError>;

    /// Upserts an asset's custom field value by definition id.
    ///
    /// # Errors
    /// `FieldNotDefined` if the definition does not exist or is
    /// person-scoped; `AssetNotFound` if the asset does not exist.
    fn set_asset_field(
        &self,
        asset_id: AssetId,
        field: CustomFieldId,
        value: &str,
    ) -> Result<(), StorageError>;

    /// Upserts a person's custom field value by definition id.
    fn set_person_field(
        &self,
        person_id: PersonId,
        field: CustomFieldId,
        value: &str,
    ) -> Result<(), StorageError>;
}

/// Row persistence for assignment intervals.
///
/// Deliberately dumb: lifecycle rules (overlap checking, supersession)
/// live in the ledger, which is the only component allowed to call the
/// mutating methods here.
pub trait AssignmentStore: Send + Sync {
    /// Persists a new interval and assigns its identity. Display names
    /// for asset and person are resolved into the returned record.
    fn insert(&self, new: &NewAssignment) -> Result<Assignment, StorageError>;

    /// Fetches an interval by id. Tombstoned rows read as absent.
    fn get(&self, id: AssignmentId) -> Result<Option<Assignment>, StorageError>;

    /// Rewrites an interval's person, span and note.
    ///
    /// # Errors
    /// `AssignmentNotFound` if the row is missing or tombstoned.
    fn update(&self, assignment: &Assignment) -> Result<(), StorageError>;

    /// Sets the interval's end, unconditionally.
    fn close(&self, id: AssignmentId, end: DateTime<Utc>) -> Result<(), StorageError>;

    /// Tombstones the interval; it disappears from every query.
    fn tombstone(&self, id: AssignmentId) -> Result<(), StorageError>;

    /// Live intervals for an asset, `effective_from` descending.
    fn for_asset(&self, asset_id: AssetId) -> Result<Vec<Assignment>, StorageError>;

    /// Live intervals for a person, `effective_from` descending.
    fn for_person(&self, person_id: PersonId) -> Result<Vec<Assignment>, StorageError>;
}

/// Row materialization for the report engine.
///
/// Each backend applies the structured sub-chain its own way - compiled
/// into the query, or evaluated with the shared fold against the rows it
/// builds - with identical chain semantics either way.
pub trait ReportStore: Send + Sync {
    /// Asset base rows: asset columns plus joined type name and current
    /// assignee (resolved as of `now`), filtered by the structured
    /// sub-chain, ordered by asset name ascending.
    fn asset_rows(
        &self,
        structured: &[FilterCondition],
        now: DateTime<Utc>,
    ) -> Result<Vec<ReportRow>, StorageError>;

    /// Person base rows, excluding the sentinel person, filtered by the
    /// structured sub-chain, ordered by person name ascending.
    fn person_rows(&self, structured: &[FilterCondition]) -> Result<Vec<ReportRow>, StorageError>;

    /// Asset base rows for every live asset of one type, unfiltered.
    fn asset_rows_for_type(
        &self,
        asset_type_id: AssetTypeId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReportRow>, StorageError>;

    /// Custom field values for one asset, as (logical name, value) pairs.
    fn asset_fields(&self, asset_id: AssetId) -> Result<Vec<(String, String)>, StorageError>;

    /// Custom field values for one person, as (logical name, value) pairs.
    fn person_fields(&self, person_id: PersonId) -> Result<Vec<(String, String)>, StorageError>;
}
