//! Plain data records for the tracked domain.
//!
//! These are transport-free shapes: the ledger and the report engine take
//! and return them directly, and the storage backends persist them. Row
//! timestamps (`created_at` / `updated_at`) are owned by the store; the
//! soft-delete marker never appears here because every query excludes
//! tombstoned rows.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AssetId, AssetTypeId, AssignmentId, CustomFieldId, PersonId};
use crate::time::Timespan;
use crate::value::FieldValue;

/// A category of assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetType {
    /// Identity.
    pub id: AssetTypeId,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A tracked asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Identity.
    pub id: AssetId,
    /// The asset's category.
    pub asset_type_id: AssetTypeId,
    /// Display name.
    pub name: String,
    /// Manufacturer model.
    pub model: String,
    /// Serial number.
    pub serial_number: String,
    /// Purchase order reference.
    pub order_no: String,
    /// License number, for licensed assets.
    pub license_number: String,
    /// Free-text notes.
    pub notes: String,
    /// Purchase date, when known.
    pub purchased_at: Option<DateTime<Utc>>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Input shape for registering an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAsset {
    /// The asset's category.
    pub asset_type_id: AssetTypeId,
    /// Display name.
    pub name: String,
    /// Manufacturer model.
    pub model: String,
    /// Serial number.
    pub serial_number: String,
    /// Purchase order reference.
    pub order_no: String,
    /// License number, for licensed assets.
    pub license_number: String,
    /// Free-text notes.
    pub notes: String,
    /// Purchase date, when known.
    pub purchased_at: Option<DateTime<Utc>>,
}

impl Default for NewAsset {
    fn default() -> Self {
        Self {
            asset_type_id: AssetTypeId::new(0),
            name: String::new(),
            model: String::new(),
            serial_number: String::new(),
            order_no: String::new(),
            license_number: String::new(),
            notes: String::new(),
            purchased_at: None,
        }
    }
}

impl NewAsset {
    /// Convenience constructor for the common name-and-type case.
    #[must_use]
    pub fn named(asset_type_id: AssetTypeId, name: impl Into<String>) -> Self {
        Self {
            asset_type_id,
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A person assets can be lent to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Identity.
    pub id: PersonId,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Contact phone.
    pub phone: String,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Input shape for registering a person.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPerson {
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Contact phone.
    pub phone: String,
}

impl NewPerson {
    /// Convenience constructor for the name-only case.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Declared data type of a custom field.
///
/// Values are stored and compared as text regardless; the declared type is
/// advisory metadata for calling surfaces (form rendering, input checks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldDataType {
    /// Free text.
    String,
    /// Whole number.
    Int,
    /// Decimal number.
    Decimal,
    /// True/false flag.
    Boolean,
    /// Calendar date.
    Date,
    /// Date and time.
    Datetime,
    /// One of a fixed set of options.
    Enum,
}

/// Which entity kind a custom field attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomFieldScope {
    /// Asset-scoped ("property") fields, reported as `prop_<name>`.
    Asset,
    /// Person-scoped ("attribute") fields, reported as `attr_<name>`.
    Person,
}

/// Definition of a sparse per-entity custom field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldDef {
    /// Identity.
    pub id: CustomFieldId,
    /// Which entity kind the field attaches to.
    pub scope: CustomFieldScope,
    /// Logical field name (the suffix after `prop_` / `attr_` in reports).
    pub name: String,
    /// Declared data type.
    pub data_type: FieldDataType,
}

/// One interval of an asset's assignment history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Identity.
    pub id: AssignmentId,
    /// The held asset.
    pub asset_id: AssetId,
    /// The holding person.
    pub person_id: PersonId,
    /// The half-open holding span. `span.to == None` means still held.
    pub span: Timespan,
    /// Free-text note.
    pub note: String,
    /// Asset display name, resolved by the store.
    pub asset_name: String,
    /// Person display name, resolved by the store.
    pub person_name: String,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Input shape for recording an assignment interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAssignment {
    /// The held asset.
    pub asset_id: AssetId,
    /// The holding person.
    pub person_id: PersonId,
    /// The half-open holding span.
    pub span: Timespan,
    /// Free-text note.
    pub note: String,
}

/// One row of a report result: field name to value.
///
/// Rows are assembled fresh per report execution from structured columns
/// plus whatever custom fields the source entity carries, keyed as
/// `prop_<name>` / `attr_<name>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportRow {
    fields: BTreeMap<String, FieldValue>,
}

impl ReportRow {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Sets a field, replacing any previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Whether the row carries the field at all.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Number of fields in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the row is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    /// Merges another set of fields into this row.
    pub fn merge(&mut self, extra: impl IntoIterator<Item = (String, FieldValue)>) {
        self.fields.extend(extra);
    }
}

impl FromIterator<(String, FieldValue)> for ReportRow {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
