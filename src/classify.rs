//! Field classification for report filters.
//!
//! A filter condition names either a structured field (backed by a real
//! column in the base query) or a dynamic custom field (a sparse
//! per-entity value, only available after rows materialize). Structured
//! names translate through a fixed map; dynamic names are marked by the
//! `prop_` (asset property) and `attr_` (person attribute) prefixes.
//!
//! A name that is neither mapped nor prefixed stays on the structured
//! path and translates to no column: the condition is silently ignored.
//! It is NOT promoted to dynamic evaluation.

use crate::filter::FilterCondition;

/// Prefix marking asset-scoped custom fields in rows and filters.
pub const ASSET_FIELD_PREFIX: &str = "prop_";

/// Prefix marking person-scoped custom fields in rows and filters.
pub const PERSON_FIELD_PREFIX: &str = "attr_";

/// Where a filter field resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldClass {
    /// Translates to a column reference in the base query.
    Structured(&'static str),
    /// Asset custom property; the logical name follows the prefix.
    AssetField(String),
    /// Person custom attribute; the logical name follows the prefix.
    PersonField(String),
    /// Unknown name: contributes nothing anywhere.
    Unmapped,
}

/// Resolves a structured field name to its column reference.
///
/// The map covers asset columns, the joined type name, and the current
/// holder's person columns. Anything else returns `None`.
#[must_use]
pub fn structured_column(field: &str) -> Option<&'static str> {
    match field {
        "ID" => Some("a.id"),
        "Name" => Some("a.name"),
        "AssetTypeName" => Some("at.name"),
        "Model" => Some("a.model"),
        "SerialNumber" => Some("a.serial_number"),
        "OrderNo" => Some("a.order_no"),
        "LicenseNumber" => Some("a.license_number"),
        "Notes" => Some("a.notes"),
        "PurchasedAt" => Some("a.purchased_at"),
        "CurrentAssignee" | "PersonName" => Some("p.name"),
        "Email" | "PersonEmail" => Some("p.email"),
        "Phone" | "PersonPhone" => Some("p.phone"),
        _ => None,
    }
}

/// Column resolver for asset reports: the full structured map applies
/// (asset columns, type name, current holder columns).
#[must_use]
pub fn asset_report_column(field: &str) -> Option<&'static str> {
    structured_column(field)
}

/// Column resolver for person reports: only person columns exist in that
/// query, so asset-column names drop out the same way unmapped names do.
#[must_use]
pub fn person_report_column(field: &str) -> Option<&'static str> {
    structured_column(field).filter(|column| column.starts_with("p."))
}

/// Classifies a single field name.
#[must_use]
pub fn classify(field: &str) -> FieldClass {
    if let Some(name) = field.strip_prefix(ASSET_FIELD_PREFIX) {
        return FieldClass::AssetField(name.to_string());
    }
    if let Some(name) = field.strip_prefix(PERSON_FIELD_PREFIX) {
        return FieldClass::PersonField(name.to_string());
    }
    match structured_column(field) {
        Some(column) => FieldClass::Structured(column),
        None => FieldClass::Unmapped,
    }
}

/// Splits a chain into the structured and dynamic sub-chains.
///
/// Each sub-chain keeps its conditions in original order with their
/// original connectors, and folds independently of the other; relative
/// positions across the two are not preserved. The entity kind plays no
/// part here: both prefixes route to the dynamic path regardless of which
/// report the chain belongs to. Unmapped names stay on the structured
/// side, where compilation drops them.
#[must_use]
pub fn partition_chain(
    conditions: &[FilterCondition],
) -> (Vec<FilterCondition>, Vec<FilterCondition>) {
    let mut structured = Vec::new();
    let mut dynamic = Vec::new();
    for cond in conditions {
        if cond.field.starts_with(ASSET_FIELD_PREFIX) || cond.field.starts_with(PERSON_FIELD_PREFIX)
        {
            dynamic.push(cond.clone());
        } else {
            structured.push(cond.clone());
        }
    }
    (structured, dynamic)
}
