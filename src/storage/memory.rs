//! In-memory storage backend.
//!
//! Thread-safe implementations of the storage traits over `RwLock`-guarded
//! maps. Intended for embedded usage and tests, and as the reference
//! implementation: report filtering here evaluates the same structured
//! sub-chain the SQLite backend compiles, through the same fold, with
//! comparison semantics mirroring the relational engine.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::classify;
use crate::filter::{fold_chain, FilterCondition, Operator};
use crate::ids::{AssetId, AssetTypeId, AssignmentId, CustomFieldId, PersonId};
use crate::record::{
    Asset, AssetType, Assignment, CustomFieldDef, CustomFieldScope, FieldDataType, NewAsset,
    NewAssignment, NewPerson, Person, ReportRow,
};
use crate::storage::traits::{
    AssignmentStore, DirectoryStore, ReportStore, StorageError, UNASSIGNED_PERSON,
};
use crate::time::Timespan;
use crate::value::FieldValue;

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

fn ts_text(at: DateTime<Utc>) -> FieldValue {
    FieldValue::Text(at.to_rfc3339())
}

#[derive(Debug, Clone)]
struct AssignmentRow {
    id: AssignmentId,
    asset_id: AssetId,
    person_id: PersonId,
    span: Timespan,
    note: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted: bool,
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    asset_types: HashMap<AssetTypeId, AssetType>,
    assets: HashMap<AssetId, (Asset, bool)>,
    persons: HashMap<PersonId, (Person, bool)>,
    field_defs: HashMap<CustomFieldId, (CustomFieldDef, bool)>,
    asset_values: HashMap<(AssetId, CustomFieldId), (String, bool)>,
    person_values: HashMap<(PersonId, CustomFieldId), (String, bool)>,
    assignments: HashMap<AssignmentId, AssignmentRow>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn live_asset(&self, id: AssetId) -> Option<&Asset> {
        self.assets
            .get(&id)
            .and_then(|(asset, deleted)| (!deleted).then_some(asset))
    }

    fn live_person(&self, id: PersonId) -> Option<&Person> {
        self.persons
            .get(&id)
            .and_then(|(person, deleted)| (!deleted).then_some(person))
    }

    /// Display name regardless of tombstoning, matching the relational
    /// backend's LEFT JOINs which do not filter the joined side.
    fn asset_name(&self, id: AssetId) -> String {
        self.assets
            .get(&id)
            .map(|(asset, _)| asset.name.clone())
            .unwrap_or_default()
    }

    fn person_name(&self, id: PersonId) -> String {
        self.persons
            .get(&id)
            .map(|(person, _)| person.name.clone())
            .unwrap_or_default()
    }

    fn to_assignment(&self, row: &AssignmentRow) -> Assignment {
        Assignment {
            id: row.id,
            asset_id: row.asset_id,
            person_id: row.person_id,
            span: row.span,
            note: row.note.clone(),
            asset_name: self.asset_name(row.asset_id),
            person_name: self.person_name(row.person_id),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    /// The assignment resolving an asset's current holder in reports: not
    /// tombstoned, end absent or after `now`, latest `effective_from`.
    fn current_holder(&self, asset_id: AssetId, now: DateTime<Utc>) -> Option<&AssignmentRow> {
        self.assignments
            .values()
            .filter(|row| {
                !row.deleted
                    && row.asset_id == asset_id
                    && row.span.to.map_or(true, |to| to > now)
            })
            .max_by_key(|row| (row.span.from, row.id))
    }
}

/// Thread-safe in-memory backend implementing every storage trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DirectoryStore for MemoryStore {
    fn create_asset_type(
        &self,
        name: &str,
        description: &str,
    ) -> Result<AssetType, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("asset_types"))?;
        let now = Utc::now();
        let record = AssetType {
            id: AssetTypeId::new(state.next_id()),
            name: name.to_string(),
            description: description.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.asset_types.insert(record.id, record.clone());
        Ok(record)
    }

    fn create_asset(&self, new: NewAsset) -> Result<Asset, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("assets"))?;
        if !state.asset_types.contains_key(&new.asset_type_id) {
            return Err(StorageError::AssetTypeNotFound(new.asset_type_id));
        }
        let now = Utc::now();
        let record = Asset {
            id: AssetId::new(state.next_id()),
            asset_type_id: new.asset_type_id,
            name: new.name,
            model: new.model,
            serial_number: new.serial_number,
            order_no: new.order_no,
            license_number: new.license_number,
            notes: new.notes,
            purchased_at: new.purchased_at,
            created_at: now,
            updated_at: now,
        };
        state.assets.insert(record.id, (record.clone(), false));
        Ok(record)
    }

    fn create_person(&self, new: NewPerson) -> Result<Person, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("persons"))?;
        let now = Utc::now();
        let record = Person {
            id: PersonId::new(state.next_id()),
            name: new.name,
            email: new.email,
            phone: new.phone,
            created_at: now,
            updated_at: now,
        };
        state.persons.insert(record.id, (record.clone(), false));
        Ok(record)
    }

    fn asset(&self, id: AssetId) -> Result<Option<Asset>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("assets"))?;
        Ok(state.live_asset(id).cloned())
    }

    fn person(&self, id: PersonId) -> Result<Option<Person>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("persons"))?;
        Ok(state.live_person(id).cloned())
    }

    fn assets(&self) -> Result<Vec<Asset>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("assets"))?;
        let mut assets: Vec<Asset> = state
            .assets
            .values()
            .filter(|(_, deleted)| !deleted)
            .map(|(asset, _)| asset.clone())
            .collect();
        assets.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(assets)
    }

    fn persons(&self) -> Result<Vec<Person>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("persons"))?;
        let mut persons: Vec<Person> = state
            .persons
            .values()
            .filter(|(_, deleted)| !deleted)
            .map(|(person, _)| person.clone())
            .collect();
        persons.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(persons)
    }

    fn unassigned_person(&self) -> Result<Option<Person>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("persons"))?;
        Ok(state
            .persons
            .values()
            .filter(|(person, deleted)| !deleted && person.name == UNASSIGNED_PERSON)
            .map(|(person, _)| person.clone())
            .min_by_key(|person| person.id))
    }

    fn remove_asset(&self, id: AssetId) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("assets"))?;
        match state.assets.get_mut(&id) {
            Some((_, deleted)) if !*deleted => {
                *deleted = true;
                Ok(())
            }
            _ => Err(StorageError::AssetNotFound(id)),
        }
    }

    fn remove_person(&self, id: PersonId) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("persons"))?;
        match state.persons.get_mut(&id) {
            Some((_, deleted)) if !*deleted => {
                *deleted = true;
                Ok(())
            }
            _ => Err(StorageError::PersonNotFound(id)),
        }
    }

    fn define_field(
        &self,
        scope: CustomFieldScope,
        name: &str,
        data_type: FieldDataType,
    ) -> Result<CustomFieldDef, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("field_defs"))?;
        if let Some(existing) = state
            .field_defs
            .values()
            .filter(|(def, deleted)| !deleted && def.scope == scope && def.name == name)
            .map(|(def, _)| def.clone())
            .next()
        {
            return Ok(existing);
        }
        let record = CustomFieldDef {
            id: CustomFieldId::new(state.next_id()),
            scope,
            name: name.to_string(),
            data_type,
        };
        state.field_defs.insert(record.id, (record.clone(), false));
        Ok(record)
    }

    fn field_defs(&self, scope: CustomFieldScope) -> Result<Vec<CustomFieldDef>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("field_defs"))?;
        let mut defs: Vec<CustomFieldDef> = state
            .field_defs
            .values()
            .filter(|(def, deleted)| !deleted && def.scope == scope)
            .map(|(def, _)| def.clone())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(defs)
    }

    fn set_asset_field(
        &self,
        asset_id: AssetId,
        field: CustomFieldId,
        value: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("asset_values"))?;
        if state.live_asset(asset_id).is_none() {
            return Err(StorageError::AssetNotFound(asset_id));
        }
        let defined = matches!(
            state.field_defs.get(&field),
            Some((def, false)) if def.scope == CustomFieldScope::Asset
        );
        if !defined {
            return Err(StorageError::FieldNotDefined(field.to_string()));
        }
        state
            .asset_values
            .insert((asset_id, field), (value.to_string(), false));
        Ok(())
    }

    fn set_person_field(
        &self,
        person_id: PersonId,
        field: CustomFieldId,
        value: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("person_values"))?;
        if state.live_person(person_id).is_none() {
            return Err(StorageError::PersonNotFound(person_id));
        }
        let defined = matches!(
            state.field_defs.get(&field),
            Some((def, false)) if def.scope == CustomFieldScope::Person
        );
        if !defined {
            return Err(StorageError::FieldNotDefined(field.to_string()));
        }
        state
            .person_values
            .insert((person_id, field), (value.to_string(), false));
        Ok(())
    }
}

impl AssignmentStore for MemoryStore {
    fn insert(&self, new: &NewAssignment) -> Result<Assignment, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("assignments"))?;
        let now = Utc::now();
        let row = AssignmentRow {
            id: AssignmentId::new(state.next_id()),
            asset_id: new.asset_id,
            person_id: new.person_id,
            span: new.span,
            note: new.note.clone(),
            created_at: now,
            updated_at: now,
            deleted: false,
        };
        let record = state.to_assignment(&row);
        state.assignments.insert(row.id, row);
        Ok(record)
    }

    fn get(&self, id: AssignmentId) -> Result<Option<Assignment>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("assignments"))?;
        Ok(state
            .assignments
            .get(&id)
            .filter(|row| !row.deleted)
            .map(|row| state.to_assignment(row)))
    }

    fn update(&self, assignment: &Assignment) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("assignments"))?;
        let now = Utc::now();
        match state.assignments.get_mut(&assignment.id) {
            Some(row) if !row.deleted => {
                row.person_id = assignment.person_id;
                row.span = assignment.span;
                row.note = assignment.note.clone();
                row.updated_at = now;
                Ok(())
            }
            _ => Err(StorageError::AssignmentNotFound(assignment.id)),
        }
    }

    fn close(&self, id: AssignmentId, end: DateTime<Utc>) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("assignments"))?;
        let now = Utc::now();
        match state.assignments.get_mut(&id) {
            Some(row) if !row.deleted => {
                row.span.close_at(end);
                row.updated_at = now;
                Ok(())
            }
            _ => Err(StorageError::AssignmentNotFound(id)),
        }
    }

    fn tombstone(&self, id: AssignmentId) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("assignments"))?;
        match state.assignments.get_mut(&id) {
            Some(row) if !row.deleted => {
                row.deleted = true;
                Ok(())
            }
            _ => Err(StorageError::AssignmentNotFound(id)),
        }
    }

    fn for_asset(&self, asset_id: AssetId) -> Result<Vec<Assignment>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("assignments"))?;
        let mut rows: Vec<&AssignmentRow> = state
            .assignments
            .values()
            .filter(|row| !row.deleted && row.asset_id == asset_id)
            .collect();
        rows.sort_by(|a, b| b.span.from.cmp(&a.span.from).then(b.id.cmp(&a.id)));
        Ok(rows.into_iter().map(|row| state.to_assignment(row)).collect())
    }

    fn for_person(&self, person_id: PersonId) -> Result<Vec<Assignment>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("assignments"))?;
        let mut rows: Vec<&AssignmentRow> = state
            .assignments
            .values()
            .filter(|row| !row.deleted && row.person_id == person_id)
            .collect();
        rows.sort_by(|a, b| b.span.from.cmp(&a.span.from).then(b.id.cmp(&a.id)));
        Ok(rows.into_iter().map(|row| state.to_assignment(row)).collect())
    }
}

/// Evaluates one structured condition the way the relational engine
/// would: NULL never satisfies a comparison, numeric columns compare
/// numerically against numeric-looking operands, text columns compare
/// lexicographically on the coerced forms, LIKE is case-insensitive
/// substring.
fn eval_sql_condition(op: Operator, actual: &FieldValue, cmp: &FieldValue) -> bool {
    match op {
        Operator::IsNull => actual.is_null(),
        Operator::IsNotNull => !actual.is_null(),
        Operator::Like | Operator::NotLike => {
            if actual.is_null() {
                return false;
            }
            let hit = actual
                .coerce_text()
                .to_lowercase()
                .contains(&cmp.coerce_text().to_lowercase());
            if op == Operator::Like {
                hit
            } else {
                !hit
            }
        }
        Operator::Eq | Operator::Ne | Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le => {
            if actual.is_null() {
                return false;
            }
            let ordering = match actual {
                FieldValue::Int(_) | FieldValue::Float(_) => {
                    let lhs = match actual {
                        FieldValue::Int(i) => *i as f64,
                        FieldValue::Float(f) => *f,
                        _ => unreachable!(),
                    };
                    match numeric_operand(cmp) {
                        Some(rhs) => lhs.partial_cmp(&rhs),
                        // Numbers sort before text in the relational
                        // engine's cross-type ordering.
                        None => Some(std::cmp::Ordering::Less),
                    }
                }
                _ => Some(actual.coerce_text().cmp(&cmp.coerce_text())),
            };
            let Some(ordering) = ordering else {
                return false;
            };
            match op {
                Operator::Eq => ordering == std::cmp::Ordering::Equal,
                Operator::Ne => ordering != std::cmp::Ordering::Equal,
                Operator::Gt => ordering == std::cmp::Ordering::Greater,
                Operator::Lt => ordering == std::cmp::Ordering::Less,
                Operator::Ge => ordering != std::cmp::Ordering::Less,
                Operator::Le => ordering != std::cmp::Ordering::Greater,
                _ => unreachable!(),
            }
        }
    }
}

fn numeric_operand(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Int(i) => Some(*i as f64),
        FieldValue::Float(f) => Some(*f),
        FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
        FieldValue::Bool(_) | FieldValue::Null => None,
    }
}

/// Folds the structured sub-chain with the same skip semantics the
/// compiled path has: unresolvable fields and unrecognized operators
/// contribute nothing, leaving their connectors behind.
fn matches_structured(
    conditions: &[FilterCondition],
    resolve: impl Fn(&str) -> Option<&'static str>,
    value_of: impl Fn(&'static str) -> FieldValue,
) -> bool {
    fold_chain(
        conditions,
        |cond| {
            let column = resolve(&cond.field)?;
            let op = Operator::parse(&cond.operator)?;
            Some(eval_sql_condition(op, &value_of(column), &cond.value))
        },
        |lhs, op, rhs| op.apply(lhs, rhs),
    )
    .unwrap_or(true)
}

struct AssetRowContext<'a> {
    asset: &'a Asset,
    type_name: Option<&'a str>,
    holder: Option<&'a Person>,
}

impl AssetRowContext<'_> {
    fn column_value(&self, column: &str) -> FieldValue {
        match column {
            "a.id" => FieldValue::Int(self.asset.id.raw()),
            "a.name" => self.asset.name.as_str().into(),
            "a.model" => self.asset.model.as_str().into(),
            "a.serial_number" => self.asset.serial_number.as_str().into(),
            "a.order_no" => self.asset.order_no.as_str().into(),
            "a.license_number" => self.asset.license_number.as_str().into(),
            "a.notes" => self.asset.notes.as_str().into(),
            "a.purchased_at" => self.asset.purchased_at.map(ts_text).into(),
            "at.name" => self.type_name.into(),
            "p.name" => self.holder.map(|p| p.name.as_str()).into(),
            "p.email" => self.holder.map(|p| p.email.as_str()).into(),
            "p.phone" => self.holder.map(|p| p.phone.as_str()).into(),
            _ => FieldValue::Null,
        }
    }

    fn to_row(&self, holder_id: Option<PersonId>) -> ReportRow {
        let mut row = ReportRow::new();
        row.set("id", self.asset.id.raw());
        row.set("asset_type_id", self.asset.asset_type_id.raw());
        row.set("name", self.asset.name.as_str());
        row.set("model", self.asset.model.as_str());
        row.set("serial_number", self.asset.serial_number.as_str());
        row.set("order_no", self.asset.order_no.as_str());
        row.set("license_number", self.asset.license_number.as_str());
        row.set("notes", self.asset.notes.as_str());
        row.set(
            "purchased_at",
            FieldValue::from(self.asset.purchased_at.map(ts_text)),
        );
        row.set("created_at", ts_text(self.asset.created_at));
        row.set("updated_at", ts_text(self.asset.updated_at));
        row.set("deleted_at", FieldValue::Null);
        row.set(
            "asset_type_name",
            FieldValue::from(self.type_name.map(ToString::to_string)),
        );
        row.set(
            "current_assignee",
            self.holder
                .map_or(UNASSIGNED_PERSON, |person| person.name.as_str()),
        );
        row.set(
            "current_assignee_id",
            FieldValue::from(holder_id.map(PersonId::raw)),
        );
        row
    }
}

impl MemoryStore {
    fn asset_rows_where(
        &self,
        now: DateTime<Utc>,
        keep: impl Fn(&AssetRowContext<'_>) -> bool,
    ) -> Result<Vec<ReportRow>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("report"))?;
        let mut assets: Vec<&Asset> = state
            .assets
            .values()
            .filter(|(_, deleted)| !deleted)
            .map(|(asset, _)| asset)
            .collect();
        assets.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        let mut rows = Vec::new();
        for asset in assets {
            let holder_row = state.current_holder(asset.id, now);
            let holder_id = holder_row.map(|row| row.person_id);
            let holder = holder_id.and_then(|id| state.persons.get(&id)).map(|(p, _)| p);
            let ctx = AssetRowContext {
                asset,
                type_name: state
                    .asset_types
                    .get(&asset.asset_type_id)
                    .map(|ty| ty.name.as_str()),
                holder,
            };
            if keep(&ctx) {
                rows.push(ctx.to_row(holder_id));
            }
        }
        Ok(rows)
    }
}

impl ReportStore for MemoryStore {
    fn asset_rows(
        &self,
        structured: &[FilterCondition],
        now: DateTime<Utc>,
    ) -> Result<Vec<ReportRow>, StorageError> {
        self.asset_rows_where(now, |ctx| {
            matches_structured(structured, classify::asset_report_column, |column| {
                ctx.column_value(column)
            })
        })
    }

    fn person_rows(&self, structured: &[FilterCondition]) -> Result<Vec<ReportRow>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("report"))?;
        let mut persons: Vec<&Person> = state
            .persons
            .values()
            .filter(|(person, deleted)| !deleted && person.name != UNASSIGNED_PERSON)
            .map(|(person, _)| person)
            .collect();
        persons.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        let mut rows = Vec::new();
        for person in persons {
            let keep = matches_structured(structured, classify::person_report_column, |column| {
                match column {
                    "p.name" => person.name.as_str().into(),
                    "p.email" => person.email.as_str().into(),
                    "p.phone" => person.phone.as_str().into(),
                    _ => FieldValue::Null,
                }
            });
            if keep {
                let mut row = ReportRow::new();
                row.set("id", person.id.raw());
                row.set("name", person.name.as_str());
                row.set("email", person.email.as_str());
                row.set("phone", person.phone.as_str());
                row.set("created_at", ts_text(person.created_at));
                row.set("updated_at", ts_text(person.updated_at));
                row.set("deleted_at", FieldValue::Null);
                rows.push(row);
            }
        }
        Ok(rows)
    }

    fn asset_rows_for_type(
        &self,
        asset_type_id: AssetTypeId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReportRow>, StorageError> {
        self.asset_rows_where(now, |ctx| ctx.asset.asset_type_id == asset_type_id)
    }

    fn asset_fields(&self, asset_id: AssetId) -> Result<Vec<(String, String)>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("asset_values"))?;
        let mut fields: Vec<(String, String)> = state
            .asset_values
            .iter()
            .filter(|(_, (_, deleted))| !deleted)
            .filter(|((owner, _), _)| *owner == asset_id)
            .filter_map(|((_, field), (value, _))| {
                let (def, deleted) = state.field_defs.get(field)?;
                (!deleted).then(|| (def.name.clone(), value.clone()))
            })
            .collect();
        fields.sort();
        Ok(fields)
    }

    fn person_fields(&self, person_id: PersonId) -> Result<Vec<(String, String)>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("person_values"))?;
        let mut fields: Vec<(String, String)> = state
            .person_values
            .iter()
            .filter(|(_, (_, deleted))| !deleted)
            .filter(|((owner, _), _)| *owner == person_id)
            .filter_map(|((_, field), (value, _))| {
                let (def, deleted) = state.field_defs.get(field)?;
                (!deleted).then(|| (def.name.clone(), value.clone()))
            })
            .collect();
        fields.sort();
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_assets() -> (MemoryStore, AssetId, AssetId, PersonId) {
        let store = MemoryStore::new();
        let ty = store.create_asset_type("Laptop", "portables").unwrap();
        let a1 = store
            .create_asset(NewAsset {
                serial_number: "SN-1".to_string(),
                ..NewAsset::named(ty.id, "Alpha")
            })
            .unwrap();
        let a2 = store
            .create_asset(NewAsset {
                serial_number: "SN-2".to_string(),
                ..NewAsset::named(ty.id, "Beta")
            })
            .unwrap();
        let holder = store
            .create_person(NewPerson {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                phone: String::new(),
            })
            .unwrap();
        store
            .insert(&NewAssignment {
                asset_id: a1.id,
                person_id: holder.id,
                span: Timespan::starting_at(Utc::now() - chrono::Duration::days(3)),
                note: String::new(),
            })
            .unwrap();
        (store, a1.id, a2.id, holder.id)
    }

    #[test]
    fn test_create_asset_requires_type() {
        let store = MemoryStore::new();
        let err = store
            .create_asset(NewAsset::named(AssetTypeId::new(99), "X"))
            .unwrap_err();
        assert!(matches!(err, StorageError::AssetTypeNotFound(_)));
    }

    #[test]
    fn test_asset_rows_resolve_holder_and_type() {
        let (store, a1, _, _) = store_with_assets();
        let rows = store.asset_rows(&[], Utc::now()).unwrap();
        assert_eq!(rows.len(), 2);
        // Ordered by name: Alpha (held by Ada), then Beta (unassigned).
        assert_eq!(rows[0].get("id"), Some(&FieldValue::Int(a1.raw())));
        assert_eq!(rows[0].get("current_assignee"), Some(&FieldValue::from("Ada")));
        assert_eq!(rows[0].get("asset_type_name"), Some(&FieldValue::from("Laptop")));
        assert_eq!(
            rows[1].get("current_assignee"),
            Some(&FieldValue::from(UNASSIGNED_PERSON))
        );
        assert!(rows[1].get("current_assignee_id").unwrap().is_null());
    }

    #[test]
    fn test_structured_filter_on_holder_columns() {
        let (store, a1, _, _) = store_with_assets();
        let rows = store
            .asset_rows(
                &[FilterCondition::new("Email", "LIKE", "ada@")],
                Utc::now(),
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&FieldValue::Int(a1.raw())));

        // Unassigned assets have NULL holder columns; IS NULL sees them.
        let rows = store
            .asset_rows(
                &[FilterCondition::new("CurrentAssignee", "IS NULL", FieldValue::Null)],
                Utc::now(),
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&FieldValue::from("Beta")));
    }

    #[test]
    fn test_null_holder_never_matches_comparisons() {
        let (store, _, _, _) = store_with_assets();
        // `!=` on a NULL column is not a match in SQL; the unassigned
        // asset must not slip through.
        let rows = store
            .asset_rows(
                &[FilterCondition::new("CurrentAssignee", "!=", "Ada")],
                Utc::now(),
            )
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_numeric_column_comparison() {
        let (store, a1, a2, _) = store_with_assets();
        let rows = store
            .asset_rows(
                &[FilterCondition::new("ID", ">", FieldValue::Int(a1.raw()))],
                Utc::now(),
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&FieldValue::Int(a2.raw())));
    }

    #[test]
    fn test_person_rows_exclude_sentinel() {
        let (store, _, _, _) = store_with_assets();
        store
            .create_person(NewPerson::named(UNASSIGNED_PERSON))
            .unwrap();
        let rows = store.person_rows(&[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&FieldValue::from("Ada")));
        assert!(store.unassigned_person().unwrap().is_some());
    }

    #[test]
    fn test_custom_field_upsert_and_listing() {
        let (store, a1, _, _) = store_with_assets();
        let color = store
            .define_field(CustomFieldScope::Asset, "Color", FieldDataType::String)
            .unwrap();
        // Defining again returns the same definition.
        let again = store
            .define_field(CustomFieldScope::Asset, "Color", FieldDataType::String)
            .unwrap();
        assert_eq!(again.id, color.id);

        store.set_asset_field(a1, color.id, "red").unwrap();
        store.set_asset_field(a1, color.id, "blue").unwrap();
        assert_eq!(
            store.asset_fields(a1).unwrap(),
            vec![("Color".to_string(), "blue".to_string())]
        );

        let err = store
            .set_person_field(PersonId::new(1), color.id, "x")
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::PersonNotFound(_) | StorageError::FieldNotDefined(_)
        ));
    }

    #[test]
    fn test_soft_delete_hides_rows() {
        let (store, a1, a2, _) = store_with_assets();
        store.remove_asset(a2).unwrap();
        assert!(store.asset(a2).unwrap().is_none());
        let rows = store.asset_rows(&[], Utc::now()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&FieldValue::Int(a1.raw())));
    }
}
