//! SQLite storage backend.
//!
//! The relational backing store. Report filtering here is the compiled
//! path: the structured sub-chain becomes the WHERE clause of the base
//! query via [`compile_chain`], with parameters bound in fold order.
//! Timestamps are stored as RFC 3339 UTC text, which compares
//! chronologically under SQLite's text ordering.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::debug;

use crate::classify;
use crate::filter::{compile_chain, FilterCondition};
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

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS asset_types (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    deleted_at  TEXT
);
CREATE TABLE IF NOT EXISTS assets (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_type_id  INTEGER NOT NULL REFERENCES asset_types(id),
    name           TEXT NOT NULL,
    model          TEXT NOT NULL DEFAULT '',
    serial_number  TEXT NOT NULL DEFAULT '',
    order_no       TEXT NOT NULL DEFAULT '',
    license_number TEXT NOT NULL DEFAULT '',
    notes          TEXT NOT NULL DEFAULT '',
    purchased_at   TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    deleted_at     TEXT
);
CREATE TABLE IF NOT EXISTS persons (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL,
    email      TEXT NOT NULL DEFAULT '',
    phone      TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);
CREATE TABLE IF NOT EXISTS custom_fields (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    scope      TEXT NOT NULL CHECK (scope IN ('asset', 'person')),
    name       TEXT NOT NULL,
    data_type  TEXT NOT NULL DEFAULT 'string',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);
CREATE TABLE IF NOT EXISTS asset_field_values (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id   INTEGER NOT NULL REFERENCES assets(id),
    field_id   INTEGER NOT NULL REFERENCES custom_fields(id),
    value      TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);
CREATE TABLE IF NOT EXISTS person_field_values (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id  INTEGER NOT NULL REFERENCES persons(id),
    field_id   INTEGER NOT NULL REFERENCES custom_fields(id),
    value      TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);
CREATE TABLE IF NOT EXISTS asset_assignments (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id       INTEGER NOT NULL REFERENCES assets(id),
    person_id      INTEGER NOT NULL REFERENCES persons(id),
    effective_from TEXT NOT NULL,
    effective_to   TEXT,
    notes          TEXT NOT NULL DEFAULT '',
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    deleted_at     TEXT
);
CREATE INDEX IF NOT EXISTS idx_assignments_asset ON asset_assignments(asset_id);
CREATE INDEX IF NOT EXISTS idx_assignments_person ON asset_assignments(person_id);
";

const ASSIGNMENT_SELECT: &str = "
SELECT aa.id, aa.asset_id, aa.person_id, aa.effective_from, aa.effective_to, aa.notes,
       aa.created_at, aa.updated_at,
       COALESCE(a.name, '') AS asset_name, COALESCE(p.name, '') AS person_name
FROM asset_assignments aa
LEFT JOIN assets a ON aa.asset_id = a.id
LEFT JOIN persons p ON aa.person_id = p.id
";

const ASSET_REPORT_BASE: &str = "
SELECT a.id, a.asset_type_id, a.name, a.model, a.serial_number, a.order_no,
       a.license_number, a.notes, a.purchased_at, a.created_at, a.updated_at, a.deleted_at,
       at.name AS asset_type_name,
       COALESCE(p.name, 'Unassigned') AS current_assignee,
       asgn.person_id AS current_assignee_id
FROM assets a
LEFT JOIN asset_types at ON a.asset_type_id = at.id
LEFT JOIN (
    SELECT asset_id, person_id,
           ROW_NUMBER() OVER (PARTITION BY asset_id ORDER BY effective_from DESC, id DESC) AS rn
    FROM asset_assignments
    WHERE deleted_at IS NULL AND (effective_to IS NULL OR effective_to > ?)
) asgn ON a.id = asgn.asset_id AND asgn.rn = 1
LEFT JOIN persons p ON asgn.person_id = p.id
WHERE a.deleted_at IS NULL
";

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::BackendError(err.to_string())
    }
}

fn lock_err() -> StorageError {
    StorageError::BackendError("poisoned connection lock".to_string())
}

fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| StorageError::BackendError(format!("bad timestamp '{raw}': {err}")))
}

fn parse_opt_ts(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, StorageError> {
    raw.map(parse_ts).transpose()
}

fn sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(b) => Value::Integer(i64::from(*b)),
        FieldValue::Int(i) => Value::Integer(*i),
        FieldValue::Float(f) => Value::Real(*f),
        FieldValue::Text(s) => Value::Text(s.clone()),
    }
}

fn field_value(value: ValueRef<'_>) -> FieldValue {
    match value {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(i) => FieldValue::Int(i),
        ValueRef::Real(f) => FieldValue::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            FieldValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn scope_text(scope: CustomFieldScope) -> &'static str {
    match scope {
        CustomFieldScope::Asset => "asset",
        CustomFieldScope::Person => "person",
    }
}

fn data_type_text(data_type: FieldDataType) -> &'static str {
    match data_type {
        FieldDataType::String => "string",
        FieldDataType::Int => "int",
        FieldDataType::Decimal => "decimal",
        FieldDataType::Boolean => "boolean",
        FieldDataType::Date => "date",
        FieldDataType::Datetime => "datetime",
        FieldDataType::Enum => "enum",
    }
}

fn parse_data_type(raw: &str) -> FieldDataType {
    match raw {
        "int" => FieldDataType::Int,
        "decimal" => FieldDataType::Decimal,
        "boolean" => FieldDataType::Boolean,
        "date" => FieldDataType::Date,
        "datetime" => FieldDataType::Datetime,
        "enum" => FieldDataType::Enum,
        _ => FieldDataType::String,
    }
}

struct RawAssignment {
    id: i64,
    asset_id: i64,
    person_id: i64,
    from: String,
    to: Option<String>,
    note: String,
    created_at: String,
    updated_at: String,
    asset_name: String,
    person_name: String,
}

impl RawAssignment {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            asset_id: row.get(1)?,
            person_id: row.get(2)?,
            from: row.get(3)?,
            to: row.get(4)?,
            note: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
            asset_name: row.get(8)?,
            person_name: row.get(9)?,
        })
    }

    fn into_assignment(self) -> Result<Assignment, StorageError> {
        Ok(Assignment {
            id: AssignmentId::new(self.id),
            asset_id: AssetId::new(self.asset_id),
            person_id: PersonId::new(self.person_id),
            span: Timespan {
                from: parse_ts(&self.from)?,
                to: parse_opt_ts(self.to.as_deref())?,
            },
            note: self.note,
            asset_name: self.asset_name,
            person_name: self.person_name,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

/// SQLite-backed store implementing every storage trait.
///
/// A single connection behind a mutex: one logical operation acquires
/// it, runs its statement(s), and releases it. No state is cached
/// between calls.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) a database file and bootstraps the
    /// schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens a fresh private in-memory database.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn assignments_where(
        &self,
        where_clause: &str,
        id: i64,
    ) -> Result<Vec<Assignment>, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let sql = format!(
            "{ASSIGNMENT_SELECT} WHERE {where_clause} AND aa.deleted_at IS NULL \
             ORDER BY aa.effective_from DESC, aa.id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let raw: Vec<RawAssignment> = stmt
            .query_map(params![id], RawAssignment::from_row)?
            .collect::<rusqlite::Result<_>>()?;
        raw.into_iter().map(RawAssignment::into_assignment).collect()
    }

    fn query_rows(
        conn: &Connection,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Vec<ReportRow>, StorageError> {
        debug!(sql, params = params.len(), "report query");
        let mut stmt = conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().iter().map(ToString::to_string).collect();
        let mut rows = stmt.query(params_from_iter(params))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut report_row = ReportRow::new();
            for (i, name) in names.iter().enumerate() {
                report_row.set(name.clone(), field_value(row.get_ref(i)?));
            }
            out.push(report_row);
        }
        Ok(out)
    }

    fn entity_fields(
        &self,
        sql: &str,
        owner_id: i64,
    ) -> Result<Vec<(String, String)>, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let mut stmt = conn.prepare(sql)?;
        let fields = stmt
            .query_map(params![owner_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<_>>()?;
        Ok(fields)
    }
}

impl DirectoryStore for SqliteStore {
    fn create_asset_type(
        &self,
        name: &str,
        description: &str,
    ) -> Result<AssetType, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO asset_types (name, description, created_at, updated_at) \
             VALUES (?, ?, ?, ?)",
            params![name, description, ts(now), ts(now)],
        )?;
        Ok(AssetType {
            id: AssetTypeId::new(conn.last_insert_rowid()),
            name: name.to_string(),
            description: description.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    fn create_asset(&self, new: NewAsset) -> Result<Asset, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let type_exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM asset_types WHERE id = ? AND deleted_at IS NULL",
                params![new.asset_type_id.raw()],
                |row| row.get(0),
            )
            .optional()?;
        if type_exists.is_none() {
            return Err(StorageError::AssetTypeNotFound(new.asset_type_id));
        }

        let now = Utc::now();
        conn.execute(
            "INSERT INTO assets (asset_type_id, name, model, serial_number, order_no, \
             license_number, notes, purchased_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                new.asset_type_id.raw(),
                new.name,
                new.model,
                new.serial_number,
                new.order_no,
                new.license_number,
                new.notes,
                new.purchased_at.map(ts),
                ts(now),
                ts(now),
            ],
        )?;
        Ok(Asset {
            id: AssetId::new(conn.last_insert_rowid()),
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
        })
    }

    fn create_person(&self, new: NewPerson) -> Result<Person, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO persons (name, email, phone, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
            params![new.name, new.email, new.phone, ts(now), ts(now)],
        )?;
        Ok(Person {
            id: PersonId::new(conn.last_insert_rowid()),
            name: new.name,
            email: new.email,
            phone: new.phone,
            created_at: now,
            updated_at: now,
        })
    }

    fn asset(&self, id: AssetId) -> Result<Option<Asset>, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let raw = conn
            .query_row(
                "SELECT id, asset_type_id, name, model, serial_number, order_no, \
                 license_number, notes, purchased_at, created_at, updated_at \
                 FROM assets WHERE id = ? AND deleted_at IS NULL",
                params![id.raw()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, Option<String>>(8)?,
                        row.get::<_, String>(9)?,
                        row.get::<_, String>(10)?,
                    ))
                },
            )
            .optional()?;
        raw.map(
            |(id, type_id, name, model, serial, order, license, notes, purchased, created, updated)| {
                Ok(Asset {
                    id: AssetId::new(id),
                    asset_type_id: AssetTypeId::new(type_id),
                    name,
                    model,
                    serial_number: serial,
                    order_no: order,
                    license_number: license,
                    notes,
                    purchased_at: parse_opt_ts(purchased.as_deref())?,
                    created_at: parse_ts(&created)?,
                    updated_at: parse_ts(&updated)?,
                })
            },
        )
        .transpose()
    }

    fn person(&self, id: PersonId) -> Result<Option<Person>, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        person_row(
            &conn,
            "SELECT id, name, email, phone, created_at, updated_at \
             FROM persons WHERE id = ? AND deleted_at IS NULL",
            Value::Integer(id.raw()),
        )
    }

    fn assets(&self) -> Result<Vec<Asset>, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let mut stmt = conn.prepare(
            "SELECT id, asset_type_id, name, model, serial_number, order_no, \
             license_number, notes, purchased_at, created_at, updated_at \
             FROM assets WHERE deleted_at IS NULL ORDER BY name, id",
        )?;
        let raw: Vec<(
            i64,
            i64,
            String,
            String,
            String,
            String,
            String,
            String,
            Option<String>,
            String,
            String,
        )> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                    row.get(10)?,
                ))
            })?
            .collect::<rusqlite::Result<_>>()?;
        raw.into_iter()
            .map(
                |(id, type_id, name, model, serial, order, license, notes, purchased, created, updated)| {
                    Ok(Asset {
                        id: AssetId::new(id),
                        asset_type_id: AssetTypeId::new(type_id),
                        name,
                        model,
                        serial_number: serial,
                        order_no: order,
                        license_number: license,
                        notes,
                        purchased_at: parse_opt_ts(purchased.as_deref())?,
                        created_at: parse_ts(&created)?,
                        updated_at: parse_ts(&updated)?,
                    })
                },
            )
            .collect()
    }

    fn persons(&self) -> Result<Vec<Person>, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let mut stmt = conn.prepare(
            "SELECT id, name, email, phone, created_at, updated_at \
             FROM persons WHERE deleted_at IS NULL ORDER BY name, id",
        )?;
        let raw: Vec<(i64, String, String, String, String, String)> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<rusqlite::Result<_>>()?;
        raw.into_iter()
            .map(|(id, name, email, phone, created, updated)| {
                Ok(Person {
                    id: PersonId::new(id),
                    name,
                    email,
                    phone,
                    created_at: parse_ts(&created)?,
                    updated_at: parse_ts(&updated)?,
                })
            })
            .collect()
    }

    fn unassigned_person(&self) -> Result<Option<Person>, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        person_row(
            &conn,
            "SELECT id, name, email, phone, created_at, updated_at \
             FROM persons WHERE name = ? AND deleted_at IS NULL ORDER BY id LIMIT 1",
            Value::Text(UNASSIGNED_PERSON.to_string()),
        )
    }

    fn remove_asset(&self, id: AssetId) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let changed = conn.execute(
            "UPDATE assets SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
            params![ts(Utc::now()), id.raw()],
        )?;
        if changed == 0 {
            return Err(StorageError::AssetNotFound(id));
        }
        Ok(())
    }

    fn remove_person(&self, id: PersonId) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let changed = conn.execute(
            "UPDATE persons SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
            params![ts(Utc::now()), id.raw()],
        )?;
        if changed == 0 {
            return Err(StorageError::PersonNotFound(id));
        }
        Ok(())
    }

    fn define_field(
        &self,
        scope: CustomFieldScope,
        name: &str,
        data_type: FieldDataType,
    ) -> Result<CustomFieldDef, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let existing: Option<(i64, String)> = conn
            .query_row(
                "SELECT id, data_type FROM custom_fields \
                 WHERE scope = ? AND name = ? AND deleted_at IS NULL",
                params![scope_text(scope), name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        if let Some((id, existing_type)) = existing {
            return Ok(CustomFieldDef {
                id: CustomFieldId::new(id),
                scope,
                name: name.to_string(),
                data_type: parse_data_type(&existing_type),
            });
        }

        let now = ts(Utc::now());
        conn.execute(
            "INSERT INTO custom_fields (scope, name, data_type, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
            params![scope_text(scope), name, data_type_text(data_type), now, now],
        )?;
        Ok(CustomFieldDef {
            id: CustomFieldId::new(conn.last_insert_rowid()),
            scope,
            name: name.to_string(),
            data_type,
        })
    }

    fn field_defs(&self, scope: CustomFieldScope) -> Result<Vec<CustomFieldDef>, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let mut stmt = conn.prepare(
            "SELECT id, name, data_type FROM custom_fields \
             WHERE scope = ? AND deleted_at IS NULL ORDER BY name",
        )?;
        let defs = stmt
            .query_map(params![scope_text(scope)], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(|(id, name, data_type)| CustomFieldDef {
                id: CustomFieldId::new(id),
                scope,
                name,
                data_type: parse_data_type(&data_type),
            })
            .collect();
        Ok(defs)
    }

    fn set_asset_field(
        &self,
        asset_id: AssetId,
        field: CustomFieldId,
        value: &str,
    ) -> Result<(), StorageError> {
        self.set_field_value(
            field,
            CustomFieldScope::Asset,
            "asset_field_values",
            "asset_id",
            asset_id.raw(),
            value,
            || StorageError::AssetNotFound(asset_id),
            "SELECT id FROM assets WHERE id = ? AND deleted_at IS NULL",
        )
    }

    fn set_person_field(
        &self,
        person_id: PersonId,
        field: CustomFieldId,
        value: &str,
    ) -> Result<(), StorageError> {
        self.set_field_value(
            field,
            CustomFieldScope::Person,
            "person_field_values",
            "person_id",
            person_id.raw(),
            value,
            || StorageError::PersonNotFound(person_id),
            "SELECT id FROM persons WHERE id = ? AND deleted_at IS NULL",
        )
    }
}

fn person_row(
    conn: &Connection,
    sql: &str,
    param: Value,
) -> Result<Option<Person>, StorageError> {
    let raw = conn
        .query_row(sql, params![param], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })
        .optional()?;
    raw.map(|(id, name, email, phone, created, updated)| {
        Ok(Person {
            id: PersonId::new(id),
            name,
            email,
            phone,
            created_at: parse_ts(&created)?,
            updated_at: parse_ts(&updated)?,
        })
    })
    .transpose()
}

impl SqliteStore {
    #[allow(clippy::too_many_arguments)]
    fn set_field_value(
        &self,
        field: CustomFieldId,
        scope: CustomFieldScope,
        table: &str,
        owner_column: &str,
        owner_id: i64,
        value: &str,
        missing_owner: impl FnOnce() -> StorageError,
        owner_check_sql: &str,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let owner: Option<i64> = conn
            .query_row(owner_check_sql, params![owner_id], |row| row.get(0))
            .optional()?;
        if owner.is_none() {
            return Err(missing_owner());
        }

        let def_scope: Option<String> = conn
            .query_row(
                "SELECT scope FROM custom_fields WHERE id = ? AND deleted_at IS NULL",
                params![field.raw()],
                |row| row.get(0),
            )
            .optional()?;
        if def_scope.as_deref() != Some(scope_text(scope)) {
            return Err(StorageError::FieldNotDefined(field.to_string()));
        }

        let now = ts(Utc::now());
        let existing: Option<i64> = conn
            .query_row(
                &format!(
                    "SELECT id FROM {table} \
                     WHERE {owner_column} = ? AND field_id = ? AND deleted_at IS NULL"
                ),
                params![owner_id, field.raw()],
                |row| row.get(0),
            )
            .optional()?;
        match existing {
            Some(row_id) => {
                conn.execute(
                    &format!("UPDATE {table} SET value = ?, updated_at = ? WHERE id = ?"),
                    params![value, now, row_id],
                )?;
            }
            None => {
                conn.execute(
                    &format!(
                        "INSERT INTO {table} ({owner_column}, field_id, value, created_at, updated_at) \
                         VALUES (?, ?, ?, ?, ?)"
                    ),
                    params![owner_id, field.raw(), value, now, now],
                )?;
            }
        }
        Ok(())
    }
}

impl AssignmentStore for SqliteStore {
    fn insert(&self, new: &NewAssignment) -> Result<Assignment, StorageError> {
        let id = {
            let conn = self.conn.lock().map_err(|_| lock_err())?;
            let now = ts(Utc::now());
            conn.execute(
                "INSERT INTO asset_assignments \
                 (asset_id, person_id, effective_from, effective_to, notes, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    new.asset_id.raw(),
                    new.person_id.raw(),
                    ts(new.span.from),
                    new.span.to.map(ts),
                    new.note,
                    now,
                    now,
                ],
            )?;
            AssignmentId::new(conn.last_insert_rowid())
        };
        self.get(id)?
            .ok_or_else(|| StorageError::AssignmentNotFound(id))
    }

    fn get(&self, id: AssignmentId) -> Result<Option<Assignment>, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let sql = format!("{ASSIGNMENT_SELECT} WHERE aa.id = ? AND aa.deleted_at IS NULL");
        let raw = conn
            .query_row(&sql, params![id.raw()], RawAssignment::from_row)
            .optional()?;
        raw.map(RawAssignment::into_assignment).transpose()
    }

    fn update(&self, assignment: &Assignment) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let changed = conn.execute(
            "UPDATE asset_assignments \
             SET person_id = ?, effective_from = ?, effective_to = ?, notes = ?, updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL",
            params![
                assignment.person_id.raw(),
                ts(assignment.span.from),
                assignment.span.to.map(ts),
                assignment.note,
                ts(Utc::now()),
                assignment.id.raw(),
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::AssignmentNotFound(assignment.id));
        }
        Ok(())
    }

    fn close(&self, id: AssignmentId, end: DateTime<Utc>) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let changed = conn.execute(
            "UPDATE asset_assignments SET effective_to = ?, updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL",
            params![ts(end), ts(Utc::now()), id.raw()],
        )?;
        if changed == 0 {
            return Err(StorageError::AssignmentNotFound(id));
        }
        Ok(())
    }

    fn tombstone(&self, id: AssignmentId) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let changed = conn.execute(
            "UPDATE asset_assignments SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
            params![ts(Utc::now()), id.raw()],
        )?;
        if changed == 0 {
            return Err(StorageError::AssignmentNotFound(id));
        }
        Ok(())
    }

    fn for_asset(&self, asset_id: AssetId) -> Result<Vec<Assignment>, StorageError> {
        self.assignments_where("aa.asset_id = ?", asset_id.raw())
    }

    fn for_person(&self, person_id: PersonId) -> Result<Vec<Assignment>, StorageError> {
        self.assignments_where("aa.person_id = ?", person_id.raw())
    }
}

impl ReportStore for SqliteStore {
    fn asset_rows(
        &self,
        structured: &[FilterCondition],
        now: DateTime<Utc>,
    ) -> Result<Vec<ReportRow>, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let mut sql = ASSET_REPORT_BASE.to_string();
        let mut params = vec![Value::Text(ts(now))];
        if let Some(clause) = compile_chain(structured, classify::asset_report_column) {
            sql.push_str(" AND (");
            sql.push_str(&clause.text);
            sql.push(')');
            params.extend(clause.params.iter().map(sql_value));
        }
        sql.push_str(" ORDER BY a.name, a.id");
        Self::query_rows(&conn, &sql, params)
    }

    fn person_rows(&self, structured: &[FilterCondition]) -> Result<Vec<ReportRow>, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let mut sql = "SELECT p.id, p.name, p.email, p.phone, p.created_at, p.updated_at, \
                       p.deleted_at \
                       FROM persons p \
                       WHERE p.deleted_at IS NULL AND p.name != ?"
            .to_string();
        let mut params = vec![Value::Text(UNASSIGNED_PERSON.to_string())];
        if let Some(clause) = compile_chain(structured, classify::person_report_column) {
            sql.push_str(" AND (");
            sql.push_str(&clause.text);
            sql.push(')');
            params.extend(clause.params.iter().map(sql_value));
        }
        sql.push_str(" ORDER BY p.name, p.id");
        Self::query_rows(&conn, &sql, params)
    }

    fn asset_rows_for_type(
        &self,
        asset_type_id: AssetTypeId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReportRow>, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let sql = format!("{ASSET_REPORT_BASE} AND a.asset_type_id = ? ORDER BY a.name, a.id");
        let params = vec![Value::Text(ts(now)), Value::Integer(asset_type_id.raw())];
        Self::query_rows(&conn, &sql, params)
    }

    fn asset_fields(&self, asset_id: AssetId) -> Result<Vec<(String, String)>, StorageError> {
        self.entity_fields(
            "SELECT f.name, v.value FROM asset_field_values v \
             JOIN custom_fields f ON v.field_id = f.id \
             WHERE v.asset_id = ? AND v.deleted_at IS NULL AND f.deleted_at IS NULL \
             ORDER BY f.name",
            asset_id.raw(),
        )
    }

    fn person_fields(&self, person_id: PersonId) -> Result<Vec<(String, String)>, StorageError> {
        self.entity_fields(
            "SELECT f.name, v.value FROM person_field_values v \
             JOIN custom_fields f ON v.field_id = f.id \
             WHERE v.person_id = ? AND v.deleted_at IS NULL AND f.deleted_at IS NULL \
             ORDER BY f.name",
            person_id.raw(),
        )
    }
}
