//! # Custodia - asset custody tracking
//!
//! Custodia tracks organizational assets and the people they are lent
//! to. Two coupled subsystems make up the core:
//!
//! - **Assignment ledger**: per-asset history of non-overlapping,
//!   half-open holding intervals, with atomic-looking supersession
//!   (`assign` ends the current interval and opens the next).
//! - **Report query engine**: compiles a client-supplied chain of filter
//!   conditions into a hybrid evaluation - structured fields pushed into
//!   the backing query, dynamic custom fields matched in-memory after
//!   rows materialize - with one shared left-to-right boolean fold
//!   keeping both paths in agreement.
//!
//! Storage is pluggable: an in-memory backend for embedded use and
//! tests, and a SQLite backend as the relational store.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chrono::Utc;
//! use custodia::{
//!     AssignmentLedger, EntityKind, FilterCondition, NewAsset, NewPerson,
//!     ReportQueryEngine, ReportRequest, SqliteStore,
//! };
//!
//! let store = Arc::new(SqliteStore::open("custodia.sqlite")?);
//! let ledger = AssignmentLedger::new(store.clone());
//! let reports = ReportQueryEngine::new(store.clone());
//!
//! ledger.assign(asset.id, person.id, "onboarding kit", Utc::now())?;
//!
//! let rows = reports.execute(&ReportRequest::filtered(
//!     EntityKind::Asset,
//!     vec![FilterCondition::new("prop_Color", "=", "red")],
//! ))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod classify;
pub mod error;
pub mod filter;
pub mod ids;
pub mod ledger;
pub mod record;
pub mod report;
pub mod storage;
pub mod time;
pub mod value;

// Re-export primary types at crate root for convenience
pub use error::{CustodiaError, CustodiaResult, LedgerError, ValidationError};
pub use filter::{
    compile_chain, fold_chain, matches_chain, matches_condition, Connector, FilterCondition,
    Operator, QueryClause,
};
pub use ids::{AssetId, AssetTypeId, AssignmentId, CustomFieldId, PersonId};
pub use ledger::{has_conflict, AssignmentLedger};
pub use record::{
    Asset, AssetType, Assignment, CustomFieldDef, CustomFieldScope, FieldDataType, NewAsset,
    NewAssignment, NewPerson, Person, ReportRow,
};
pub use report::{EntityKind, ReportQueryEngine, ReportRequest};
pub use storage::{
    AssignmentStore, DirectoryStore, MemoryStore, ReportStore, SqliteStore, StorageError,
    UNASSIGNED_PERSON,
};
pub use time::Timespan;
pub use value::FieldValue;
