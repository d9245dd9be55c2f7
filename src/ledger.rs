//! The temporal assignment ledger.
//!
//! Owns the lifecycle of assignment intervals: for a fixed asset the live
//! intervals never overlap, where `[a.from, a.to)` and `[b.from, b.to)`
//! overlap iff `a.from < b.to` and `b.from < a.to` with absent ends
//! reading as infinity. The ledger is the only component that mutates
//! intervals; everything else sees them through the query methods.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{CustodiaResult, LedgerError, ValidationError};
use crate::ids::{AssetId, AssignmentId, PersonId};
use crate::record::{Assignment, NewAssignment};
use crate::storage::AssignmentStore;
use crate::time::Timespan;

/// Whether a candidate span conflicts with any interval in `existing`,
/// skipping the excluded id (for update-in-place checks).
///
/// Pure and backend-agnostic: every store feeds its intervals through
/// this one predicate, so open-ended and bounded ends go through the
/// same algebra everywhere.
#[must_use]
pub fn has_conflict(
    existing: &[Assignment],
    candidate: &Timespan,
    exclude: Option<AssignmentId>,
) -> bool {
    existing
        .iter()
        .filter(|a| exclude != Some(a.id))
        .any(|a| a.span.overlaps(candidate))
}

/// Assignment interval lifecycle over a pluggable store.
#[derive(Clone)]
pub struct AssignmentLedger {
    store: Arc<dyn AssignmentStore>,
}

impl AssignmentLedger {
    /// Creates a ledger over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn AssignmentStore>) -> Self {
        Self { store }
    }

    fn validate_span(span: &Timespan) -> Result<(), ValidationError> {
        match span.to {
            Some(to) if span.from >= to => {
                Err(ValidationError::InvalidTimespan { from: span.from, to })
            }
            _ => Ok(()),
        }
    }

    /// Read-only conflict probe: does the candidate span overlap any
    /// other live interval of the asset?
    pub fn has_overlap(
        &self,
        asset_id: AssetId,
        candidate: &Timespan,
        exclude: Option<AssignmentId>,
    ) -> CustodiaResult<bool> {
        let existing = self.store.for_asset(asset_id)?;
        Ok(has_conflict(&existing, candidate, exclude))
    }

    /// Records a new interval.
    ///
    /// # Errors
    ///
    /// `Validation` if a bounded span ends at or before its start;
    /// `OverlappingAssignment` if the span conflicts with an existing
    /// interval of the asset.
    pub fn create(&self, new: NewAssignment) -> CustodiaResult<Assignment> {
        Self::validate_span(&new.span)?;
        if self.has_overlap(new.asset_id, &new.span, None)? {
            return Err(LedgerError::OverlappingAssignment {
                asset_id: new.asset_id,
            }
            .into());
        }
        Ok(self.store.insert(&new)?)
    }

    /// Rewrites an existing interval, checking overlap against all
    /// intervals except itself.
    pub fn update(&self, assignment: &Assignment) -> CustodiaResult<()> {
        Self::validate_span(&assignment.span)?;
        if self.has_overlap(assignment.asset_id, &assignment.span, Some(assignment.id))? {
            return Err(LedgerError::OverlappingAssignment {
                asset_id: assignment.asset_id,
            }
            .into());
        }
        self.store.update(assignment)?;
        Ok(())
    }

    /// Fetches an interval.
    ///
    /// # Errors
    ///
    /// `AssignmentNotFound` if the id is unknown or tombstoned.
    pub fn get(&self, id: AssignmentId) -> CustodiaResult<Assignment> {
        self.store
            .get(id)?
            .ok_or_else(|| LedgerError::AssignmentNotFound { id }.into())
    }

    /// Ends an interval at the given date, unconditionally.
    ///
    /// No overlap re-validation happens here: shortening an interval
    /// cannot introduce a conflict under the half-open predicate.
    pub fn end(&self, id: AssignmentId, end_date: DateTime<Utc>) -> CustodiaResult<()> {
        self.store.close(id, end_date)?;
        Ok(())
    }

    /// Tombstones an interval; other intervals are unaffected.
    pub fn delete(&self, id: AssignmentId) -> CustodiaResult<()> {
        self.store.tombstone(id)?;
        Ok(())
    }

    /// Hands an asset to a person: ends the current interval (if any) at
    /// `effective_date`, then opens a new open-ended interval for the new
    /// holder.
    ///
    /// The two steps are sequential, not transactional. Concurrent
    /// `assign` calls for the same asset can both observe the same
    /// current interval; the overlap check inside the create step is the
    /// only backstop. Callers needing strict per-asset serialization
    /// must supply external mutual exclusion keyed by asset id.
    pub fn assign(
        &self,
        asset_id: AssetId,
        person_id: PersonId,
        note: impl Into<String>,
        effective_date: DateTime<Utc>,
    ) -> CustodiaResult<Assignment> {
        if let Some(current) = self.current_for_asset(asset_id)? {
            self.end(current.id, effective_date)?;
        }
        self.create(NewAssignment {
            asset_id,
            person_id,
            span: Timespan::starting_at(effective_date),
            note: note.into(),
        })
    }

    /// The asset's interval active right now, if any.
    pub fn current_for_asset(&self, asset_id: AssetId) -> CustodiaResult<Option<Assignment>> {
        let now = Utc::now();
        Ok(self
            .store
            .for_asset(asset_id)?
            .into_iter()
            .find(|a| a.span.active_at(now)))
    }

    /// Like [`current_for_asset`](Self::current_for_asset), but a missing
    /// interval is an error for contexts that require one.
    pub fn require_current_for_asset(&self, asset_id: AssetId) -> CustodiaResult<Assignment> {
        self.current_for_asset(asset_id)?
            .ok_or_else(|| LedgerError::NoCurrentAssignment { asset_id }.into())
    }

    /// Full interval history for an asset, `effective_from` descending.
    pub fn history_for_asset(&self, asset_id: AssetId) -> CustodiaResult<Vec<Assignment>> {
        Ok(self.store.for_asset(asset_id)?)
    }

    /// All intervals active right now for a person. A person may hold
    /// several assets, so this is a list, and empty is not an error.
    pub fn current_for_person(&self, person_id: PersonId) -> CustodiaResult<Vec<Assignment>> {
        let now = Utc::now();
        let mut intervals = self.store.for_person(person_id)?;
        intervals.retain(|a| a.span.active_at(now));
        Ok(intervals)
    }

    /// Full interval history for a person, `effective_from` descending.
    pub fn history_for_person(&self, person_id: PersonId) -> CustodiaResult<Vec<Assignment>> {
        Ok(self.store.for_person(person_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{NewAsset, NewPerson};
    use crate::storage::{DirectoryStore, MemoryStore};
    use chrono::{Duration, TimeZone};

    fn day(month: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, month, d, 0, 0, 0).unwrap()
    }

    fn ledger_fixture() -> (AssignmentLedger, AssetId, PersonId, PersonId) {
        let store = Arc::new(MemoryStore::new());
        let ty = store.create_asset_type("Laptop", "").unwrap();
        let asset = store.create_asset(NewAsset::named(ty.id, "MBP 14")).unwrap();
        let p1 = store.create_person(NewPerson::named("Ada")).unwrap();
        let p2 = store.create_person(NewPerson::named("Grace")).unwrap();
        (AssignmentLedger::new(store), asset.id, p1.id, p2.id)
    }

    fn new_assignment(asset: AssetId, person: PersonId, span: Timespan) -> NewAssignment {
        NewAssignment {
            asset_id: asset,
            person_id: person,
            span,
            note: String::new(),
        }
    }

    #[test]
    fn test_has_conflict_excludes_id() {
        let (ledger, asset, p1, _) = ledger_fixture();
        let created = ledger
            .create(new_assignment(
                asset,
                p1,
                Timespan::new(day(1, 1), day(6, 1)).unwrap(),
            ))
            .unwrap();

        let candidate = Timespan::new(day(2, 1), day(5, 1)).unwrap();
        assert!(ledger.has_overlap(asset, &candidate, None).unwrap());
        assert!(!ledger
            .has_overlap(asset, &candidate, Some(created.id))
            .unwrap());
    }

    #[test]
    fn test_create_rejects_conflicts() {
        let (ledger, asset, p1, p2) = ledger_fixture();
        ledger
            .create(new_assignment(
                asset,
                p1,
                Timespan::new(day(1, 1), day(6, 1)).unwrap(),
            ))
            .unwrap();

        // [Mar 1, Sep 1) overlaps [Jan 1, Jun 1).
        let err = ledger
            .create(new_assignment(
                asset,
                p2,
                Timespan::new(day(3, 1), day(9, 1)).unwrap(),
            ))
            .unwrap_err();
        assert!(err.is_conflict());

        // [Jun 1, Sep 1) touches but does not overlap.
        ledger
            .create(new_assignment(
                asset,
                p2,
                Timespan::new(day(6, 1), day(9, 1)).unwrap(),
            ))
            .unwrap();
    }

    #[test]
    fn test_create_validates_span() {
        let (ledger, asset, p1, _) = ledger_fixture();
        let backwards = Timespan {
            from: day(6, 1),
            to: Some(day(1, 1)),
        };
        let err = ledger
            .create(new_assignment(asset, p1, backwards))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_update_checks_against_others_only() {
        let (ledger, asset, p1, p2) = ledger_fixture();
        let first = ledger
            .create(new_assignment(
                asset,
                p1,
                Timespan::new(day(1, 1), day(3, 1)).unwrap(),
            ))
            .unwrap();
        ledger
            .create(new_assignment(
                asset,
                p2,
                Timespan::new(day(3, 1), day(6, 1)).unwrap(),
            ))
            .unwrap();

        // Growing the first interval into the second conflicts.
        let mut grown = first.clone();
        grown.span = Timespan::new(day(1, 1), day(4, 1)).unwrap();
        assert!(ledger.update(&grown).unwrap_err().is_conflict());

        // Shrinking it is fine; its own row is excluded from the check.
        let mut shrunk = first;
        shrunk.span = Timespan::new(day(1, 1), day(2, 1)).unwrap();
        ledger.update(&shrunk).unwrap();
    }

    #[test]
    fn test_assign_then_reassign_preserves_continuity() {
        let (ledger, asset, p1, p2) = ledger_fixture();
        let t1 = Utc::now() - Duration::days(30);
        let t2 = Utc::now() - Duration::days(10);

        ledger.assign(asset, p1, "initial", t1).unwrap();
        ledger.assign(asset, p2, "handover", t2).unwrap();

        let history = ledger.history_for_asset(asset).unwrap();
        assert_eq!(history.len(), 2);
        // Descending by effective_from: the open interval first.
        assert_eq!(history[0].person_id, p2);
        assert_eq!(history[0].span, Timespan::starting_at(t2));
        assert_eq!(history[1].person_id, p1);
        assert_eq!(history[1].span, Timespan::new(t1, t2).unwrap());

        let current = ledger.current_for_asset(asset).unwrap().unwrap();
        assert_eq!(current.person_id, p2);
    }

    #[test]
    fn test_assign_without_predecessor() {
        let (ledger, asset, p1, _) = ledger_fixture();
        let t = Utc::now() - Duration::days(1);
        let created = ledger.assign(asset, p1, "", t).unwrap();
        assert!(created.span.is_open_ended());
        assert_eq!(ledger.history_for_asset(asset).unwrap().len(), 1);
    }

    #[test]
    fn test_end_is_unconditional() {
        let (ledger, asset, p1, _) = ledger_fixture();
        let t = Utc::now() - Duration::days(5);
        let a = ledger.assign(asset, p1, "", t).unwrap();

        ledger.end(a.id, t + Duration::days(2)).unwrap();
        let ended = ledger.get(a.id).unwrap();
        assert_eq!(ended.span.to, Some(t + Duration::days(2)));
        assert!(ledger.current_for_asset(asset).unwrap().is_none());
    }

    #[test]
    fn test_delete_tombstones_without_touching_others() {
        let (ledger, asset, p1, p2) = ledger_fixture();
        let a = ledger
            .create(new_assignment(
                asset,
                p1,
                Timespan::new(day(1, 1), day(3, 1)).unwrap(),
            ))
            .unwrap();
        let b = ledger
            .create(new_assignment(
                asset,
                p2,
                Timespan::new(day(3, 1), day(6, 1)).unwrap(),
            ))
            .unwrap();

        ledger.delete(a.id).unwrap();
        assert!(ledger.get(a.id).unwrap_err().is_not_found());
        assert_eq!(ledger.history_for_asset(asset).unwrap(), vec![ledger.get(b.id).unwrap()]);

        // The tombstoned interval no longer blocks its old slot.
        ledger
            .create(new_assignment(
                asset,
                p2,
                Timespan::new(day(1, 1), day(2, 1)).unwrap(),
            ))
            .unwrap();
    }

    #[test]
    fn test_current_for_person_lists_all_held_assets() {
        let store = Arc::new(MemoryStore::new());
        let ty = store.create_asset_type("Laptop", "").unwrap();
        let a1 = store.create_asset(NewAsset::named(ty.id, "One")).unwrap();
        let a2 = store.create_asset(NewAsset::named(ty.id, "Two")).unwrap();
        let p = store.create_person(NewPerson::named("Ada")).unwrap();
        let ledger = AssignmentLedger::new(store);

        let t = Utc::now() - Duration::days(2);
        ledger.assign(a1.id, p.id, "", t).unwrap();
        ledger.assign(a2.id, p.id, "", t).unwrap();
        let ended = ledger.assign(a1.id, p.id, "", t + Duration::days(1)).unwrap();
        ledger.end(ended.id, Utc::now() - Duration::hours(1)).unwrap();

        let current = ledger.current_for_person(p.id).unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].asset_id, a2.id);

        assert_eq!(ledger.history_for_person(p.id).unwrap().len(), 3);
    }

    #[test]
    fn test_require_current_not_found() {
        let (ledger, asset, _, _) = ledger_fixture();
        let err = ledger.require_current_for_asset(asset).unwrap_err();
        assert!(err.is_not_found());
    }
}
