//! Temporal spans for assignment intervals.
//!
//! Every assignment holds an asset for a half-open span `[from, to)`.
//! An absent `to` means the span is open-ended: the asset is still held.
//! Open ends participate in the interval algebra as "+infinity"; no
//! sentinel timestamp leaks into the core types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A half-open span of time: `[from, to)`.
///
/// # Examples
///
/// ```
/// use custodia::Timespan;
/// use chrono::Utc;
///
/// let span = Timespan::starting_at(Utc::now());
/// assert!(span.is_open_ended());
/// assert!(span.contains(Utc::now()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timespan {
    /// Start of the span (inclusive).
    pub from: DateTime<Utc>,

    /// End of the span (exclusive). None means open-ended.
    pub to: Option<DateTime<Utc>>,
}

impl Timespan {
    /// Creates a bounded span from two timestamps.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTimespan` if `from >= to`.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, ValidationError> {
        if from >= to {
            return Err(ValidationError::InvalidTimespan { from, to });
        }
        Ok(Self { from, to: Some(to) })
    }

    /// Creates an open-ended span starting at the given time.
    #[must_use]
    pub const fn starting_at(from: DateTime<Utc>) -> Self {
        Self { from, to: None }
    }

    /// Returns true if the span has no end.
    #[must_use]
    pub const fn is_open_ended(&self) -> bool {
        self.to.is_none()
    }

    /// Check if a timestamp falls within this span `[from, to)`.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && self.to.map_or(true, |to| at < to)
    }

    /// Whether the span is active at the given instant.
    ///
    /// Identical to [`contains`](Self::contains); named for call sites that
    /// read "is this assignment current as of now".
    #[must_use]
    pub fn active_at(&self, now: DateTime<Utc>) -> bool {
        self.contains(now)
    }

    /// Whether two spans overlap.
    ///
    /// Half-open semantics: a span ending exactly when another begins does
    /// NOT overlap it. Open ends compare as `DateTime::MAX_UTC`, so the
    /// predicate is the same algebra whether or not an end is present.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let self_end = self.to.unwrap_or(DateTime::<Utc>::MAX_UTC);
        let other_end = other.to.unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.from < other_end && other.from < self_end
    }

    /// Closes the span at the specified time, unconditionally.
    ///
    /// Shortening a span cannot introduce an overlap with its neighbors,
    /// so no further validation happens here.
    pub fn close_at(&mut self, at: DateTime<Utc>) {
        self.to = Some(at);
    }
}

impl std::fmt::Display for Timespan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to {
            Some(to) => write!(f, "[{} → {})", self.from, to),
            None => write!(f, "[{} → ∞)", self.from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_new_valid() {
        let span = Timespan::new(at(1), at(2)).unwrap();
        assert_eq!(span.from, at(1));
        assert_eq!(span.to, Some(at(2)));
        assert!(!span.is_open_ended());
    }

    #[test]
    fn test_new_invalid() {
        assert!(Timespan::new(at(2), at(1)).is_err());
        assert!(Timespan::new(at(1), at(1)).is_err());
    }

    #[test]
    fn test_contains_half_open() {
        let span = Timespan::new(at(1), at(3)).unwrap();
        assert!(span.contains(at(1)));
        assert!(span.contains(at(2)));
        assert!(!span.contains(at(3)));
    }

    #[test]
    fn test_contains_open_ended() {
        let span = Timespan::starting_at(at(1));
        assert!(span.contains(at(1) + Duration::days(365 * 50)));
        assert!(!span.contains(at(1) - Duration::seconds(1)));
    }

    #[test]
    fn test_overlap_symmetry() {
        let a = Timespan::new(at(1), at(4)).unwrap();
        let b = Timespan::new(at(2), at(6)).unwrap();
        let c = Timespan::starting_at(at(5));

        assert_eq!(a.overlaps(&b), b.overlaps(&a));
        assert_eq!(a.overlaps(&c), c.overlaps(&a));
        assert_eq!(b.overlaps(&c), c.overlaps(&b));

        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(b.overlaps(&c));
    }

    #[test]
    fn test_touching_spans_do_not_overlap() {
        let a = Timespan::new(at(1), at(3)).unwrap();
        let b = Timespan::new(at(3), at(5)).unwrap();
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn test_open_ended_overlaps_everything_after_start() {
        let open = Timespan::starting_at(at(2));
        let before = Timespan::new(at(0), at(2)).unwrap();
        let after = Timespan::new(at(10), at(11)).unwrap();
        assert!(!open.overlaps(&before));
        assert!(open.overlaps(&after));

        let other_open = Timespan::starting_at(at(20));
        assert!(open.overlaps(&other_open));
    }

    #[test]
    fn test_close_at() {
        let mut span = Timespan::starting_at(at(1));
        span.close_at(at(4));
        assert_eq!(span.to, Some(at(4)));
        assert!(!span.contains(at(4)));
    }

    #[test]
    fn test_display() {
        let span = Timespan::starting_at(at(1));
        assert!(format!("{span}").contains('∞'));
    }
}
