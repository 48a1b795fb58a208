use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn from_duration(start: NaiveDateTime, duration_minutes: i32) -> Self {
        Self::new(start, start + Duration::minutes(i64::from(duration_minutes)))
    }

    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub label: String,
}

impl AvailableSlot {
    pub fn new(range: TimeRange) -> Self {
        let label = format!(
            "{} {}-{}",
            range.start.format("%a %d/%m"),
            range.start.format("%H:%M"),
            range.end.format("%H:%M")
        );
        Self {
            start: range.start,
            end: range.end,
            label,
        }
    }
}

/// Owner-defined interval that must not be booked (vacation, personal time).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityBlock {
    pub id: String,
    pub owner_id: String,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub reason: Option<String>,
}

impl AvailabilityBlock {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.starts_at, self.ends_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_overlap_half_open() {
        let a = TimeRange::from_duration(dt("2026-10-22 14:00"), 50);
        let b = TimeRange::from_duration(dt("2026-10-22 14:30"), 50);
        let c = TimeRange::from_duration(dt("2026-10-22 14:50"), 50);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn test_contains() {
        let outer = TimeRange::new(dt("2026-10-22 00:00"), dt("2026-10-23 00:00"));
        let inner = TimeRange::from_duration(dt("2026-10-22 14:00"), 50);
        let straddling = TimeRange::from_duration(dt("2026-10-22 23:30"), 50);
        assert!(outer.contains(&inner));
        assert!(!outer.contains(&straddling));
        assert!(!inner.contains(&outer));
    }

    #[test]
    fn test_slot_label() {
        let slot = AvailableSlot::new(TimeRange::from_duration(dt("2026-10-22 14:00"), 50));
        assert_eq!(slot.label, "Thu 22/10 14:00-14:50");
    }
}
