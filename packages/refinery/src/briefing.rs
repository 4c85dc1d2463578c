//! Deadline briefing - a date-windowed view over stored records.
//!
//! A pure read over the knowledge store for timeline-style consumers. The
//! reference date is always passed in by the caller; the library never
//! reads the wall clock.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::types::record::StructuredRecord;

/// A record with a due date inside the briefing window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefingItem {
    pub record: StructuredRecord,

    /// Days from the reference date to the due date (negative = overdue)
    pub days_left: i64,
}

impl BriefingItem {
    /// D-day label: `D-3`, `D-DAY`, or `Overdue`.
    pub fn d_day_label(&self) -> String {
        match self.days_left {
            0 => "D-DAY".to_string(),
            d if d > 0 => format!("D-{d}"),
            _ => "Overdue".to_string(),
        }
    }
}

/// Window bounds for a briefing, relative to the reference date.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BriefingWindow {
    /// Days to look back (catches recently missed deadlines)
    pub lookback_days: u64,

    /// Days to look ahead
    pub horizon_days: u64,
}

impl Default for BriefingWindow {
    fn default() -> Self {
        Self {
            lookback_days: 3,
            horizon_days: 14,
        }
    }
}

/// Records due inside the window, soonest first.
///
/// Records without a due date never appear; ties on the due date fall back
/// to importance (highest first) then id for a deterministic order.
pub fn upcoming_deadlines(
    records: &[StructuredRecord],
    today: NaiveDate,
    window: BriefingWindow,
) -> Vec<BriefingItem> {
    let start = today - Days::new(window.lookback_days);
    let end = today + Days::new(window.horizon_days);

    let mut items: Vec<BriefingItem> = records
        .iter()
        .filter_map(|record| {
            let due = record.due_date?;
            if due < start || due > end {
                return None;
            }
            Some(BriefingItem {
                record: record.clone(),
                days_left: (due - today).num_days(),
            })
        })
        .collect();

    items.sort_by(|a, b| {
        a.days_left
            .cmp(&b.days_left)
            .then_with(|| b.record.importance.cmp(&a.record.importance))
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    items
}
