//! Business-wide weekly breakdown across the analysis span.

use crate::aggregate::business_kpis;
use crate::types::{Kpi, MetricValue, Record};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekSummary {
    /// 1-based.
    pub index: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub record_count: usize,
    pub values: BTreeMap<Kpi, MetricValue>,
}

impl WeekSummary {
    pub fn get(&self, kpi: Kpi) -> MetricValue {
        self.values.get(&kpi).copied().unwrap_or(MetricValue::Undefined)
    }
}

/// Consecutive 7-day weeks from `start` to `end` inclusive; the last week
/// stops at `end`. Records outside the span are ignored.
pub fn breakdown(records: &[Record], start: NaiveDate, end: NaiveDate) -> Vec<WeekSummary> {
    if end < start {
        return Vec::new();
    }
    let weeks = ((end - start).num_days() / 7 + 1) as usize;
    let mut buckets: Vec<Vec<&Record>> = vec![Vec::new(); weeks];
    for r in records {
        if r.date < start || r.date > end {
            continue;
        }
        let i = ((r.date - start).num_days() / 7) as usize;
        buckets[i].push(r);
    }

    buckets
        .into_iter()
        .enumerate()
        .map(|(i, bucket)| {
            let week_start = start + Duration::days(7 * i as i64);
            let week_end = (week_start + Duration::days(6)).min(end);
            WeekSummary {
                index: i + 1,
                start: week_start,
                end: week_end,
                record_count: bucket.len(),
                values: business_kpis(&bucket),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Measure, Source};

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    fn sale(date: NaiveDate, gross: f64) -> Record {
        Record {
            source: Source::Sales,
            entity_id: "1".into(),
            entity_name: "One".into(),
            campaign: None,
            date,
            metric_values: BTreeMap::from([(Measure::GrossSales, gross), (Measure::Orders, 1.0)]),
        }
    }

    #[test]
    fn test_last_week_is_truncated() {
        let weeks = breakdown(&[], d(5, 1), d(5, 16));
        assert_eq!(weeks.len(), 3);
        assert_eq!(weeks[0].end, d(5, 7));
        assert_eq!(weeks[2].start, d(5, 15));
        assert_eq!(weeks[2].end, d(5, 16));
        assert_eq!(weeks[2].get(Kpi::GrossSales), MetricValue::Defined(0.0));
    }

    #[test]
    fn test_records_land_in_their_week() {
        let records = vec![
            sale(d(5, 1), 10.0),
            sale(d(5, 7), 5.0),
            sale(d(5, 8), 20.0),
            sale(d(6, 30), 99.0),
        ];
        let weeks = breakdown(&records, d(5, 1), d(5, 14));
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].get(Kpi::GrossSales), MetricValue::Defined(15.0));
        assert_eq!(weeks[0].record_count, 2);
        assert_eq!(weeks[1].get(Kpi::GrossSales), MetricValue::Defined(20.0));
        assert_eq!(weeks[1].get(Kpi::AverageOrderValue), MetricValue::Defined(20.0));
    }
}
