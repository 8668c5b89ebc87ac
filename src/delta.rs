//! Delta engine: absolute and percentage change between two aggregates.
//!
//! Percentages follow plain division. With a negative baseline (a net loss,
//! say) a positive percentage does not mean improvement; callers read the
//! absolute delta for direction.

use crate::aggregate::Aggregate;
use crate::period::Comparison;
use crate::types::{EntityKey, Kpi, MetricValue, ZERO_EPSILON};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeltaResult {
    pub kpi: Kpi,
    pub baseline: MetricValue,
    pub comparison: MetricValue,
    pub absolute_delta: MetricValue,
    /// Finite percentage, or `Undefined` when the baseline is zero and the
    /// comparison is not (or either side is itself undefined).
    pub percent_delta: MetricValue,
}

/// Absolute and percent change between two plain figures.
pub fn change(baseline: f64, comparison: f64) -> (MetricValue, MetricValue) {
    let abs = comparison - baseline;
    let pct = if baseline.abs() >= ZERO_EPSILON {
        MetricValue::new(abs / baseline * 100.0)
    } else if comparison.abs() < ZERO_EPSILON {
        // Zero to zero is "no change", not "undefined".
        MetricValue::Defined(0.0)
    } else {
        MetricValue::Undefined
    };
    (MetricValue::new(abs), pct)
}

pub fn delta(kpi: Kpi, baseline: MetricValue, comparison: MetricValue) -> DeltaResult {
    let (absolute_delta, percent_delta) = match (baseline, comparison) {
        (MetricValue::Defined(b), MetricValue::Defined(c)) => change(b, c),
        _ => (MetricValue::Undefined, MetricValue::Undefined),
    };
    DeltaResult {
        kpi,
        baseline,
        comparison,
        absolute_delta,
        percent_delta,
    }
}

/// All deltas for one entity and one comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaSet {
    pub entity: EntityKey,
    pub comparison: Comparison,
    pub results: Vec<DeltaResult>,
}

impl DeltaSet {
    pub fn get(&self, kpi: Kpi) -> Option<&DeltaResult> {
        self.results.iter().find(|d| d.kpi == kpi)
    }

    /// Percent delta of `kpi`, undefined when the KPI is absent.
    pub fn percent(&self, kpi: Kpi) -> MetricValue {
        self.get(kpi).map_or(MetricValue::Undefined, |d| d.percent_delta)
    }

    pub fn absolute(&self, kpi: Kpi) -> MetricValue {
        self.get(kpi).map_or(MetricValue::Undefined, |d| d.absolute_delta)
    }
}

/// One delta per KPI present in both aggregates, in KPI order.
pub fn compare(comparison: Comparison, baseline: &Aggregate, current: &Aggregate) -> DeltaSet {
    debug_assert_eq!(baseline.entity, current.entity);
    let results = baseline
        .values
        .iter()
        .filter_map(|(kpi, b)| current.get(*kpi).map(|c| delta(*kpi, *b, c)))
        .collect();
    DeltaSet {
        entity: baseline.entity.clone(),
        comparison,
        results,
    }
}
