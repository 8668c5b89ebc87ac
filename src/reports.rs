//! Report assembler and the queries presentation adapters read from.

use crate::aggregate::{Aggregate, EntityRegistry, SelfServeSummary};
use crate::classify::{PerformanceTier, Priority, Ranking, StoreAssessment};
use crate::delta::{compare, DeltaResult, DeltaSet};
use crate::period::{Comparison, PeriodSet, Window};
use crate::types::{EntityInfo, EntityKey, Kpi, MetricValue};
use crate::weekly::WeekSummary;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Everything one analysis run produced. Entity order everywhere follows
/// the registry (first encountered, business first).
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub periods: PeriodSet,
    pub entities: Vec<EntityInfo>,
    /// Window-major, then entity order.
    pub aggregates: Vec<Aggregate>,
    /// Comparison-major, then entity order.
    pub deltas: Vec<DeltaSet>,
    pub assessments: Vec<StoreAssessment>,
    pub ranking: Ranking,
    pub weekly: Vec<WeekSummary>,
    pub self_serve: SelfServeReport,
    /// Records whose date falls in no period.
    pub unassigned_records: usize,
    #[serde(skip)]
    aggregate_index: HashMap<(EntityKey, Window), usize>,
    #[serde(skip)]
    delta_index: HashMap<(EntityKey, Comparison), usize>,
}

/// Self-serve campaigns as a group, prior year against current year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelfServeReport {
    pub prior_year: SelfServeSummary,
    pub current: SelfServeSummary,
    pub change: DeltaSet,
}

impl SelfServeReport {
    pub fn new(prior_year: SelfServeSummary, current: SelfServeSummary) -> Self {
        let change = compare(
            Comparison::OverallYearOverYear,
            &prior_year.aggregate,
            &current.aggregate,
        );
        Self {
            prior_year,
            current,
            change,
        }
    }
}

/// One row of the per-store summary sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSummary {
    pub rank: usize,
    pub store_id: String,
    pub store_name: String,
    pub sales_growth: MetricValue,
    pub marketing_sales_growth: MetricValue,
    pub roi_change: MetricValue,
    pub tier: PerformanceTier,
    pub priority: Priority,
}

/// Top-level KPI block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalSummary {
    pub store_count: usize,
    /// Mean over stores with a defined growth figure.
    pub average_sales_growth: MetricValue,
    pub average_marketing_sales_growth: MetricValue,
    pub tier_counts: BTreeMap<PerformanceTier, usize>,
    pub high_priority_stores: usize,
    pub business_sales_growth: MetricValue,
}

/// Merge computed parts into a [`Report`]. Only builds lookup indices.
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    periods: PeriodSet,
    registry: &EntityRegistry,
    aggregates: Vec<Aggregate>,
    deltas: Vec<DeltaSet>,
    assessments: Vec<StoreAssessment>,
    ranking: Ranking,
    weekly: Vec<WeekSummary>,
    self_serve: SelfServeReport,
    unassigned_records: usize,
) -> Report {
    let aggregate_index = aggregates
        .iter()
        .enumerate()
        .map(|(i, a)| ((a.entity.clone(), a.window), i))
        .collect();
    let delta_index = deltas
        .iter()
        .enumerate()
        .map(|(i, d)| ((d.entity.clone(), d.comparison), i))
        .collect();
    Report {
        periods,
        entities: registry.entities().to_vec(),
        aggregates,
        deltas,
        assessments,
        ranking,
        weekly,
        self_serve,
        unassigned_records,
        aggregate_index,
        delta_index,
    }
}

impl Report {
    pub fn entity(&self, key: &EntityKey) -> Option<&EntityInfo> {
        self.entities.iter().find(|e| &e.key == key)
    }

    pub fn stores(&self) -> impl Iterator<Item = &EntityInfo> {
        self.entities.iter().filter(|e| e.key.is_store())
    }

    pub fn campaigns(&self) -> impl Iterator<Item = &EntityInfo> {
        self.entities
            .iter()
            .filter(|e| matches!(e.key, EntityKey::Campaign(_)))
    }

    /// Campaigns by post-period ROI, best first; undefined ROI sorts last,
    /// ties by name.
    pub fn campaigns_by_roi(&self) -> Vec<&EntityInfo> {
        let roi = |e: &EntityInfo| {
            self.aggregate(&e.key, Window::Post)
                .and_then(|a| a.get(Kpi::MarketingRoi))
                .and_then(MetricValue::value)
                .unwrap_or(f64::NEG_INFINITY)
        };
        let mut campaigns: Vec<&EntityInfo> = self.campaigns().collect();
        campaigns.sort_by(|a, b| roi(*b).total_cmp(&roi(*a)).then_with(|| a.name.cmp(&b.name)));
        campaigns
    }

    pub fn aggregate(&self, key: &EntityKey, window: Window) -> Option<&Aggregate> {
        self.aggregate_index
            .get(&(key.clone(), window))
            .map(|i| &self.aggregates[*i])
    }

    pub fn delta_set(&self, key: &EntityKey, comparison: Comparison) -> Option<&DeltaSet> {
        self.delta_index
            .get(&(key.clone(), comparison))
            .map(|i| &self.deltas[*i])
    }

    pub fn delta(&self, key: &EntityKey, comparison: Comparison, kpi: Kpi) -> Option<&DeltaResult> {
        self.delta_set(key, comparison).and_then(|d| d.get(kpi))
    }

    /// One KPI across every entity that carries it, in entity order.
    pub fn deltas_for(&self, kpi: Kpi, comparison: Comparison) -> Vec<(&EntityInfo, &DeltaResult)> {
        self.entities
            .iter()
            .filter_map(|e| self.delta(&e.key, comparison, kpi).map(|d| (e, d)))
            .collect()
    }

    pub fn assessment(&self, key: &EntityKey) -> Option<&StoreAssessment> {
        self.assessments.iter().find(|a| &a.entity == key)
    }

    /// Per-store rows in entity order.
    pub fn store_summaries(&self) -> Vec<StoreSummary> {
        let ranks: HashMap<&EntityKey, usize> = self
            .ranking
            .ordered
            .iter()
            .map(|r| (&r.entity, r.rank))
            .collect();
        self.assessments
            .iter()
            .map(|a| StoreSummary {
                rank: ranks.get(&a.entity).copied().unwrap_or(0),
                store_id: a.entity.id().to_string(),
                store_name: self
                    .entity(&a.entity)
                    .map(|e| e.name.clone())
                    .unwrap_or_default(),
                sales_growth: a.sales_growth,
                marketing_sales_growth: a.marketing_sales_growth,
                roi_change: a.roi_change,
                tier: a.tier,
                priority: a.priority,
            })
            .collect()
    }

    pub fn summary(&self) -> GlobalSummary {
        let defined_mean = |values: Vec<f64>| {
            let n = values.len() as f64;
            MetricValue::ratio(values.iter().sum(), n)
        };
        let mut tier_counts: BTreeMap<PerformanceTier, usize> =
            PerformanceTier::ALL.iter().map(|t| (*t, 0)).collect();
        for a in &self.assessments {
            *tier_counts.entry(a.tier).or_default() += 1;
        }

        GlobalSummary {
            store_count: self.assessments.len(),
            average_sales_growth: defined_mean(
                self.assessments.iter().filter_map(|a| a.sales_growth.value()).collect(),
            ),
            average_marketing_sales_growth: defined_mean(
                self.assessments
                    .iter()
                    .filter_map(|a| a.marketing_sales_growth.value())
                    .collect(),
            ),
            tier_counts,
            high_priority_stores: self
                .assessments
                .iter()
                .filter(|a| a.priority == Priority::High)
                .count(),
            business_sales_growth: self
                .delta(&EntityKey::Business, Comparison::PostVsPre, Kpi::GrossSales)
                .map_or(MetricValue::Undefined, |d| d.percent_delta),
        }
    }
}
