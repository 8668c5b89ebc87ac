//! Performance classifier, ranking, and insight tags.

use crate::delta::{DeltaResult, DeltaSet};
use crate::types::{EntityKey, Kpi, MetricValue};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PerformanceTier {
    Excellent,
    Good,
    Moderate,
    Poor,
}

const EXCELLENT_MIN: f64 = 50.0;
const GOOD_MIN: f64 = 15.0;
const MODERATE_MIN: f64 = 0.0;

impl PerformanceTier {
    pub const ALL: [PerformanceTier; 4] = [
        PerformanceTier::Excellent,
        PerformanceTier::Good,
        PerformanceTier::Moderate,
        PerformanceTier::Poor,
    ];

    /// Ordered bands with inclusive lower bounds; first match wins.
    pub fn from_growth(percent: f64) -> Self {
        if percent >= EXCELLENT_MIN {
            PerformanceTier::Excellent
        } else if percent >= GOOD_MIN {
            PerformanceTier::Good
        } else if percent >= MODERATE_MIN {
            PerformanceTier::Moderate
        } else {
            PerformanceTier::Poor
        }
    }
}

impl fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Priority {
    High,
    Medium,
}

/// Sales growth as a sortable number. Growth from a zero baseline is
/// unbounded, so it sorts as +inf (or -inf for a move into negative sales).
pub fn growth_score(sales: &DeltaResult) -> f64 {
    match (sales.percent_delta, sales.absolute_delta) {
        (MetricValue::Defined(p), _) => p,
        (MetricValue::Undefined, MetricValue::Defined(a)) if a > 0.0 => f64::INFINITY,
        (MetricValue::Undefined, _) => f64::NEG_INFINITY,
    }
}

pub fn classify(sales: &DeltaResult) -> PerformanceTier {
    PerformanceTier::from_growth(growth_score(sales))
}

/// Observations attached to a store. Figures are percent deltas unless named
/// otherwise; text for them belongs to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Insight {
    SalesGrowth { tier: PerformanceTier, growth: MetricValue },
    MarketingHighlyEffective { growth: MetricValue },
    MarketingEffective { growth: MetricValue },
    MarketingUnderperforming { growth: MetricValue, roi_change: MetricValue },
    StrongOrganicGrowth { growth: MetricValue },
    OrganicDecline { growth: MetricValue },
    OrderSurge { growth: MetricValue },
    OrderDecline { growth: MetricValue },
    AverageOrderValueUp { growth: MetricValue },
    AverageOrderValueDown { growth: MetricValue },
    SpendUpReturnDown,
    SpendDownSalesUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    ScaleSuccessfulInitiatives,
    ExpandSuccessfulCampaigns,
    ImproveMarketingStrategy,
    UrgentGrowthReview,
    IncreaseMarketingBudget,
    OptimizeAndTestChannels,
    RestructureCampaigns,
    InvestInRetention,
    BrandBuilding,
    EnsureCapacity,
    CustomerAcquisition,
    ContinueUpselling,
    ReviewPricing,
    RefocusSpend,
    AccelerateWithBudget,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreAssessment {
    pub entity: EntityKey,
    pub tier: PerformanceTier,
    pub priority: Priority,
    pub sales_growth: MetricValue,
    pub marketing_sales_growth: MetricValue,
    /// Absolute change of marketing ROI, in percentage points.
    pub roi_change: MetricValue,
    pub insights: Vec<Insight>,
    pub recommendations: Vec<Recommendation>,
}

/// Tier, priority and tags for one store from its post-vs-pre deltas.
pub fn assess(deltas: &DeltaSet) -> StoreAssessment {
    let sales_growth = deltas.percent(Kpi::GrossSales);
    let tier = deltas
        .get(Kpi::GrossSales)
        .map_or(PerformanceTier::Poor, classify);
    let marketing_growth = deltas.percent(Kpi::MarketingSales);
    let roi_change = deltas.absolute(Kpi::MarketingRoi);
    let organic_growth = deltas.percent(Kpi::OrganicSales);
    let order_growth = deltas.percent(Kpi::OrderCount);
    let aov_growth = deltas.percent(Kpi::AverageOrderValue);
    let spend_growth = deltas.percent(Kpi::MarketingSpend);

    let mut insights = vec![Insight::SalesGrowth {
        tier,
        growth: sales_growth,
    }];
    let mut recommendations = vec![match tier {
        PerformanceTier::Excellent => Recommendation::ScaleSuccessfulInitiatives,
        PerformanceTier::Good => Recommendation::ExpandSuccessfulCampaigns,
        PerformanceTier::Moderate => Recommendation::ImproveMarketingStrategy,
        PerformanceTier::Poor => Recommendation::UrgentGrowthReview,
    }];
    let mut priority = if tier == PerformanceTier::Poor {
        Priority::High
    } else {
        Priority::Medium
    };

    if marketing_growth.above(30.0) && roi_change.above(0.0) {
        insights.push(Insight::MarketingHighlyEffective { growth: marketing_growth });
        recommendations.push(Recommendation::IncreaseMarketingBudget);
    } else if marketing_growth.above(0.0) && roi_change.above(0.0) {
        insights.push(Insight::MarketingEffective { growth: marketing_growth });
        recommendations.push(Recommendation::OptimizeAndTestChannels);
    } else if marketing_growth.below(0.0) || roi_change.below(-10.0) {
        insights.push(Insight::MarketingUnderperforming {
            growth: marketing_growth,
            roi_change,
        });
        recommendations.push(Recommendation::RestructureCampaigns);
        priority = Priority::High;
    }

    if organic_growth.above(20.0) {
        insights.push(Insight::StrongOrganicGrowth { growth: organic_growth });
        recommendations.push(Recommendation::InvestInRetention);
    } else if deltas.absolute(Kpi::OrganicSales).below(0.0) {
        insights.push(Insight::OrganicDecline { growth: organic_growth });
        recommendations.push(Recommendation::BrandBuilding);
    }

    if order_growth.above(30.0) {
        insights.push(Insight::OrderSurge { growth: order_growth });
        recommendations.push(Recommendation::EnsureCapacity);
    } else if order_growth.below(-15.0) {
        insights.push(Insight::OrderDecline { growth: order_growth });
        recommendations.push(Recommendation::CustomerAcquisition);
    }

    if aov_growth.above(10.0) {
        insights.push(Insight::AverageOrderValueUp { growth: aov_growth });
        recommendations.push(Recommendation::ContinueUpselling);
    } else if aov_growth.below(-5.0) {
        insights.push(Insight::AverageOrderValueDown { growth: aov_growth });
        recommendations.push(Recommendation::ReviewPricing);
    }

    if spend_growth.above(50.0) && roi_change.below(-20.0) {
        insights.push(Insight::SpendUpReturnDown);
        recommendations.push(Recommendation::RefocusSpend);
    } else if spend_growth.below(-20.0) && marketing_growth.above(0.0) {
        insights.push(Insight::SpendDownSalesUp);
        recommendations.push(Recommendation::AccelerateWithBudget);
    }

    StoreAssessment {
        entity: deltas.entity.clone(),
        tier,
        priority,
        sales_growth,
        marketing_sales_growth: marketing_growth,
        roi_change,
        insights,
        recommendations,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedStore {
    pub rank: usize,
    pub entity: EntityKey,
    pub sales_growth: MetricValue,
}

/// All stores sorted by sales growth, best first. The top-performer and
/// needs-attention lists are the two halves of this one order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    pub ordered: Vec<RankedStore>,
    pub top_count: usize,
}

impl Ranking {
    /// Stable sort by growth descending, ties by entity id ascending.
    pub fn build<'a>(stores: impl IntoIterator<Item = (&'a EntityKey, &'a DeltaResult)>) -> Self {
        let mut scored: Vec<(f64, &EntityKey, MetricValue)> = stores
            .into_iter()
            .map(|(key, sales)| (growth_score(sales), key, sales.percent_delta))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id().cmp(b.1.id())));

        let ordered: Vec<RankedStore> = scored
            .into_iter()
            .enumerate()
            .map(|(i, (_, key, growth))| RankedStore {
                rank: i + 1,
                entity: key.clone(),
                sales_growth: growth,
            })
            .collect();
        let top_count = (ordered.len() + 1) / 2;
        Self { ordered, top_count }
    }

    pub fn top_performers(&self) -> &[RankedStore] {
        &self.ordered[..self.top_count]
    }

    /// Worst first.
    pub fn needs_attention(&self) -> Vec<&RankedStore> {
        self.ordered[self.top_count..].iter().rev().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::delta;
    use crate::period::Comparison;
    use MetricValue::{Defined, Undefined};

    fn sales(pre: f64, post: f64) -> DeltaResult {
        delta(Kpi::GrossSales, Defined(pre), Defined(post))
    }

    #[test]
    fn test_band_boundaries() {
        assert_eq!(PerformanceTier::from_growth(50.0), PerformanceTier::Excellent);
        assert_eq!(PerformanceTier::from_growth(49.999), PerformanceTier::Good);
        assert_eq!(PerformanceTier::from_growth(15.0), PerformanceTier::Good);
        assert_eq!(PerformanceTier::from_growth(14.999), PerformanceTier::Moderate);
        assert_eq!(PerformanceTier::from_growth(0.0), PerformanceTier::Moderate);
        assert_eq!(PerformanceTier::from_growth(-0.001), PerformanceTier::Poor);
    }

    #[test]
    fn test_every_growth_maps_to_one_tier() {
        let mut p = -200.0;
        while p <= 200.0 {
            let hits = PerformanceTier::ALL
                .iter()
                .filter(|t| PerformanceTier::from_growth(p) == **t)
                .count();
            assert_eq!(hits, 1);
            p += 0.5;
        }
    }

    #[test]
    fn test_growth_from_zero_baseline_is_excellent() {
        let d = sales(0.0, 500.0);
        assert_eq!(d.percent_delta, Undefined);
        assert_eq!(classify(&d), PerformanceTier::Excellent);
        assert_eq!(classify(&sales(0.0, 0.0)), PerformanceTier::Moderate);
    }

    #[test]
    fn test_ranking_ties_break_by_id_and_halves_cover_all() {
        let keys: Vec<EntityKey> = ["b", "a", "c", "d", "e"]
            .iter()
            .map(|s| EntityKey::Store(s.to_string()))
            .collect();
        let deltas = vec![
            sales(100.0, 110.0),
            sales(100.0, 110.0),
            sales(100.0, 200.0),
            sales(100.0, 50.0),
            sales(0.0, 10.0),
        ];
        let ranking = Ranking::build(keys.iter().zip(deltas.iter()));
        let ids: Vec<&str> = ranking.ordered.iter().map(|r| r.entity.id()).collect();
        assert_eq!(ids, vec!["e", "c", "a", "b", "d"]);

        let top: Vec<&str> = ranking.top_performers().iter().map(|r| r.entity.id()).collect();
        let attention: Vec<&str> = ranking.needs_attention().iter().map(|r| r.entity.id()).collect();
        assert_eq!(top, vec!["e", "c", "a"]);
        assert_eq!(attention, vec!["d", "b"]);

        let mut all: Vec<&str> = top.into_iter().chain(attention).collect();
        all.sort();
        assert_eq!(all, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_numeric_ids_tie_break_as_text() {
        let keys: Vec<EntityKey> = ["9", "10"]
            .iter()
            .map(|s| EntityKey::Store(s.to_string()))
            .collect();
        let deltas = vec![sales(100.0, 110.0), sales(100.0, 110.0)];
        let ranking = Ranking::build(keys.iter().zip(deltas.iter()));
        let ids: Vec<&str> = ranking.ordered.iter().map(|r| r.entity.id()).collect();
        assert_eq!(ids, vec!["10", "9"]);
    }

    fn set(values: &[(Kpi, f64, f64)]) -> DeltaSet {
        DeltaSet {
            entity: EntityKey::Store("1".into()),
            comparison: Comparison::PostVsPre,
            results: values
                .iter()
                .map(|(k, b, c)| delta(*k, Defined(*b), Defined(*c)))
                .collect(),
        }
    }

    #[test]
    fn test_assess_good_store_with_effective_marketing() {
        let a = assess(&set(&[
            (Kpi::GrossSales, 10_000.0, 12_320.0),
            (Kpi::MarketingSales, 1_000.0, 1_500.0),
            (Kpi::MarketingRoi, 100.0, 150.0),
            (Kpi::OrganicSales, 9_000.0, 10_820.0),
            (Kpi::OrderCount, 500.0, 1_071.0),
            (Kpi::AverageOrderValue, 20.0, 11.5),
        ]));
        assert_eq!(a.tier, PerformanceTier::Good);
        assert_eq!(a.priority, Priority::Medium);
        assert!(a
            .insights
            .iter()
            .any(|i| matches!(i, Insight::MarketingHighlyEffective { .. })));
        assert!(a.insights.iter().any(|i| matches!(i, Insight::OrderSurge { .. })));
        assert!(a
            .insights
            .iter()
            .any(|i| matches!(i, Insight::AverageOrderValueDown { .. })));
        assert_eq!(a.recommendations[0], Recommendation::ExpandSuccessfulCampaigns);
    }

    #[test]
    fn test_assess_flags_organic_decline_and_high_priority() {
        let a = assess(&set(&[
            (Kpi::GrossSales, 1_000.0, 990.0),
            (Kpi::MarketingSales, 200.0, 150.0),
            (Kpi::OrganicSales, 800.0, 790.0),
        ]));
        assert_eq!(a.tier, PerformanceTier::Poor);
        assert_eq!(a.priority, Priority::High);
        assert!(a.insights.iter().any(|i| matches!(i, Insight::OrganicDecline { .. })));
        assert!(a
            .insights
            .iter()
            .any(|i| matches!(i, Insight::MarketingUnderperforming { .. })));
    }
}
