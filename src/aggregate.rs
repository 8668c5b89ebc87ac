//! Metric aggregator: reduces one window's records to per-entity KPIs.

use crate::period::Window;
use crate::types::{EntityInfo, EntityKey, Kpi, Measure, MetricValue, Record, Source};
use crate::util::average;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Entities in first-encountered order, `Business` always first.
#[derive(Debug, Clone)]
pub struct EntityRegistry {
    entities: Vec<EntityInfo>,
    index: HashMap<EntityKey, usize>,
}

impl EntityRegistry {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut reg = Self {
            entities: Vec::new(),
            index: HashMap::new(),
        };
        reg.insert(EntityKey::Business, "All Stores", None);
        for r in records {
            reg.insert(EntityKey::Store(r.entity_id.clone()), &r.entity_name, None);
            if let Some(c) = &r.campaign {
                reg.insert(EntityKey::Campaign(c.name.clone()), &c.name, Some(c.self_serve));
            }
        }
        for e in &mut reg.entities {
            if e.name.is_empty() {
                e.name = "Unknown".to_string();
            }
        }
        reg
    }

    fn insert(&mut self, key: EntityKey, name: &str, self_serve: Option<bool>) {
        match self.index.get(&key) {
            Some(&i) => {
                let e = &mut self.entities[i];
                if e.name.is_empty() {
                    e.name = name.to_string();
                }
                if let (Some(seen), Some(flag)) = (e.self_serve, self_serve) {
                    e.self_serve = Some(seen || flag);
                }
            }
            None => {
                self.index.insert(key.clone(), self.entities.len());
                self.entities.push(EntityInfo {
                    key,
                    name: name.to_string(),
                    self_serve,
                });
            }
        }
    }

    pub fn entities(&self) -> &[EntityInfo] {
        &self.entities
    }

    pub fn position(&self, key: &EntityKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// KPIs for one entity over one window. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    pub entity: EntityKey,
    pub window: Window,
    pub record_count: usize,
    pub values: BTreeMap<Kpi, MetricValue>,
}

impl Aggregate {
    pub fn get(&self, kpi: Kpi) -> Option<MetricValue> {
        self.values.get(&kpi).copied()
    }
}

#[derive(Debug, Default)]
struct SourceTotals {
    sums: BTreeMap<Measure, f64>,
    roas: Vec<f64>,
}

impl SourceTotals {
    fn sum(&self, m: Measure) -> f64 {
        self.sums.get(&m).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Default)]
struct Totals {
    records: usize,
    financial: SourceTotals,
    marketing: SourceTotals,
    sales: SourceTotals,
}

impl Totals {
    fn add(&mut self, r: &Record) {
        self.records += 1;
        let target = match r.source {
            Source::Financial => &mut self.financial,
            Source::Marketing => &mut self.marketing,
            Source::Sales => &mut self.sales,
        };
        for (m, v) in &r.metric_values {
            if *m == Measure::Roas {
                target.roas.push(*v);
            } else {
                *target.sums.entry(*m).or_default() += v;
            }
        }
    }
}

fn entity_keys(r: &Record) -> impl Iterator<Item = EntityKey> + '_ {
    [
        Some(EntityKey::Business),
        Some(EntityKey::Store(r.entity_id.clone())),
        r.campaign.as_ref().map(|c| EntityKey::Campaign(c.name.clone())),
    ]
    .into_iter()
    .flatten()
}

/// One aggregate per registered entity, in registry order. Entities with no
/// records in the window get zero totals and undefined ratios.
pub fn aggregate_window(
    registry: &EntityRegistry,
    window: Window,
    records: &[&Record],
) -> Vec<Aggregate> {
    let mut totals: Vec<Totals> = (0..registry.len()).map(|_| Totals::default()).collect();
    for r in records {
        for key in entity_keys(r) {
            if let Some(i) = registry.position(&key) {
                totals[i].add(r);
            }
        }
    }

    registry
        .entities()
        .iter()
        .zip(totals)
        .map(|(info, t)| {
            let values = match info.key {
                EntityKey::Campaign(_) | EntityKey::SelfServeCampaigns => campaign_kpis(&t),
                EntityKey::Business | EntityKey::Store(_) => store_kpis(&t),
            };
            Aggregate {
                entity: info.key.clone(),
                window,
                record_count: t.records,
                values,
            }
        })
        .collect()
}

/// All self-serve campaign rows of one window, reduced together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelfServeSummary {
    /// Keyed `SelfServeCampaigns`; `record_count` is the number of campaign rows.
    pub aggregate: Aggregate,
    pub unique_campaigns: usize,
}

pub fn self_serve_summary(window: Window, records: &[&Record]) -> SelfServeSummary {
    let mut totals = Totals::default();
    let mut names: HashSet<&str> = HashSet::new();
    for r in records {
        if let Some(c) = r.campaign.as_ref().filter(|c| c.self_serve) {
            totals.add(r);
            names.insert(c.name.as_str());
        }
    }
    SelfServeSummary {
        aggregate: Aggregate {
            entity: EntityKey::SelfServeCampaigns,
            window,
            record_count: totals.records,
            values: campaign_kpis(&totals),
        },
        unique_campaigns: names.len(),
    }
}

/// Business-wide KPIs over an arbitrary slice of records.
pub fn business_kpis(records: &[&Record]) -> BTreeMap<Kpi, MetricValue> {
    let mut totals = Totals::default();
    for r in records {
        totals.add(r);
    }
    store_kpis(&totals)
}

fn store_kpis(t: &Totals) -> BTreeMap<Kpi, MetricValue> {
    let fin_sales = t.financial.sum(Measure::Subtotal);
    let report_sales = t.sales.sum(Measure::GrossSales);

    // The two sales bases rarely agree; the larger one is the more complete export.
    let (gross, orders, commission) = if report_sales > fin_sales {
        (
            report_sales,
            t.sales.sum(Measure::Orders),
            t.sales.sum(Measure::Commission),
        )
    } else {
        (
            fin_sales,
            t.financial.sum(Measure::Orders),
            t.financial.sum(Measure::Commission),
        )
    };

    let fin_spend =
        t.financial.sum(Measure::MarketingFees) + t.financial.sum(Measure::CustomerDiscounts);
    let campaign_spend =
        t.marketing.sum(Measure::MarketingFees) + t.marketing.sum(Measure::CustomerDiscounts);
    let spend_basis = if campaign_spend > fin_spend {
        &t.marketing
    } else {
        &t.financial
    };
    let fees = spend_basis.sum(Measure::MarketingFees);
    let discounts = spend_basis.sum(Measure::CustomerDiscounts);
    let spend = fees + discounts;

    let marketing_sales = t.marketing.sum(Measure::CampaignSales);

    BTreeMap::from([
        (Kpi::GrossSales, gross.into()),
        (Kpi::OrderCount, orders.into()),
        (Kpi::AverageOrderValue, MetricValue::ratio(gross, orders)),
        (Kpi::Commission, commission.into()),
        (Kpi::CommissionRate, MetricValue::percent(commission, gross)),
        (Kpi::MarketingFees, fees.into()),
        (Kpi::CustomerDiscounts, discounts.into()),
        (
            Kpi::PlatformDiscounts,
            t.financial.sum(Measure::PlatformDiscounts).into(),
        ),
        (Kpi::MarketingSpend, spend.into()),
        (Kpi::NetPayout, t.financial.sum(Measure::NetTotal).into()),
        (Kpi::MarketingSales, marketing_sales.into()),
        (Kpi::MarketingOrders, t.marketing.sum(Measure::Orders).into()),
        (Kpi::OrganicSales, (gross - marketing_sales).into()),
        (Kpi::MarketingShare, MetricValue::percent(marketing_sales, gross)),
        (
            Kpi::MarketingRoi,
            MetricValue::percent(marketing_sales - spend, spend),
        ),
        (Kpi::AverageRoas, average(&t.marketing.roas)),
        (Kpi::NewCustomers, t.marketing.sum(Measure::NewCustomers).into()),
        (
            Kpi::NewDashPassCustomers,
            t.marketing.sum(Measure::NewDashPassCustomers).into(),
        ),
        (Kpi::TotalCustomers, t.marketing.sum(Measure::TotalCustomers).into()),
    ])
}

fn campaign_kpis(t: &Totals) -> BTreeMap<Kpi, MetricValue> {
    let m = &t.marketing;
    let sales = m.sum(Measure::CampaignSales);
    let orders = m.sum(Measure::Orders);
    let fees = m.sum(Measure::MarketingFees);
    let discounts = m.sum(Measure::CustomerDiscounts);
    let cost = fees + discounts;

    BTreeMap::from([
        (Kpi::AverageOrderValue, MetricValue::ratio(sales, orders)),
        (Kpi::MarketingFees, fees.into()),
        (Kpi::CustomerDiscounts, discounts.into()),
        (Kpi::MarketingSpend, cost.into()),
        (Kpi::MarketingSales, sales.into()),
        (Kpi::MarketingOrders, orders.into()),
        (Kpi::MarketingRoi, MetricValue::percent(sales - cost, cost)),
        (Kpi::AverageRoas, average(&m.roas)),
        (Kpi::NewCustomers, m.sum(Measure::NewCustomers).into()),
        (Kpi::NewDashPassCustomers, m.sum(Measure::NewDashPassCustomers).into()),
        (Kpi::TotalCustomers, m.sum(Measure::TotalCustomers).into()),
    ])
}
