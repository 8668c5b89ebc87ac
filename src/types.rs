use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Raw export rows
// ---------------------------------------------------------------------------
//
// Every column is read as an optional string so that a single bad cell never
// fails CSV decoding; the loader decides what is usable.

#[derive(Debug, Deserialize)]
pub struct RawFinancialRow {
    #[serde(rename = "Timestamp UTC date")]
    pub timestamp_date: Option<String>,
    #[serde(rename = "Payout date")]
    pub payout_date: Option<String>,
    #[serde(rename = "Store ID")]
    pub store_id: Option<String>,
    #[serde(rename = "Store name")]
    pub store_name: Option<String>,
    #[serde(rename = "Transaction type")]
    pub transaction_type: Option<String>,
    #[serde(rename = "Subtotal")]
    pub subtotal: Option<String>,
    #[serde(rename = "Commission")]
    pub commission: Option<String>,
    #[serde(rename = "Marketing fees | (including any applicable taxes)")]
    pub marketing_fees: Option<String>,
    #[serde(rename = "Marketing fees (for historical reference only) | (all discounts and fees)")]
    pub marketing_fees_historical: Option<String>,
    #[serde(rename = "Customer discounts from marketing | (funded by you)")]
    pub merchant_discounts: Option<String>,
    #[serde(rename = "Customer discounts from marketing | (Funded by you)")]
    pub merchant_discounts_capitalised: Option<String>,
    #[serde(rename = "Customer discounts from marketing | (funded by DoorDash)")]
    pub platform_discounts: Option<String>,
    #[serde(rename = "Customer discounts from marketing | (Funded by DoorDash)")]
    pub platform_discounts_capitalised: Option<String>,
    #[serde(rename = "Net total")]
    pub net_total: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawMarketingRow {
    #[serde(rename = "Date")]
    pub date: Option<String>,
    #[serde(rename = "Store ID")]
    pub store_id: Option<String>,
    #[serde(rename = "Store name", alias = "Store Name")]
    pub store_name: Option<String>,
    #[serde(rename = "Campaign name")]
    pub campaign_name: Option<String>,
    #[serde(rename = "Is self serve campaign")]
    pub is_self_serve: Option<String>,
    #[serde(rename = "Orders")]
    pub orders: Option<String>,
    #[serde(rename = "Sales")]
    pub sales: Option<String>,
    #[serde(rename = "Customer discounts from marketing | (funded by you)")]
    pub merchant_discounts: Option<String>,
    #[serde(rename = "Customer discounts from marketing | (Funded by you)")]
    pub merchant_discounts_capitalised: Option<String>,
    #[serde(rename = "Marketing fees | (including any applicable taxes)")]
    pub marketing_fees: Option<String>,
    #[serde(rename = "Marketing fees (for historical reference only) | (all discounts and fees)")]
    pub marketing_fees_historical: Option<String>,
    #[serde(rename = "ROAS")]
    pub roas: Option<String>,
    #[serde(rename = "New customers acquired")]
    pub new_customers: Option<String>,
    /// New subscription (DashPass) customers; a subset of new customers.
    #[serde(rename = "New DP customers acquired")]
    pub new_dp_customers: Option<String>,
    #[serde(rename = "Total customers acquired")]
    pub total_customers: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawSalesRow {
    #[serde(rename = "Start Date")]
    pub start_date: Option<String>,
    #[serde(rename = "Store ID")]
    pub store_id: Option<String>,
    #[serde(rename = "Store Name", alias = "Store name")]
    pub store_name: Option<String>,
    #[serde(rename = "Gross Sales")]
    pub gross_sales: Option<String>,
    #[serde(rename = "Total Delivered or Picked Up Orders")]
    pub orders: Option<String>,
    #[serde(rename = "Total Commission")]
    pub total_commission: Option<String>,
}

// ---------------------------------------------------------------------------
// Normalized records
// ---------------------------------------------------------------------------

/// Which export family a record was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Financial,
    Marketing,
    Sales,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Source::Financial => "financial",
            Source::Marketing => "marketing",
            Source::Sales => "sales",
        };
        f.write_str(s)
    }
}

/// Raw measurements carried by a record. Which ones are present depends on
/// the record's source; absent measures read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    /// Financial order subtotal.
    Subtotal,
    /// Sales-report gross sales.
    GrossSales,
    Orders,
    /// Commission magnitude (exports carry it negated).
    Commission,
    MarketingFees,
    /// Customer discounts funded by the merchant.
    CustomerDiscounts,
    /// Customer discounts funded by the delivery platform.
    PlatformDiscounts,
    NetTotal,
    /// Sales attributed to a marketing campaign.
    CampaignSales,
    Roas,
    NewCustomers,
    NewDashPassCustomers,
    TotalCustomers,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignRef {
    pub name: String,
    pub self_serve: bool,
}

/// One normalized observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub source: Source,
    /// Store identifier.
    pub entity_id: String,
    pub entity_name: String,
    pub campaign: Option<CampaignRef>,
    pub date: NaiveDate,
    pub metric_values: BTreeMap<Measure, f64>,
}

impl Record {
    pub fn value(&self, measure: Measure) -> f64 {
        self.metric_values.get(&measure).copied().unwrap_or(0.0)
    }

    pub fn has(&self, measure: Measure) -> bool {
        self.metric_values.contains_key(&measure)
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityKey {
    Business,
    Store(String),
    Campaign(String),
    /// Every self-serve campaign taken together.
    SelfServeCampaigns,
}

impl EntityKey {
    /// Identifier as exported. Rankings break ties on this string, so ids
    /// compare as text: `"10"` sorts before `"9"`.
    pub fn id(&self) -> &str {
        match self {
            EntityKey::Business => "ALL",
            EntityKey::SelfServeCampaigns => "SELF_SERVE",
            EntityKey::Store(id) | EntityKey::Campaign(id) => id,
        }
    }

    pub fn is_store(&self) -> bool {
        matches!(self, EntityKey::Store(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityInfo {
    pub key: EntityKey,
    pub name: String,
    /// Campaigns only: at least one row was flagged self-serve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_serve: Option<bool>,
}

// ---------------------------------------------------------------------------
// Metric values
// ---------------------------------------------------------------------------

/// Denominators with a smaller magnitude than this are treated as zero.
pub const ZERO_EPSILON: f64 = 1e-9;

/// A KPI or delta value. `Undefined` is the sentinel for "ratio undefined
/// because the denominator is zero"; it is never an error and `Defined`
/// never holds a NaN or infinity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Defined(f64),
    Undefined,
}

impl MetricValue {
    pub fn new(v: f64) -> Self {
        if v.is_finite() {
            MetricValue::Defined(v)
        } else {
            MetricValue::Undefined
        }
    }

    pub fn ratio(numerator: f64, denominator: f64) -> Self {
        if denominator.abs() < ZERO_EPSILON {
            return MetricValue::Undefined;
        }
        MetricValue::new(numerator / denominator)
    }

    /// `numerator / denominator * 100`, undefined on a zero denominator.
    pub fn percent(numerator: f64, denominator: f64) -> Self {
        Self::ratio(numerator, denominator).map(|r| r * 100.0)
    }

    pub fn value(self) -> Option<f64> {
        match self {
            MetricValue::Defined(v) => Some(v),
            MetricValue::Undefined => None,
        }
    }

    pub fn is_undefined(self) -> bool {
        matches!(self, MetricValue::Undefined)
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self {
            MetricValue::Defined(v) => MetricValue::new(f(v)),
            MetricValue::Undefined => MetricValue::Undefined,
        }
    }

    /// Strictly greater than `threshold`; undefined compares false.
    pub fn above(self, threshold: f64) -> bool {
        self.value().map_or(false, |v| v > threshold)
    }

    /// Strictly less than `threshold`; undefined compares false.
    pub fn below(self, threshold: f64) -> bool {
        self.value().map_or(false, |v| v < threshold)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::new(v)
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Defined(v) => serializer.serialize_f64(*v),
            MetricValue::Undefined => serializer.serialize_none(),
        }
    }
}

// ---------------------------------------------------------------------------
// KPIs
// ---------------------------------------------------------------------------

/// Closed set of derived KPIs. Declaration order is report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Kpi {
    GrossSales,
    OrderCount,
    AverageOrderValue,
    Commission,
    CommissionRate,
    MarketingFees,
    CustomerDiscounts,
    PlatformDiscounts,
    MarketingSpend,
    NetPayout,
    MarketingSales,
    MarketingOrders,
    OrganicSales,
    MarketingShare,
    MarketingRoi,
    AverageRoas,
    NewCustomers,
    NewDashPassCustomers,
    TotalCustomers,
}

impl Kpi {
    pub const ALL: [Kpi; 19] = [
        Kpi::GrossSales,
        Kpi::OrderCount,
        Kpi::AverageOrderValue,
        Kpi::Commission,
        Kpi::CommissionRate,
        Kpi::MarketingFees,
        Kpi::CustomerDiscounts,
        Kpi::PlatformDiscounts,
        Kpi::MarketingSpend,
        Kpi::NetPayout,
        Kpi::MarketingSales,
        Kpi::MarketingOrders,
        Kpi::OrganicSales,
        Kpi::MarketingShare,
        Kpi::MarketingRoi,
        Kpi::AverageRoas,
        Kpi::NewCustomers,
        Kpi::NewDashPassCustomers,
        Kpi::TotalCustomers,
    ];

    /// KPIs that make sense for a single marketing campaign.
    pub const CAMPAIGN: [Kpi; 11] = [
        Kpi::AverageOrderValue,
        Kpi::MarketingFees,
        Kpi::CustomerDiscounts,
        Kpi::MarketingSpend,
        Kpi::MarketingSales,
        Kpi::MarketingOrders,
        Kpi::MarketingRoi,
        Kpi::AverageRoas,
        Kpi::NewCustomers,
        Kpi::NewDashPassCustomers,
        Kpi::TotalCustomers,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Kpi::GrossSales => "Gross Sales",
            Kpi::OrderCount => "Orders",
            Kpi::AverageOrderValue => "Average Order Value",
            Kpi::Commission => "Commission",
            Kpi::CommissionRate => "Commission Rate (%)",
            Kpi::MarketingFees => "Marketing Fees",
            Kpi::CustomerDiscounts => "Customer Discounts (merchant)",
            Kpi::PlatformDiscounts => "Customer Discounts (platform)",
            Kpi::MarketingSpend => "Marketing Spend",
            Kpi::NetPayout => "Net Payout",
            Kpi::MarketingSales => "Marketing-Driven Sales",
            Kpi::MarketingOrders => "Marketing Orders",
            Kpi::OrganicSales => "Organic Sales",
            Kpi::MarketingShare => "Marketing Share (%)",
            Kpi::MarketingRoi => "Marketing ROI (%)",
            Kpi::AverageRoas => "Average ROAS",
            Kpi::NewCustomers => "New Customers",
            Kpi::NewDashPassCustomers => "New DashPass Customers",
            Kpi::TotalCustomers => "Customers Acquired",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_zero_denominator_is_undefined() {
        assert_eq!(MetricValue::ratio(10.0, 0.0), MetricValue::Undefined);
        assert_eq!(MetricValue::ratio(0.0, 0.0), MetricValue::Undefined);
        assert_eq!(MetricValue::ratio(10.0, 4.0), MetricValue::Defined(2.5));
        assert_eq!(MetricValue::percent(1.0, 4.0), MetricValue::Defined(25.0));
    }

    #[test]
    fn test_non_finite_collapses_to_undefined() {
        assert!(MetricValue::new(f64::NAN).is_undefined());
        assert!(MetricValue::new(f64::INFINITY).is_undefined());
    }

    #[test]
    fn test_threshold_helpers_treat_undefined_as_false() {
        assert!(!MetricValue::Undefined.above(0.0));
        assert!(!MetricValue::Undefined.below(0.0));
        assert!(MetricValue::Defined(5.0).above(0.0));
        assert!(MetricValue::Defined(-5.0).below(0.0));
    }

    #[test]
    fn test_metric_value_serializes_sentinel_as_null() {
        let json = serde_json::to_string(&vec![MetricValue::Defined(1.5), MetricValue::Undefined])
            .unwrap();
        assert_eq!(json, "[1.5,null]");
    }

    #[test]
    fn test_record_missing_measure_reads_zero() {
        let r = Record {
            source: Source::Sales,
            entity_id: "1".into(),
            entity_name: "One".into(),
            campaign: None,
            date: NaiveDate::from_ymd_opt(2025, 5, 9).unwrap(),
            metric_values: BTreeMap::from([(Measure::GrossSales, 12.0)]),
        };
        assert_eq!(r.value(Measure::GrossSales), 12.0);
        assert_eq!(r.value(Measure::Subtotal), 0.0);
        assert!(!r.has(Measure::Subtotal));
    }
}
