//! Presentation adapter: spreadsheet rows, JSON files, the markdown
//! insights document and console previews. All narrative text lives here.

use crate::classify::{Insight, PerformanceTier, Recommendation, StoreAssessment};
use crate::error::{AnalysisError, Result};
use crate::period::{Comparison, PeriodKind, Window};
use crate::reports::Report;
use crate::types::{EntityKey, Kpi, MetricValue};
use crate::delta::change;
use crate::util::{format_int, format_metric, format_number, format_percent};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

pub const STORE_SUMMARY_FILE: &str = "store_summary.csv";
pub const KPI_COMPARISON_FILE: &str = "business_kpi_comparison.csv";
pub const CAMPAIGN_FILE: &str = "campaign_comparison.csv";
pub const WEEKLY_FILE: &str = "weekly_breakdown.csv";
pub const SELF_SERVE_FILE: &str = "self_serve_campaigns.csv";
pub const REPORT_FILE: &str = "report.json";
pub const SUMMARY_FILE: &str = "summary.json";
pub const INSIGHTS_FILE: &str = "insights.md";

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct StoreSummaryRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Store ID")]
    #[tabled(rename = "Store ID")]
    pub store_id: String,
    #[serde(rename = "Store Name")]
    #[tabled(rename = "Store Name")]
    pub store_name: String,
    #[serde(rename = "Sales Growth")]
    #[tabled(rename = "Sales Growth")]
    pub sales_growth: String,
    #[serde(rename = "Marketing Sales Growth")]
    #[tabled(rename = "Marketing Sales Growth")]
    pub marketing_sales_growth: String,
    #[serde(rename = "ROI Change (pts)")]
    #[tabled(rename = "ROI Change (pts)")]
    pub roi_change: String,
    #[serde(rename = "Tier")]
    #[tabled(rename = "Tier")]
    pub tier: String,
    #[serde(rename = "Priority")]
    #[tabled(rename = "Priority")]
    pub priority: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct KpiComparisonRow {
    #[serde(rename = "Comparison")]
    #[tabled(rename = "Comparison")]
    pub comparison: String,
    #[serde(rename = "KPI")]
    #[tabled(rename = "KPI")]
    pub kpi: String,
    #[serde(rename = "Baseline")]
    #[tabled(rename = "Baseline")]
    pub baseline: String,
    #[serde(rename = "Current")]
    #[tabled(rename = "Current")]
    pub current: String,
    #[serde(rename = "Change")]
    #[tabled(rename = "Change")]
    pub change: String,
    #[serde(rename = "Change %")]
    #[tabled(rename = "Change %")]
    pub change_pct: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CampaignRow {
    #[serde(rename = "Campaign")]
    #[tabled(rename = "Campaign")]
    pub campaign: String,
    #[serde(rename = "Self Serve")]
    #[tabled(rename = "Self Serve")]
    pub self_serve: String,
    #[serde(rename = "Pre Sales")]
    #[tabled(rename = "Pre Sales")]
    pub pre_sales: String,
    #[serde(rename = "Post Sales")]
    #[tabled(rename = "Post Sales")]
    pub post_sales: String,
    #[serde(rename = "Sales Change %")]
    #[tabled(rename = "Sales Change %")]
    pub sales_change: String,
    #[serde(rename = "Pre Spend")]
    #[tabled(rename = "Pre Spend")]
    pub pre_spend: String,
    #[serde(rename = "Post Spend")]
    #[tabled(rename = "Post Spend")]
    pub post_spend: String,
    #[serde(rename = "Pre ROI %")]
    #[tabled(rename = "Pre ROI %")]
    pub pre_roi: String,
    #[serde(rename = "Post ROI %")]
    #[tabled(rename = "Post ROI %")]
    pub post_roi: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SelfServeRow {
    #[serde(rename = "Metric")]
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[serde(rename = "Prior Year")]
    #[tabled(rename = "Prior Year")]
    pub prior_year: String,
    #[serde(rename = "Current Year")]
    #[tabled(rename = "Current Year")]
    pub current: String,
    #[serde(rename = "Change")]
    #[tabled(rename = "Change")]
    pub change: String,
    #[serde(rename = "Change %")]
    #[tabled(rename = "Change %")]
    pub change_pct: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct WeekRow {
    #[serde(rename = "Week")]
    #[tabled(rename = "Week")]
    pub week: usize,
    #[serde(rename = "Start")]
    #[tabled(rename = "Start")]
    pub start: String,
    #[serde(rename = "End")]
    #[tabled(rename = "End")]
    pub end: String,
    #[serde(rename = "Gross Sales")]
    #[tabled(rename = "Gross Sales")]
    pub gross_sales: String,
    #[serde(rename = "Orders")]
    #[tabled(rename = "Orders")]
    pub orders: String,
    #[serde(rename = "Net Payout")]
    #[tabled(rename = "Net Payout")]
    pub net_payout: String,
    #[serde(rename = "Marketing Spend")]
    #[tabled(rename = "Marketing Spend")]
    pub marketing_spend: String,
    #[serde(rename = "Merchant Discounts")]
    #[tabled(rename = "Merchant Discounts")]
    pub merchant_discounts: String,
}

pub fn store_summary_rows(report: &Report) -> Vec<StoreSummaryRow> {
    let mut rows: Vec<_> = report.store_summaries();
    rows.sort_by_key(|s| s.rank);
    rows.into_iter()
        .map(|s| StoreSummaryRow {
            rank: s.rank,
            store_id: s.store_id,
            store_name: s.store_name,
            sales_growth: format_percent(s.sales_growth),
            marketing_sales_growth: format_percent(s.marketing_sales_growth),
            roi_change: format_metric(s.roi_change, 2),
            tier: s.tier.to_string(),
            priority: format!("{:?}", s.priority),
        })
        .collect()
}

pub fn kpi_comparison_rows(report: &Report) -> Vec<KpiComparisonRow> {
    let mut rows = Vec::new();
    for comparison in Comparison::ALL {
        let Some(set) = report.delta_set(&EntityKey::Business, comparison) else {
            continue;
        };
        for d in &set.results {
            rows.push(KpiComparisonRow {
                comparison: comparison.label().to_string(),
                kpi: d.kpi.label().to_string(),
                baseline: format_metric(d.baseline, 2),
                current: format_metric(d.comparison, 2),
                change: format_metric(d.absolute_delta, 2),
                change_pct: format_percent(d.percent_delta),
            });
        }
    }
    rows
}

pub fn campaign_rows(report: &Report) -> Vec<CampaignRow> {
    let value = |key: &EntityKey, window: Window, kpi: Kpi| {
        report
            .aggregate(key, window)
            .and_then(|a| a.get(kpi))
            .unwrap_or(MetricValue::Undefined)
    };
    report
        .campaigns_by_roi()
        .into_iter()
        .map(|c| CampaignRow {
            campaign: c.name.clone(),
            self_serve: if c.self_serve.unwrap_or(false) { "Yes" } else { "No" }.to_string(),
            pre_sales: format_metric(value(&c.key, Window::Pre, Kpi::MarketingSales), 2),
            post_sales: format_metric(value(&c.key, Window::Post, Kpi::MarketingSales), 2),
            sales_change: format_percent(
                report
                    .delta(&c.key, Comparison::PostVsPre, Kpi::MarketingSales)
                    .map_or(MetricValue::Undefined, |d| d.percent_delta),
            ),
            pre_spend: format_metric(value(&c.key, Window::Pre, Kpi::MarketingSpend), 2),
            post_spend: format_metric(value(&c.key, Window::Post, Kpi::MarketingSpend), 2),
            pre_roi: format_metric(value(&c.key, Window::Pre, Kpi::MarketingRoi), 2),
            post_roi: format_metric(value(&c.key, Window::Post, Kpi::MarketingRoi), 2),
        })
        .collect()
}

/// Self-serve group totals; the two count rows come first.
pub fn self_serve_rows(report: &Report) -> Vec<SelfServeRow> {
    let ss = &report.self_serve;
    let counts = [
        (
            "Campaign Rows",
            ss.prior_year.aggregate.record_count,
            ss.current.aggregate.record_count,
        ),
        (
            "Unique Campaigns",
            ss.prior_year.unique_campaigns,
            ss.current.unique_campaigns,
        ),
    ];
    let mut rows: Vec<SelfServeRow> = counts
        .iter()
        .map(|(label, prior, current)| {
            let (abs, pct) = change(*prior as f64, *current as f64);
            SelfServeRow {
                metric: label.to_string(),
                prior_year: format_int(*prior),
                current: format_int(*current),
                change: format_metric(abs, 0),
                change_pct: format_percent(pct),
            }
        })
        .collect();
    rows.extend(ss.change.results.iter().map(|d| SelfServeRow {
        metric: d.kpi.label().to_string(),
        prior_year: format_metric(d.baseline, 2),
        current: format_metric(d.comparison, 2),
        change: format_metric(d.absolute_delta, 2),
        change_pct: format_percent(d.percent_delta),
    }));
    rows
}

pub fn week_rows(report: &Report) -> Vec<WeekRow> {
    report
        .weekly
        .iter()
        .map(|w| WeekRow {
            week: w.index,
            start: w.start.to_string(),
            end: w.end.to_string(),
            gross_sales: format_metric(w.get(Kpi::GrossSales), 2),
            orders: format_metric(w.get(Kpi::OrderCount), 0),
            net_payout: format_metric(w.get(Kpi::NetPayout), 2),
            marketing_spend: format_metric(w.get(Kpi::MarketingSpend), 2),
            merchant_discounts: format_metric(w.get(Kpi::CustomerDiscounts), 2),
        })
        .collect()
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush().map_err(|e| write_error(path, e))?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).map_err(|e| write_error(path, e))
}

fn write_error(path: &Path, source: std::io::Error) -> AnalysisError {
    AnalysisError::Write {
        path: path.display().to_string(),
        source,
    }
}

/// Write every output file into `dir`, returning the paths written.
pub fn write_all(report: &Report, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(|e| write_error(dir, e))?;
    let file = |name: &str| dir.join(name);

    write_json(&file(REPORT_FILE), report)?;
    write_json(&file(SUMMARY_FILE), &report.summary())?;
    write_csv(&file(STORE_SUMMARY_FILE), &store_summary_rows(report))?;
    write_csv(&file(KPI_COMPARISON_FILE), &kpi_comparison_rows(report))?;
    write_csv(&file(CAMPAIGN_FILE), &campaign_rows(report))?;
    write_csv(&file(WEEKLY_FILE), &week_rows(report))?;
    write_csv(&file(SELF_SERVE_FILE), &self_serve_rows(report))?;
    std::fs::write(file(INSIGHTS_FILE), render_markdown(report))
        .map_err(|e| write_error(&file(INSIGHTS_FILE), e))?;

    let written: Vec<PathBuf> = [
        REPORT_FILE,
        SUMMARY_FILE,
        STORE_SUMMARY_FILE,
        KPI_COMPARISON_FILE,
        CAMPAIGN_FILE,
        WEEKLY_FILE,
        SELF_SERVE_FILE,
        INSIGHTS_FILE,
    ]
    .iter()
    .map(|n| dir.join(n))
    .collect();
    info!(files = written.len(), dir = %dir.display(), "outputs written");
    Ok(written)
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    println!("{}\n", markdown_table(slice));
}

fn markdown_table<T: Tabled>(rows: Vec<T>) -> String {
    Table::new(rows).with(Style::markdown()).to_string()
}

fn insight_text(insight: &Insight) -> String {
    match insight {
        Insight::SalesGrowth { tier, growth } => {
            let lead = match tier {
                PerformanceTier::Excellent => "Exceptional sales growth",
                PerformanceTier::Good => "Strong sales growth",
                PerformanceTier::Moderate => "Modest sales growth",
                PerformanceTier::Poor => "Sales declined",
            };
            format!("{} ({})", lead, format_percent(*growth))
        }
        Insight::MarketingHighlyEffective { growth } => format!(
            "Marketing highly effective: marketing-driven sales {} with improving ROI",
            format_percent(*growth)
        ),
        Insight::MarketingEffective { growth } => format!(
            "Marketing effective: marketing-driven sales {} with improving ROI",
            format_percent(*growth)
        ),
        Insight::MarketingUnderperforming { growth, roi_change } => format!(
            "Marketing underperforming: marketing-driven sales {}, ROI change {} pts",
            format_percent(*growth),
            format_metric(*roi_change, 2)
        ),
        Insight::StrongOrganicGrowth { growth } => {
            format!("Strong organic growth ({})", format_percent(*growth))
        }
        Insight::OrganicDecline { growth } => {
            format!("Organic sales declined ({})", format_percent(*growth))
        }
        Insight::OrderSurge { growth } => {
            format!("Order volume surged ({})", format_percent(*growth))
        }
        Insight::OrderDecline { growth } => {
            format!("Order volume fell ({})", format_percent(*growth))
        }
        Insight::AverageOrderValueUp { growth } => {
            format!("Average order value rose ({})", format_percent(*growth))
        }
        Insight::AverageOrderValueDown { growth } => {
            format!("Average order value fell ({})", format_percent(*growth))
        }
        Insight::SpendUpReturnDown => {
            "Marketing spend rose sharply while ROI dropped".to_string()
        }
        Insight::SpendDownSalesUp => {
            "Marketing sales grew on a reduced budget".to_string()
        }
    }
}

fn recommendation_text(rec: Recommendation) -> &'static str {
    match rec {
        Recommendation::ScaleSuccessfulInitiatives => {
            "Scale the initiatives that drove this growth to similar stores"
        }
        Recommendation::ExpandSuccessfulCampaigns => {
            "Expand the campaigns that are working and keep momentum"
        }
        Recommendation::ImproveMarketingStrategy => {
            "Revisit the marketing mix to lift growth above the current pace"
        }
        Recommendation::UrgentGrowthReview => {
            "Review operations, menu and pricing urgently to reverse the decline"
        }
        Recommendation::IncreaseMarketingBudget => {
            "Increase budget on the best-returning campaigns"
        }
        Recommendation::OptimizeAndTestChannels => {
            "Optimize current campaigns and test additional channels"
        }
        Recommendation::RestructureCampaigns => {
            "Restructure or pause campaigns with negative returns"
        }
        Recommendation::InvestInRetention => {
            "Invest in retention to keep organic customers returning"
        }
        Recommendation::BrandBuilding => {
            "Strengthen brand visibility to recover organic demand"
        }
        Recommendation::EnsureCapacity => {
            "Make sure kitchen and staffing capacity can absorb the order growth"
        }
        Recommendation::CustomerAcquisition => {
            "Run acquisition offers to win back order volume"
        }
        Recommendation::ContinueUpselling => {
            "Keep the bundling and upselling that lifted basket size"
        }
        Recommendation::ReviewPricing => {
            "Review pricing and discount depth, basket size is shrinking"
        }
        Recommendation::RefocusSpend => {
            "Cut back spend to the campaigns that still return"
        }
        Recommendation::AccelerateWithBudget => {
            "Consider adding budget back, marketing is converting efficiently"
        }
    }
}

fn store_section(out: &mut String, report: &Report, a: &StoreAssessment) {
    let name = report
        .entity(&a.entity)
        .map(|e| e.name.as_str())
        .unwrap_or("Unknown");
    let _ = writeln!(out, "### {} ({})\n", name, a.entity.id());
    let _ = writeln!(out, "Tier: **{}**, priority: **{:?}**\n", a.tier, a.priority);
    for insight in &a.insights {
        let _ = writeln!(out, "- {}", insight_text(insight));
    }
    let _ = writeln!(out, "\nRecommendations:\n");
    for rec in &a.recommendations {
        let _ = writeln!(out, "- {}", recommendation_text(*rec));
    }
    out.push('\n');
}

/// The human-readable insights document.
pub fn render_markdown(report: &Report) -> String {
    let mut out = String::new();
    let summary = report.summary();

    let _ = writeln!(out, "# Store Performance Impact Report\n");
    for kind in PeriodKind::ALL {
        let p = report.periods.get(kind);
        let _ = writeln!(out, "- {}: {}", kind, p);
    }
    out.push('\n');

    let _ = writeln!(out, "## Summary\n");
    let _ = writeln!(out, "- Stores analyzed: {}", summary.store_count);
    let _ = writeln!(
        out,
        "- Business sales growth: {}",
        format_percent(summary.business_sales_growth)
    );
    let _ = writeln!(
        out,
        "- Average store sales growth: {}",
        format_percent(summary.average_sales_growth)
    );
    let _ = writeln!(
        out,
        "- Average marketing-driven sales growth: {}",
        format_percent(summary.average_marketing_sales_growth)
    );
    for (tier, n) in &summary.tier_counts {
        let _ = writeln!(out, "- {} stores: {}", tier, n);
    }
    let _ = writeln!(out, "- High priority stores: {}", summary.high_priority_stores);
    out.push('\n');

    let business: Vec<KpiComparisonRow> = kpi_comparison_rows(report)
        .into_iter()
        .filter(|r| r.comparison == Comparison::PostVsPre.label())
        .collect();
    if !business.is_empty() {
        let _ = writeln!(out, "## Business KPIs ({})\n", Comparison::PostVsPre.label());
        let _ = writeln!(out, "{}\n", markdown_table(business));
    }

    let growth_line = |out: &mut String, rank: usize, key: &EntityKey, growth: MetricValue| {
        let name = report.entity(key).map(|e| e.name.as_str()).unwrap_or("Unknown");
        let _ = writeln!(out, "{}. {} ({}): {}", rank, name, key.id(), format_percent(growth));
    };
    let _ = writeln!(out, "## Top Performers\n");
    for r in report.ranking.top_performers() {
        growth_line(&mut out, r.rank, &r.entity, r.sales_growth);
    }
    let _ = writeln!(out, "\n## Stores Requiring Attention\n");
    for r in report.ranking.needs_attention() {
        growth_line(&mut out, r.rank, &r.entity, r.sales_growth);
    }
    out.push('\n');

    let ss = &report.self_serve;
    let _ = writeln!(out, "## Self-Serve Campaigns\n");
    let _ = writeln!(
        out,
        "{} rows across {} campaigns in the prior year, {} rows across {} campaigns this year.\n",
        ss.prior_year.aggregate.record_count,
        ss.prior_year.unique_campaigns,
        ss.current.aggregate.record_count,
        ss.current.unique_campaigns
    );
    let _ = writeln!(out, "{}\n", markdown_table(self_serve_rows(report)));

    let _ = writeln!(out, "## Store Details\n");
    for a in &report.assessments {
        store_section(&mut out, report, a);
    }

    if let Some(total) = report
        .weekly
        .iter()
        .map(|w| w.get(Kpi::GrossSales).value())
        .sum::<Option<f64>>()
    {
        let _ = writeln!(
            out,
            "Weekly gross sales across {} weeks: {}",
            report.weekly.len(),
            format_number(total, 2)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_recommendation_has_text() {
        let recs = [
            Recommendation::ScaleSuccessfulInitiatives,
            Recommendation::UrgentGrowthReview,
            Recommendation::RefocusSpend,
            Recommendation::AccelerateWithBudget,
        ];
        for r in recs {
            assert!(!recommendation_text(r).is_empty());
        }
    }

    #[test]
    fn test_insight_text_renders_sentinel() {
        let text = insight_text(&Insight::SalesGrowth {
            tier: PerformanceTier::Excellent,
            growth: MetricValue::Undefined,
        });
        assert_eq!(text, "Exceptional sales growth (undefined)");
        let text = insight_text(&Insight::OrderDecline {
            growth: MetricValue::Defined(-20.0),
        });
        assert_eq!(text, "Order volume fell (-20.00%)");
    }
}
