use chrono::NaiveDate;
use impact_report::classify::{PerformanceTier, Priority};
use impact_report::output;
use impact_report::period::{Comparison, PeriodKind, Window};
use impact_report::types::{EntityKey, Kpi, MetricValue};
use impact_report::{run_analysis, AnalysisConfig, AnalysisError, Normalizer, Record, Report};

const SALES: &str = "\
Start Date,Store ID,Store Name,Gross Sales,Total Delivered or Picked Up Orders,Total Commission
2025-05-09,101,Downtown,10000,500,1500
2025-07-09,101,Downtown,12320,1071,1800
2024-05-09,101,Downtown,8000,400,1200
2024-07-09,101,Downtown,8800,440,1300
2025-05-20,102,Uptown,5000,250,750
2025-07-20,102,Uptown,4000,200,600
2024-05-20,102,Uptown,4500,225,700
2024-07-20,102,Uptown,4600,230,700
2025-12-01,103,Elsewhere,100,5,10
";

const MARKETING: &str = "\
Date,Store ID,Store name,Campaign name,Is self serve campaign,Orders,Sales,Customer discounts from marketing | (Funded by you),Marketing fees | (including any applicable taxes),ROAS
2025-07-15,101,Downtown,Launch,TRUE,50,1500,200,100,5.0
";

fn records() -> Vec<Record> {
    let mut n = Normalizer::new();
    n.ingest_sales(SALES.as_bytes()).unwrap();
    n.ingest_marketing(MARKETING.as_bytes()).unwrap();
    n.finish().records
}

fn report() -> Report {
    run_analysis(&records(), AnalysisConfig::default()).unwrap()
}

fn store(id: &str) -> EntityKey {
    EntityKey::Store(id.to_string())
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn test_store_growth_tier_and_average_order_value() {
    let report = report();
    let sales = report
        .delta(&store("101"), Comparison::PostVsPre, Kpi::GrossSales)
        .unwrap();
    let pct = sales.percent_delta.value().unwrap();
    assert!((pct - 23.2).abs() < 1e-9);
    assert_eq!(report.assessment(&store("101")).unwrap().tier, PerformanceTier::Good);

    let aov = report
        .delta(&store("101"), Comparison::PostVsPre, Kpi::AverageOrderValue)
        .unwrap();
    assert_eq!(aov.baseline, MetricValue::Defined(20.0));
    let post = aov.comparison.value().unwrap();
    assert!((post - 11.50).abs() < 0.01);
}

#[test]
fn test_zero_pre_spend_gives_sentinel_roi_delta() {
    let report = report();
    let roi = report
        .delta(&store("101"), Comparison::PostVsPre, Kpi::MarketingRoi)
        .unwrap();
    assert_eq!(roi.baseline, MetricValue::Undefined);
    assert_eq!(roi.percent_delta, MetricValue::Undefined);

    let spend = report
        .delta(&store("101"), Comparison::PostVsPre, Kpi::MarketingSpend)
        .unwrap();
    assert_eq!(spend.absolute_delta, MetricValue::Defined(300.0));
    assert_eq!(spend.percent_delta, MetricValue::Undefined);
}

#[test]
fn test_repeated_runs_serialize_identically() {
    let first = serde_json::to_string(&report()).unwrap();
    let second = serde_json::to_string(&report()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_rankings_cover_every_store_once() {
    let report = report();
    let mut ids: Vec<&str> = report
        .ranking
        .top_performers()
        .iter()
        .chain(report.ranking.needs_attention())
        .map(|r| r.entity.id())
        .collect();
    assert_eq!(ids, vec!["101", "102"]);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), report.stores().count());
}

#[test]
fn test_out_of_period_store_is_not_registered() {
    let report = report();
    assert_eq!(report.unassigned_records, 1);
    assert!(report.entity(&store("103")).is_none());
    let order: Vec<&EntityKey> = report.entities.iter().map(|e| &e.key).collect();
    assert_eq!(
        order,
        vec![
            &EntityKey::Business,
            &store("101"),
            &store("102"),
            &EntityKey::Campaign("Launch".into()),
        ]
    );
}

#[test]
fn test_global_summary() {
    let summary = report().summary();
    assert_eq!(summary.store_count, 2);
    assert_eq!(summary.tier_counts[&PerformanceTier::Good], 1);
    assert_eq!(summary.tier_counts[&PerformanceTier::Poor], 1);
    assert_eq!(summary.tier_counts[&PerformanceTier::Excellent], 0);
    assert_eq!(summary.high_priority_stores, 1);
    let avg = summary.average_sales_growth.value().unwrap();
    assert!((avg - 1.6).abs() < 1e-9);
    // Downtown's marketing growth is undefined (zero pre-period), Uptown's is 0 to 0.
    assert_eq!(summary.average_marketing_sales_growth, MetricValue::Defined(0.0));
    let business = summary.business_sales_growth.value().unwrap();
    assert!((business - 8.8).abs() < 1e-9);
}

#[test]
fn test_poor_store_is_high_priority() {
    let report = report();
    let a = report.assessment(&store("102")).unwrap();
    assert_eq!(a.tier, PerformanceTier::Poor);
    assert_eq!(a.priority, Priority::High);
}

#[test]
fn test_year_over_year_comparisons() {
    let report = report();
    let pre_yoy = report
        .delta(&store("101"), Comparison::PreYearOverYear, Kpi::GrossSales)
        .unwrap();
    assert_eq!(pre_yoy.percent_delta, MetricValue::Defined(25.0));

    let overall = report
        .delta(&EntityKey::Business, Comparison::OverallYearOverYear, Kpi::GrossSales)
        .unwrap();
    assert_eq!(overall.baseline, MetricValue::Defined(25_900.0));
    assert_eq!(overall.comparison, MetricValue::Defined(31_320.0));

    let by_store = report.deltas_for(Kpi::GrossSales, Comparison::PriorYearPostVsPre);
    assert_eq!(by_store.len(), 3);
    assert_eq!(by_store[1].1.percent_delta, MetricValue::Defined(10.0));
}

#[test]
fn test_campaign_aggregates() {
    let report = report();
    let launch = EntityKey::Campaign("Launch".into());
    let post = report.aggregate(&launch, Window::Post).unwrap();
    assert_eq!(post.get(Kpi::MarketingSales), Some(MetricValue::Defined(1_500.0)));
    assert_eq!(post.get(Kpi::MarketingRoi), Some(MetricValue::Defined(400.0)));
    let pre = report.aggregate(&launch, Window::Pre).unwrap();
    assert_eq!(pre.record_count, 0);
    assert_eq!(report.entity(&launch).unwrap().self_serve, Some(true));
}

#[test]
fn test_self_serve_year_over_year_summary() {
    let report = report();
    let ss = &report.self_serve;
    assert_eq!(ss.prior_year.aggregate.record_count, 0);
    assert_eq!(ss.prior_year.unique_campaigns, 0);
    assert_eq!(ss.current.aggregate.record_count, 1);
    assert_eq!(ss.current.unique_campaigns, 1);
    assert_eq!(ss.current.aggregate.window, Window::Current);
    assert_eq!(
        ss.current.aggregate.get(Kpi::MarketingSpend),
        Some(MetricValue::Defined(300.0))
    );

    let sales = ss.change.get(Kpi::MarketingSales).unwrap();
    assert_eq!(sales.baseline, MetricValue::Defined(0.0));
    assert_eq!(sales.comparison, MetricValue::Defined(1_500.0));
    assert_eq!(sales.absolute_delta, MetricValue::Defined(1_500.0));
    assert_eq!(sales.percent_delta, MetricValue::Undefined);
    assert_eq!(ss.change.entity, EntityKey::SelfServeCampaigns);
}

#[test]
fn test_campaign_rows_ordered_by_post_roi() {
    const MORE_MARKETING: &str = "\
Date,Store ID,Store name,Campaign name,Is self serve campaign,Orders,Sales,Marketing fees | (including any applicable taxes)
2025-07-20,102,Uptown,Anniversary,FALSE,20,1300,100
2025-07-21,102,Uptown,Bundle,FALSE,10,400,200
2025-07-22,101,Downtown,Afterhours,FALSE,10,1300,100
2025-05-20,102,Uptown,Spring,FALSE,10,300,50
";
    let mut n = Normalizer::new();
    n.ingest_sales(SALES.as_bytes()).unwrap();
    n.ingest_marketing(MARKETING.as_bytes()).unwrap();
    n.ingest_marketing(MORE_MARKETING.as_bytes()).unwrap();
    let report = run_analysis(&n.finish().records, AnalysisConfig::default()).unwrap();

    let names: Vec<String> = output::campaign_rows(&report)
        .into_iter()
        .map(|r| r.campaign)
        .collect();
    // Afterhours and Anniversary tie at 1200%; Spring has no post-period ROI.
    assert_eq!(names, vec!["Afterhours", "Anniversary", "Launch", "Bundle", "Spring"]);
}

#[test]
fn test_weekly_breakdown_spans_both_periods() {
    let report = report();
    assert_eq!(report.weekly.len(), 18);
    assert_eq!(report.weekly[0].start, d(2025, 5, 9));
    assert_eq!(report.weekly[17].end, d(2025, 9, 8));
    let total: f64 = report
        .weekly
        .iter()
        .filter_map(|w| w.get(Kpi::GrossSales).value())
        .sum();
    assert_eq!(total, 31_320.0);
}

#[test]
fn test_misordered_period_aborts_run() {
    let config = AnalysisConfig {
        pre_start: d(2025, 7, 8),
        pre_end: d(2025, 5, 9),
        ..AnalysisConfig::default()
    };
    let err = run_analysis(&records(), config).unwrap_err();
    assert_eq!(
        err.to_string(),
        "pre-period end date 2025-05-09 precedes start date 2025-07-08"
    );
}

#[test]
fn test_gap_between_periods_aborts_run() {
    let config = AnalysisConfig {
        post_start: d(2025, 7, 20),
        ..AnalysisConfig::default()
    };
    let err = run_analysis(&records(), config).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::PeriodGap { second: PeriodKind::Post, .. }
    ));
    assert!(err.to_string().contains("post-period starts 2025-07-20"));
}

#[test]
fn test_missing_prior_year_data_aborts_run() {
    let current_only: Vec<Record> = records()
        .into_iter()
        .filter(|r| r.date.format("%Y").to_string() == "2025")
        .collect();
    let err = run_analysis(&current_only, AnalysisConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::EmptyPeriod { period: PeriodKind::PrePriorYear, .. }
    ));
}

#[test]
fn test_write_all_outputs() {
    let report = report();
    let dir = tempfile::tempdir().unwrap();
    let written = output::write_all(&report, dir.path()).unwrap();
    assert_eq!(written.len(), 8);
    for path in &written {
        assert!(path.exists(), "{} missing", path.display());
    }

    let summary = std::fs::read_to_string(dir.path().join(output::STORE_SUMMARY_FILE)).unwrap();
    let mut lines = summary.lines();
    assert!(lines.next().unwrap().starts_with("Rank,Store ID,Store Name,Sales Growth"));
    assert!(lines.next().unwrap().starts_with("1,101,Downtown,+23.20%"));

    let self_serve = std::fs::read_to_string(dir.path().join(output::SELF_SERVE_FILE)).unwrap();
    let mut lines = self_serve.lines();
    assert_eq!(lines.next(), Some("Metric,Prior Year,Current Year,Change,Change %"));
    assert_eq!(lines.next(), Some("Campaign Rows,0,1,1,undefined"));

    let markdown = std::fs::read_to_string(dir.path().join(output::INSIGHTS_FILE)).unwrap();
    assert!(markdown.contains("## Self-Serve Campaigns"));
    assert!(markdown.contains("## Top Performers"));
    assert!(markdown.contains("1. Downtown (101): +23.20%"));
    assert!(markdown.contains("Sales declined (-20.00%)"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join(output::SUMMARY_FILE)).unwrap())
            .unwrap();
    assert_eq!(json["store_count"], 2);
    assert_eq!(json["average_marketing_sales_growth"], 0.0);
    assert!(json["business_sales_growth"].is_number());
}
