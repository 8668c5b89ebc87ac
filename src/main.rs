// Entry point and high-level CLI flow.
//
// Loads the exports named on the command line, runs one analysis over the
// configured periods, writes every output file and prints short previews.
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use impact_report::output;
use impact_report::types::Source;
use impact_report::util::{format_int, format_percent};
use impact_report::{run_analysis, AnalysisConfig, Normalizer};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "impact_report")]
#[command(about = "Pre/post and year-over-year store performance analysis")]
#[command(version)]
struct Cli {
    /// Financial transaction export (repeat for current and prior year)
    #[arg(long = "financial", value_name = "CSV")]
    financial: Vec<String>,

    /// Promotion or sponsored-listing export (repeatable)
    #[arg(long = "marketing", value_name = "CSV")]
    marketing: Vec<String>,

    /// Sales-by-store-by-time export (repeatable)
    #[arg(long = "sales", value_name = "CSV")]
    sales: Vec<String>,

    /// First day of the pre-period
    #[arg(long, env = "IMPACT_PRE_START", default_value = "2025-05-09")]
    pre_start: NaiveDate,

    /// Last day of the pre-period
    #[arg(long, env = "IMPACT_PRE_END", default_value = "2025-07-08")]
    pre_end: NaiveDate,

    /// First day of the post-period
    #[arg(long, env = "IMPACT_POST_START", default_value = "2025-07-09")]
    post_start: NaiveDate,

    /// Last day of the post-period
    #[arg(long, env = "IMPACT_POST_END", default_value = "2025-09-08")]
    post_end: NaiveDate,

    /// Directory the reports are written to
    #[arg(long, env = "IMPACT_OUT_DIR", default_value = "reports")]
    out_dir: PathBuf,

    /// Rows shown per console preview
    #[arg(long, default_value_t = 5)]
    preview_rows: usize,
}

impl Cli {
    fn config(&self) -> AnalysisConfig {
        AnalysisConfig {
            pre_start: self.pre_start,
            pre_end: self.pre_end,
            post_start: self.post_start,
            post_end: self.post_end,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.financial.is_empty() && cli.sales.is_empty() {
        bail!("at least one --financial or --sales export is required");
    }

    let mut normalizer = Normalizer::new();
    let inputs = [
        (Source::Financial, &cli.financial),
        (Source::Marketing, &cli.marketing),
        (Source::Sales, &cli.sales),
    ];
    for (source, paths) in inputs {
        for path in paths {
            normalizer
                .ingest_path(source, path)
                .with_context(|| format!("loading {} export", source))?;
        }
    }
    let input = normalizer.finish();

    println!(
        "Processing dataset... ({} records loaded)",
        format_int(input.records.len())
    );
    for report in &input.reports {
        println!(
            "  {}: {} rows, {} kept, {} filtered, {} dropped",
            report.source,
            format_int(report.total_rows),
            format_int(report.kept_rows),
            format_int(report.filtered_rows),
            format_int(report.dropped_rows())
        );
        for line in report.summary_lines() {
            println!("  Note: {}", line);
        }
    }
    println!();

    let report = run_analysis(&input.records, cli.config()).context("analysis aborted")?;
    let written = output::write_all(&report, &cli.out_dir)?;
    info!(out_dir = %cli.out_dir.display(), "reports ready");

    let summary = report.summary();
    println!("Summary Stats ({}):", output::SUMMARY_FILE);
    println!(
        "{} stores, average sales growth {}, average marketing sales growth {}\n",
        summary.store_count,
        format_percent(summary.average_sales_growth),
        format_percent(summary.average_marketing_sales_growth)
    );

    println!("Store Performance Summary\n");
    output::preview_table_rows(&output::store_summary_rows(&report), cli.preview_rows);
    println!("Business KPIs\n");
    output::preview_table_rows(&output::kpi_comparison_rows(&report), cli.preview_rows);
    println!("Campaigns\n");
    output::preview_table_rows(&output::campaign_rows(&report), cli.preview_rows);
    println!("Self-Serve Campaigns\n");
    output::preview_table_rows(&output::self_serve_rows(&report), cli.preview_rows);
    println!("Weekly Breakdown\n");
    output::preview_table_rows(&output::week_rows(&report), cli.preview_rows);

    println!("Outputs saved:");
    for path in written {
        println!("  {}", path.display());
    }
    Ok(())
}
