//! Record normalizer.
//!
//! Reads the three export families into one sequence of [`Record`]s. Bad
//! rows are dropped and counted per source; they never abort a load.

use crate::error::{AnalysisError, Result};
use crate::types::{
    CampaignRef, Measure, RawFinancialRow, RawMarketingRow, RawSalesRow, Record, Source,
};
use crate::util::{is_blank, parse_bool_safe, parse_date_safe, parse_f64_safe};
use csv::ReaderBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    MalformedRow,
    UnparseableDate,
    MissingEntityId,
    MalformedNumber,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DropReason::MalformedRow => "malformed row",
            DropReason::UnparseableDate => "unparseable date",
            DropReason::MissingEntityId => "missing entity id",
            DropReason::MalformedNumber => "malformed number",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub source: Source,
    pub total_rows: usize,
    pub kept_rows: usize,
    /// Well-formed rows that are not observations (e.g. non-order transactions).
    pub filtered_rows: usize,
    pub dropped: BTreeMap<DropReason, usize>,
}

impl LoadReport {
    fn new(source: Source) -> Self {
        Self {
            source,
            total_rows: 0,
            kept_rows: 0,
            filtered_rows: 0,
            dropped: BTreeMap::new(),
        }
    }

    pub fn dropped_rows(&self) -> usize {
        self.dropped.values().sum()
    }

    /// One line per drop reason, e.g. `3 rows dropped from source sales: unparseable date`.
    pub fn summary_lines(&self) -> Vec<String> {
        self.dropped
            .iter()
            .map(|(reason, n)| format!("{} rows dropped from source {}: {}", n, self.source, reason))
            .collect()
    }
}

/// Output of the normalizer: records in input order plus per-source counts.
#[derive(Debug, Clone)]
pub struct NormalizedInput {
    pub records: Vec<Record>,
    pub reports: Vec<LoadReport>,
}

#[derive(Debug, Default)]
pub struct Normalizer {
    records: Vec<Record>,
    reports: BTreeMap<Source, LoadReport>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest_financial<R: Read>(&mut self, reader: R) -> Result<()> {
        self.ingest(Source::Financial, reader, financial_record)
    }

    /// Promotion and sponsored-listing exports share this reader.
    pub fn ingest_marketing<R: Read>(&mut self, reader: R) -> Result<()> {
        self.ingest(Source::Marketing, reader, marketing_record)
    }

    pub fn ingest_sales<R: Read>(&mut self, reader: R) -> Result<()> {
        self.ingest(Source::Sales, reader, sales_record)
    }

    pub fn ingest_path(&mut self, source: Source, path: &str) -> Result<()> {
        let file = File::open(path).map_err(|e| AnalysisError::Open {
            path: path.to_string(),
            source: e,
        })?;
        debug!(%source, path, "reading export");
        match source {
            Source::Financial => self.ingest_financial(file),
            Source::Marketing => self.ingest_marketing(file),
            Source::Sales => self.ingest_sales(file),
        }
    }

    fn ingest<T, R, F>(&mut self, source: Source, reader: R, convert: F) -> Result<()>
    where
        T: DeserializeOwned,
        R: Read,
        F: Fn(T) -> std::result::Result<Option<Record>, DropReason>,
    {
        let mut rdr = ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        rdr.headers()?;

        let report = self
            .reports
            .entry(source)
            .or_insert_with(|| LoadReport::new(source));

        for result in rdr.deserialize::<T>() {
            report.total_rows += 1;
            let row = match result {
                Ok(r) => r,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    debug!(%source, error = %e, "undecodable row");
                    *report.dropped.entry(DropReason::MalformedRow).or_default() += 1;
                    continue;
                }
            };
            match convert(row) {
                Ok(Some(record)) => {
                    report.kept_rows += 1;
                    self.records.push(record);
                }
                Ok(None) => report.filtered_rows += 1,
                Err(reason) => *report.dropped.entry(reason).or_default() += 1,
            }
        }
        Ok(())
    }

    pub fn finish(self) -> NormalizedInput {
        let reports: Vec<LoadReport> = self.reports.into_values().collect();
        for report in &reports {
            info!(
                source = %report.source,
                total = report.total_rows,
                kept = report.kept_rows,
                filtered = report.filtered_rows,
                "source normalized"
            );
            for line in report.summary_lines() {
                warn!("{}", line);
            }
        }
        NormalizedInput {
            records: self.records,
            reports,
        }
    }
}

/// Blank cells are zero; anything else must parse.
fn amount(cell: Option<&str>) -> std::result::Result<f64, DropReason> {
    if is_blank(cell) {
        return Ok(0.0);
    }
    parse_f64_safe(cell).ok_or(DropReason::MalformedNumber)
}

/// First non-blank of two column variants for the same figure.
fn amount_either(current: Option<&str>, historical: Option<&str>) -> std::result::Result<f64, DropReason> {
    if is_blank(current) {
        amount(historical)
    } else {
        amount(current)
    }
}

fn entity_id(cell: Option<&str>) -> std::result::Result<String, DropReason> {
    match cell.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(DropReason::MissingEntityId),
    }
}

fn entity_name(cell: Option<String>) -> String {
    cell.map(|s| s.trim().to_string()).unwrap_or_default()
}

fn financial_record(row: RawFinancialRow) -> std::result::Result<Option<Record>, DropReason> {
    let is_order = row
        .transaction_type
        .as_deref()
        .map_or(false, |t| t.trim().eq_ignore_ascii_case("order"));
    if !is_order {
        return Ok(None);
    }
    let entity_id = entity_id(row.store_id.as_deref())?;
    let date = parse_date_safe(row.timestamp_date.as_deref())
        .or_else(|| parse_date_safe(row.payout_date.as_deref()))
        .ok_or(DropReason::UnparseableDate)?;

    let metric_values = BTreeMap::from([
        (Measure::Subtotal, amount(row.subtotal.as_deref())?),
        (Measure::Orders, 1.0),
        (Measure::Commission, amount(row.commission.as_deref())?.abs()),
        (
            Measure::MarketingFees,
            amount_either(
                row.marketing_fees.as_deref(),
                row.marketing_fees_historical.as_deref(),
            )?,
        ),
        (
            Measure::CustomerDiscounts,
            amount_either(
                row.merchant_discounts.as_deref(),
                row.merchant_discounts_capitalised.as_deref(),
            )?,
        ),
        (
            Measure::PlatformDiscounts,
            amount_either(
                row.platform_discounts.as_deref(),
                row.platform_discounts_capitalised.as_deref(),
            )?,
        ),
        (Measure::NetTotal, amount(row.net_total.as_deref())?),
    ]);

    Ok(Some(Record {
        source: Source::Financial,
        entity_id,
        entity_name: entity_name(row.store_name),
        campaign: None,
        date,
        metric_values,
    }))
}

fn marketing_record(row: RawMarketingRow) -> std::result::Result<Option<Record>, DropReason> {
    let entity_id = entity_id(row.store_id.as_deref())?;
    let date = parse_date_safe(row.date.as_deref()).ok_or(DropReason::UnparseableDate)?;

    let mut metric_values = BTreeMap::from([
        (Measure::Orders, amount(row.orders.as_deref())?),
        (Measure::CampaignSales, amount(row.sales.as_deref())?),
        (
            Measure::MarketingFees,
            amount_either(
                row.marketing_fees.as_deref(),
                row.marketing_fees_historical.as_deref(),
            )?,
        ),
        (
            Measure::CustomerDiscounts,
            amount_either(
                row.merchant_discounts.as_deref(),
                row.merchant_discounts_capitalised.as_deref(),
            )?,
        ),
        (Measure::NewCustomers, amount(row.new_customers.as_deref())?),
        (Measure::NewDashPassCustomers, amount(row.new_dp_customers.as_deref())?),
        (Measure::TotalCustomers, amount(row.total_customers.as_deref())?),
    ]);
    // Only rows that report ROAS take part in its average.
    if !is_blank(row.roas.as_deref()) {
        metric_values.insert(Measure::Roas, amount(row.roas.as_deref())?);
    }

    let campaign = row
        .campaign_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .map(|name| CampaignRef {
            name,
            self_serve: parse_bool_safe(row.is_self_serve.as_deref()),
        });

    Ok(Some(Record {
        source: Source::Marketing,
        entity_id,
        entity_name: entity_name(row.store_name),
        campaign,
        date,
        metric_values,
    }))
}

fn sales_record(row: RawSalesRow) -> std::result::Result<Option<Record>, DropReason> {
    let entity_id = entity_id(row.store_id.as_deref())?;
    let date = parse_date_safe(row.start_date.as_deref()).ok_or(DropReason::UnparseableDate)?;

    let metric_values = BTreeMap::from([
        (Measure::GrossSales, amount(row.gross_sales.as_deref())?),
        (Measure::Orders, amount(row.orders.as_deref())?),
        (Measure::Commission, amount(row.total_commission.as_deref())?.abs()),
    ]);

    Ok(Some(Record {
        source: Source::Sales,
        entity_id,
        entity_name: entity_name(row.store_name),
        campaign: None,
        date,
        metric_values,
    }))
}
