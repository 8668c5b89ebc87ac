//! Store-level impact analysis for delivery-platform exports.
//!
//! Financial, marketing and sales exports are normalized into [`Record`]s,
//! split into pre/post periods (plus the same periods one year earlier),
//! aggregated per entity and compared. [`run_analysis`] drives the whole
//! pipeline; presentation lives in [`output`].

pub mod aggregate;
pub mod classify;
pub mod delta;
pub mod error;
pub mod loader;
pub mod output;
pub mod period;
pub mod reports;
pub mod types;
pub mod util;
pub mod weekly;

pub use error::{AnalysisError, Result};
pub use loader::{LoadReport, NormalizedInput, Normalizer};
pub use period::AnalysisConfig;
pub use reports::Report;
pub use types::Record;

use aggregate::{aggregate_window, self_serve_summary, EntityRegistry};
use classify::{assess, Ranking};
use delta::compare;
use period::{partition, Comparison, PeriodKind, PeriodSet, Window};
use std::collections::BTreeMap;
use tracing::info;
use types::Kpi;

/// Run one analysis over normalized records.
///
/// Structural problems (bad period boundaries, a period without usable
/// data) abort the run; nothing is partially reported.
pub fn run_analysis(records: &[Record], config: AnalysisConfig) -> Result<Report> {
    let periods = PeriodSet::from_config(config)?;
    let parts = partition(records, &periods)?;

    let registry = EntityRegistry::from_records(
        records
            .iter()
            .filter(|r| periods.iter().any(|p| p.contains(r.date))),
    );
    info!(entities = registry.len(), "entity registry built");

    let by_window: BTreeMap<Window, Vec<aggregate::Aggregate>> = Window::ALL
        .iter()
        .map(|w| (*w, aggregate_window(&registry, *w, &parts.window(*w))))
        .collect();
    info!(windows = by_window.len(), "aggregates computed");

    let mut deltas = Vec::with_capacity(Comparison::ALL.len() * registry.len());
    for comparison in Comparison::ALL {
        let baseline = &by_window[&comparison.baseline()];
        let current = &by_window[&comparison.comparison()];
        deltas.extend(
            baseline
                .iter()
                .zip(current)
                .map(|(b, c)| compare(comparison, b, c)),
        );
    }
    info!(delta_sets = deltas.len(), "deltas computed");

    let store_deltas: Vec<&delta::DeltaSet> = deltas
        .iter()
        .filter(|d| d.comparison == Comparison::PostVsPre && d.entity.is_store())
        .collect();
    let assessments: Vec<_> = store_deltas.iter().map(|d| assess(d)).collect();
    let ranking = Ranking::build(
        store_deltas
            .iter()
            .filter_map(|d| d.get(Kpi::GrossSales).map(|g| (&d.entity, g))),
    );
    info!(stores = assessments.len(), "stores classified");

    let weekly = weekly::breakdown(
        records,
        periods.get(PeriodKind::Pre).start,
        periods.get(PeriodKind::Post).end,
    );

    let self_serve = reports::SelfServeReport::new(
        self_serve_summary(Window::PriorYear, &parts.window(Window::PriorYear)),
        self_serve_summary(Window::Current, &parts.window(Window::Current)),
    );
    info!(
        prior_year = self_serve.prior_year.aggregate.record_count,
        current = self_serve.current.aggregate.record_count,
        "self-serve campaigns summarized"
    );

    let aggregates = by_window.into_values().flatten().collect();
    Ok(reports::assemble(
        periods,
        &registry,
        aggregates,
        deltas,
        assessments,
        ranking,
        weekly,
        self_serve,
        parts.unassigned,
    ))
}
