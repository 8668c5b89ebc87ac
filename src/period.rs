//! Analysis periods and the period partitioner.

use crate::error::{AnalysisError, Result};
use crate::types::{Record, Source};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    Pre,
    Post,
    PrePriorYear,
    PostPriorYear,
}

impl PeriodKind {
    pub const ALL: [PeriodKind; 4] = [
        PeriodKind::Pre,
        PeriodKind::Post,
        PeriodKind::PrePriorYear,
        PeriodKind::PostPriorYear,
    ];
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PeriodKind::Pre => "pre-period",
            PeriodKind::Post => "post-period",
            PeriodKind::PrePriorYear => "prior-year pre-period",
            PeriodKind::PostPriorYear => "prior-year post-period",
        };
        f.write_str(s)
    }
}

/// A named, closed date interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    pub kind: PeriodKind,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn new(kind: PeriodKind, start: NaiveDate, end: NaiveDate) -> Self {
        Self { kind, start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, other: &Period) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    fn validate(&self) -> Result<()> {
        if self.end < self.start {
            return Err(AnalysisError::PeriodOrder {
                period: self.kind,
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    fn one_year_earlier(&self, kind: PeriodKind) -> Result<Period> {
        Ok(Period::new(
            kind,
            one_year_before(self.start)?,
            one_year_before(self.end)?,
        ))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Same calendar day twelve months earlier; Feb 29 clamps to Feb 28.
pub fn one_year_before(date: NaiveDate) -> Result<NaiveDate> {
    date.checked_sub_months(Months::new(12))
        .ok_or(AnalysisError::DateOutOfRange(date))
}

/// The four boundaries an operator may set. Everything else is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub pre_start: NaiveDate,
    pub pre_end: NaiveDate,
    pub post_start: NaiveDate,
    pub post_end: NaiveDate,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let ymd = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
        Self {
            pre_start: ymd(2025, 5, 9),
            pre_end: ymd(2025, 7, 8),
            post_start: ymd(2025, 7, 9),
            post_end: ymd(2025, 9, 8),
        }
    }
}

/// A validated set of the four canonical periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodSet {
    pre: Period,
    post: Period,
    pre_prior_year: Period,
    post_prior_year: Period,
}

impl PeriodSet {
    /// Validates ordering, pairwise disjointness and the one-year offset.
    pub fn new(
        pre: Period,
        post: Period,
        pre_prior_year: Period,
        post_prior_year: Period,
    ) -> Result<Self> {
        let set = Self {
            pre: Period { kind: PeriodKind::Pre, ..pre },
            post: Period { kind: PeriodKind::Post, ..post },
            pre_prior_year: Period { kind: PeriodKind::PrePriorYear, ..pre_prior_year },
            post_prior_year: Period { kind: PeriodKind::PostPriorYear, ..post_prior_year },
        };

        for p in set.iter() {
            p.validate()?;
        }

        let all: Vec<Period> = set.iter().collect();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                if a.overlaps(b) {
                    return Err(AnalysisError::PeriodOverlap {
                        first: a.kind,
                        second: b.kind,
                        first_range: a.to_string(),
                        second_range: b.to_string(),
                    });
                }
            }
        }

        // Prior-year periods are pinned by the offset check below; a leap
        // day may fall between them.
        if set.pre.end.succ_opt() != Some(set.post.start) {
            return Err(AnalysisError::PeriodGap {
                first: set.pre.kind,
                second: set.post.kind,
                first_end: set.pre.end,
                second_start: set.post.start,
            });
        }

        for (prior, current) in [(set.pre_prior_year, set.pre), (set.post_prior_year, set.post)] {
            let expected = current.one_year_earlier(prior.kind)?;
            if prior != expected {
                return Err(AnalysisError::PriorYearOffset {
                    period: prior.kind,
                    counterpart: current.kind,
                });
            }
        }

        Ok(set)
    }

    pub fn from_config(config: AnalysisConfig) -> Result<Self> {
        let pre = Period::new(PeriodKind::Pre, config.pre_start, config.pre_end);
        let post = Period::new(PeriodKind::Post, config.post_start, config.post_end);
        // Order errors must name the operator's period, not a derived one.
        pre.validate()?;
        post.validate()?;
        let pre_prior = pre.one_year_earlier(PeriodKind::PrePriorYear)?;
        let post_prior = post.one_year_earlier(PeriodKind::PostPriorYear)?;
        Self::new(pre, post, pre_prior, post_prior)
    }

    pub fn get(&self, kind: PeriodKind) -> Period {
        match kind {
            PeriodKind::Pre => self.pre,
            PeriodKind::Post => self.post,
            PeriodKind::PrePriorYear => self.pre_prior_year,
            PeriodKind::PostPriorYear => self.post_prior_year,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Period> + '_ {
        PeriodKind::ALL.into_iter().map(move |k| self.get(k))
    }
}

/// Record sets that aggregates are built over: the four periods plus the
/// two era unions used for overall year-over-year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    Pre,
    Post,
    PrePriorYear,
    PostPriorYear,
    Current,
    PriorYear,
}

impl Window {
    pub const ALL: [Window; 6] = [
        Window::Pre,
        Window::Post,
        Window::PrePriorYear,
        Window::PostPriorYear,
        Window::Current,
        Window::PriorYear,
    ];

    pub fn periods(self) -> &'static [PeriodKind] {
        match self {
            Window::Pre => &[PeriodKind::Pre],
            Window::Post => &[PeriodKind::Post],
            Window::PrePriorYear => &[PeriodKind::PrePriorYear],
            Window::PostPriorYear => &[PeriodKind::PostPriorYear],
            Window::Current => &[PeriodKind::Pre, PeriodKind::Post],
            Window::PriorYear => &[PeriodKind::PrePriorYear, PeriodKind::PostPriorYear],
        }
    }
}

/// A (baseline, comparison) window pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    PostVsPre,
    /// The same boundary one year earlier, as a seasonal baseline.
    PriorYearPostVsPre,
    PreYearOverYear,
    PostYearOverYear,
    OverallYearOverYear,
}

impl Comparison {
    pub const ALL: [Comparison; 5] = [
        Comparison::PostVsPre,
        Comparison::PriorYearPostVsPre,
        Comparison::PreYearOverYear,
        Comparison::PostYearOverYear,
        Comparison::OverallYearOverYear,
    ];

    pub fn baseline(self) -> Window {
        match self {
            Comparison::PostVsPre => Window::Pre,
            Comparison::PriorYearPostVsPre => Window::PrePriorYear,
            Comparison::PreYearOverYear => Window::PrePriorYear,
            Comparison::PostYearOverYear => Window::PostPriorYear,
            Comparison::OverallYearOverYear => Window::PriorYear,
        }
    }

    pub fn comparison(self) -> Window {
        match self {
            Comparison::PostVsPre => Window::Post,
            Comparison::PriorYearPostVsPre => Window::PostPriorYear,
            Comparison::PreYearOverYear => Window::Pre,
            Comparison::PostYearOverYear => Window::Post,
            Comparison::OverallYearOverYear => Window::Current,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Comparison::PostVsPre => "Post vs Pre",
            Comparison::PriorYearPostVsPre => "Post vs Pre (prior year)",
            Comparison::PreYearOverYear => "Pre-period YoY",
            Comparison::PostYearOverYear => "Post-period YoY",
            Comparison::OverallYearOverYear => "Overall YoY",
        }
    }
}

/// Records split by period. Records outside every period are counted, not kept.
#[derive(Debug, Clone)]
pub struct Partitions<'a> {
    parts: BTreeMap<PeriodKind, Vec<&'a Record>>,
    pub unassigned: usize,
}

impl<'a> Partitions<'a> {
    pub fn get(&self, kind: PeriodKind) -> &[&'a Record] {
        self.parts.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn window(&self, window: Window) -> Vec<&'a Record> {
        window
            .periods()
            .iter()
            .flat_map(|k| self.get(*k).iter().copied())
            .collect()
    }
}

/// Split records into the four periods.
///
/// Fails with `EmptyPeriod` when a period has no records, or none from a
/// source that carries sales totals: a period without data must not be
/// mistaken for a period with zero sales.
pub fn partition<'a>(records: &'a [Record], periods: &PeriodSet) -> Result<Partitions<'a>> {
    let mut parts: BTreeMap<PeriodKind, Vec<&'a Record>> =
        PeriodKind::ALL.iter().map(|k| (*k, Vec::new())).collect();
    let mut unassigned = 0usize;

    for r in records {
        // Periods are disjoint, so at most one matches.
        match periods.iter().find(|p| p.contains(r.date)) {
            Some(p) => parts.entry(p.kind).or_default().push(r),
            None => unassigned += 1,
        }
    }

    for period in periods.iter() {
        let part = &parts[&period.kind];
        if part.is_empty() {
            return Err(AnalysisError::EmptyPeriod {
                period: period.kind,
                reason: format!("no records fall between {}", period),
            });
        }
        if !part
            .iter()
            .any(|r| matches!(r.source, Source::Financial | Source::Sales))
        {
            return Err(AnalysisError::EmptyPeriod {
                period: period.kind,
                reason: "no financial or sales records, so gross sales cannot be established"
                    .to_string(),
            });
        }
        debug!(period = %period.kind, records = part.len(), "partition built");
    }

    info!(unassigned, "records partitioned into periods");
    Ok(Partitions { parts, unassigned })
}
