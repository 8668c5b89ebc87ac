//! Analysis error types.
//!
//! Only structural problems and I/O are errors. Bad rows are counted by the
//! loader and zero denominators resolve to `MetricValue::Undefined`.

use crate::period::PeriodKind;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{period} end date {end} precedes start date {start}")]
    PeriodOrder {
        period: PeriodKind,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("{second} must start the day after {first} ends ({first} ends {first_end}, {second} starts {second_start})")]
    PeriodGap {
        first: PeriodKind,
        second: PeriodKind,
        first_end: NaiveDate,
        second_start: NaiveDate,
    },

    #[error("{first} and {second} overlap ({first_range} vs {second_range})")]
    PeriodOverlap {
        first: PeriodKind,
        second: PeriodKind,
        first_range: String,
        second_range: String,
    },

    #[error("{period} is not exactly one year before {counterpart}")]
    PriorYearOffset {
        period: PeriodKind,
        counterpart: PeriodKind,
    },

    #[error("cannot shift {0} back one year")]
    DateOutOfRange(NaiveDate),

    #[error("{period} has no usable records: {reason}")]
    EmptyPeriod { period: PeriodKind, reason: String },

    #[error("failed to open '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
