//! Deterministic cycle analysis used as the local fallback for the
//! remote analysis provider.

use serde::{Deserialize, Serialize};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Duration};

use crate::source::SourceError;

pub const ISO_DATE: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// A cycle is regular when its lengths vary less than this coefficient
/// of variation and the mean falls inside the acceptable range below.
const REGULAR_CV_LIMIT: f64 = 0.2;
const REGULAR_MEAN_MIN_DAYS: f64 = 21.0;
const REGULAR_MEAN_MAX_DAYS: f64 = 35.0;

/// Where an analysis came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleSource {
    Remote,
    LocalFallback,
}

/// Phase bucket for the current day offset within the latest interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CyclePhase {
    Menstrual,
    Follicular,
    Ovulatory,
    Luteal,
    #[serde(rename = "Late/Prolonged")]
    LateProlonged,
    #[serde(rename = "unknown")]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleMetrics {
    pub average_cycle_length: f64,
    pub regularity_score: f64,
    pub is_regular: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleState {
    pub day_in_cycle: i64,
    pub phase: CyclePhase,
    pub predicted_next_period: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub source: CycleSource,
    pub metrics: CycleMetrics,
    pub current_state: CycleState,
}

pub fn parse_date(value: &str) -> Result<Date, SourceError> {
    Date::parse(value.trim(), ISO_DATE)
        .map_err(|e| SourceError::protocol(format!("invalid event date '{value}': {e}")))
}

pub fn format_date(date: Date) -> String {
    date.format(ISO_DATE).unwrap_or_else(|_| date.to_string())
}

/// Analyze an event-date history as of `today`.
///
/// Sorts the dates, derives consecutive day deltas, and reports the
/// mean interval, coefficient of variation, the phase bucket for the
/// current position in the latest interval, and the predicted next
/// event (latest date plus the rounded mean interval). Fewer than two
/// dates is an insufficient-data error, never a default-valued report.
pub fn analyze(history: &[Date], today: Date) -> Result<CycleReport, SourceError> {
    if history.len() < 2 {
        return Err(SourceError::insufficient_data(format!(
            "cycle analysis needs at least two event dates, got {}",
            history.len()
        )));
    }

    let mut dates = history.to_vec();
    dates.sort_unstable();

    let lengths: Vec<i64> = dates
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).whole_days())
        .collect();

    let mean = lengths.iter().sum::<i64>() as f64 / lengths.len() as f64;
    let variance = lengths
        .iter()
        .map(|&len| {
            let delta = len as f64 - mean;
            delta * delta
        })
        .sum::<f64>()
        / lengths.len() as f64;
    let cv = if mean > 0.0 { variance.sqrt() / mean } else { 0.0 };

    let latest = dates[dates.len() - 1];
    let day_in_cycle = (today - latest).whole_days() + 1;
    let predicted = latest + Duration::days(mean.round() as i64);

    Ok(CycleReport {
        source: CycleSource::LocalFallback,
        metrics: CycleMetrics {
            average_cycle_length: mean,
            regularity_score: 1.0 - cv,
            is_regular: cv < REGULAR_CV_LIMIT
                && (REGULAR_MEAN_MIN_DAYS..=REGULAR_MEAN_MAX_DAYS).contains(&mean),
        },
        current_state: CycleState {
            day_in_cycle,
            phase: phase_for(day_in_cycle, mean),
            predicted_next_period: format_date(predicted),
        },
    })
}

fn phase_for(day_in_cycle: i64, mean: f64) -> CyclePhase {
    match day_in_cycle {
        1..=5 => CyclePhase::Menstrual,
        6..=13 => CyclePhase::Follicular,
        14 => CyclePhase::Ovulatory,
        day if day >= 15 && (day as f64) <= mean => CyclePhase::Luteal,
        day if day >= 15 => CyclePhase::LateProlonged,
        _ => CyclePhase::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn history(dates: &[&str]) -> Vec<Date> {
        dates.iter().map(|d| parse_date(d).expect("valid")).collect()
    }

    #[test]
    fn regular_history_yields_zero_cv_and_rounded_prediction() {
        let dates = history(&["2024-01-01", "2024-01-29", "2024-02-26"]);
        let report = analyze(&dates, date!(2024 - 03 - 10)).expect("analyzes");

        assert_eq!(report.metrics.average_cycle_length, 28.0);
        assert_eq!(report.metrics.regularity_score, 1.0);
        assert!(report.metrics.is_regular);
        assert_eq!(report.current_state.predicted_next_period, "2024-03-25");
        assert_eq!(report.source, CycleSource::LocalFallback);
    }

    #[test]
    fn analysis_is_independent_of_input_order() {
        let shuffled = history(&["2024-02-26", "2024-01-01", "2024-01-29"]);
        let report = analyze(&shuffled, date!(2024 - 03 - 10)).expect("analyzes");

        assert_eq!(report.metrics.average_cycle_length, 28.0);
        assert_eq!(report.current_state.predicted_next_period, "2024-03-25");
    }

    #[test]
    fn single_date_is_insufficient() {
        let dates = history(&["2024-01-01"]);
        let error = analyze(&dates, date!(2024 - 03 - 10)).expect_err("insufficient");
        assert_eq!(
            error.kind(),
            crate::source::SourceErrorKind::InsufficientData
        );
    }

    #[test]
    fn empty_history_is_insufficient() {
        let error = analyze(&[], date!(2024 - 03 - 10)).expect_err("insufficient");
        assert_eq!(
            error.kind(),
            crate::source::SourceErrorKind::InsufficientData
        );
    }

    #[test]
    fn irregular_lengths_clear_the_regular_flag() {
        // Intervals of 20 and 40 days: mean 30, cv > 0.3.
        let dates = history(&["2024-01-01", "2024-01-21", "2024-03-01"]);
        let report = analyze(&dates, date!(2024 - 03 - 05)).expect("analyzes");

        assert!(!report.metrics.is_regular);
        assert!(report.metrics.regularity_score < 0.8);
    }

    #[test]
    fn phase_buckets_cover_the_interval() {
        assert_eq!(phase_for(1, 28.0), CyclePhase::Menstrual);
        assert_eq!(phase_for(5, 28.0), CyclePhase::Menstrual);
        assert_eq!(phase_for(6, 28.0), CyclePhase::Follicular);
        assert_eq!(phase_for(13, 28.0), CyclePhase::Follicular);
        assert_eq!(phase_for(14, 28.0), CyclePhase::Ovulatory);
        assert_eq!(phase_for(15, 28.0), CyclePhase::Luteal);
        assert_eq!(phase_for(28, 28.0), CyclePhase::Luteal);
        assert_eq!(phase_for(29, 28.0), CyclePhase::LateProlonged);
        assert_eq!(phase_for(0, 28.0), CyclePhase::Unknown);
    }

    #[test]
    fn phase_serializes_with_original_labels() {
        assert_eq!(
            serde_json::to_string(&CyclePhase::LateProlonged).expect("serializes"),
            "\"Late/Prolonged\""
        );
        assert_eq!(
            serde_json::to_string(&CyclePhase::Menstrual).expect("serializes"),
            "\"Menstrual\""
        );
    }
}
