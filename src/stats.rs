use crate::models::{Athlete, AthleteSummary, HrvStatus, WeekRecord, WeekStatus};
use chrono::{Datelike, Duration, NaiveDate};

pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date - Duration::days(date.weekday().num_days_from_sunday() as i64);
    (start, start + Duration::days(6))
}

pub fn week_label(start: NaiveDate, end: NaiveDate) -> String {
    format!("{} - {}", start.format("%b %-d"), end.format("%b %-d"))
}

/// Display-only; values below 0 or above 100 are passed through untouched.
pub fn progress_percentage(athlete: &Athlete, current_vo2: Option<f64>) -> Option<f64> {
    let baseline = athlete.baseline_vo2?;
    let target = athlete.target_vo2?;
    let current = current_vo2?;
    let span = target - baseline;
    if span == 0.0 {
        return None;
    }
    Some((current - baseline) / span * 100.0)
}

pub fn hrv_status(athlete: &Athlete, hrv: Option<f64>) -> Option<HrvStatus> {
    let (low, high) = (athlete.hrv_low?, athlete.hrv_high?);
    let hrv = hrv?;
    if (low..=high).contains(&hrv) {
        Some(HrvStatus::Balanced)
    } else {
        Some(HrvStatus::Unbalanced)
    }
}

fn latest(weeks: &[&WeekRecord], pick: impl Fn(&WeekRecord) -> Option<f64>) -> Option<f64> {
    weeks.iter().rev().find_map(|week| pick(week))
}

pub fn build_summary(athlete: &Athlete, weeks: &[&WeekRecord]) -> AthleteSummary {
    let current_vo2 = latest(weeks, |week| week.measurements.vo2_max);
    let hrv = latest(weeks, |week| week.measurements.hrv);

    let completed: Vec<_> = weeks
        .iter()
        .filter(|week| week.status == WeekStatus::Completed)
        .collect();
    let completed_volume: f64 = completed
        .iter()
        .filter_map(|week| week.measurements.total_volume)
        .sum();

    AthleteSummary {
        current_vo2,
        progress_percentage: progress_percentage(athlete, current_vo2),
        hrv_status: hrv_status(athlete, hrv),
        completed_weeks: completed.len(),
        completed_volume,
    }
}
