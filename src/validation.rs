use crate::fields::MeasurementField;
use crate::models::{CompletionCheck, WeekRecord};

const VO2_SWING_LIMIT: f64 = 10.0;
const VOLUME_JUMP_FACTOR: f64 = 2.0;
const RESTING_HR_LOW: f64 = 35.0;
const RESTING_HR_HIGH: f64 = 100.0;
const VOLUME_CEILING: f64 = 150.0;

fn required_value(week: &WeekRecord, field: MeasurementField) -> Option<f64> {
    let value = match field {
        MeasurementField::Vo2Max => week.measurements.vo2_max,
        MeasurementField::RestingHr => week.measurements.resting_hr,
        MeasurementField::TotalVolume => week.measurements.total_volume,
        _ => None,
    };
    value.filter(|v| *v != 0.0)
}

/// Warnings are only produced for weeks that pass the required-field gate.
pub fn validate_for_completion(week: &WeekRecord, previous: Option<&WeekRecord>) -> CompletionCheck {
    let missing: Vec<String> = MeasurementField::REQUIRED
        .iter()
        .filter(|field| required_value(week, **field).is_none())
        .map(|field| field.label().to_string())
        .collect();

    if !missing.is_empty() {
        return CompletionCheck {
            valid: false,
            missing,
            warnings: Vec::new(),
        };
    }

    CompletionCheck {
        valid: true,
        missing,
        warnings: warnings(week, previous),
    }
}

fn warnings(week: &WeekRecord, previous: Option<&WeekRecord>) -> Vec<String> {
    let mut warnings = Vec::new();
    let vo2 = week.measurements.vo2_max.unwrap_or_default();
    let resting_hr = week.measurements.resting_hr.unwrap_or_default();
    let volume = week.measurements.total_volume.unwrap_or_default();

    if let Some(last) = previous {
        if let Some(last_vo2) = last.measurements.vo2_max {
            let change = (vo2 - last_vo2).abs();
            if change > VO2_SWING_LIMIT {
                warnings.push(format!(
                    "VO2 max changed by {} points from last week ({})",
                    round1(change),
                    round1(last_vo2)
                ));
            }
        }
        if let Some(last_volume) = last.measurements.total_volume.filter(|v| *v > 0.0) {
            if volume > VOLUME_JUMP_FACTOR * last_volume {
                warnings.push(format!(
                    "Volume is {:.1}x last week's volume ({})",
                    volume / last_volume,
                    round1(last_volume)
                ));
            }
        }
    }

    if !(RESTING_HR_LOW..=RESTING_HR_HIGH).contains(&resting_hr) {
        warnings.push(format!("Unusual resting HR: {} bpm", round1(resting_hr)));
    }
    if volume > VOLUME_CEILING {
        warnings.push(format!("Very high volume: {} miles this week", round1(volume)));
    }

    warnings
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
