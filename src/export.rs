use crate::fields::MeasurementField;
use crate::models::{WeekRecord, WeekStatus};
use crate::storage::to_row;
use serde_json::Value;

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => match number.as_f64() {
            Some(value) if value.fract() == 0.0 && value.abs() < 1e15 => format!("{}", value as i64),
            _ => number.to_string(),
        },
        Some(other) => other.to_string(),
    }
}

pub fn render_csv(weeks: &[&WeekRecord]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["Week", "Dates", "Start", "End", "Status"];
    header.extend(MeasurementField::ALL.iter().map(|field| field.label()));
    writer.write_record(&header)?;

    for week in weeks {
        let row = to_row(week).map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        let status = match week.status {
            WeekStatus::Active => "active",
            WeekStatus::Completed => "completed",
        };
        let mut record = vec![
            week.sequence.to_string(),
            week.label(),
            week.start_date.to_string(),
            week.end_date.to_string(),
            status.to_string(),
        ];
        record.extend(
            MeasurementField::ALL
                .iter()
                .map(|field| cell(row.get(field.column()))),
        );
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}
