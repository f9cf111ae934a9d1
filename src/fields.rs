use crate::errors::WeekError;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    Text,
}

macro_rules! measurement_fields {
    ($( $variant:ident => $column:literal, $label:literal, $kind:ident; )*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum MeasurementField {
            $( $variant, )*
        }

        impl MeasurementField {
            pub const ALL: &'static [MeasurementField] = &[ $( MeasurementField::$variant, )* ];

            pub fn column(self) -> &'static str {
                match self {
                    $( MeasurementField::$variant => $column, )*
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $( MeasurementField::$variant => $label, )*
                }
            }

            pub fn kind(self) -> FieldKind {
                match self {
                    $( MeasurementField::$variant => FieldKind::$kind, )*
                }
            }
        }
    };
}

measurement_fields! {
    Vo2Max => "vo2_max", "VO2 MAX", Number;
    RestingHr => "resting_hr", "RESTING HR", Number;
    Hrv => "hrv", "HRV", Number;
    Weight => "weight", "WEIGHT", Number;
    SleepQuality => "sleep_quality", "SLEEP QUALITY", Number;
    TotalVolume => "total_volume", "TOTAL VOLUME", Number;
    LowAerobicLoad => "low_aerobic_load", "LOW AEROBIC LOAD", Number;
    MondayDuration => "monday_duration", "MON DURATION", Number;
    MondayAvgHr => "monday_avg_hr", "MON AVG HR", Number;
    MondayPace => "monday_pace", "MON PACE", Text;
    MondayHrZones => "monday_hr_zones", "MON HR ZONES", Text;
    MondayNotes => "monday_notes", "MON NOTES", Text;
    TuesdayWorkout => "tuesday_workout", "TUE WORKOUT", Text;
    TuesdayAvgPace => "tuesday_avg_pace", "TUE AVG PACE", Text;
    TuesdayAvgHr => "tuesday_avg_hr", "TUE AVG HR", Number;
    TuesdayMaxHr => "tuesday_max_hr", "TUE MAX HR", Number;
    TuesdayRecoveryHr => "tuesday_recovery_hr", "TUE RECOVERY HR", Number;
    TuesdayNotes => "tuesday_notes", "TUE NOTES", Text;
    ThursdayWorkout => "thursday_workout", "THU WORKOUT", Text;
    ThursdayAvgPace => "thursday_avg_pace", "THU AVG PACE", Text;
    ThursdayAvgHr => "thursday_avg_hr", "THU AVG HR", Number;
    ThursdayMaxHr => "thursday_max_hr", "THU MAX HR", Number;
    ThursdayRecoveryHr => "thursday_recovery_hr", "THU RECOVERY HR", Number;
    ThursdayNotes => "thursday_notes", "THU NOTES", Text;
    SaturdayDistance => "saturday_distance", "SAT DISTANCE", Number;
    SaturdayAvgPace => "saturday_avg_pace", "SAT AVG PACE", Text;
    SaturdayAvgHr => "saturday_avg_hr", "SAT AVG HR", Number;
    SaturdayNotes => "saturday_notes", "SAT NOTES", Text;
    EasyMiles => "easy_miles", "EASY MILES", Number;
    StairmasterSessions => "stairmaster_sessions", "STAIRMASTER SESSIONS", Number;
    FormNotes => "form_notes", "FORM NOTES", Text;
    WeeklyObservations => "weekly_observations", "WEEKLY OBSERVATIONS", Text;
    CoachNotes => "coach_notes", "COACH NOTES", Text;
}

impl MeasurementField {
    pub const REQUIRED: [MeasurementField; 3] = [
        MeasurementField::Vo2Max,
        MeasurementField::RestingHr,
        MeasurementField::TotalVolume,
    ];

    pub fn is_coach_only(self) -> bool {
        self == MeasurementField::CoachNotes
    }

    /// `null` and empty strings clear the field. Numeric columns accept JSON
    /// numbers and numeric strings; text columns accept strings and numbers.
    pub fn normalize(self, value: Value) -> Result<Value, WeekError> {
        match (self.kind(), value) {
            (_, Value::Null) => Ok(Value::Null),
            (FieldKind::Number, Value::Number(number)) => Ok(Value::Number(number)),
            (FieldKind::Number, Value::String(raw)) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Ok(Value::Null);
                }
                let parsed: f64 = trimmed.parse().map_err(|_| self.invalid(format!("'{raw}' is not a number")))?;
                serde_json::Number::from_f64(parsed)
                    .map(Value::Number)
                    .ok_or_else(|| self.invalid(format!("'{raw}' is not a finite number")))
            }
            (FieldKind::Text, Value::String(text)) if text.is_empty() => Ok(Value::Null),
            (FieldKind::Text, Value::String(text)) => Ok(Value::String(text)),
            (FieldKind::Text, Value::Number(number)) => Ok(Value::String(number.to_string())),
            (_, other) => Err(self.invalid(format!("unsupported value {other}"))),
        }
    }

    fn invalid(self, reason: String) -> WeekError {
        WeekError::InvalidValue {
            field: self.column(),
            reason,
        }
    }
}

impl FromStr for MeasurementField {
    type Err = WeekError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let name = name.trim();
        MeasurementField::ALL
            .iter()
            .copied()
            .find(|field| field.column() == name)
            .ok_or_else(|| WeekError::InvalidField(name.to_string()))
    }
}

impl fmt::Display for MeasurementField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}
