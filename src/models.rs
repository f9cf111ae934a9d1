use crate::stats::week_label;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Athlete {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub baseline_vo2: Option<f64>,
    #[serde(default)]
    pub target_vo2: Option<f64>,
    #[serde(default)]
    pub baseline_mileage: Option<f64>,
    #[serde(default)]
    pub hrv_low: Option<f64>,
    #[serde(default)]
    pub hrv_high: Option<f64>,
    #[serde(default)]
    pub starting_weight: Option<f64>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl Athlete {
    pub fn export_name(&self) -> String {
        match &self.slug {
            Some(slug) if !slug.is_empty() => slug.clone(),
            _ => format!("athlete_{}", self.id),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Coach,
    Athlete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub password_hash: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub athlete_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub role: Role,
    pub athlete_id: Option<i64>,
}

impl Caller {
    pub fn coach(user_id: i64) -> Self {
        Self {
            user_id,
            role: Role::Coach,
            athlete_id: None,
        }
    }

    pub fn athlete(user_id: i64, athlete_id: i64) -> Self {
        Self {
            user_id,
            role: Role::Athlete,
            athlete_id: Some(athlete_id),
        }
    }

    pub fn is_coach(&self) -> bool {
        self.role == Role::Coach
    }

    /// Coaches see every athlete; athletes only see themselves.
    pub fn can_access(&self, athlete_id: i64) -> bool {
        self.is_coach() || self.athlete_id == Some(athlete_id)
    }
}

impl From<&UserAccount> for Caller {
    fn from(user: &UserAccount) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
            athlete_id: user.athlete_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WeekStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Measurements {
    pub vo2_max: Option<f64>,
    pub resting_hr: Option<f64>,
    pub hrv: Option<f64>,
    pub weight: Option<f64>,
    pub sleep_quality: Option<f64>,
    pub total_volume: Option<f64>,
    pub low_aerobic_load: Option<f64>,

    pub monday_duration: Option<f64>,
    pub monday_avg_hr: Option<f64>,
    pub monday_pace: Option<String>,
    pub monday_hr_zones: Option<String>,
    pub monday_notes: Option<String>,

    pub tuesday_workout: Option<String>,
    pub tuesday_avg_pace: Option<String>,
    pub tuesday_avg_hr: Option<f64>,
    pub tuesday_max_hr: Option<f64>,
    pub tuesday_recovery_hr: Option<f64>,
    pub tuesday_notes: Option<String>,

    pub thursday_workout: Option<String>,
    pub thursday_avg_pace: Option<String>,
    pub thursday_avg_hr: Option<f64>,
    pub thursday_max_hr: Option<f64>,
    pub thursday_recovery_hr: Option<f64>,
    pub thursday_notes: Option<String>,

    pub saturday_distance: Option<f64>,
    pub saturday_avg_pace: Option<String>,
    pub saturday_avg_hr: Option<f64>,
    pub saturday_notes: Option<String>,

    pub easy_miles: Option<f64>,
    pub stairmaster_sessions: Option<f64>,
    pub form_notes: Option<String>,
    pub weekly_observations: Option<String>,
    pub coach_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeekRecord {
    pub id: i64,
    pub athlete_id: i64,
    #[serde(rename = "week_num")]
    pub sequence: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: WeekStatus,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub measurements: Measurements,
}

impl WeekRecord {
    pub fn is_active(&self) -> bool {
        self.status == WeekStatus::Active
    }

    pub fn label(&self) -> String {
        week_label(self.start_date, self.end_date)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekView {
    #[serde(flatten)]
    pub week: WeekRecord,
    pub label: String,
}

impl From<WeekRecord> for WeekView {
    fn from(week: WeekRecord) -> Self {
        Self {
            label: week.label(),
            week,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewWeek {
    pub athlete_id: i64,
    pub week_num: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: WeekStatus,
    pub total_volume: f64,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub athlete_id: Option<i64>,
}

impl From<UserAccount> for UserResponse {
    fn from(user: UserAccount) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            athlete_id: user.athlete_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateFieldRequest {
    pub field: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct PublicRequest {
    pub is_public: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HrvStatus {
    Balanced,
    Unbalanced,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AthleteSummary {
    pub current_vo2: Option<f64>,
    pub progress_percentage: Option<f64>,
    pub hrv_status: Option<HrvStatus>,
    pub completed_weeks: usize,
    pub completed_volume: f64,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub athlete: Athlete,
    pub active_week: WeekView,
    pub weeks: Vec<WeekView>,
    pub summary: AthleteSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionCheck {
    pub valid: bool,
    pub missing: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub completed_week: WeekRecord,
    pub next_week: WeekRecord,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompletionResponse {
    #[serde(flatten)]
    pub completion: Completion,
    pub warnings: Vec<String>,
}
