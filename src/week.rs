use crate::errors::WeekError;
use crate::fields::MeasurementField;
use crate::models::{Caller, Completion, CompletionCheck, CompletionResponse, NewWeek, WeekRecord, WeekStatus};
use crate::stats::week_bounds;
use crate::storage::{Collection, Direction, Query, Row, Store, from_row, to_row};
use crate::validation::validate_for_completion;
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// An athlete's weeks, holding at most one active week.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawWeekCollection")]
pub struct WeekCollection {
    athlete_id: i64,
    active: Option<WeekRecord>,
    completed: Vec<WeekRecord>,
}

#[derive(Deserialize)]
struct RawWeekCollection {
    athlete_id: i64,
    active: Option<WeekRecord>,
    #[serde(default)]
    completed: Vec<WeekRecord>,
}

impl TryFrom<RawWeekCollection> for WeekCollection {
    type Error = WeekError;

    fn try_from(raw: RawWeekCollection) -> Result<Self, Self::Error> {
        let records = raw.active.into_iter().chain(raw.completed).collect();
        Self::from_records(raw.athlete_id, records)
    }
}

impl WeekCollection {
    pub fn new(athlete_id: i64) -> Self {
        Self {
            athlete_id,
            active: None,
            completed: Vec::new(),
        }
    }

    pub fn from_records(athlete_id: i64, records: Vec<WeekRecord>) -> Result<Self, WeekError> {
        let mut collection = Self::new(athlete_id);
        for record in records {
            if record.athlete_id != athlete_id {
                return Err(WeekError::InconsistentHistory(format!(
                    "week {} belongs to athlete {}, not {athlete_id}",
                    record.id, record.athlete_id
                )));
            }
            match record.status {
                WeekStatus::Active => {
                    if let Some(existing) = &collection.active {
                        return Err(WeekError::InconsistentHistory(format!(
                            "athlete {athlete_id} has two active weeks ({} and {})",
                            existing.id, record.id
                        )));
                    }
                    collection.active = Some(record);
                }
                WeekStatus::Completed => collection.completed.push(record),
            }
        }
        collection.completed.sort_by_key(|week| week.sequence);
        Ok(collection)
    }

    pub fn athlete_id(&self) -> i64 {
        self.athlete_id
    }

    pub fn active(&self) -> Option<&WeekRecord> {
        self.active.as_ref()
    }

    pub fn records(&self) -> Vec<&WeekRecord> {
        let mut records: Vec<_> = self.completed.iter().chain(self.active.as_ref()).collect();
        records.sort_by_key(|week| week.sequence);
        records
    }

    pub fn get(&self, week_id: i64) -> Option<&WeekRecord> {
        self.active
            .as_ref()
            .filter(|week| week.id == week_id)
            .or_else(|| self.completed.iter().find(|week| week.id == week_id))
    }

    pub fn next_sequence(&self) -> u32 {
        self.records().last().map_or(1, |week| week.sequence + 1)
    }

    pub fn previous_completed(&self, sequence: u32) -> Option<&WeekRecord> {
        self.completed
            .iter()
            .filter(|week| week.sequence < sequence)
            .max_by_key(|week| week.sequence)
    }

    fn open(&mut self, week: WeekRecord) -> Result<(), WeekError> {
        if let Some(active) = &self.active {
            return Err(WeekError::InconsistentHistory(format!(
                "week {} is already active for athlete {}",
                active.id, self.athlete_id
            )));
        }
        self.active = Some(week);
        Ok(())
    }

    fn replace(&mut self, week: WeekRecord) {
        if let Some(active) = self.active.as_mut().filter(|active| active.id == week.id) {
            *active = week;
        } else if let Some(slot) = self.completed.iter_mut().find(|slot| slot.id == week.id) {
            *slot = week;
        }
    }

    fn close_active(&mut self, completed: WeekRecord) {
        self.active = None;
        self.completed.push(completed);
        self.completed.sort_by_key(|week| week.sequence);
    }

    fn remove(&mut self, week_id: i64) -> Option<WeekRecord> {
        if self.active.as_ref().is_some_and(|week| week.id == week_id) {
            return self.active.take();
        }
        let index = self.completed.iter().position(|week| week.id == week_id)?;
        Some(self.completed.remove(index))
    }
}

#[derive(Clone)]
pub struct WeekLifecycle {
    store: Arc<dyn Store>,
}

impl WeekLifecycle {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn load_weeks(&self, athlete_id: i64) -> Result<WeekCollection, WeekError> {
        let query = Query::new()
            .eq("athlete_id", athlete_id)
            .order_by("week_num", Direction::Asc);
        let rows = self.store.query(Collection::WeeklyData, &query).await?;
        let records = rows
            .into_iter()
            .map(from_row::<WeekRecord>)
            .collect::<Result<Vec<_>, _>>()?;
        WeekCollection::from_records(athlete_id, records)
    }

    pub async fn ensure_active_week(&self, weeks: &mut WeekCollection) -> Result<WeekRecord, WeekError> {
        self.ensure_active_week_on(weeks, Local::now().date_naive()).await
    }

    pub async fn ensure_active_week_on(
        &self,
        weeks: &mut WeekCollection,
        today: NaiveDate,
    ) -> Result<WeekRecord, WeekError> {
        if let Some(active) = weeks.active() {
            return Ok(active.clone());
        }

        let (start_date, end_date) = week_bounds(today);
        let new_week = NewWeek {
            athlete_id: weeks.athlete_id(),
            week_num: weeks.next_sequence(),
            start_date,
            end_date,
            status: WeekStatus::Active,
            total_volume: 0.0,
        };
        let inserted = self.store.insert(Collection::WeeklyData, to_row(&new_week)?).await?;
        let week: WeekRecord = from_row(inserted)?;
        weeks.open(week.clone())?;

        info!(
            athlete_id = week.athlete_id,
            week_id = week.id,
            sequence = week.sequence,
            "opened active week"
        );
        Ok(week)
    }

    pub async fn update_measurement(
        &self,
        weeks: &mut WeekCollection,
        week_id: i64,
        field: &str,
        value: Value,
        caller: &Caller,
    ) -> Result<WeekRecord, WeekError> {
        let field: MeasurementField = field.parse()?;
        if field.is_coach_only() && !caller.is_coach() {
            warn!(user_id = caller.user_id, week_id, %field, "non-coach tried to write coach-only field");
            return Err(WeekError::PermissionDenied(format!("only coaches can edit {field}")));
        }

        let week = weeks.get(week_id).ok_or(WeekError::WeekNotFound(week_id))?;
        if week.status == WeekStatus::Completed && field != MeasurementField::CoachNotes {
            return Err(WeekError::WeekCompleted { week_id });
        }

        let value = field.normalize(value)?;
        let mut patch = Row::new();
        patch.insert(field.column().to_string(), value);

        let mut updated = to_row(week)?;
        updated.extend(patch.clone());
        let updated: WeekRecord = from_row(updated)?;

        self.store.patch(Collection::WeeklyData, week_id, patch).await?;
        weeks.replace(updated.clone());
        Ok(updated)
    }

    pub fn validate(&self, weeks: &WeekCollection, week_id: i64) -> Result<CompletionCheck, WeekError> {
        let week = weeks.get(week_id).ok_or(WeekError::WeekNotFound(week_id))?;
        Ok(validate_for_completion(week, weeks.previous_completed(week.sequence)))
    }

    pub async fn complete_week(&self, weeks: &mut WeekCollection, week_id: i64) -> Result<Completion, WeekError> {
        self.complete_week_at(weeks, week_id, Local::now().date_naive(), Utc::now())
            .await
    }

    /// Does not re-run validation; callers check [`WeekLifecycle::validate`] first.
    pub async fn complete_week_at(
        &self,
        weeks: &mut WeekCollection,
        week_id: i64,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Completion, WeekError> {
        let active = match weeks.active() {
            Some(active) if active.id == week_id => active.clone(),
            _ if weeks.get(week_id).is_some() => return Err(WeekError::NoActiveWeek { week_id }),
            _ => return Err(WeekError::WeekNotFound(week_id)),
        };

        let mut patch = Row::new();
        patch.insert("status".to_string(), serde_json::to_value(WeekStatus::Completed)?);
        patch.insert("completed_at".to_string(), serde_json::to_value(now)?);
        self.store.patch(Collection::WeeklyData, week_id, patch).await?;

        let completed_week = WeekRecord {
            status: WeekStatus::Completed,
            completed_at: Some(now),
            ..active
        };
        weeks.close_active(completed_week.clone());
        info!(
            athlete_id = completed_week.athlete_id,
            week_id,
            sequence = completed_week.sequence,
            "completed week"
        );

        let next_week = self.ensure_active_week_on(weeks, today).await?;
        Ok(Completion {
            completed_week,
            next_week,
        })
    }

    pub async fn finish_week(&self, weeks: &mut WeekCollection, week_id: i64) -> Result<CompletionResponse, WeekError> {
        let check = self.validate(weeks, week_id)?;
        if !check.valid {
            return Err(WeekError::MissingRequiredFields(check.missing));
        }
        let completion = self.complete_week(weeks, week_id).await?;
        Ok(CompletionResponse {
            completion,
            warnings: check.warnings,
        })
    }

    pub async fn delete_week(&self, weeks: &mut WeekCollection, week_id: i64) -> Result<(), WeekError> {
        self.store.delete(Collection::WeeklyData, week_id).await?;
        if let Some(removed) = weeks.remove(week_id) {
            info!(
                athlete_id = removed.athlete_id,
                week_id,
                sequence = removed.sequence,
                was_active = removed.is_active(),
                "deleted week"
            );
        }
        Ok(())
    }
}
