use crate::errors::{AppError, RosterError, WeekError};
use crate::export::render_csv;
use crate::models::{
    Athlete, Caller, CompletionCheck, CompletionResponse, DashboardResponse, LoginRequest, PublicRequest,
    UpdateFieldRequest, UserResponse, WeekRecord, WeekView,
};
use crate::roster::Roster;
use crate::state::{AppState, TrackerData};
use crate::stats::build_summary;
use crate::week::WeekCollection;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use std::collections::btree_map::Entry;
use tracing::warn;

pub const USER_HEADER: &str = "x-user-id";

pub async fn health() -> &'static str {
    "ok"
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, AppError> {
    let payload = parse_body(payload)?;
    let user = Roster::new(state.store.as_ref())
        .authenticate(&payload.email, &payload.password)
        .await?;
    Ok(Json(user.into()))
}

pub async fn list_athletes(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Athlete>>, AppError> {
    let caller = resolve_caller(&state, &headers).await?;
    require_coach(&caller)?;
    let athletes = Roster::new(state.store.as_ref()).list_athletes().await?;
    Ok(Json(athletes))
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Path(athlete_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<DashboardResponse>, AppError> {
    let caller = resolve_caller(&state, &headers).await?;
    authorize(&caller, athlete_id)?;
    let athlete = Roster::new(state.store.as_ref()).get_athlete(athlete_id).await?;

    let mut data = state.data.lock().await;
    let result = open_dashboard(&state, &mut data, athlete_id).await;
    let (active_week, weeks) = reconcile(&mut data, athlete_id, result)?;

    let refs: Vec<&WeekRecord> = weeks.iter().collect();
    let summary = build_summary(&athlete, &refs);
    Ok(Json(DashboardResponse {
        athlete,
        active_week: active_week.into(),
        weeks: weeks.into_iter().map(WeekView::from).collect(),
        summary,
    }))
}

pub async fn set_public(
    State(state): State<AppState>,
    Path(athlete_id): Path<i64>,
    headers: HeaderMap,
    payload: Result<Json<PublicRequest>, JsonRejection>,
) -> Result<Json<Athlete>, AppError> {
    let payload = parse_body(payload)?;
    let caller = resolve_caller(&state, &headers).await?;
    require_coach(&caller)?;
    let athlete = Roster::new(state.store.as_ref())
        .set_public(athlete_id, payload.is_public)
        .await?;
    Ok(Json(athlete))
}

pub async fn update_week(
    State(state): State<AppState>,
    Path((athlete_id, week_id)): Path<(i64, i64)>,
    headers: HeaderMap,
    payload: Result<Json<UpdateFieldRequest>, JsonRejection>,
) -> Result<Json<WeekRecord>, AppError> {
    let payload = parse_body(payload)?;
    let caller = resolve_caller(&state, &headers).await?;
    authorize(&caller, athlete_id)?;

    let mut data = state.data.lock().await;
    let result = match weeks_for(&state, &mut data, athlete_id).await {
        Ok(weeks) => {
            state
                .lifecycle
                .update_measurement(weeks, week_id, &payload.field, payload.value, &caller)
                .await
        }
        Err(err) => Err(err),
    };
    let week = reconcile(&mut data, athlete_id, result)?;
    Ok(Json(week))
}

pub async fn validate_week(
    State(state): State<AppState>,
    Path((athlete_id, week_id)): Path<(i64, i64)>,
    headers: HeaderMap,
) -> Result<Json<CompletionCheck>, AppError> {
    let caller = resolve_caller(&state, &headers).await?;
    authorize(&caller, athlete_id)?;

    let mut data = state.data.lock().await;
    let result = match weeks_for(&state, &mut data, athlete_id).await {
        Ok(weeks) => state.lifecycle.validate(weeks, week_id),
        Err(err) => Err(err),
    };
    let check = reconcile(&mut data, athlete_id, result)?;
    Ok(Json(check))
}

pub async fn complete_week(
    State(state): State<AppState>,
    Path((athlete_id, week_id)): Path<(i64, i64)>,
    headers: HeaderMap,
) -> Result<Json<CompletionResponse>, AppError> {
    let caller = resolve_caller(&state, &headers).await?;
    authorize(&caller, athlete_id)?;

    let mut data = state.data.lock().await;
    let result = match weeks_for(&state, &mut data, athlete_id).await {
        Ok(weeks) => state.lifecycle.finish_week(weeks, week_id).await,
        Err(err) => Err(err),
    };
    let response = reconcile(&mut data, athlete_id, result)?;
    Ok(Json(response))
}

pub async fn delete_week(
    State(state): State<AppState>,
    Path((athlete_id, week_id)): Path<(i64, i64)>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let caller = resolve_caller(&state, &headers).await?;
    authorize(&caller, athlete_id)?;

    let mut data = state.data.lock().await;
    let result = match weeks_for(&state, &mut data, athlete_id).await {
        Ok(weeks) if weeks.get(week_id).is_none() => Err(WeekError::WeekNotFound(week_id)),
        Ok(weeks) => state.lifecycle.delete_week(weeks, week_id).await,
        Err(err) => Err(err),
    };
    reconcile(&mut data, athlete_id, result)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn export_csv(
    State(state): State<AppState>,
    Path(athlete_id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let caller = resolve_caller(&state, &headers).await?;
    authorize(&caller, athlete_id)?;
    let athlete = Roster::new(state.store.as_ref()).get_athlete(athlete_id).await?;

    let mut data = state.data.lock().await;
    let result = weeks_for(&state, &mut data, athlete_id)
        .await
        .map(|weeks| render_csv(&weeks.records()));
    let body = reconcile(&mut data, athlete_id, result)??;

    let disposition = format!("attachment; filename=\"{}_data.csv\"", athlete.export_name());
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

async fn resolve_caller(state: &AppState, headers: &HeaderMap) -> Result<Caller, AppError> {
    let raw = headers
        .get(USER_HEADER)
        .ok_or_else(|| AppError::unauthorized(format!("missing {USER_HEADER} header")))?;
    let user_id: i64 = raw
        .to_str()
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .ok_or_else(|| AppError::unauthorized(format!("invalid {USER_HEADER} header")))?;

    let user = Roster::new(state.store.as_ref())
        .get_user(user_id)
        .await
        .map_err(|err| match err {
            RosterError::NotFound(_) => AppError::unauthorized("unknown user"),
            other => other.into(),
        })?;
    Ok(Caller::from(&user))
}

fn authorize(caller: &Caller, athlete_id: i64) -> Result<(), AppError> {
    if caller.can_access(athlete_id) {
        Ok(())
    } else {
        Err(AppError::forbidden(format!("no access to athlete {athlete_id}")))
    }
}

fn require_coach(caller: &Caller) -> Result<(), AppError> {
    if caller.is_coach() {
        Ok(())
    } else {
        Err(AppError::forbidden("coach access required"))
    }
}

async fn weeks_for<'a>(
    state: &AppState,
    data: &'a mut TrackerData,
    athlete_id: i64,
) -> Result<&'a mut WeekCollection, WeekError> {
    match data.weeks.entry(athlete_id) {
        Entry::Occupied(entry) => Ok(entry.into_mut()),
        Entry::Vacant(entry) => {
            let weeks = state.lifecycle.load_weeks(athlete_id).await?;
            Ok(entry.insert(weeks))
        }
    }
}

/// The dashboard re-reads the athlete's weeks from the store, replacing the
/// cached copy, and repairs a missing active week.
async fn open_dashboard(
    state: &AppState,
    data: &mut TrackerData,
    athlete_id: i64,
) -> Result<(WeekRecord, Vec<WeekRecord>), WeekError> {
    let loaded = state.lifecycle.load_weeks(athlete_id).await?;
    let weeks = match data.weeks.entry(athlete_id) {
        Entry::Occupied(mut entry) => {
            entry.insert(loaded);
            entry.into_mut()
        }
        Entry::Vacant(entry) => entry.insert(loaded),
    };
    let active = state.lifecycle.ensure_active_week(weeks).await?;
    Ok((active, weeks.records().into_iter().cloned().collect()))
}

fn reconcile<T>(data: &mut TrackerData, athlete_id: i64, result: Result<T, WeekError>) -> Result<T, AppError> {
    if let Err(WeekError::StorageFailure(_) | WeekError::InconsistentHistory(_)) = &result {
        warn!(athlete_id, "discarding cached weeks after failed operation");
        data.weeks.remove(&athlete_id);
    }
    result.map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WeekStatus;
    use crate::storage::{Collection, JsonStore, Row, Store, StoreData};
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn rows(value: Value) -> Vec<Row> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(row) => Some(row),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn seeded_store() -> Arc<JsonStore> {
        let mut data = StoreData::default();
        data.tables.insert(
            "athletes".into(),
            rows(json!([{ "id": 1, "name": "Riley", "baseline_vo2": 45.0, "target_vo2": 55.0 }])),
        );
        data.tables.insert(
            "users".into(),
            rows(json!([{ "id": 1, "email": "coach@example.com", "role": "coach" }])),
        );
        Arc::new(JsonStore::in_memory(data))
    }

    fn coach_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, "1".parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn dashboard_rereads_weeks_changed_in_the_store() {
        let store = seeded_store();
        let state = AppState::new(store.clone());

        let Json(first) = get_dashboard(State(state.clone()), Path(1), coach_headers())
            .await
            .unwrap();
        let week_id = first.active_week.week.id;
        assert_eq!(first.active_week.week.sequence, 1);

        let mut patch = Row::new();
        patch.insert("status".into(), json!("completed"));
        patch.insert("vo2_max".into(), json!(55));
        store.patch(Collection::WeeklyData, week_id, patch).await.unwrap();

        let Json(second) = get_dashboard(State(state), Path(1), coach_headers())
            .await
            .unwrap();
        assert_eq!(second.active_week.week.sequence, 2);
        assert_ne!(second.active_week.week.id, week_id);

        let earlier = second
            .weeks
            .iter()
            .find(|view| view.week.id == week_id)
            .unwrap();
        assert_eq!(earlier.week.status, WeekStatus::Completed);
        assert_eq!(earlier.week.measurements.vo2_max, Some(55.0));
        assert_eq!(second.summary.current_vo2, Some(55.0));
        assert_eq!(second.summary.progress_percentage, Some(100.0));
    }

    #[tokio::test]
    async fn unknown_user_is_unauthorized() {
        let state = AppState::new(seeded_store());
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, "42".parse().unwrap());

        let err = list_athletes(State(state), headers).await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }
}
