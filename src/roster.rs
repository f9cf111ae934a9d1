use crate::errors::RosterError;
use crate::models::{Athlete, UserAccount};
use crate::storage::{Collection, Direction, Query, Row, Store, from_row};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

pub struct Roster<'a> {
    store: &'a dyn Store,
}

impl<'a> Roster<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn list_athletes(&self) -> Result<Vec<Athlete>, RosterError> {
        let query = Query::new().order_by("name", Direction::Asc);
        let rows = self.store.query(Collection::Athletes, &query).await?;
        Ok(rows.into_iter().map(from_row).collect::<Result<_, _>>()?)
    }

    pub async fn get_athlete(&self, id: i64) -> Result<Athlete, RosterError> {
        let rows = self
            .store
            .query(Collection::Athletes, &Query::new().eq("id", id))
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| RosterError::NotFound(format!("athlete {id}")))?;
        Ok(from_row(row)?)
    }

    pub async fn set_public(&self, id: i64, is_public: bool) -> Result<Athlete, RosterError> {
        self.set_public_at(id, is_public, Utc::now()).await
    }

    pub async fn set_public_at(&self, id: i64, is_public: bool, now: DateTime<Utc>) -> Result<Athlete, RosterError> {
        // Surface a missing athlete as NotFound rather than a storage error.
        self.get_athlete(id).await?;

        let mut patch = Row::new();
        patch.insert("is_public".to_string(), Value::Bool(is_public));
        let published_at = if is_public {
            serde_json::to_value(now)?
        } else {
            Value::Null
        };
        patch.insert("published_at".to_string(), published_at);

        let row = self.store.patch(Collection::Athletes, id, patch).await?;
        info!(athlete_id = id, is_public, "updated athlete visibility");
        Ok(from_row(row)?)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, RosterError> {
        let rows = self
            .store
            .query(Collection::Users, &Query::new().eq("email", email.trim()))
            .await?;
        Ok(rows.into_iter().next().map(from_row).transpose()?)
    }

    pub async fn get_user(&self, id: i64) -> Result<UserAccount, RosterError> {
        let rows = self
            .store
            .query(Collection::Users, &Query::new().eq("id", id))
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| RosterError::NotFound(format!("user {id}")))?;
        Ok(from_row(row)?)
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<UserAccount, RosterError> {
        let user = self
            .find_user_by_email(email)
            .await?
            .ok_or(RosterError::InvalidCredentials)?;
        if user.password_hash.as_deref() != Some(password) {
            return Err(RosterError::InvalidCredentials);
        }
        info!(user_id = user.id, role = ?user.role, "user logged in");
        Ok(user)
    }
}
