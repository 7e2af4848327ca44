//! Writes: insert, update, delete and the `save` dispatcher.

use oxide_query::{Record, Value};
use serde::Serialize;
use tracing::info;

use super::check::CheckFailure;
use super::criteria::Criteria;
use super::Table;
use crate::connection::Connection;
use crate::error::Result;

/// What a write did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "detail")]
pub enum SaveOutcome {
    /// Nothing was written.
    NoChange,
    /// The row with this id was deleted.
    Deleted(i64),
    /// The row with this id was updated.
    Updated(i64),
    /// A row was added with this id.
    Added(i64),
    /// A check rejected the record.
    FailedCheck(CheckFailure),
    /// The statement affected an unexpected number of rows.
    Failed(u64),
}

impl SaveOutcome {
    /// Returns true unless the write failed or was rejected.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::FailedCheck(_) | Self::Failed(_))
    }

    /// Returns the id the write applied to, if any.
    #[must_use]
    pub const fn id(&self) -> Option<i64> {
        match self {
            Self::Deleted(id) | Self::Updated(id) | Self::Added(id) => Some(*id),
            Self::NoChange | Self::FailedCheck(_) | Self::Failed(_) => None,
        }
    }
}

impl Table {
    /// Writes `fields`.
    ///
    /// With an id (non-zero), empty `fields` delete the row and anything
    /// else updates it. Without one, the fields are inserted as a new row.
    /// `criteria` further restricts updates and deletes.
    ///
    /// # Errors
    ///
    /// Propagates query and connection errors. Rejected records are an
    /// outcome, not an error.
    pub async fn save<C: Connection>(
        &self,
        db: &C,
        id: Option<i64>,
        fields: Record,
        skip_checks: bool,
        criteria: &Criteria,
    ) -> Result<SaveOutcome> {
        match (id.filter(|id| *id != 0), fields.is_empty()) {
            (Some(id), true) => self.delete(db, id, criteria).await,
            (Some(id), false) => self.update(db, id, fields, skip_checks, criteria).await,
            (None, true) => Ok(SaveOutcome::NoChange),
            (None, false) => self.insert(db, fields, skip_checks).await,
        }
    }

    /// Inserts a new row. Missing fields take their filtered null value;
    /// columns are written in declaration order.
    ///
    /// Tables without autoincrement lock themselves, take `MAX(id) + 1` and
    /// unlock again whether or not the insert succeeded.
    ///
    /// # Errors
    ///
    /// Propagates connection errors.
    pub async fn insert<C: Connection>(
        &self,
        db: &C,
        fields: Record,
        skip_checks: bool,
    ) -> Result<SaveOutcome> {
        let mut record = self.filter(fields, true);
        if !skip_checks {
            if let Some(failure) = self.check(db, &record, None).await? {
                return Ok(SaveOutcome::FailedCheck(failure));
            }
        }

        let outcome = if self.id_is_autoincrement {
            record.shift_remove(&self.id_field);
            match db.execute(&self.insert_statement(db, &record)).await? {
                1 => SaveOutcome::Added(db.last_insert_id().await?),
                affected => SaveOutcome::Failed(affected),
            }
        } else {
            db.lock_table(&self.name).await?;
            let inserted = self.insert_with_next_id(db, record).await;
            let unlocked = db.unlock_table(&self.name).await;
            let outcome = inserted?;
            unlocked?;
            outcome
        };
        info!(table = %self.name, outcome = ?outcome, "Insert");
        Ok(outcome)
    }

    async fn insert_with_next_id<C: Connection>(
        &self,
        db: &C,
        mut record: Record,
    ) -> Result<SaveOutcome> {
        let sql = format!(
            "SELECT IFNULL(MAX(`{id}`), 0) + 1 AS next_id FROM `{table}`",
            id = self.id_field,
            table = self.name
        );
        let next_id = db
            .query_value("next_id", Value::Int(1), &sql)
            .await?
            .as_i64()
            .unwrap_or(1);
        record.insert(self.id_field.clone(), Value::Int(next_id));
        Ok(match db.execute(&self.insert_statement(db, &record)).await? {
            1 => SaveOutcome::Added(next_id),
            affected => SaveOutcome::Failed(affected),
        })
    }

    fn insert_statement<C: Connection>(&self, db: &C, record: &Record) -> String {
        let (columns, values): (Vec<String>, Vec<String>) = self
            .fields
            .keys()
            .filter_map(|name| {
                record
                    .get(name)
                    .map(|value| (format!("`{name}`"), db.literal(value)))
            })
            .unzip();
        if columns.is_empty() {
            format!("INSERT INTO `{}` DEFAULT VALUES", self.name)
        } else {
            format!(
                "INSERT INTO `{}` ({}) VALUES ({})",
                self.name,
                columns.join(", "),
                values.join(", ")
            )
        }
    }

    /// Updates the row `id` with the supplied fields.
    ///
    /// Checks see the stored record with the supplied fields merged over
    /// it; only the supplied declared fields are written.
    ///
    /// # Errors
    ///
    /// Propagates connection errors.
    pub async fn update<C: Connection>(
        &self,
        db: &C,
        id: i64,
        fields: Record,
        skip_checks: bool,
        criteria: &Criteria,
    ) -> Result<SaveOutcome> {
        let fields = self.filter(fields, false);
        if !skip_checks {
            let mut merged = self
                .load(db, &Criteria::Id(id), &[])
                .await?
                .unwrap_or_else(|| self.blank_record());
            for (name, value) in &fields {
                merged.insert(name.clone(), value.clone());
            }
            let merged = self.filter(merged, false);
            if let Some(failure) = self.check(db, &merged, Some(id)).await? {
                return Ok(SaveOutcome::FailedCheck(failure));
            }
        }

        let assignments: Vec<String> = fields
            .iter()
            .filter(|(name, _)| *name != &self.id_field && self.has_field(name))
            .map(|(name, value)| format!("`{name}` = {}", db.literal(value)))
            .collect();
        if assignments.is_empty() {
            return Ok(SaveOutcome::NoChange);
        }

        let sql = format!(
            "UPDATE `{}` SET {} WHERE {}",
            self.name,
            assignments.join(", "),
            self.row_condition(db, id, criteria)
        );
        let outcome = match db.execute(&sql).await? {
            0 => SaveOutcome::NoChange,
            1 => SaveOutcome::Updated(id),
            affected => SaveOutcome::Failed(affected),
        };
        info!(table = %self.name, id, outcome = ?outcome, "Update");
        Ok(outcome)
    }

    /// Deletes the row `id`, if it also matches `criteria`.
    ///
    /// # Errors
    ///
    /// Propagates connection errors.
    pub async fn delete<C: Connection>(
        &self,
        db: &C,
        id: i64,
        criteria: &Criteria,
    ) -> Result<SaveOutcome> {
        let sql = format!(
            "DELETE FROM `{}` WHERE {}",
            self.name,
            self.row_condition(db, id, criteria)
        );
        let outcome = if db.execute(&sql).await? == 1 {
            SaveOutcome::Deleted(id)
        } else {
            SaveOutcome::NoChange
        };
        info!(table = %self.name, id, outcome = ?outcome, "Delete");
        Ok(outcome)
    }

    fn row_condition<C: Connection>(&self, db: &C, id: i64, criteria: &Criteria) -> String {
        let by_id = format!("`{}` = {id}", self.id_field);
        match criteria.to_expression(db, &self.id_field) {
            Some(condition) => format!("{by_id} AND ({condition})"),
            None => by_id,
        }
    }
}
