use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;

use lounge_core::domain::appointment::{Appointment, AppointmentId, Slot, SlotTime};
use lounge_core::domain::catalog::Procedure;
use lounge_core::domain::user::UserId;

use super::{AppointmentRepository, RepositoryError};
use crate::DbPool;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqlAppointmentRepository {
    pool: DbPool,
}

impl SqlAppointmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn row_to_appointment(row: &sqlx::sqlite::SqliteRow) -> Result<Appointment, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let telegram_id: i64 =
        row.try_get("telegram_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let procedure_key: String =
        row.try_get("procedure").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let date_str: String =
        row.try_get("date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let time_str: String =
        row.try_get("time").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let procedure = Procedure::from_key(&procedure_key).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown procedure `{procedure_key}`"))
    })?;
    let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
        .map_err(|e| RepositoryError::Decode(format!("appointments.date: {e}")))?;
    let time = time_str
        .parse::<SlotTime>()
        .map_err(|e| RepositoryError::Decode(format!("appointments.time: {e}")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("appointments.created_at: {e}")))?;

    Ok(Appointment {
        id: AppointmentId(id),
        user_id: UserId(telegram_id),
        slot: Slot { procedure, date, time },
        created_at,
    })
}

#[async_trait::async_trait]
impl AppointmentRepository for SqlAppointmentRepository {
    async fn create(&self, appointment: Appointment) -> Result<Appointment, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO appointments (id, telegram_id, procedure, date, time, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&appointment.id.0)
        .bind(appointment.user_id.0)
        .bind(appointment.slot.procedure.key())
        .bind(date_key(appointment.slot.date))
        .bind(appointment.slot.time.to_string())
        .bind(appointment.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(appointment),
            Err(sqlx::Error::Database(error)) if error.is_unique_violation() => {
                Err(RepositoryError::SlotTaken(appointment.slot))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn find_by_id(&self, id: &AppointmentId) -> Result<Option<Appointment>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, telegram_id, procedure, date, time, created_at
             FROM appointments WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_appointment(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_slot(&self, slot: &Slot) -> Result<Option<Appointment>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, telegram_id, procedure, date, time, created_at
             FROM appointments WHERE procedure = ? AND date = ? AND time = ?",
        )
        .bind(slot.procedure.key())
        .bind(date_key(slot.date))
        .bind(slot.time.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_appointment(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Appointment>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, telegram_id, procedure, date, time, created_at
             FROM appointments WHERE telegram_id = ?
             ORDER BY date ASC, time ASC",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_appointment).collect::<Result<Vec<_>, _>>()
    }

    async fn taken_times(
        &self,
        procedure: Procedure,
        date: NaiveDate,
    ) -> Result<Vec<SlotTime>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT time FROM appointments WHERE procedure = ? AND date = ? ORDER BY time ASC",
        )
        .bind(procedure.key())
        .bind(date_key(date))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let value: String =
                    row.try_get("time").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                value
                    .parse::<SlotTime>()
                    .map_err(|e| RepositoryError::Decode(format!("appointments.time: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()
    }

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Appointment>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, telegram_id, procedure, date, time, created_at
             FROM appointments WHERE date = ?
             ORDER BY time ASC, procedure ASC",
        )
        .bind(date_key(date))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_appointment).collect::<Result<Vec<_>, _>>()
    }

    async fn delete_by_id(&self, id: &AppointmentId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM appointments WHERE id = ?").bind(&id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_by_user(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM appointments WHERE telegram_id = ?")
            .bind(user_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
