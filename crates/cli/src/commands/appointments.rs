use chrono::NaiveDate;
use serde::Serialize;

use lounge_core::config::{AppConfig, LoadOptions};
use lounge_core::domain::appointment::format_date;
use lounge_db::repositories::{
    AppointmentRepository, SqlAppointmentRepository, SqlUserRepository, UserRepository,
};
use lounge_db::{connect, DbPool};

use crate::commands::{block_on, CommandResult};

#[derive(Debug, Serialize)]
struct AppointmentRow {
    id: String,
    time: String,
    procedure: &'static str,
    telegram_id: i64,
    client: String,
    phone_number: Option<String>,
}

/// Day sheet for the front desk: every booked slot on `date`, earliest first.
pub fn run(date: NaiveDate) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "appointments",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let result = block_on("appointments", async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let rows = day_sheet(&pool, date).await;
        pool.close().await;
        rows.map_err(|error| ("db_query", error, 6u8))
    });

    match result {
        Ok(Ok(rows)) => {
            let mut lines = vec![format!("{} appointment(s) on {}", rows.len(), format_date(date))];
            lines.extend(rows.iter().map(|row| {
                let phone = row.phone_number.as_deref().unwrap_or("unregistered");
                format!("- {} {}: {} ({phone})", row.time, row.procedure, row.client)
            }));
            let data = serde_json::to_value(&rows).ok();
            CommandResult::success_with_data("appointments", lines.join("\n"), data)
        }
        Ok(Err((error_class, message, exit_code))) => {
            CommandResult::failure("appointments", error_class, message, exit_code)
        }
        Err(runtime_failure) => runtime_failure,
    }
}

async fn day_sheet(pool: &DbPool, date: NaiveDate) -> Result<Vec<AppointmentRow>, String> {
    let appointments = SqlAppointmentRepository::new(pool.clone());
    let users = SqlUserRepository::new(pool.clone());

    let mut rows = Vec::new();
    for appointment in appointments.list_by_date(date).await.map_err(|error| error.to_string())? {
        let user = users.find_by_id(appointment.user_id).await.map_err(|error| error.to_string())?;
        rows.push(AppointmentRow {
            id: appointment.id.to_string(),
            time: appointment.slot.time.to_string(),
            procedure: appointment.slot.procedure.label(),
            telegram_id: appointment.user_id.0,
            client: user.as_ref().map_or_else(|| format!("user-{}", appointment.user_id), |user| {
                user.display_name()
            }),
            phone_number: user.map(|user| user.phone_number),
        });
    }
    Ok(rows)
}
