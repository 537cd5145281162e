use std::sync::Arc;

use chrono::NaiveDate;
use tempfile::TempDir;

use lounge_core::domain::appointment::{Appointment, Slot, SlotTime};
use lounge_core::domain::catalog::Procedure;
use lounge_core::domain::user::UserId;
use lounge_db::repositories::{AppointmentRepository, RepositoryError, SqlAppointmentRepository};
use lounge_db::{connect_with_settings, migrations};

type LedgerTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

async fn file_backed_repo(dir: &TempDir) -> LedgerTestResult<SqlAppointmentRepository> {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("ledger.db").display());
    let pool = connect_with_settings(&url, 4, 30).await.map_err(|e| e.to_string())?;
    migrations::run_pending(&pool).await.map_err(|e| e.to_string())?;
    Ok(SqlAppointmentRepository::new(pool))
}

fn slot() -> LedgerTestResult<Slot> {
    Ok(Slot {
        procedure: Procedure::Endosphere,
        date: NaiveDate::from_ymd_opt(2024, 6, 1).ok_or("invalid date")?,
        time: SlotTime::new(14, 0).map_err(|e| e.to_string())?,
    })
}

#[tokio::test]
async fn concurrent_bookings_across_connections_have_one_winner() -> LedgerTestResult {
    let dir = TempDir::new().map_err(|e| e.to_string())?;
    let repo = Arc::new(file_backed_repo(&dir).await?);
    let contested = slot()?;

    let handles: Vec<_> = (1..=6)
        .map(|user| {
            let repo = Arc::clone(&repo);
            let contested = contested.clone();
            tokio::spawn(async move { repo.create(Appointment::new(UserId(user), contested)).await })
        })
        .collect();

    let mut winners = Vec::new();
    let mut rejected = 0;
    for handle in handles {
        match handle.await.map_err(|e| e.to_string())? {
            Ok(appointment) => winners.push(appointment),
            Err(RepositoryError::SlotTaken(taken)) => {
                require_eq!(taken, contested);
                rejected += 1;
            }
            Err(other) => return Err(format!("unexpected repository error: {other}")),
        }
    }

    require_eq!(winners.len(), 1);
    require_eq!(rejected, 5);

    let holder = repo.find_by_slot(&contested).await.map_err(|e| e.to_string())?;
    require!(
        holder.as_ref().map(|a| &a.id) == winners.first().map(|a| &a.id),
        "stored holder should be the single winner"
    );
    Ok(())
}

#[tokio::test]
async fn bookings_survive_a_reconnect() -> LedgerTestResult {
    let dir = TempDir::new().map_err(|e| e.to_string())?;
    let booked = {
        let repo = file_backed_repo(&dir).await?;
        repo.create(Appointment::new(UserId(77), slot()?)).await.map_err(|e| e.to_string())?
    };

    let reopened = file_backed_repo(&dir).await?;
    let mine = reopened.find_by_user(UserId(77)).await.map_err(|e| e.to_string())?;
    require_eq!(mine.len(), 1);
    require!(mine[0].id == booked.id, "reopened ledger should return the stored booking");
    Ok(())
}
