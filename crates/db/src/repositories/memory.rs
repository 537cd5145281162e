use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;

use lounge_core::domain::appointment::{Appointment, AppointmentId, Slot, SlotTime};
use lounge_core::domain::catalog::Procedure;
use lounge_core::domain::user::{NewUser, User, UserId};

use super::{AppointmentRepository, RepositoryError, UserRepository};

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, User>>,
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn register(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        let stored = users.entry(user.id).or_insert_with(|| user.into_user(Utc::now()));
        Ok(stored.clone())
    }
}

/// Slot uniqueness holds because the check and the insert happen under one
/// write guard.
#[derive(Default)]
pub struct InMemoryAppointmentRepository {
    appointments: RwLock<HashMap<AppointmentId, Appointment>>,
}

fn sorted(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by(|a, b| {
        (a.slot.date, a.slot.time, a.slot.procedure.key())
            .cmp(&(b.slot.date, b.slot.time, b.slot.procedure.key()))
    });
    appointments
}

#[async_trait::async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn create(&self, appointment: Appointment) -> Result<Appointment, RepositoryError> {
        let mut appointments = self.appointments.write().await;
        if appointments.values().any(|existing| existing.slot == appointment.slot) {
            return Err(RepositoryError::SlotTaken(appointment.slot));
        }
        appointments.insert(appointment.id.clone(), appointment.clone());
        Ok(appointment)
    }

    async fn find_by_id(&self, id: &AppointmentId) -> Result<Option<Appointment>, RepositoryError> {
        let appointments = self.appointments.read().await;
        Ok(appointments.get(id).cloned())
    }

    async fn find_by_slot(&self, slot: &Slot) -> Result<Option<Appointment>, RepositoryError> {
        let appointments = self.appointments.read().await;
        Ok(appointments.values().find(|a| &a.slot == slot).cloned())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Appointment>, RepositoryError> {
        let appointments = self.appointments.read().await;
        Ok(sorted(appointments.values().filter(|a| a.is_owned_by(user_id)).cloned().collect()))
    }

    async fn taken_times(
        &self,
        procedure: Procedure,
        date: NaiveDate,
    ) -> Result<Vec<SlotTime>, RepositoryError> {
        let appointments = self.appointments.read().await;
        let mut times: Vec<SlotTime> = appointments
            .values()
            .filter(|a| a.slot.procedure == procedure && a.slot.date == date)
            .map(|a| a.slot.time)
            .collect();
        times.sort();
        Ok(times)
    }

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Appointment>, RepositoryError> {
        let appointments = self.appointments.read().await;
        Ok(sorted(appointments.values().filter(|a| a.slot.date == date).cloned().collect()))
    }

    async fn delete_by_id(&self, id: &AppointmentId) -> Result<bool, RepositoryError> {
        let mut appointments = self.appointments.write().await;
        Ok(appointments.remove(id).is_some())
    }

    async fn delete_all_by_user(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let mut appointments = self.appointments.write().await;
        let before = appointments.len();
        appointments.retain(|_, a| !a.is_owned_by(user_id));
        Ok((before - appointments.len()) as u64)
    }
}
