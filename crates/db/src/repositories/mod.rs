use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use lounge_core::domain::appointment::{Appointment, AppointmentId, Slot, SlotTime};
use lounge_core::domain::catalog::Procedure;
use lounge_core::domain::user::{NewUser, User, UserId};
use lounge_core::errors::{ApplicationError, DomainError};

pub mod appointment;
pub mod memory;
pub mod user;

pub use appointment::SqlAppointmentRepository;
pub use memory::{InMemoryAppointmentRepository, InMemoryUserRepository};
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("slot already booked: {0}")]
    SlotTaken(Slot),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::SlotTaken(slot) => DomainError::SlotTaken { slot }.into(),
            other => ApplicationError::Persistence(other.to_string()),
        }
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    /// Inserts the user unless a record with the same id already exists; the
    /// stored record is returned either way.
    async fn register(&self, user: NewUser) -> Result<User, RepositoryError>;
}

/// Durable ledger of booked slots. `create` is the only way to claim a slot
/// and fails with [`RepositoryError::SlotTaken`] when the slot is already held.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn create(&self, appointment: Appointment) -> Result<Appointment, RepositoryError>;
    async fn find_by_id(&self, id: &AppointmentId) -> Result<Option<Appointment>, RepositoryError>;
    async fn find_by_slot(&self, slot: &Slot) -> Result<Option<Appointment>, RepositoryError>;
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Appointment>, RepositoryError>;
    async fn taken_times(
        &self,
        procedure: Procedure,
        date: NaiveDate,
    ) -> Result<Vec<SlotTime>, RepositoryError>;
    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Appointment>, RepositoryError>;
    async fn delete_by_id(&self, id: &AppointmentId) -> Result<bool, RepositoryError>;
    async fn delete_all_by_user(&self, user_id: UserId) -> Result<u64, RepositoryError>;
}
