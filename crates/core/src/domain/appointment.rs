use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::catalog::Procedure;
use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppointmentId(pub String);

impl AppointmentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wall-clock start of a slot, minute precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotTime {
    hour: u8,
    minute: u8,
}

impl SlotTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, DomainError> {
        if hour > 23 || minute > 59 {
            return Err(DomainError::InvariantViolation(format!(
                "slot time {hour:02}:{minute:02} is out of range"
            )));
        }
        Ok(Self { hour, minute })
    }

    /// Parses the four-digit `HHMM` form used in callback payloads.
    pub fn parse_compact(value: &str) -> Result<Self, DomainError> {
        if value.len() != 4 || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::InvariantViolation(format!(
                "slot time `{value}` must be four digits"
            )));
        }
        let (hour, minute) = value.split_at(2);
        Self::new(parse_digits(hour)?, parse_digits(minute)?)
    }

    pub fn compact(self) -> String {
        format!("{:02}{:02}", self.hour, self.minute)
    }
}

fn parse_digits(value: &str) -> Result<u8, DomainError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DomainError::InvariantViolation(format!("`{value}` is not a number")));
    }
    value
        .parse::<u8>()
        .map_err(|_| DomainError::InvariantViolation(format!("`{value}` is not a number")))
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for SlotTime {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let Some((hour, minute)) = trimmed.split_once(':') else {
            return Err(DomainError::InvariantViolation(format!(
                "slot time `{trimmed}` must look like HH:MM"
            )));
        };
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(DomainError::InvariantViolation(format!(
                "slot time `{trimmed}` must look like HH:MM"
            )));
        }
        Self::new(parse_digits(hour)?, parse_digits(minute)?)
    }
}

/// A bookable unit. At most one appointment may hold a given slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub procedure: Procedure,
    pub date: NaiveDate,
    pub time: SlotTime,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} о {}", self.procedure.label(), format_date(self.date), self.time)
    }
}

/// `01.06.2024`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub user_id: UserId,
    pub slot: Slot,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn new(user_id: UserId, slot: Slot) -> Self {
        Self { id: AppointmentId::generate(), user_id, slot, created_at: Utc::now() }
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}
