use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Messaging-platform identity of an end user. Immutable once assigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> String {
        let first = self.first_name.trim();
        let last = self.last_name.as_deref().map(str::trim).unwrap_or_default();
        match (first.is_empty(), last.is_empty()) {
            (false, false) => format!("{first} {last}"),
            (false, true) => first.to_owned(),
            (true, false) => last.to_owned(),
            (true, true) => format!("user-{}", self.id),
        }
    }

    /// `Name (phone)` as shown in operator notifications.
    pub fn signature(&self) -> String {
        format!("{} ({})", self.display_name(), self.phone_number)
    }
}

/// Registration data captured from a contact-share event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewUser {
    pub id: UserId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone_number: String,
}

impl NewUser {
    pub fn into_user(self, created_at: DateTime<Utc>) -> User {
        User {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            phone_number: self.phone_number,
            created_at,
        }
    }
}
