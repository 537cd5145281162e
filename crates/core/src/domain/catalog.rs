//! Fixed menu of the lounge: bookable procedures and coffee options.
//!
//! Every item has a stable ASCII `key` used inside callback payloads and a
//! user-facing `label`.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Procedure {
    Massage,
    Cleaning,
    Btl,
    Endosphere,
}

impl Procedure {
    pub const ALL: [Procedure; 4] =
        [Procedure::Massage, Procedure::Cleaning, Procedure::Btl, Procedure::Endosphere];

    pub fn key(self) -> &'static str {
        match self {
            Self::Massage => "massage",
            Self::Cleaning => "cleaning",
            Self::Btl => "btl",
            Self::Endosphere => "endosphere",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Massage => "Масаж",
            Self::Cleaning => "Чистка",
            Self::Btl => "БТЛ",
            Self::Endosphere => "Ендосфера",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|procedure| procedure.key() == key)
    }

    /// Procedures are persisted by label, matching what operators read.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|procedure| procedure.label() == label)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoffeeKind {
    Espresso,
    Americano,
    Latte,
    Lungo,
}

impl CoffeeKind {
    pub const ALL: [CoffeeKind; 4] =
        [CoffeeKind::Espresso, CoffeeKind::Americano, CoffeeKind::Latte, CoffeeKind::Lungo];

    pub fn key(self) -> &'static str {
        match self {
            Self::Espresso => "espresso",
            Self::Americano => "americano",
            Self::Latte => "latte",
            Self::Lungo => "lungo",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Espresso => "Еспресо",
            Self::Americano => "Американо",
            Self::Latte => "Лате",
            Self::Lungo => "Лунго",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CupSize {
    Small,
    Medium,
    Large,
}

impl CupSize {
    pub const ALL: [CupSize; 3] = [CupSize::Small, CupSize::Medium, CupSize::Large];

    pub fn key(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Small => "Маленька",
            Self::Medium => "Середня",
            Self::Large => "Велика",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|size| size.key() == key)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sugar {
    With,
    Without,
}

impl Sugar {
    pub fn key(self) -> &'static str {
        match self {
            Self::With => "yes",
            Self::Without => "no",
        }
    }

    /// Button caption.
    pub fn answer(self) -> &'static str {
        match self {
            Self::With => "Так",
            Self::Without => "Ні",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::With => "з цукром",
            Self::Without => "без цукру",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "yes" => Some(Self::With),
            "no" => Some(Self::Without),
            _ => None,
        }
    }
}

/// A completed coffee selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoffeeOrder {
    pub kind: CoffeeKind,
    pub size: CupSize,
    pub sugar: Sugar,
}

impl CoffeeOrder {
    /// `Лате (Середня, з цукром)`
    pub fn summary(&self) -> String {
        format!("{} ({}, {})", self.kind.label(), self.size.label(), self.sugar.label())
    }
}
