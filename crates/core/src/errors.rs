use thiserror::Error;

use crate::{domain::appointment::Slot, flows::FlowTransitionError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("slot already taken: {slot}")]
    SlotTaken { slot: Slot },
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl ApplicationError {
    /// Text that is safe to show to the end user in chat.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::SlotTaken { .. }) => "❌ Цей час уже зайнятий. Оберіть інший.",
            Self::Domain(DomainError::FlowTransition(_)) => "😕 Щось пішло не так. Почніть знову.",
            Self::Domain(DomainError::InvariantViolation(_)) => {
                "😕 Не вдалося обробити запит. Перевірте дані та спробуйте ще раз."
            }
            Self::Persistence(_) => "⚠️ Сервіс тимчасово недоступний. Спробуйте трохи пізніше.",
        }
    }

    /// Whether the user can simply retry the same step.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::domain::appointment::{Slot, SlotTime};
    use crate::domain::catalog::Procedure;
    use crate::errors::{ApplicationError, DomainError};
    use crate::flows::{FlowEvent, FlowTransitionError, StepKind};

    #[test]
    fn slot_taken_maps_to_pick_another_message() {
        let error = ApplicationError::from(DomainError::SlotTaken {
            slot: Slot {
                procedure: Procedure::Massage,
                date: NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date"),
                time: SlotTime::new(10, 0).expect("valid time"),
            },
        });

        assert_eq!(error.user_message(), "❌ Цей час уже зайнятий. Оберіть інший.");
        assert!(!error.is_retryable());
    }

    #[test]
    fn stale_flow_maps_to_start_over_message() {
        let error = ApplicationError::from(DomainError::from(
            FlowTransitionError::MissingSelection {
                step: StepKind::Idle,
                event: FlowEvent::SugarChosen(crate::domain::catalog::Sugar::With),
                missing: "coffee size",
            },
        ));

        assert_eq!(error.user_message(), "😕 Щось пішло не так. Почніть знову.");
    }

    #[test]
    fn persistence_error_is_retryable_and_hides_details() {
        let error = ApplicationError::Persistence("database lock timeout".to_owned());

        assert!(error.is_retryable());
        assert!(!error.user_message().contains("lock"));
    }
}
